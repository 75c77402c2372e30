//! Content identifiers (blake3, 32 bytes)
//!
//! Every block and every DAG node is named by the BLAKE3 digest of its bytes.

use std::{fmt, str::FromStr};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("invalid hash length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
    #[error("invalid hex hash: {0}")]
    InvalidHex(#[from] data_encoding::DecodeError),
}

/// Content identifier: the BLAKE3 hash of a block.
#[derive(Clone, Copy, Hash, PartialEq, Eq)]
pub struct Hash(blake3::Hash);

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hash").field(&self.to_hex()).finish()
    }
}

impl Hash {
    pub fn new(buf: impl AsRef<[u8]>) -> Self {
        Hash(blake3::hash(buf.as_ref()))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(blake3::Hash::from_bytes(bytes))
    }

    /// Reads an identifier from bytes whose length is not known in advance,
    /// such as a stored record.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, HashError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| HashError::InvalidLength(bytes.len()))?;
        Ok(Self::from_bytes(arr))
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }

    /// Hex of the first 5 bytes, for log lines.
    pub fn fmt_short(&self) -> String {
        data_encoding::HEXLOWER.encode(&self.as_bytes()[..5])
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl PartialOrd for Hash {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Hash {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.as_bytes().cmp(other.0.as_bytes())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Hash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = data_encoding::HEXLOWER_PERMISSIVE.decode(s.trim().as_bytes())?;
        Hash::from_slice(&bytes)
    }
}

// CBOR: a hash is a 32-byte byte string.
impl<C> minicbor::Encode<C> for Hash {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.bytes(self.as_bytes())?;
        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Hash {
    fn decode(
        d: &mut minicbor::Decoder<'b>,
        _ctx: &mut C,
    ) -> Result<Self, minicbor::decode::Error> {
        let bytes = d.bytes()?;
        Hash::from_slice(bytes).map_err(|e| minicbor::decode::Error::message(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip_is_case_insensitive() {
        let hash = Hash::new(b"parse me");
        assert_eq!(hash.to_hex().len(), 64);
        assert_eq!(hash.to_string().parse::<Hash>().unwrap(), hash);
        assert_eq!(hash.to_hex().to_uppercase().parse::<Hash>().unwrap(), hash);
        assert!(hash.to_hex().starts_with(&hash.fmt_short()));
    }

    #[test]
    fn rejects_wrong_lengths_and_digits() {
        assert!(matches!("abcd".parse::<Hash>(), Err(HashError::InvalidLength(2))));
        assert!(matches!(
            "zz".repeat(32).parse::<Hash>(),
            Err(HashError::InvalidHex(_))
        ));
        assert_eq!(Hash::from_slice(&[7; 31]), Err(HashError::InvalidLength(31)));
    }

    #[test]
    fn orders_by_bytes() {
        let low = Hash::from_bytes([0; 32]);
        let mut mid = [0; 32];
        mid[31] = 1;
        let high = Hash::from_bytes([0xff; 32]);
        assert!(low < Hash::from_bytes(mid));
        assert!(Hash::from_bytes(mid) < high);
    }

    #[test]
    fn encodes_as_cbor_byte_string() {
        let hash = Hash::new(b"cbor");
        let encoded = minicbor::to_vec(hash).unwrap();
        assert_eq!(&encoded[..2], &[0x58, 0x20]);
        assert_eq!(minicbor::decode::<Hash>(&encoded).unwrap(), hash);

        // two-byte byte string
        assert!(minicbor::decode::<Hash>(&[0x42, 1, 2]).is_err());
    }
}
