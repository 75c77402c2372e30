use crate::{Hash, store::StoreFeatures};
use base64::Engine;

const BLOCK_PREFIX: &str = "block3/";

/// Relative path of a block inside a store.
///
/// Case-sensitive backends get base64url names, case-insensitive ones
/// base32. Backends that prefer small directories get the name split into
/// two-character fan-out levels.
pub fn path_for_hash(hash: Hash, features: &StoreFeatures) -> String {
    let hash_str = if features.case_sensitive {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hash)
    } else {
        let mut output = Vec::with_capacity(base32_fs::encoded_len(hash.as_bytes().len()));
        base32_fs::encode(hash.as_bytes(), &mut output);
        // base32_fs only emits ASCII
        String::from_utf8_lossy(&output).into_owned()
    };

    if features.recommended_max_dir_size < 10000 {
        if features.case_sensitive {
            format!("{}/{}/{}", &hash_str[0..2], &hash_str[2..4], &hash_str[4..])
        } else {
            format!(
                "{}/{}/{}/{}",
                &hash_str[0..2],
                &hash_str[2..4],
                &hash_str[4..6],
                &hash_str[6..]
            )
        }
    } else {
        hash_str
    }
}

pub fn block_path_for_hash(hash: Hash, features: &StoreFeatures) -> String {
    format!("{BLOCK_PREFIX}{}", path_for_hash(hash, features))
}

/// Inverse of [`block_path_for_hash`]. Paths outside the block prefix, or
/// that do not decode to a 32-byte hash, yield `Ok(None)`.
pub fn hash_from_block_path(
    path: &str,
    features: &StoreFeatures,
) -> Result<Option<Hash>, std::io::Error> {
    // Local stores list with the platform separator.
    let path = path.replace('\\', "/");
    let Some(rest) = path.strip_prefix(BLOCK_PREFIX) else {
        return Ok(None);
    };
    let encoded: String = rest.chars().filter(|&c| c != '/').collect();
    if encoded.is_empty() {
        return Ok(None);
    }

    let bytes = if features.case_sensitive {
        base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(encoded.as_bytes())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?
    } else {
        if !base32_fs::is_valid(encoded.as_bytes()) {
            return Ok(None);
        }
        let Some(len) = base32_fs::decoded_len(encoded.len()) else {
            return Ok(None);
        };
        let mut out = Vec::with_capacity(len);
        let _ = base32_fs::decode(encoded.as_bytes(), &mut out);
        out
    };

    Ok(Hash::from_slice(&bytes).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(case_sensitive: bool, recommended_max_dir_size: u64) -> StoreFeatures {
        StoreFeatures {
            case_sensitive,
            recommended_max_dir_size,
        }
    }

    #[test]
    fn paths_roundtrip_for_every_layout() {
        let hash = Hash::new(b"layout");
        for f in [
            features(true, u64::MAX),
            features(true, 1024),
            features(false, u64::MAX),
            features(false, 1024),
        ] {
            let path = block_path_for_hash(hash, &f);
            assert!(path.starts_with("block3/"));
            assert_eq!(hash_from_block_path(&path, &f).unwrap(), Some(hash));
        }
    }

    #[test]
    fn foreign_paths_are_ignored() {
        let f = features(false, 1024);
        assert_eq!(hash_from_block_path("other/abc", &f).unwrap(), None);
        assert_eq!(hash_from_block_path("block3/", &f).unwrap(), None);
    }
}
