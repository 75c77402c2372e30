use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;

pub type StoreResult<T, E = anyhow::Error> = std::result::Result<T, E>;

/// Typed failures a `Store` may report through `anyhow::Error`.
///
/// Callers that need to distinguish a missing object from an I/O failure
/// use `err.downcast_ref::<StoreError>()`.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("object not found")]
    NotFound,
}

impl StoreError {
    /// Returns true if `err` (or anything in its chain) is a not-found error.
    pub fn is_not_found(err: &anyhow::Error) -> bool {
        err.chain().any(|cause| {
            matches!(cause.downcast_ref::<StoreError>(), Some(StoreError::NotFound))
                || cause
                    .downcast_ref::<std::io::Error>()
                    .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound)
        })
    }
}

/// Path-addressed byte storage.
#[async_trait]
pub trait Store: std::fmt::Debug + Send + Sync + 'static {
    fn features(&self) -> StoreFeatures;

    async fn exists(&self, path: &str) -> StoreResult<bool>;

    async fn put_bytes(&self, path: &str, bytes: Bytes) -> StoreResult<PutResponse>;

    async fn open_read_bytes(
        &self,
        path: &str,
        offset: u64,
        max_len: Option<u64>,
    ) -> StoreResult<Bytes>;

    async fn size(&self, path: &str) -> StoreResult<u64>;

    /// Lists every object path in the store.
    async fn list(
        &self,
    ) -> StoreResult<Box<dyn Stream<Item = Result<String, std::io::Error>> + Send + Unpin + 'static>>;

    async fn delete(&self, path: &str) -> StoreResult<()>;
}

pub type PutResponse = ();

pub struct StoreFeatures {
    pub case_sensitive: bool,
    pub recommended_max_dir_size: u64,
}
