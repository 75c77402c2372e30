use anchor_core::store::{StoreFeatures, StoreResult};
use anyhow::{Context, bail};
use bytes::Bytes;
use futures::Stream;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use walkdir::WalkDir;

const TMP_EXTENSION: &str = "tmp";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalStoreConfig {
    pub base_path: String,
}

/// Block storage in a plain directory tree.
///
/// Writes go to a sibling temp file that is synced and renamed into place,
/// so a crash never leaves a truncated block under its final name.
#[derive(Debug, Clone)]
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        LocalStore {
            base_path: base_path.into(),
        }
    }

    pub fn create(config: LocalStoreConfig) -> Self {
        LocalStore {
            base_path: config.base_path.into(),
        }
    }

    pub fn to_block_store(self) -> anchor_core::BlockStore {
        anchor_core::BlockStore::new(self)
    }

    /// Maps a store path under `base_path`, refusing anything that could
    /// escape it.
    fn resolve_path(&self, path: &str) -> StoreResult<PathBuf> {
        if path.starts_with('/') || path.split(['/', '\\']).any(|part| part == "..") {
            bail!("store path '{path}' must be relative and stay inside the store");
        }
        Ok(self.base_path.join(path))
    }
}

fn is_tmp(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == TMP_EXTENSION)
}

fn walk_files(base: &Path) -> Vec<Result<String, std::io::Error>> {
    // nothing written yet
    if !base.exists() {
        return Vec::new();
    }
    WalkDir::new(base)
        .into_iter()
        .filter_map(|entry| match entry {
            Err(err) => Some(Err(err.into())),
            Ok(entry) if !entry.file_type().is_file() || is_tmp(entry.path()) => None,
            Ok(entry) => entry
                .path()
                .strip_prefix(base)
                .ok()
                .map(|rel| Ok(rel.to_string_lossy().into_owned())),
        })
        .collect()
}

#[async_trait::async_trait]
impl anchor_core::store::Store for LocalStore {
    fn features(&self) -> StoreFeatures {
        StoreFeatures {
            case_sensitive: false,
            recommended_max_dir_size: 1024,
        }
    }

    async fn exists(&self, path: &str) -> StoreResult<bool> {
        Ok(tokio::fs::try_exists(self.resolve_path(path)?).await?)
    }

    async fn put_bytes(&self, path: &str, bytes: Bytes) -> StoreResult<()> {
        let target = self.resolve_path(path)?;
        if let Some(dir) = target.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }

        let staging = target.with_extension(TMP_EXTENSION);
        {
            let mut file = File::create(&staging).await?;
            file.write_all(&bytes).await?;
            file.sync_all().await?;
        }
        tokio::fs::rename(&staging, &target).await?;
        Ok(())
    }

    async fn open_read_bytes(
        &self,
        path: &str,
        offset: u64,
        max_len: Option<u64>,
    ) -> StoreResult<Bytes> {
        let mut file = File::open(self.resolve_path(path)?).await?;
        let available = file.metadata().await?.len().saturating_sub(offset);
        let wanted = max_len.map_or(available, |max| max.min(available));
        if wanted == 0 {
            return Ok(Bytes::new());
        }

        file.seek(std::io::SeekFrom::Start(offset)).await?;
        let mut buffer = Vec::with_capacity(
            usize::try_from(wanted).context("requested range does not fit in memory")?,
        );
        file.take(wanted).read_to_end(&mut buffer).await?;
        Ok(buffer.into())
    }

    async fn size(&self, path: &str) -> StoreResult<u64> {
        let meta = tokio::fs::metadata(self.resolve_path(path)?).await?;
        Ok(meta.len())
    }

    /// Walks the directory tree on the blocking pool. Half-written
    /// staging files are skipped.
    async fn list(
        &self,
    ) -> StoreResult<Box<dyn Stream<Item = Result<String, std::io::Error>> + Send + Unpin + 'static>>
    {
        let base = self.base_path.clone();
        let entries = tokio::task::spawn_blocking(move || walk_files(&base)).await?;
        Ok(Box::new(futures::stream::iter(entries)))
    }

    /// Deleting a missing object is not an error.
    async fn delete(&self, path: &str) -> StoreResult<()> {
        match tokio::fs::remove_file(self.resolve_path(path)?).await {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchor_core::testutil::StoreTests;
    use anchor_core::store::Store;
    use anchor_core::{BlockDag, DagService, Node};

    #[tokio::test]
    async fn test_local_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(temp_dir.path());
        StoreTests::new(&store).run_all().await.unwrap();
    }

    #[tokio::test]
    async fn fresh_store_lists_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let blocks = LocalStore::new(temp_dir.path().join("not-created-yet")).to_block_store();
        assert!(blocks.list_hashes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_escaping_paths() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(temp_dir.path());
        assert!(store.exists("../outside").await.is_err());
        assert!(store.exists("a/../../outside").await.is_err());
        assert!(store.exists("/etc/passwd").await.is_err());
    }

    #[tokio::test]
    async fn blocks_survive_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let node = Node::leaf(b"persisted".to_vec());

        let hash = {
            let dag = BlockDag::new(LocalStore::new(temp_dir.path()).to_block_store());
            dag.add(&node).await.unwrap()
        };

        let blocks = LocalStore::new(temp_dir.path()).to_block_store();
        assert_eq!(blocks.list_hashes().await.unwrap(), vec![hash]);
        let dag = BlockDag::new(blocks);
        assert_eq!(dag.get(hash).await.unwrap(), node);
    }
}
