//! RedbDatastore - a local `Datastore` backed by redb.

use anchor_core::Datastore;
use anchor_core::store::StoreResult;
use bytes::Bytes;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::{path::Path, sync::Arc};

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("records");

/// `Datastore` backed by a single redb file. Every `put` is its own
/// committed write transaction, so a returned `Ok` is durable.
#[derive(Clone)]
pub struct RedbDatastore {
    db: Arc<Database>,
}

impl RedbDatastore {
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;
        let db = Database::create(path.join("datastore.redb"))?;

        // Create the table up front so a first read on a fresh database
        // sees "no record" instead of a missing-table error.
        {
            let write_txn = db.begin_write()?;
            {
                let _ = write_txn.open_table(TABLE)?;
            }
            write_txn.commit()?;
        }

        Ok(Self { db: Arc::new(db) })
    }
}

impl std::fmt::Debug for RedbDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbDatastore").finish()
    }
}

#[async_trait::async_trait]
impl Datastore for RedbDatastore {
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        let db = self.db.clone();
        let key = key.to_owned();

        tokio::task::spawn_blocking(move || -> anyhow::Result<Option<Bytes>> {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(TABLE)?;
            let value = table
                .get(key.as_str())?
                .map(|guard| Bytes::copy_from_slice(guard.value()));
            Ok(value)
        })
        .await
        .map_err(|e| anyhow::anyhow!("redb read task failed: {}", e))?
    }

    async fn put(&self, key: &str, value: Bytes) -> StoreResult<()> {
        let db = self.db.clone();
        let key = key.to_owned();

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let write_txn = db.begin_write()?;
            {
                let mut table = write_txn.open_table(TABLE)?;
                table.insert(key.as_str(), value.as_ref())?;
            }
            write_txn.commit()?;
            Ok(())
        })
        .await
        .map_err(|e| anyhow::anyhow!("redb write task failed: {}", e))?
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let db = self.db.clone();
        let key = key.to_owned();

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let write_txn = db.begin_write()?;
            {
                let mut table = write_txn.open_table(TABLE)?;
                table.remove(key.as_str())?;
            }
            write_txn.commit()?;
            Ok(())
        })
        .await
        .map_err(|e| anyhow::anyhow!("redb delete task failed: {}", e))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchor_core::testutil::DatastoreTests;

    #[tokio::test]
    async fn test_redb_datastore() {
        let dir = tempfile::tempdir().unwrap();
        let ds = RedbDatastore::open(dir.path()).unwrap();
        DatastoreTests::new(&ds).run_all().await.unwrap();
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let ds = RedbDatastore::open(dir.path()).unwrap();
            ds.put("/local/pins", Bytes::from_static(b"root"))
                .await
                .unwrap();
        }
        let ds = RedbDatastore::open(dir.path()).unwrap();
        assert_eq!(
            ds.get("/local/pins").await.unwrap().as_deref(),
            Some(&b"root"[..])
        );
    }
}
