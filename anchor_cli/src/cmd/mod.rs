use std::path::Path;
use std::sync::Arc;

use anchor_core::{BlockDag, BlockStore, Link};
use anchor_datastore_redb::RedbDatastore;
use anchor_pin::Pinner;
use anchor_store_local::LocalStore;
use anchor_store_memory::MemoryStore;
use anyhow::Result;

use crate::config::{AnchorConfig, StoreConfig};

mod gc;
mod object;
mod pin;

pub use gc::run_gc;
pub use object::run_object;
pub use pin::run_pin;

/// Everything a command needs from an initialized repository.
pub struct Repo {
    pub blocks: BlockStore,
    pub dag: Arc<BlockDag>,
    pub pinner: Pinner,
}

impl Repo {
    pub async fn open(path: &Path) -> Result<Self> {
        let config = AnchorConfig::load(path)?;
        let blocks = match config.store {
            StoreConfig::Local(local) => BlockStore::new(LocalStore::create(local)),
            StoreConfig::Memory => BlockStore::new(MemoryStore::new()),
        };
        let dag = Arc::new(BlockDag::new(blocks.clone()));
        let datastore = Arc::new(RedbDatastore::open(&config.datastore.path)?);
        let pinner = Pinner::open(dag.clone(), datastore, &config.pinner).await?;
        Ok(Self {
            blocks,
            dag,
            pinner,
        })
    }
}

pub async fn run_command(repo: &Path, cmd: crate::Commands) -> Result<()> {
    match cmd {
        crate::Commands::Init => crate::init_config::init_repo(repo),
        crate::Commands::Object { cmd } => run_object(cmd, &Repo::open(repo).await?).await,
        crate::Commands::Pin { cmd } => run_pin(cmd, &Repo::open(repo).await?).await,
        crate::Commands::Gc { dry_run } => run_gc(&Repo::open(repo).await?, dry_run).await,
    }
}

/// Parses a `NAME=HASH` link argument.
pub fn parse_link(s: &str) -> Result<Link, String> {
    let (name, hash) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=HASH, got '{s}'"))?;
    let hash = hash
        .trim()
        .parse()
        .map_err(|e| format!("invalid hash in link '{s}': {e}"))?;
    Ok(Link::new(name, hash))
}
