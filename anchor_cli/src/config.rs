use std::path::{Path, PathBuf};

use anchor_pin::PinnerConfig;
use anchor_store_local::LocalStoreConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "anchor.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnchorConfig {
    pub store: StoreConfig,
    pub datastore: DatastoreConfig,
    #[serde(default)]
    pub pinner: PinnerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum StoreConfig {
    Local(LocalStoreConfig),
    /// Blocks live only as long as the process. Useful for trying things.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatastoreConfig {
    pub path: String,
}

impl AnchorConfig {
    pub fn load(repo: &Path) -> anyhow::Result<Self> {
        let file = repo.join(CONFIG_FILE);
        let content = std::fs::read_to_string(&file).with_context(|| {
            format!(
                "failed to read {}; run `anchor init` first",
                file.display()
            )
        })?;
        let mut config: AnchorConfig = toml::from_str(&content)
            .with_context(|| format!("could not parse {}", file.display()))?;
        config.resolve_paths(repo);
        Ok(config)
    }

    /// Relative paths in the file are relative to the repository.
    fn resolve_paths(&mut self, repo: &Path) {
        if let StoreConfig::Local(local) = &mut self.store {
            local.base_path = resolve(repo, &local.base_path);
        }
        self.datastore.path = resolve(repo, &self.datastore.path);
    }
}

fn resolve(repo: &Path, path: &str) -> String {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path.to_string_lossy().into()
    } else {
        repo.join(path).to_string_lossy().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_local_store_and_resolves_paths() {
        let mut config: AnchorConfig = toml::from_str(
            r#"
[store]
type = "local"
base_path = "blocks"

[datastore]
path = "/var/lib/anchor/datastore"

[pinner]
fanout = 64
"#,
        )
        .unwrap();
        config.resolve_paths(Path::new("/repo"));

        assert_eq!(
            config.store,
            StoreConfig::Local(LocalStoreConfig {
                base_path: "/repo/blocks".into()
            })
        );
        assert_eq!(config.datastore.path, "/var/lib/anchor/datastore");
        assert_eq!(config.pinner.fanout, 64);
        assert_eq!(config.pinner.max_items, PinnerConfig::default().max_items);
    }

    #[test]
    fn pinner_table_is_optional() {
        let config: AnchorConfig = toml::from_str(
            r#"
[store]
type = "memory"

[datastore]
path = "datastore"
"#,
        )
        .unwrap();
        assert_eq!(config.store, StoreConfig::Memory);
        assert_eq!(config.pinner, PinnerConfig::default());
    }
}
