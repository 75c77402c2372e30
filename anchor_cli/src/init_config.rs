use std::{fs, io::Write, path::Path};

use anyhow::Context;
use toml_edit::{DocumentMut, Item, Table};
use tracing::info;

use crate::config::CONFIG_FILE;

/// Writes `anchor.toml` into `repo`, adding whatever tables are missing.
/// Values already present in an existing file are left alone.
pub fn init_repo(repo: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(repo)
        .with_context(|| format!("failed to create repository {}", repo.display()))?;
    let config_file = repo.join(CONFIG_FILE);

    let mut doc = if config_file.exists() {
        fs::read_to_string(&config_file)?
    } else {
        String::new()
    }
    .parse::<DocumentMut>()
    .context("could not parse repository config file")?;

    if !doc.contains_key("store") {
        let mut store = Table::new();
        store.insert("type", "local".into());
        store.insert("base_path", "blocks".into());
        doc.insert("store", Item::Table(store));
    }

    if !doc.contains_key("datastore") {
        let mut datastore = Table::new();
        datastore.insert("path", "datastore".into());
        doc.insert("datastore", Item::Table(datastore));
    }

    info!("writing to config file {config_file:?}");

    let tmp_path = config_file.with_extension("tmp");
    let mut tmp = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)?;
    tmp.write_all(doc.to_string().as_bytes())?;
    tmp.sync_all()?;
    fs::rename(&tmp_path, config_file)?;
    Ok(())
}
