use std::io::Write;

use anchor_core::{DagService, Node};
use anyhow::{Context, Result};

use super::Repo;
use crate::ObjectCmd;

pub async fn run_object(cmd: ObjectCmd, repo: &Repo) -> Result<()> {
    match cmd {
        ObjectCmd::Put { path, links } => {
            let data = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            for link in &links {
                if !repo.dag.has(link.hash).await? {
                    anyhow::bail!("link '{}' points at missing node {}", link.name, link.hash);
                }
            }
            let hash = repo.dag.add(&Node::new(data, links)).await?;
            println!("{hash}");
        }
        ObjectCmd::Get { hash } => {
            let node = repo.dag.get(hash).await?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(node.data())?;
            stdout.flush()?;
        }
        ObjectCmd::Links { hash } => {
            let node = repo.dag.get(hash).await?;
            for link in &node.links {
                println!("{} {}", link.hash, link.name);
            }
        }
    }
    Ok(())
}
