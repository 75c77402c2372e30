use std::collections::BTreeSet;

use anchor_core::{DagService, Hash};
use anchor_pin::{PinQuery, reachable_from};
use anyhow::{Result, bail};

use super::Repo;
use crate::PinCmd;

pub async fn run_pin(cmd: PinCmd, repo: &Repo) -> Result<()> {
    let pinner = &repo.pinner;
    match cmd {
        PinCmd::Add { hash, recursive } => {
            pinner.pin(hash, recursive).await?;
            pinner.flush().await?;
            println!("pinned {hash} {}", if recursive { "recursively" } else { "directly" });
        }
        PinCmd::Rm { hash, recursive } => {
            pinner.unpin(hash, recursive).await?;
            pinner.flush().await?;
            println!("unpinned {hash}");
        }
        PinCmd::Ls { kind } => {
            for (hash, label) in list_pins(repo, kind).await? {
                println!("{hash} {label}");
            }
        }
        PinCmd::Verify => {
            let mut problems = 0usize;
            for root in pinner.recursive_keys().await {
                if let Err(err) = repo.dag.fetch_graph(root).await {
                    eprintln!("recursive pin {root} is incomplete: {err:#}");
                    problems += 1;
                }
            }
            for key in pinner.direct_keys().await {
                if !repo.dag.has(key).await? {
                    eprintln!("direct pin {key} is missing");
                    problems += 1;
                }
            }
            for key in pinner.internal_pins().await {
                if !repo.dag.has(key).await? {
                    eprintln!("pin record node {key} is missing");
                    problems += 1;
                }
            }
            if problems > 0 {
                bail!("{problems} pins failed verification");
            }
            println!("all pins verified");
        }
    }
    Ok(())
}

async fn list_pins(repo: &Repo, kind: PinQuery) -> Result<Vec<(Hash, &'static str)>> {
    let snapshot = repo.pinner.snapshot().await;
    let mut out = Vec::new();

    if matches!(kind, PinQuery::All | PinQuery::Recursive) {
        out.extend(snapshot.recursive.iter().map(|h| (*h, "recursive")));
    }
    if matches!(kind, PinQuery::All | PinQuery::Direct) {
        out.extend(snapshot.direct.iter().map(|h| (*h, "direct")));
    }
    if kind == PinQuery::Internal {
        out.extend(snapshot.internal.iter().map(|h| (*h, "internal")));
    }
    if matches!(kind, PinQuery::All | PinQuery::Indirect) {
        let roots = &snapshot.recursive;
        let reachable = reachable_from(repo.dag.as_ref(), roots.iter().copied()).await?;
        // Only nodes that no stronger pin already names.
        let indirect: BTreeSet<Hash> = reachable
            .into_iter()
            .filter(|h| !roots.contains(h) && !snapshot.direct.contains(h))
            .collect();
        out.extend(indirect.into_iter().map(|h| (h, "indirect")));
    }

    Ok(out)
}
