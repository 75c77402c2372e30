use std::collections::HashSet;

use anchor_core::{BlockStore, DagService, Hash};
use tracing::{debug, warn};

use crate::{PinError, PinResult, Pinner};

/// `roots` and every node reachable from them.
///
/// Fails on the first node that cannot be read.
pub async fn reachable_from<I>(dag: &dyn DagService, roots: I) -> PinResult<HashSet<Hash>>
where
    I: IntoIterator<Item = Hash>,
{
    let mut reachable = HashSet::new();
    let mut stack: Vec<Hash> = roots.into_iter().collect();
    while let Some(hash) = stack.pop() {
        if !reachable.insert(hash) {
            continue;
        }
        let node = dag.get(hash).await.map_err(PinError::Fetch)?;
        stack.extend(node.links.iter().map(|l| l.hash));
    }
    Ok(reachable)
}

/// Every identifier `pinner` requires to be kept: recursive roots and all
/// their descendants, direct pins, and the nodes of the pin record.
///
/// All three sets come from one [`Pinner::snapshot`] taken before the walk.
/// Fails if any node under a recursive root cannot be read. A partial walk
/// would let the collector delete blocks that are still pinned.
pub async fn collect_retained(pinner: &Pinner) -> PinResult<HashSet<Hash>> {
    let snapshot = pinner.snapshot().await;
    let mut retained = reachable_from(pinner.dag().as_ref(), snapshot.recursive).await?;
    retained.extend(snapshot.direct);
    retained.extend(snapshot.internal);
    debug!(retained = retained.len(), "collected retained set");
    Ok(retained)
}

/// Summary of a garbage-collection run over a block store.
#[derive(Debug, Default)]
pub struct GcReport {
    /// Blocks examined.
    pub total: usize,
    /// Blocks kept because they are retained.
    pub kept: usize,
    /// Blocks that were deleted in this run. Zero for a dry run.
    pub deleted: usize,
    /// Blocks not retained, whether or not they were deleted.
    pub candidates: Vec<Hash>,
    pub delete_errors: Vec<(Hash, anyhow::Error)>,
}

/// Deletes every block in `blocks` that is not in `retained`, or only
/// reports them when `dry_run` is set.
///
/// Delete failures are collected in the report and do not stop the run.
pub async fn gc_store(
    blocks: &BlockStore,
    retained: &HashSet<Hash>,
    dry_run: bool,
) -> anyhow::Result<GcReport> {
    let mut report = GcReport::default();

    for hash in blocks.list_hashes().await? {
        report.total += 1;
        if retained.contains(&hash) {
            report.kept += 1;
            continue;
        }

        report.candidates.push(hash);
        if dry_run {
            continue;
        }
        match blocks.remove(hash).await {
            Ok(()) => report.deleted += 1,
            Err(err) => {
                warn!(hash = %hash.fmt_short(), "failed to delete block: {err:#}");
                report.delete_errors.push((hash, err));
            }
        }
    }

    report.candidates.sort();
    Ok(report)
}
