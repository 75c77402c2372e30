use anchor_pin::{collect_retained, gc_store};
use anyhow::Result;

use super::Repo;

pub async fn run_gc(repo: &Repo, dry_run: bool) -> Result<()> {
    let retained = collect_retained(&repo.pinner).await?;
    let report = gc_store(&repo.blocks, &retained, dry_run).await?;

    if dry_run {
        println!(
            "{} of {} blocks would be deleted",
            report.candidates.len(),
            report.total
        );
        for hash in &report.candidates {
            println!("{hash}");
        }
    } else {
        for (hash, err) in &report.delete_errors {
            eprintln!("failed to delete {hash}: {err:#}");
        }
        println!(
            "deleted {} blocks, kept {}",
            report.deleted, report.kept
        );
    }
    Ok(())
}
