use std::path::Path;

use anyhow::{bail, Context, Result};
use colored::Colorize;

use fmgen_core::DocumentStore;
use fmgen_pipeline::{SyncOptions, SyncOutcome, SyncPlan};

use super::Session;
use crate::diff;

pub async fn execute(session: &Session, path: &Path, dry_run: bool) -> Result<()> {
    let document = session
        .store
        .document_at(path)
        .await
        .with_context(|| format!("Cannot use {}", path.display()))?;
    let sync = session.sync(SyncOptions { dry_run }).await?;
    let id = &document.id;

    if dry_run {
        let text = session.store.read(id).await?;
        let plan = sync
            .plan(&document, &text)
            .with_context(|| format!("Failed to generate frontmatter for {id}"))?;
        match plan {
            SyncPlan::Write { new_text, .. } => {
                println!("{} {}", "Would update".cyan().bold(), id);
                print!("{}", diff::render(&text, &new_text));
            }
            SyncPlan::Skip(reason) => println!("{} {} ({})", "Unchanged:".dimmed(), id, reason),
        }
        return Ok(());
    }

    match sync.sync_file(&document).await {
        SyncOutcome::Updated(_) => println!("{} {}", "Updated:".green().bold(), id),
        SyncOutcome::Skipped(reason) => println!("{} {} ({})", "Unchanged:".dimmed(), id, reason),
        SyncOutcome::Busy => println!("{} {} is already being updated", "Busy:".yellow().bold(), id),
        // The notifier has already printed the cause.
        SyncOutcome::Failed(_) => bail!("{id} was not updated"),
    }
    Ok(())
}
