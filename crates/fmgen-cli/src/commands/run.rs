use anyhow::{bail, Result};
use colored::Colorize;

use fmgen_pipeline::SyncOptions;

use super::Session;

pub async fn execute(session: &Session, folder: Option<&str>, dry_run: bool) -> Result<()> {
    let sync = session.sync(SyncOptions { dry_run }).await?;
    let report = match folder {
        Some(folder) => sync.run_folder(folder).await,
        None => sync.run_all().await,
    };

    println!("{} {}", "Done:".green().bold(), report);
    if dry_run && report.updated > 0 {
        println!(
            "{} {} documents would change, nothing was written",
            "Dry run:".cyan().bold(),
            report.updated
        );
    }
    for (id, err) in &report.failures {
        println!("  {} {}: {}", "✗".red(), id, err);
    }

    if report.has_failures() {
        bail!("{} documents failed", report.failures.len());
    }
    Ok(())
}
