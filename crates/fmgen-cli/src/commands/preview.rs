use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use colored::Colorize;

use fmgen_core::DocumentStore;
use fmgen_pipeline::{sample_document, PreviewResult, SyncOptions};

use super::Session;

pub async fn execute(session: &Session, path: Option<&Path>, template: Option<&str>) -> Result<()> {
    let document = match path {
        Some(path) => session
            .store
            .document_at(path)
            .await
            .with_context(|| format!("Cannot use {}", path.display()))?,
        None => {
            let documents = session.store.list().await?;
            sample_document(&documents)
                .cloned()
                .ok_or_else(|| anyhow!("The vault has no markdown documents to preview"))?
        }
    };
    let text = session.store.read(&document.id).await?;
    let template = template.unwrap_or(&session.settings.template);
    let sync = session.sync_for(template, SyncOptions { dry_run: true }).await?;

    println!("{} {}", "Preview for".cyan().bold(), document.id);
    match sync.preview(template, &document, &text) {
        PreviewResult::Rendered(json) => {
            println!("{json}");
            Ok(())
        }
        PreviewResult::Failed(message) => {
            println!("{} {}", "Error:".red().bold(), message);
            bail!("The template is not valid")
        }
    }
}
