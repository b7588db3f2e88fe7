use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use fmgen_config::{Settings, SettingsLoader};

pub async fn execute(vault: &Path, config: Option<&Path>, force: bool) -> Result<()> {
    let path = SettingsLoader::resolve_path(vault, config);
    let exists = tokio::fs::try_exists(&path)
        .await
        .with_context(|| format!("Cannot access {}", path.display()))?;
    if exists && !force {
        println!(
            "{} Settings already exist at {}. No changes made.",
            "Info:".cyan().bold(),
            path.display()
        );
        return Ok(());
    }

    SettingsLoader::save(&Settings::default(), &path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("{} {}", "Created".green().bold(), path.display());
    Ok(())
}
