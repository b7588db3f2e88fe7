pub mod file;
pub mod init;
pub mod preview;
pub mod run;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use fmgen_config::{Settings, SettingsLoader};
use fmgen_core::DocumentStore;
use fmgen_pipeline::{FrontmatterSync, SyncOptions};

use crate::cli::{Cli, Commands};
use crate::host::{ConsoleNotifier, FsStore, VaultIndex};

/// An opened vault with its settings.
pub struct Session {
    pub store: Arc<FsStore>,
    pub settings_path: PathBuf,
    pub settings: Settings,
}

impl Session {
    pub async fn open(vault: &Path, config: Option<&Path>) -> Result<Self> {
        let store = FsStore::open(vault)
            .await
            .with_context(|| format!("Failed to open vault {}", vault.display()))?;
        let settings_path = SettingsLoader::resolve_path(store.root(), config);
        let settings = SettingsLoader::load_or_default(&settings_path)
            .await
            .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
        debug!(vault = %store.root().display(), settings = %settings_path.display(), "session opened");
        Ok(Self {
            store: Arc::new(store),
            settings_path,
            settings,
        })
    }

    /// Build the sync orchestrator for the configured template.
    pub async fn sync(&self, options: SyncOptions) -> Result<Arc<FrontmatterSync>> {
        self.sync_for(&self.settings.template, options).await
    }

    /// Build the sync orchestrator. The page index behind `dv` is only
    /// built when `template` mentions it.
    pub async fn sync_for(&self, template: &str, options: SyncOptions) -> Result<Arc<FrontmatterSync>> {
        let store: Arc<dyn DocumentStore> = self.store.clone();
        let mut sync = FrontmatterSync::new(
            Arc::clone(&store),
            Arc::new(ConsoleNotifier),
            self.settings.clone(),
        )
        .with_options(options);

        if template.contains("dv") {
            let index = VaultIndex::build(store.as_ref())
                .await
                .context("Failed to index the vault")?;
            debug!(pages = index.len(), "query API enabled");
            sync = sync.with_query(Arc::new(index));
        }
        Ok(Arc::new(sync))
    }
}

pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Init { force } => init::execute(&cli.vault, config, force).await,
        Commands::Run { folder, dry_run } => {
            let session = Session::open(&cli.vault, config).await?;
            run::execute(&session, folder.as_deref(), dry_run).await
        }
        Commands::File { path, dry_run } => {
            let session = Session::open(&cli.vault, config).await?;
            file::execute(&session, &path, dry_run).await
        }
        Commands::Preview { path, template } => {
            let session = Session::open(&cli.vault, config).await?;
            preview::execute(&session, path.as_deref(), template.as_deref()).await
        }
        Commands::Watch => {
            let session = Session::open(&cli.vault, config).await?;
            watch::execute(session).await
        }
    }
}
