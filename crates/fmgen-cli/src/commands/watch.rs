//! `fmgen watch`: sync documents as they change on disk.
//!
//! Filesystem events become [`HostEvent::Modified`] and go through the
//! [`EventRouter`], so `runOnModify` decides whether anything happens.
//! Changes to the settings file are picked up without a restart.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use fmgen_config::SettingsLoader;
use fmgen_core::Document;
use fmgen_pipeline::{
    DispatchOutcome, EventRouter, FrontmatterSaveStep, HostEvent, IgnoredEvent, SavePipeline,
    SyncOptions, SyncOutcome,
};

use super::Session;
use crate::host::FsStore;

pub async fn execute(session: Session) -> Result<()> {
    let sync = session.sync(SyncOptions::default()).await?;
    let save = SavePipeline::new().with_step(Arc::new(FrontmatterSaveStep::new(Arc::clone(&sync))));
    let router = EventRouter::new(Arc::clone(&sync), save);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
        // The receiver is gone once the loop below has ended.
        let _ = tx.send(result);
    })
    .context("Failed to create file watcher")?;
    watcher
        .watch(session.store.root(), RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", session.store.root().display()))?;

    if !sync.settings().run_on_modify {
        println!(
            "{} runOnModify is off in {}; changes are ignored until it is enabled.",
            "Warning:".yellow().bold(),
            session.settings_path.display()
        );
    }
    println!(
        "{} {} (Ctrl-C to stop)",
        "Watching".green().bold(),
        session.store.root().display()
    );
    info!(vault = %session.store.root().display(), "watch started");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            received = rx.recv() => match received {
                Some(Ok(event)) => handle(&session, &router, event).await,
                Some(Err(err)) => warn!(error = %err, "watch error"),
                None => break,
            },
        }
    }

    info!("watch stopped");
    Ok(())
}

async fn handle(session: &Session, router: &EventRouter, event: Event) {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return;
    }
    for path in &event.paths {
        if is_settings_file(session, path) {
            reload_settings(session, router).await;
            continue;
        }
        let Some(document) = document_for(&session.store, path) else {
            continue;
        };
        let id = document.id.clone();
        match router.dispatch(HostEvent::Modified { document }).await {
            DispatchOutcome::Synced(SyncOutcome::Updated(_)) => {
                println!("{} {}", "Updated:".green().bold(), id);
            }
            DispatchOutcome::Synced(outcome) => debug!(path = %id, ?outcome, "no update"),
            DispatchOutcome::Ignored(IgnoredEvent::NotMarkdown) => {}
            other => debug!(path = %id, ?other, "event not handled"),
        }
    }
}

fn is_settings_file(session: &Session, path: &Path) -> bool {
    path == session.settings_path
        || session.settings_path.file_name().is_some_and(|name| {
            path.file_name() == Some(name) && path.parent() == Some(session.store.root())
        })
}

fn document_for(store: &FsStore, path: &Path) -> Option<Document> {
    let id = store.id_of(path)?;
    id.is_markdown().then(|| Document::new(id))
}

async fn reload_settings(session: &Session, router: &EventRouter) {
    match SettingsLoader::load(&session.settings_path).await {
        Ok(settings) => {
            router.sync().update_settings(settings);
            println!("{} settings reloaded", "Info:".cyan().bold());
        }
        Err(err) => {
            warn!(path = %session.settings_path.display(), error = %err, "keeping previous settings");
            println!(
                "{} could not reload settings: {}",
                "Warning:".yellow().bold(),
                err
            );
        }
    }
}
