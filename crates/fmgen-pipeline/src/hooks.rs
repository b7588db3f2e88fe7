//! Save hook middleware
//!
//! A save runs an ordered list of [`SaveStep`]s. Each step runs exactly once
//! per save, and a failing step is logged without stopping the steps after
//! it. The host's own save is registered as the last step, so a broken
//! template never prevents the document from being saved.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use fmgen_core::{BufferHandle, Document};

use crate::outcome::SyncOutcome;
use crate::sync::FrontmatterSync;

/// What a save step receives.
#[derive(Clone)]
pub struct SaveContext {
    pub document: Document,
    /// Live buffer, when the document is open in an editor.
    pub buffer: Option<BufferHandle>,
}

impl SaveContext {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            buffer: None,
        }
    }

    pub fn with_buffer(mut self, buffer: BufferHandle) -> Self {
        self.buffer = Some(buffer);
        self
    }
}

/// One step of a save.
#[async_trait]
pub trait SaveStep: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, ctx: &SaveContext) -> Result<()>;
}

/// Steps that ran, and the ones that failed with their error text.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub completed: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl SaveReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Ordered save middleware.
#[derive(Default, Clone)]
pub struct SavePipeline {
    steps: Vec<Arc<dyn SaveStep>>,
}

impl SavePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step(mut self, step: Arc<dyn SaveStep>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn push(&mut self, step: Arc<dyn SaveStep>) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub async fn run(&self, ctx: &SaveContext) -> SaveReport {
        let mut report = SaveReport::default();
        for step in &self.steps {
            match step.run(ctx).await {
                Ok(()) => {
                    debug!(step = step.name(), path = %ctx.document.id, "save step done");
                    report.completed.push(step.name().to_string());
                }
                Err(err) => {
                    warn!(step = step.name(), path = %ctx.document.id, error = %err, "save step failed");
                    report.failed.push((step.name().to_string(), format!("{err:#}")));
                }
            }
        }
        report
    }
}

/// Runs the frontmatter sync for the saved document.
pub struct FrontmatterSaveStep {
    sync: Arc<FrontmatterSync>,
}

impl FrontmatterSaveStep {
    pub fn new(sync: Arc<FrontmatterSync>) -> Self {
        Self { sync }
    }
}

#[async_trait]
impl SaveStep for FrontmatterSaveStep {
    fn name(&self) -> &str {
        "frontmatter"
    }

    async fn run(&self, ctx: &SaveContext) -> Result<()> {
        let outcome = match &ctx.buffer {
            Some(buffer) => self.sync.sync_buffer(&ctx.document, buffer).await,
            None => self.sync.sync_file(&ctx.document).await,
        };
        match outcome {
            SyncOutcome::Failed(err) => {
                Err(anyhow!(err).context(format!("frontmatter sync of {}", ctx.document.id)))
            }
            _ => Ok(()),
        }
    }
}

/// Wraps a closure as a step, typically the host's own save.
pub struct FnStep<F>
where
    F: Fn(&SaveContext) -> Result<()> + Send + Sync,
{
    name: String,
    step_fn: F,
}

impl<F> FnStep<F>
where
    F: Fn(&SaveContext) -> Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, step_fn: F) -> Self {
        Self {
            name: name.into(),
            step_fn,
        }
    }
}

#[async_trait]
impl<F> SaveStep for FnStep<F>
where
    F: Fn(&SaveContext) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &SaveContext) -> Result<()> {
        (self.step_fn)(ctx)
    }
}
