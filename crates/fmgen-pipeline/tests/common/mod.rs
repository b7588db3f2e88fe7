//! Common test utilities for pipeline tests.

#![allow(dead_code)]

use std::sync::Arc;

use fmgen_config::Settings;
use fmgen_core::test_support::{MockStore, RecordingNotifier};
use fmgen_pipeline::FrontmatterSync;

pub struct Harness {
    pub store: MockStore,
    pub notifier: RecordingNotifier,
    pub sync: Arc<FrontmatterSync>,
}

pub fn settings(template: &str) -> Settings {
    Settings {
        template: template.to_string(),
        ..Settings::default()
    }
}

/// Orchestrator over an in-memory store holding `documents`.
pub fn harness_with(settings: Settings, documents: &[(&str, &str)]) -> Harness {
    let store = MockStore::new();
    for (path, text) in documents {
        store.insert(path, text);
    }
    let notifier = RecordingNotifier::new();
    let sync = FrontmatterSync::new(
        Arc::new(store.clone()),
        Arc::new(notifier.clone()),
        settings,
    );
    Harness {
        store,
        notifier,
        sync: Arc::new(sync),
    }
}

pub fn harness(template: &str, documents: &[(&str, &str)]) -> Harness {
    harness_with(settings(template), documents)
}
