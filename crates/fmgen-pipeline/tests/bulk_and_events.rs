//! Bulk runs, save hooks and host event routing.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use fmgen_config::Settings;
use fmgen_core::{Document, DocumentId, LiveBuffer, NoticeLevel, TextBuffer};
use fmgen_pipeline::{
    DispatchOutcome, EventRouter, FnStep, FrontmatterSaveStep, HostEvent, IgnoredEvent,
    SavePipeline, SyncOutcome, WriteMode,
};

use common::{harness, harness_with, settings};

// ============================================================================
// Bulk
// ============================================================================

#[tokio::test]
async fn test_run_all_isolates_failures_and_reports_once() {
    let mut settings = settings("{ title: file.basename }");
    settings.set_folders_to_ignore("Templates");
    let h = harness_with(
        settings,
        &[
            ("a.md", "body"),
            ("b.md", "body"),
            ("c.md", "---\ntitle: c\n---\n\nbody"),
            ("Templates/t.md", "body"),
            ("image.png", "binary"),
        ],
    );
    h.store.fail_reads("b.md");

    let report = h.sync.run_all().await;

    assert_eq!(report.total, 4);
    assert_eq!(report.updated, 1);
    assert_eq!(report.unchanged, 1);
    assert_eq!(report.ignored, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, DocumentId::new("b.md"));

    let notices = h.notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Warning);
    assert_eq!(
        notices[0].message,
        "2 out of 3 files are successfully processed (1 updated). Errors: 1"
    );
    assert_eq!(h.store.text("a.md").unwrap(), "---\ntitle: a\n---\n\nbody");
}

#[tokio::test]
async fn test_run_all_without_failures_is_info() {
    let h = harness("{ n: 1 }", &[("a.md", "x"), ("Notes/b.md", "y")]);

    let report = h.sync.run_all().await;

    assert_eq!(report.updated, 2);
    assert_eq!(h.notifier.count(NoticeLevel::Info), 1);
    assert_eq!(h.notifier.count(NoticeLevel::Warning), 0);
}

#[tokio::test]
async fn test_run_folder_is_recursive_and_scoped() {
    let h = harness(
        "{ n: 1 }",
        &[
            ("Notes/x.md", "x"),
            ("Notes/sub/y.md", "y"),
            ("Notesy/z.md", "z"),
            ("Other/w.md", "w"),
        ],
    );

    let report = h.sync.run_folder("Notes").await;

    assert_eq!(report.total, 2);
    assert_eq!(report.updated, 2);
    assert_eq!(h.store.text("Other/w.md").unwrap(), "w");
    assert_eq!(h.store.text("Notesy/z.md").unwrap(), "z");
}

#[tokio::test]
async fn test_bulk_template_errors_are_not_notified_per_document() {
    let h = harness("{ a: missing }", &[("a.md", "x"), ("b.md", "y")]);

    let report = h.sync.run_all().await;

    assert_eq!(report.failures.len(), 2);
    assert_eq!(h.notifier.notices().len(), 1);
    assert_eq!(h.notifier.count(NoticeLevel::Error), 0);
}

// ============================================================================
// Events
// ============================================================================

fn router_for(h: &common::Harness) -> EventRouter {
    let save = SavePipeline::new().with_step(Arc::new(FrontmatterSaveStep::new(Arc::clone(&h.sync))));
    EventRouter::new(Arc::clone(&h.sync), save)
}

#[tokio::test]
async fn test_modify_respects_run_on_modify() {
    let h = harness("{ a: 1 }", &[("a.md", "body")]);
    let router = router_for(&h);

    let outcome = router
        .dispatch(HostEvent::Modified {
            document: Document::new("a.md"),
        })
        .await;
    assert!(matches!(
        outcome,
        DispatchOutcome::Ignored(IgnoredEvent::RunOnModifyDisabled)
    ));

    h.sync.update_settings(Settings {
        run_on_modify: true,
        ..settings("{ a: 1 }")
    });
    let outcome = router
        .dispatch(HostEvent::Modified {
            document: Document::new("a.md"),
        })
        .await;
    assert!(matches!(
        outcome,
        DispatchOutcome::Synced(SyncOutcome::Updated(WriteMode::Overwritten))
    ));
}

#[tokio::test]
async fn test_modified_open_document_is_left_to_editor() {
    let settings = Settings {
        run_on_modify: true,
        ..settings("{ a: 1 }")
    };
    let h = harness_with(settings, &[("a.md", "body")]);
    let router = router_for(&h);
    router.open(DocumentId::new("a.md"), TextBuffer::new("body").into_handle());

    let outcome = router
        .dispatch(HostEvent::Modified {
            document: Document::new("a.md"),
        })
        .await;
    assert!(matches!(outcome, DispatchOutcome::Ignored(IgnoredEvent::OpenInEditor)));

    router.close(&DocumentId::new("a.md"));
    let outcome = router
        .dispatch(HostEvent::Modified {
            document: Document::new("a.md"),
        })
        .await;
    assert!(matches!(outcome, DispatchOutcome::Synced(_)));
}

#[tokio::test]
async fn test_non_markdown_events_are_ignored() {
    let h = harness("{ a: 1 }", &[]);
    let router = router_for(&h);

    let outcome = router
        .dispatch(HostEvent::RunFile {
            document: Document::new("image.png"),
            buffer: None,
        })
        .await;
    assert!(matches!(outcome, DispatchOutcome::Ignored(IgnoredEvent::NotMarkdown)));
}

#[tokio::test]
async fn test_run_file_patches_open_buffer() {
    let h = harness("{ a: 1 }", &[("a.md", "body")]);
    let router = router_for(&h);
    let handle = TextBuffer::new("body").into_handle();
    router.open(DocumentId::new("a.md"), handle.clone());

    let outcome = router
        .dispatch(HostEvent::RunFile {
            document: Document::new("a.md"),
            buffer: None,
        })
        .await;

    assert!(matches!(
        outcome,
        DispatchOutcome::Synced(SyncOutcome::Updated(WriteMode::Patched(_)))
    ));
    assert_eq!(handle.lock().content(), "---\na: 1\n---\n\nbody");
    assert!(h.store.writes().is_empty());
}

#[tokio::test]
async fn test_save_runs_host_save_even_when_template_fails() {
    let h = harness("{ a: missing }", &[]);
    let saves = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&saves);
    let save = SavePipeline::new()
        .with_step(Arc::new(FrontmatterSaveStep::new(Arc::clone(&h.sync))))
        .with_step(Arc::new(FnStep::new("host-save", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })));
    let router = EventRouter::new(Arc::clone(&h.sync), save);

    let outcome = router
        .dispatch(HostEvent::SaveRequested {
            document: Document::new("a.md"),
            buffer: Some(TextBuffer::new("body").into_handle()),
        })
        .await;

    let DispatchOutcome::Saved(report) = outcome else {
        panic!("expected a save report");
    };
    assert_eq!(saves.load(Ordering::SeqCst), 1);
    assert_eq!(report.completed, vec!["host-save"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "frontmatter");
    assert_eq!(h.notifier.count(NoticeLevel::Error), 1);
}

#[tokio::test]
async fn test_run_folder_event() {
    let h = harness("{ a: 1 }", &[("Notes/a.md", "x"), ("b.md", "y")]);
    let router = router_for(&h);

    let outcome = router
        .dispatch(HostEvent::RunFolder {
            folder: "Notes".into(),
        })
        .await;

    let DispatchOutcome::Bulk(report) = outcome else {
        panic!("expected a bulk report");
    };
    assert_eq!(report.updated, 1);
    assert_eq!(h.store.text("b.md").unwrap(), "y");
}
