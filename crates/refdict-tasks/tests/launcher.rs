// crates/refdict-tasks/tests/launcher.rs
// ============================================================================
// Module: Task Launcher Tests
// Description: Verifies submission, dedup, cancellation, and failure capture.
// ============================================================================
//! ## Overview
//! Ensures the launcher enforces at-most-one-concurrent-execution per
//! descriptor, blocks synchronous callers until terminal states, captures
//! performer failures and panics without dying, and honors cooperative
//! cancellation with a terminal `Canceled` status.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use refdict_core::Event;
use refdict_core::EventBus;
use refdict_core::interfaces::PerformerError;
use refdict_core::interfaces::TaskContext;
use refdict_core::interfaces::TaskPerformer;
use refdict_store_memory::AtomicSequence;
use refdict_store_memory::RecordingListener;
use refdict_store_memory::StaticPerformerRegistry;
use refdict_store_memory::SyncEventBus;
use refdict_tasks::DescriptorId;
use refdict_tasks::TaskDescriptor;
use refdict_tasks::TaskError;
use refdict_tasks::TaskLauncher;
use refdict_tasks::TaskStatus;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Test Performers
// ============================================================================

type PerformFn = dyn Fn(&dyn TaskContext) -> Result<BTreeMap<String, Value>, PerformerError>
    + Send
    + Sync;

struct FnPerformer {
    name: String,
    body: Box<PerformFn>,
}

impl FnPerformer {
    fn new(
        name: &str,
        body: impl Fn(&dyn TaskContext) -> Result<BTreeMap<String, Value>, PerformerError>
        + Send
        + Sync
        + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            body: Box::new(body),
        })
    }
}

impl TaskPerformer for FnPerformer {
    fn name(&self) -> &str {
        &self.name
    }

    fn perform(
        &self,
        ctx: &dyn TaskContext,
        _parameters: &BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, Value>, PerformerError> {
        (self.body)(ctx)
    }
}

struct Fixture {
    launcher: TaskLauncher,
    recorder: Arc<RecordingListener>,
}

fn fixture(performers: &[Arc<FnPerformer>]) -> Fixture {
    let registry = Arc::new(StaticPerformerRegistry::new());
    for performer in performers {
        registry.register(performer.clone());
    }
    let bus = Arc::new(SyncEventBus::new());
    let recorder = Arc::new(RecordingListener::new());
    bus.subscribe(recorder.clone());
    let launcher = TaskLauncher::new(registry, bus, Arc::new(AtomicSequence::new()), 2, 16);
    Fixture {
        launcher,
        recorder,
    }
}

fn descriptor(id: &str, performer: &str) -> TaskDescriptor {
    TaskDescriptor {
        id: DescriptorId::new(id),
        performer: performer.to_string(),
        author: "tests".to_string(),
        parameters: BTreeMap::new(),
    }
}

fn wait_terminal(launcher: &TaskLauncher, id: &DescriptorId) -> TaskStatus {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let snapshot = launcher.find_by_id(id).expect("lookup").expect("known execution");
        if snapshot.status.is_terminal() {
            return snapshot.status;
        }
        assert!(Instant::now() < deadline, "execution never reached a terminal status");
        thread::sleep(Duration::from_millis(5));
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn sync_submission_returns_the_finished_result() {
    let performer = FnPerformer::new("echo", |_ctx| {
        let mut values = BTreeMap::new();
        values.insert("answer".to_string(), json!(42));
        Ok(values)
    });
    let fixture = fixture(&[performer]);

    let execution = fixture.launcher.submit_sync(descriptor("task-1", "echo")).expect("submit");
    assert_eq!(execution.status, TaskStatus::Finished);
    let result = execution.result.expect("result present");
    assert_eq!(result.values.get("answer"), Some(&json!(42)));
    assert!(result.error.is_none());
    assert!(execution.started_at.is_some());
    assert!(execution.finished_at.is_some());
}

#[test]
fn unknown_performer_is_rejected() {
    let fixture = fixture(&[]);
    let err = fixture.launcher.submit_async(descriptor("task-1", "absent")).unwrap_err();
    assert!(matches!(err, TaskError::UnknownPerformer { .. }));
}

#[test]
fn failing_performer_reaches_error_without_killing_the_pool() {
    let failing = FnPerformer::new("failing", |_ctx| {
        Err(PerformerError::Failed("boom".to_string()))
    });
    let healthy = FnPerformer::new("healthy", |_ctx| Ok(BTreeMap::new()));
    let fixture = fixture(&[failing, healthy]);

    let failed = fixture.launcher.submit_sync(descriptor("task-1", "failing")).expect("submit");
    assert_eq!(failed.status, TaskStatus::Error);
    assert!(failed.result.expect("result").error.expect("error").contains("boom"));

    let ok = fixture.launcher.submit_sync(descriptor("task-2", "healthy")).expect("submit");
    assert_eq!(ok.status, TaskStatus::Finished);
}

#[test]
fn panicking_performer_is_captured_as_error() {
    let panicking = FnPerformer::new("panicking", |_ctx| panic!("unexpected"));
    let fixture = fixture(&[panicking]);

    let execution =
        fixture.launcher.submit_sync(descriptor("task-1", "panicking")).expect("submit");
    assert_eq!(execution.status, TaskStatus::Error);
    assert!(
        execution.result.expect("result").error.expect("error").contains("panicked")
    );
}

#[test]
fn resubmitting_a_running_descriptor_returns_the_existing_execution() {
    let started = Arc::new(AtomicBool::new(false));
    let release = Arc::new(AtomicBool::new(false));
    let invocations = Arc::new(AtomicU32::new(0));
    let gate = {
        let started = started.clone();
        let release = release.clone();
        let invocations = invocations.clone();
        FnPerformer::new("gated", move |_ctx| {
            invocations.fetch_add(1, Ordering::SeqCst);
            started.store(true, Ordering::SeqCst);
            while !release.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(2));
            }
            Ok(BTreeMap::new())
        })
    };
    let fixture = fixture(&[gate]);

    let first = fixture.launcher.submit_async(descriptor("task-1", "gated")).expect("submit");
    while !started.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(2));
    }
    let second = fixture.launcher.submit_async(descriptor("task-1", "gated")).expect("submit");
    assert_eq!(second.descriptor.id, first.descriptor.id);
    assert_eq!(second.submitted_at, first.submitted_at);
    assert!(!second.status.is_terminal());

    release.store(true, Ordering::SeqCst);
    assert_eq!(wait_terminal(&fixture.launcher, &first.descriptor.id), TaskStatus::Finished);
    assert_eq!(invocations.load(Ordering::SeqCst), 1);

    // A terminal descriptor may be resubmitted as a fresh execution.
    let third = fixture.launcher.submit_sync(descriptor("task-1", "gated")).expect("submit");
    assert_eq!(third.status, TaskStatus::Finished);
    assert_eq!(invocations.load(Ordering::SeqCst), 2);
}

#[test]
fn cancellation_is_cooperative_and_terminal() {
    let looping = FnPerformer::new("looping", |ctx| {
        loop {
            if ctx.is_cancel_requested() {
                return Err(PerformerError::Canceled);
            }
            thread::sleep(Duration::from_millis(2));
        }
    });
    let fixture = fixture(&[looping]);

    let execution = fixture.launcher.submit_async(descriptor("task-1", "looping")).expect("submit");
    let affected = fixture.launcher.cancel(&[execution.descriptor.id.clone()]).expect("cancel");
    assert_eq!(affected.len(), 1);
    assert_eq!(wait_terminal(&fixture.launcher, &execution.descriptor.id), TaskStatus::Canceled);
}

#[test]
fn executing_list_excludes_terminal_executions() {
    let quick = FnPerformer::new("quick", |_ctx| Ok(BTreeMap::new()));
    let fixture = fixture(&[quick]);

    fixture.launcher.submit_sync(descriptor("task-1", "quick")).expect("submit");
    assert!(fixture.launcher.find_executing().expect("executing").is_empty());
}

#[test]
fn lifecycle_and_progress_events_reach_the_bus() {
    let reporting = FnPerformer::new("reporting", |ctx| {
        ctx.publish_progress("halfway", 0.5);
        ctx.publish_progress("done", 1.0);
        Ok(BTreeMap::new())
    });
    let fixture = fixture(&[reporting]);

    fixture.launcher.submit_sync(descriptor("task-1", "reporting")).expect("submit");
    let events = fixture.recorder.events();

    let statuses: Vec<String> = events
        .iter()
        .filter_map(|event| match event {
            Event::TaskLifecycle(lifecycle) => Some(lifecycle.status.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(statuses, vec!["submitted", "running", "finished"]);

    let progress: Vec<f64> = events
        .iter()
        .filter_map(|event| match event {
            Event::TaskProgress(progress) => Some(progress.total_progress),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![0.5, 1.0]);
}
