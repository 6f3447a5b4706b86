// crates/refdict-tasks/src/launcher.rs
// ============================================================================
// Module: Task Launcher
// Description: Fixed worker pool executing submitted task descriptors.
// Purpose: Run performers asynchronously with dedup, cancellation, and events.
// Dependencies: refdict-core, crate::{model, progress}, std
// ============================================================================

//! ## Overview
//! The launcher owns a fixed pool of worker threads fed by a bounded queue.
//! Submitting a descriptor already queued or running returns the existing
//! execution; synchronous submission blocks until a terminal status.
//! Cancellation is cooperative: performers poll the flag at checkpoints and
//! the execution still reaches a terminal `Canceled` status. Performer
//! failures and panics are captured into the execution result and announced
//! on the event bus; they never take the launcher down.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::thread;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use refdict_core::Event;
use refdict_core::EventId;
use refdict_core::TaskLifecycleEvent;
use refdict_core::TaskProgressEvent;
use refdict_core::Timestamp;
use refdict_core::interfaces::EventBus;
use refdict_core::interfaces::PerformerError;
use refdict_core::interfaces::Sequence;
use refdict_core::interfaces::TaskContext;
use refdict_core::interfaces::TaskPerformer;
use refdict_core::interfaces::TaskPerformerRegistry;
use thiserror::Error;

use crate::model::DescriptorId;
use crate::model::TaskDescriptor;
use crate::model::TaskExecution;
use crate::model::TaskResult;
use crate::model::TaskStatus;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Launcher errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum TaskError {
    /// No performer is registered under the descriptor's name.
    #[error("unknown task performer: '{name}'")]
    UnknownPerformer {
        /// The unresolved performer name.
        name: String,
    },
    /// The launcher is shutting down and accepts no work.
    #[error("task queue is closed")]
    QueueClosed,
    /// Internal synchronization failed.
    #[error("task launcher lock poisoned")]
    LockPoisoned,
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Reads the wall clock as a core timestamp.
///
/// The launcher is the host edge of the system; engines themselves never
/// read the clock.
#[must_use]
pub fn now_millis() -> Timestamp {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0);
    Timestamp::from_unix_millis(millis)
}

// ============================================================================
// SECTION: Execution Handles
// ============================================================================

/// Shared mutable state of one execution.
struct ExecutionHandle {
    /// Snapshot guarded for readers and the worker.
    state: Mutex<TaskExecution>,
    /// Cooperative cancellation flag.
    cancel: AtomicBool,
    /// Signaled on every terminal transition.
    done: Condvar,
}

impl ExecutionHandle {
    /// Creates a handle for a submitted descriptor.
    fn new(descriptor: TaskDescriptor, submitted_at: Timestamp) -> Self {
        Self {
            state: Mutex::new(TaskExecution::submitted(descriptor, submitted_at)),
            cancel: AtomicBool::new(false),
            done: Condvar::new(),
        }
    }

    /// Returns a copy of the current snapshot.
    fn snapshot(&self) -> Result<TaskExecution, TaskError> {
        self.state.lock().map(|state| state.clone()).map_err(|_| TaskError::LockPoisoned)
    }
}

/// Work item handed to the pool.
struct WorkItem {
    /// Execution handle to drive.
    handle: Arc<ExecutionHandle>,
    /// Resolved performer.
    performer: Arc<dyn TaskPerformer>,
}

// ============================================================================
// SECTION: Performer Context
// ============================================================================

/// Context handed to a running performer.
struct WorkerContext {
    /// Execution handle for cancellation and progress state.
    handle: Arc<ExecutionHandle>,
    /// Event bus for progress announcements.
    bus: Arc<dyn EventBus>,
    /// Identifier sequence for event identifiers.
    sequence: Arc<dyn Sequence>,
}

impl TaskContext for WorkerContext {
    fn is_cancel_requested(&self) -> bool {
        self.handle.cancel.load(Ordering::Relaxed)
    }

    fn publish_progress(&self, step: &str, total_progress: f64) {
        let descriptor_id = {
            let Ok(mut state) = self.handle.state.lock() else {
                return;
            };
            state.progress = total_progress.clamp(0.0, 1.0);
            state.descriptor.id.clone()
        };
        let event = Event::TaskProgress(TaskProgressEvent {
            event_id: EventId::new(self.sequence.next_id("event")),
            descriptor_id: descriptor_id.to_string(),
            step: step.to_string(),
            total_progress,
            event_date: now_millis(),
        });
        // Progress is advisory; a bus failure must not fail the task.
        let _ = self.bus.publish(&event);
    }
}

// ============================================================================
// SECTION: Launcher
// ============================================================================

/// Fixed-pool task launcher.
///
/// # Invariants
/// - At most one non-terminal execution exists per descriptor identifier.
/// - Every execution reaches a terminal status, cancellation included.
pub struct TaskLauncher {
    /// Shared launcher state.
    inner: Arc<LauncherInner>,
    /// Work queue sender; dropped on shutdown to stop the pool.
    queue: Mutex<Option<mpsc::SyncSender<WorkItem>>>,
    /// Worker join handles.
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
}

/// State shared between the launcher facade and its workers.
struct LauncherInner {
    /// Performer registry collaborator.
    registry: Arc<dyn TaskPerformerRegistry>,
    /// Event bus collaborator.
    bus: Arc<dyn EventBus>,
    /// Identifier sequence collaborator.
    sequence: Arc<dyn Sequence>,
    /// Executions by descriptor identifier.
    executions: Mutex<BTreeMap<DescriptorId, Arc<ExecutionHandle>>>,
}

impl LauncherInner {
    /// Publishes a lifecycle event for one transition.
    fn announce(&self, execution: &TaskExecution, error: Option<String>) {
        let event = Event::TaskLifecycle(TaskLifecycleEvent {
            event_id: EventId::new(self.sequence.next_id("event")),
            descriptor_id: execution.descriptor.id.to_string(),
            performer: execution.descriptor.performer.clone(),
            status: execution.status.label().to_string(),
            error,
            event_date: now_millis(),
        });
        // Lifecycle announcements are best-effort observability.
        let _ = self.bus.publish(&event);
    }

    /// Drives one work item to a terminal status.
    fn run(&self, item: &WorkItem) {
        let context = WorkerContext {
            handle: Arc::clone(&item.handle),
            bus: Arc::clone(&self.bus),
            sequence: Arc::clone(&self.sequence),
        };

        // A cancellation that raced the queue still terminates properly.
        if item.handle.cancel.load(Ordering::Relaxed) {
            self.finish(item, TaskStatus::Canceled, TaskResult::default());
            return;
        }

        let parameters = {
            let Ok(mut state) = item.handle.state.lock() else {
                return;
            };
            state.status = TaskStatus::Running;
            state.started_at = Some(now_millis());
            self.announce(&state, None);
            state.descriptor.parameters.clone()
        };

        let outcome =
            catch_unwind(AssertUnwindSafe(|| item.performer.perform(&context, &parameters)));
        match outcome {
            Ok(Ok(values)) => {
                self.finish(
                    item,
                    TaskStatus::Finished,
                    TaskResult {
                        values,
                        error: None,
                    },
                );
            }
            Ok(Err(PerformerError::Canceled)) => {
                self.finish(item, TaskStatus::Canceled, TaskResult::default());
            }
            Ok(Err(err)) => {
                self.finish(
                    item,
                    TaskStatus::Error,
                    TaskResult {
                        values: BTreeMap::new(),
                        error: Some(err.to_string()),
                    },
                );
            }
            Err(_) => {
                self.finish(
                    item,
                    TaskStatus::Error,
                    TaskResult {
                        values: BTreeMap::new(),
                        error: Some("task performer panicked".to_string()),
                    },
                );
            }
        }
    }

    /// Applies a terminal transition and wakes synchronous waiters.
    fn finish(&self, item: &WorkItem, status: TaskStatus, result: TaskResult) {
        let snapshot = {
            let Ok(mut state) = item.handle.state.lock() else {
                return;
            };
            state.status = status;
            state.finished_at = Some(now_millis());
            if status == TaskStatus::Finished {
                state.progress = 1.0;
            }
            state.result = Some(result);
            state.clone()
        };
        item.handle.done.notify_all();
        let error = snapshot.result.as_ref().and_then(|result| result.error.clone());
        self.announce(&snapshot, error);
    }
}

impl TaskLauncher {
    /// Creates a launcher with the given pool size and queue capacity.
    #[must_use]
    pub fn new(
        registry: Arc<dyn TaskPerformerRegistry>,
        bus: Arc<dyn EventBus>,
        sequence: Arc<dyn Sequence>,
        workers: usize,
        queue_capacity: usize,
    ) -> Self {
        let inner = Arc::new(LauncherInner {
            registry,
            bus,
            sequence,
            executions: Mutex::new(BTreeMap::new()),
        });
        let (sender, receiver) = mpsc::sync_channel::<WorkItem>(queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let mut handles = Vec::with_capacity(workers.max(1));
        for _ in 0..workers.max(1) {
            let inner = Arc::clone(&inner);
            let receiver = Arc::clone(&receiver);
            handles.push(thread::spawn(move || {
                loop {
                    let item = {
                        let Ok(receiver) = receiver.lock() else {
                            return;
                        };
                        receiver.recv()
                    };
                    match item {
                        Ok(item) => inner.run(&item),
                        Err(_) => return,
                    }
                }
            }));
        }
        Self {
            inner,
            queue: Mutex::new(Some(sender)),
            workers: Mutex::new(handles),
        }
    }

    /// Submits a descriptor for asynchronous execution.
    ///
    /// Returns the existing execution when the descriptor is already queued
    /// or running; a descriptor whose previous execution is terminal starts a
    /// fresh one.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::UnknownPerformer`] for an unregistered performer
    /// name and [`TaskError::QueueClosed`] after shutdown.
    pub fn submit_async(&self, descriptor: TaskDescriptor) -> Result<TaskExecution, TaskError> {
        let mut executions = self.inner.executions.lock().map_err(|_| TaskError::LockPoisoned)?;
        if let Some(existing) = executions.get(&descriptor.id) {
            let snapshot = existing.snapshot()?;
            if !snapshot.status.is_terminal() {
                return Ok(snapshot);
            }
        }
        let performer = self.inner.registry.find_performer(&descriptor.performer).ok_or_else(
            || TaskError::UnknownPerformer {
                name: descriptor.performer.clone(),
            },
        )?;
        let handle = Arc::new(ExecutionHandle::new(descriptor.clone(), now_millis()));
        executions.insert(descriptor.id.clone(), Arc::clone(&handle));
        let snapshot = handle.snapshot()?;
        self.inner.announce(&snapshot, None);
        drop(executions);

        let sent = {
            let queue = self.queue.lock().map_err(|_| TaskError::LockPoisoned)?;
            match queue.as_ref() {
                Some(sender) => sender
                    .send(WorkItem {
                        handle,
                        performer,
                    })
                    .is_ok(),
                None => false,
            }
        };
        if !sent {
            // A closed queue must not leave a forever-submitted execution.
            if let Ok(mut executions) = self.inner.executions.lock() {
                executions.remove(&snapshot.descriptor.id);
            }
            return Err(TaskError::QueueClosed);
        }
        Ok(snapshot)
    }

    /// Submits a descriptor and blocks until a terminal status.
    ///
    /// # Errors
    ///
    /// Returns submission errors; execution failures are reported through the
    /// returned snapshot, not as launcher errors.
    pub fn submit_sync(&self, descriptor: TaskDescriptor) -> Result<TaskExecution, TaskError> {
        let submitted = self.submit_async(descriptor)?;
        let handle = {
            let executions =
                self.inner.executions.lock().map_err(|_| TaskError::LockPoisoned)?;
            executions.get(&submitted.descriptor.id).map(Arc::clone)
        };
        let Some(handle) = handle else {
            return Ok(submitted);
        };
        let mut state = handle.state.lock().map_err(|_| TaskError::LockPoisoned)?;
        while !state.status.is_terminal() {
            state = handle.done.wait(state).map_err(|_| TaskError::LockPoisoned)?;
        }
        Ok(state.clone())
    }

    /// Requests cooperative cancellation of the given descriptors.
    ///
    /// Returns the current snapshots of the affected executions.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::LockPoisoned`] when internal state is
    /// unavailable.
    pub fn cancel(&self, ids: &[DescriptorId]) -> Result<Vec<TaskExecution>, TaskError> {
        let executions = self.inner.executions.lock().map_err(|_| TaskError::LockPoisoned)?;
        let mut affected = Vec::new();
        for id in ids {
            if let Some(handle) = executions.get(id) {
                let snapshot = handle.snapshot()?;
                if !snapshot.status.is_terminal() {
                    handle.cancel.store(true, Ordering::Relaxed);
                    affected.push(snapshot);
                }
            }
        }
        Ok(affected)
    }

    /// Lists executions that have not reached a terminal status.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::LockPoisoned`] when internal state is
    /// unavailable.
    pub fn find_executing(&self) -> Result<Vec<TaskExecution>, TaskError> {
        let executions = self.inner.executions.lock().map_err(|_| TaskError::LockPoisoned)?;
        let mut running = Vec::new();
        for handle in executions.values() {
            let snapshot = handle.snapshot()?;
            if !snapshot.status.is_terminal() {
                running.push(snapshot);
            }
        }
        Ok(running)
    }

    /// Loads the execution snapshot for a descriptor, when known.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::LockPoisoned`] when internal state is
    /// unavailable.
    pub fn find_by_id(&self, id: &DescriptorId) -> Result<Option<TaskExecution>, TaskError> {
        let executions = self.inner.executions.lock().map_err(|_| TaskError::LockPoisoned)?;
        executions.get(id).map(|handle| handle.snapshot()).transpose()
    }

    /// Stops accepting work, cancels in-flight executions, and joins the pool.
    pub fn shutdown(&self) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.take();
        }
        if let Ok(executions) = self.inner.executions.lock() {
            for handle in executions.values() {
                handle.cancel.store(true, Ordering::Relaxed);
            }
        }
        if let Ok(mut workers) = self.workers.lock() {
            for worker in workers.drain(..) {
                let _ = worker.join();
            }
        }
    }
}

impl Drop for TaskLauncher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
