// crates/refdict-tasks/src/model.rs
// ============================================================================
// Module: Task Model
// Description: Descriptors, statuses, results, and execution snapshots.
// Purpose: Describe submitted work and its observable state.
// Dependencies: refdict-core, serde, serde_json
// ============================================================================

//! ## Overview
//! A [`TaskDescriptor`] names a performer and carries its parameter map; the
//! descriptor identifier is the idempotency key for submission. A
//! [`TaskExecution`] is the observable snapshot of one run through the status
//! machine `Submitted → Running → {Finished | Error | Canceled}`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use refdict_core::Timestamp;
use refdict_core::runtime::AttributeSpec;
use refdict_core::runtime::EntityDescriptor;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Identifiers
// ============================================================================

/// Task descriptor identifier; the submission idempotency key.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DescriptorId(String);

impl DescriptorId {
    /// Creates a new descriptor identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for DescriptorId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DescriptorId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Descriptor
// ============================================================================

/// Parameters of one submittable unit of work.
///
/// # Invariants
/// - `performer` names a registered [`refdict_core::interfaces::TaskPerformer`].
/// - Two descriptors with the same identifier denote the same work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Descriptor identifier, the idempotency key.
    pub id: DescriptorId,
    /// Registered performer name.
    pub performer: String,
    /// Operator submitting the work.
    pub author: String,
    /// Performer parameters.
    pub parameters: BTreeMap<String, Value>,
}

/// Attribute table for task descriptors. The parameter map renders as one
/// attribute, so any differing entry reports a single diff.
pub static TASK_DESCRIPTOR_DESCRIPTOR: EntityDescriptor<TaskDescriptor> = EntityDescriptor {
    target_type: "TaskDescriptor",
    attributes: &[
        AttributeSpec {
            name: "id",
            hashed: false,
            filterable: true,
            sortable: true,
            render: |descriptor| Value::String(descriptor.id.as_str().to_string()),
        },
        AttributeSpec {
            name: "performer",
            hashed: true,
            filterable: true,
            sortable: true,
            render: |descriptor| Value::String(descriptor.performer.clone()),
        },
        AttributeSpec {
            name: "author",
            hashed: true,
            filterable: true,
            sortable: false,
            render: |descriptor| Value::String(descriptor.author.clone()),
        },
        AttributeSpec {
            name: "parameters",
            hashed: true,
            filterable: false,
            sortable: false,
            render: |descriptor| {
                Value::Object(
                    descriptor
                        .parameters
                        .iter()
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect(),
                )
            },
        },
    ],
};

// ============================================================================
// SECTION: Status Machine
// ============================================================================

/// Lifecycle status of a task execution.
///
/// # Invariants
/// - Transitions follow `Submitted → Running → {Finished | Error | Canceled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Queued and awaiting a worker.
    Submitted,
    /// Executing on a worker.
    Running,
    /// Completed successfully.
    Finished,
    /// Failed; the causing error is attached to the result.
    Error,
    /// Stopped after observing a cancellation request.
    Canceled,
}

impl TaskStatus {
    /// Returns true when no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Error | Self::Canceled)
    }

    /// Returns a stable lowercase label for events.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Error => "error",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// SECTION: Results
// ============================================================================

/// Outcome values of a finished execution.
///
/// # Invariants
/// - `error` is present exactly for the `Error` status.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskResult {
    /// Values returned by the performer.
    pub values: BTreeMap<String, Value>,
    /// Rendering of the causing error, when the execution failed.
    pub error: Option<String>,
}

// ============================================================================
// SECTION: Execution Snapshot
// ============================================================================

/// Observable snapshot of one task execution.
///
/// # Invariants
/// - `started_at` is set on entering `Running`; `finished_at` on any
///   terminal status.
/// - `progress` is in `[0.0, 1.0]` and non-decreasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskExecution {
    /// Submitted descriptor.
    pub descriptor: TaskDescriptor,
    /// Current status.
    pub status: TaskStatus,
    /// Submission time.
    pub submitted_at: Timestamp,
    /// Execution start time.
    pub started_at: Option<Timestamp>,
    /// Terminal transition time.
    pub finished_at: Option<Timestamp>,
    /// Outcome, present once terminal.
    pub result: Option<TaskResult>,
    /// Aggregate progress of the execution's root tracker.
    pub progress: f64,
}

impl TaskExecution {
    /// Creates the initial snapshot for a submitted descriptor.
    #[must_use]
    pub const fn submitted(descriptor: TaskDescriptor, submitted_at: Timestamp) -> Self {
        Self {
            descriptor,
            status: TaskStatus::Submitted,
            submitted_at,
            started_at: None,
            finished_at: None,
            result: None,
            progress: 0.0,
        }
    }
}
