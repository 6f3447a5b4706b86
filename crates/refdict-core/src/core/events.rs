// crates/refdict-core/src/core/events.rs
// ============================================================================
// Module: Refdict Events
// Description: Typed event payloads for structural changes, recode outcomes, and tasks.
// Purpose: Carry engine observations to listeners with deduplicable identities.
// Dependencies: crate::core::{change, identifiers, notification, path, time}, serde
// ============================================================================

//! ## Overview
//! Events are the observability surface of the engines: structural change
//! events drive dependency propagation, recode outcome events feed the
//! notification aggregator, and task events surface execution state. Every
//! event carries a unique [`EventId`]; delivery is at-least-once, so handlers
//! must deduplicate by event identifier or act idempotently.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::change::ChangeKind;
use crate::core::identifiers::EventId;
use crate::core::notification::NotifyKind;
use crate::core::path::DictionaryPath;
use crate::core::path::FieldPath;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Entity Kinds
// ============================================================================

/// Hierarchy entity kinds referenced by structural change events.
///
/// # Invariants
/// - Variants are stable for serialization and propagation dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Top-level group namespace.
    Group,
    /// Reference dictionary.
    Dictionary,
    /// Dictionary column definition.
    MetaField,
    /// Single cell value.
    Field,
    /// Recode rule set.
    RuleSet,
    /// Concrete recode rule.
    Rule,
    /// Aggregated notification.
    Notification,
}

impl EntityKind {
    /// Returns a stable label for registry and history records.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Group => "Group",
            Self::Dictionary => "Dictionary",
            Self::MetaField => "MetaField",
            Self::Field => "Field",
            Self::RuleSet => "RecodeRuleSet",
            Self::Rule => "RecodeRule",
            Self::Notification => "Notification",
        }
    }
}

// ============================================================================
// SECTION: Structural Change Events
// ============================================================================

/// Structural change notification published by hierarchy mutations.
///
/// # Invariants
/// - `target_ids` lists changed documents of a single entity kind.
/// - Events for one target id are published in change order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Unique event identifier for listener deduplication.
    pub event_id: EventId,
    /// Kind of the changed documents.
    pub entity_kind: EntityKind,
    /// Classification of the change.
    pub change_kind: ChangeKind,
    /// Identifiers of the changed documents, rendered as strings.
    pub target_ids: Vec<String>,
    /// Date the change was recorded.
    pub event_date: Timestamp,
}

// ============================================================================
// SECTION: Recode Outcome Events
// ============================================================================

/// Successful recode of one value.
///
/// # Invariants
/// - Both paths carry concrete value segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecodeSuccessEvent {
    /// Unique event identifier for listener deduplication.
    pub event_id: EventId,
    /// Symbolic name of the rule set that produced the mapping.
    pub rule_set_name: String,
    /// Source value address.
    pub from_path: FieldPath,
    /// Target value address.
    pub to_path: FieldPath,
    /// Date the recode was performed.
    pub event_date: Timestamp,
}

/// Failed recode of one value.
///
/// # Invariants
/// - `kind` is a failure classification, never [`NotifyKind::RecodeSuccess`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecodeFailedEvent {
    /// Unique event identifier for listener deduplication.
    pub event_id: EventId,
    /// Symbolic name of the rule set involved, when resolved.
    pub rule_set_name: String,
    /// Source value address.
    pub from_path: FieldPath,
    /// Target dictionary address (no value exists for a failed recode).
    pub to_path: DictionaryPath,
    /// Failure classification.
    pub kind: NotifyKind,
    /// Human-readable cause for diagnostics.
    pub cause: String,
    /// Date the recode was attempted.
    pub event_date: Timestamp,
}

// ============================================================================
// SECTION: Task Events
// ============================================================================

/// Task lifecycle transition observed by the execution substrate.
///
/// # Invariants
/// - `status` is a stable label from the task status machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLifecycleEvent {
    /// Unique event identifier for listener deduplication.
    pub event_id: EventId,
    /// Descriptor identifier of the execution.
    pub descriptor_id: String,
    /// Performer name of the execution.
    pub performer: String,
    /// New status label.
    pub status: String,
    /// Error rendering when the transition is a failure.
    pub error: Option<String>,
    /// Date of the transition.
    pub event_date: Timestamp,
}

/// Task progress observation.
///
/// # Invariants
/// - `total_progress` is in `[0.0, 1.0]` and non-decreasing per execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskProgressEvent {
    /// Unique event identifier for listener deduplication.
    pub event_id: EventId,
    /// Descriptor identifier of the execution.
    pub descriptor_id: String,
    /// Current step description.
    pub step: String,
    /// Aggregate progress of the root tracker.
    pub total_progress: f64,
    /// Date of the observation.
    pub event_date: Timestamp,
}

// ============================================================================
// SECTION: Event Envelope
// ============================================================================

/// Union of all event payloads published on the bus.
///
/// # Invariants
/// - Variants are stable for serialization and listener dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// Structural change on the hierarchy or rule graph.
    Change(ChangeEvent),
    /// Successful recode outcome.
    RecodeSuccess(RecodeSuccessEvent),
    /// Failed recode outcome.
    RecodeFailed(RecodeFailedEvent),
    /// Task lifecycle transition.
    TaskLifecycle(TaskLifecycleEvent),
    /// Task progress observation.
    TaskProgress(TaskProgressEvent),
}

impl Event {
    /// Returns the unique identifier of the wrapped event.
    #[must_use]
    pub const fn event_id(&self) -> &EventId {
        match self {
            Self::Change(event) => &event.event_id,
            Self::RecodeSuccess(event) => &event.event_id,
            Self::RecodeFailed(event) => &event.event_id,
            Self::TaskLifecycle(event) => &event.event_id,
            Self::TaskProgress(event) => &event.event_id,
        }
    }
}
