// crates/refdict-core/src/core/change.rs
// ============================================================================
// Module: Refdict Change Model
// Description: Change kinds, field-level diffs, and history records.
// Purpose: Capture the audit trail of every document mutation.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! Every document mutation is classified by a [`ChangeKind`] and recorded as a
//! [`History`] entry carrying the ordered [`Diff`] list produced by the diff
//! engine. History entries are append-only; the (target, event type, event
//! date) triple is their deduplication identity.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::HistoryId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Change Kinds
// ============================================================================

/// Classification of a document change event.
///
/// # Invariants
/// - Variants are stable for serialization and history matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// The change was ignored by policy.
    Ignore,
    /// The revisions are semantically identical; nothing was written.
    Skip,
    /// The document was created.
    Create,
    /// The document was updated.
    Update,
    /// A previously closed document was restored.
    Restore,
    /// The document was closed.
    Close,
}

impl ChangeKind {
    /// Kinds describing a document that currently exists.
    pub const ACTUAL_KINDS: [Self; 4] = [Self::Skip, Self::Create, Self::Update, Self::Restore];
    /// Kinds describing a document whose content changed.
    pub const CHANGED_KINDS: [Self; 3] = [Self::Create, Self::Update, Self::Restore];
    /// Kinds describing a document that was closed.
    pub const CLOSED_KINDS: [Self; 1] = [Self::Close];

    /// Returns a stable lowercase label for the kind.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ignore => "ignore",
            Self::Skip => "skip",
            Self::Create => "create",
            Self::Update => "update",
            Self::Restore => "restore",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// SECTION: Diffs
// ============================================================================

/// One attribute-level difference between two revisions of a document.
///
/// # Invariants
/// - Emitted only when the rendered attribute values differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    /// Entity type declaring the attribute.
    pub entity: String,
    /// Attribute name.
    pub attribute: String,
    /// Rendered old value; empty when the attribute was absent.
    pub old_value: String,
    /// Rendered new value; empty when the attribute was removed.
    pub new_value: String,
}

impl Diff {
    /// Creates a diff entry for one changed attribute.
    #[must_use]
    pub fn new(
        entity: impl Into<String>,
        attribute: impl Into<String>,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self {
            entity: entity.into(),
            attribute: attribute.into(),
            old_value: old_value.into(),
            new_value: new_value.into(),
        }
    }
}

impl fmt::Display for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}: '{}' -> '{}'",
            self.entity, self.attribute, self.old_value, self.new_value
        )
    }
}

// ============================================================================
// SECTION: History
// ============================================================================

/// Audit record of one change event for any document.
///
/// # Invariants
/// - Append-only; never mutated after creation.
/// - One history entry exists per (target, event type, event date).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    /// Generated identifier.
    pub id: HistoryId,
    /// Identifier of the changed document, rendered as a string.
    pub target_id: String,
    /// Entity type of the changed document.
    pub target_type: String,
    /// Classification of the event.
    pub event_type: ChangeKind,
    /// Date the event occurred.
    pub event_date: Timestamp,
    /// Author who triggered the event.
    pub event_author: String,
    /// Ordered attribute diffs carried by the event.
    pub diffs: Vec<Diff>,
}

impl History {
    /// Returns the deduplication identity of this entry.
    #[must_use]
    pub fn identity(&self) -> (&str, ChangeKind, Timestamp) {
        (self.target_id.as_str(), self.event_type, self.event_date)
    }
}

impl fmt::Display for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "history[{} {} {} at {}]",
            self.target_type, self.target_id, self.event_type, self.event_date
        )
    }
}

// ============================================================================
// SECTION: Change Sets
// ============================================================================

/// Ordered batch of same-kind changes produced by one engine operation.
///
/// # Invariants
/// - All member histories share the batch's change kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Entity type shared by all members.
    pub target_type: String,
    /// Classification shared by all members.
    pub change_kind: ChangeKind,
    /// Member history records in application order.
    pub histories: Vec<History>,
}

impl ChangeSet {
    /// Creates an empty change set for the given type and kind.
    #[must_use]
    pub fn new(target_type: impl Into<String>, change_kind: ChangeKind) -> Self {
        Self {
            target_type: target_type.into(),
            change_kind,
            histories: Vec::new(),
        }
    }

    /// Appends a history record to the batch.
    pub fn push(&mut self, history: History) {
        self.histories.push(history);
    }

    /// Returns true when the batch carries no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }
}
