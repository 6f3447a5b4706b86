// crates/refdict-core/src/core/notification.rs
// ============================================================================
// Module: Refdict Notifications
// Description: Aggregated recode outcome records with a pending/processed lifecycle.
// Purpose: Surface recode successes and failures to operators in time buckets.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! Individual recode outcomes are aggregated by rule set, source, target, and
//! classification into time-bucketed [`Notification`] documents. A
//! notification is created `Pending` and retired to `Processed` exactly once;
//! processing an already processed notification is a no-op. Document names
//! embedded in notifications are truncated to [`DOCUMENT_NAME_LEN`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::NotificationId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum stored length of a document name inside a notification.
pub const DOCUMENT_NAME_LEN: usize = 255;

/// Truncates a document name to [`DOCUMENT_NAME_LEN`] with a trailing ellipsis.
#[must_use]
pub fn truncate_document_name(name: &str) -> String {
    if name.chars().count() <= DOCUMENT_NAME_LEN {
        return name.to_string();
    }
    let prefix: String = name.chars().take(DOCUMENT_NAME_LEN - 3).collect();
    format!("{prefix}...")
}

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Classification of an aggregated recode outcome.
///
/// # Invariants
/// - Variants are stable for serialization and aggregation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyKind {
    /// The value was recoded successfully.
    RecodeSuccess,
    /// No rule matched the source value and the set declares no default.
    MissingRule,
    /// The rule set itself could not be resolved for the requested pair.
    MissingRuleSet,
}

impl NotifyKind {
    /// Returns true when the kind describes a failed recode.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        !matches!(self, Self::RecodeSuccess)
    }
}

/// Processing state of a notification.
///
/// # Invariants
/// - `Pending → Processed` is the only transition and is idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyState {
    /// The notification awaits operator processing.
    Pending,
    /// The notification has been processed.
    Processed,
}

// ============================================================================
// SECTION: Notification
// ============================================================================

/// Aggregated recode outcome over a time window.
///
/// # Invariants
/// - `count >= 1`; increments are atomic per open (key, window) bucket.
/// - Immutable after creation except `count` and the processing fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Generated identifier.
    pub id: NotificationId,
    /// Outcome classification.
    pub kind: NotifyKind,
    /// Symbolic name of the rule set the outcome belongs to.
    pub rule_set_name: String,
    /// Source group name.
    pub from_group_name: String,
    /// Source dictionary name.
    pub from_dictionary_name: String,
    /// Source value that was recoded, when known.
    pub from_value: Option<String>,
    /// Target group name.
    pub to_group_name: String,
    /// Target dictionary name.
    pub to_dictionary_name: String,
    /// Number of aggregated outcomes.
    pub count: u64,
    /// Start of the aggregation window.
    pub start_date: Timestamp,
    /// End of the aggregation window.
    pub end_date: Timestamp,
    /// Current processing state.
    pub processing_state: NotifyState,
    /// Date the notification was processed.
    pub processing_date: Option<Timestamp>,
    /// Operator who processed the notification.
    pub processing_author: Option<String>,
}

impl Notification {
    /// Returns the aggregation key of this notification.
    #[must_use]
    pub fn aggregation_key(&self) -> NotificationKey {
        NotificationKey {
            kind: self.kind,
            rule_set_name: self.rule_set_name.clone(),
            from_group_name: self.from_group_name.clone(),
            from_dictionary_name: self.from_dictionary_name.clone(),
            from_value: self.from_value.clone(),
            to_group_name: self.to_group_name.clone(),
            to_dictionary_name: self.to_dictionary_name.clone(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "notification[{:?} '{}' {}.{} -> {}.{} x{}]",
            self.kind,
            self.rule_set_name,
            self.from_group_name,
            self.from_dictionary_name,
            self.to_group_name,
            self.to_dictionary_name,
            self.count
        )
    }
}

// ============================================================================
// SECTION: Aggregation Key
// ============================================================================

/// Grouping key for notification aggregation within one window.
///
/// # Invariants
/// - Field values are stored post-truncation, matching the notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationKey {
    /// Outcome classification.
    pub kind: NotifyKind,
    /// Rule set symbolic name.
    pub rule_set_name: String,
    /// Source group name.
    pub from_group_name: String,
    /// Source dictionary name.
    pub from_dictionary_name: String,
    /// Source value, when the classification tracks individual values.
    pub from_value: Option<String>,
    /// Target group name.
    pub to_group_name: String,
    /// Target dictionary name.
    pub to_dictionary_name: String,
}
