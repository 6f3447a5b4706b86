// crates/refdict-core/src/interfaces/mod.rs
// ============================================================================
// Module: Refdict Interfaces
// Description: Backend-agnostic interfaces for storage, indexing, events, and tasks.
// Purpose: Define the contract surfaces used by the Refdict engines.
// Dependencies: crate::core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how the engines integrate with external collaborators
//! without embedding backend-specific details. Implementations must be safe
//! under concurrent callers and fail closed on missing or invalid data.
//! Invariants:
//! - [`RuleStore::apply_batch`] is atomic relative to readers.
//! - [`NotificationStore::increment_count`] is atomic per notification.
//! - Event delivery is at-least-once; listeners must be idempotent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::core::Dictionary;
use crate::core::DictionaryId;
use crate::core::DictionaryPath;
use crate::core::EntityKind;
use crate::core::Event;
use crate::core::Field;
use crate::core::FieldId;
use crate::core::FieldPath;
use crate::core::Group;
use crate::core::GroupId;
use crate::core::History;
use crate::core::MetaField;
use crate::core::MetaFieldId;
use crate::core::MetaFieldPath;
use crate::core::Notification;
use crate::core::NotificationId;
use crate::core::NotificationKey;
use crate::core::RecodeRule;
use crate::core::RecodeRuleSet;
use crate::core::Record;
use crate::core::RuleId;
use crate::core::RuleSetId;
use crate::core::Timestamp;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Persistence collaborator errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("store io error: {0}")]
    Io(String),
    /// Optimistic consistency conflict; the engine surfaces it, never retries.
    #[error("store conflict: {0}")]
    Conflict(String),
    /// Store data is invalid.
    #[error("store invalid data: {0}")]
    Invalid(String),
}

impl From<StoreError> for crate::core::CoreError {
    fn from(err: StoreError) -> Self {
        Self::StoreConflict {
            message: err.to_string(),
        }
    }
}

// ============================================================================
// SECTION: Hierarchy Store
// ============================================================================

/// Persistence surface for the document hierarchy.
pub trait HierarchyStore: Send + Sync {
    /// Loads a group by case-insensitive name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_group_by_name(&self, name: &str) -> Result<Option<Group>, StoreError>;

    /// Loads a group by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_group_by_id(&self, id: &GroupId) -> Result<Option<Group>, StoreError>;

    /// Loads a dictionary by named path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_dictionary_by_path(
        &self,
        path: &DictionaryPath,
    ) -> Result<Option<Dictionary>, StoreError>;

    /// Loads a dictionary by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_dictionary_by_id(&self, id: &DictionaryId) -> Result<Option<Dictionary>, StoreError>;

    /// Lists dictionaries owned by a group.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_dictionaries_by_group(&self, id: &GroupId) -> Result<Vec<Dictionary>, StoreError>;

    /// Loads a meta field by named path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_meta_field_by_path(
        &self,
        path: &MetaFieldPath,
    ) -> Result<Option<MetaField>, StoreError>;

    /// Loads a meta field by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_meta_field_by_id(&self, id: &MetaFieldId) -> Result<Option<MetaField>, StoreError>;

    /// Lists meta fields owned by a dictionary, ordered by ordinal.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_meta_fields_by_dictionary(
        &self,
        id: &DictionaryId,
    ) -> Result<Vec<MetaField>, StoreError>;

    /// Loads the primary meta field of a dictionary.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_primary_meta_field(&self, id: &DictionaryId) -> Result<Option<MetaField>, StoreError>;

    /// Loads a field by named path, matching the value segment exactly.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_field_by_path(&self, path: &FieldPath) -> Result<Option<Field>, StoreError>;

    /// Loads a field by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_field_by_id(&self, id: &FieldId) -> Result<Option<Field>, StoreError>;

    /// Lists fields owned by a meta field.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_fields_by_meta_field(&self, id: &MetaFieldId) -> Result<Vec<Field>, StoreError>;

    /// Counts open fields owned by a meta field.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn count_fields(&self, id: &MetaFieldId) -> Result<usize, StoreError>;

    /// Assembles the logical records of a dictionary.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_records(&self, id: &DictionaryId) -> Result<Vec<Record>, StoreError>;

    /// Inserts or replaces a group.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn upsert_group(&self, group: Group) -> Result<(), StoreError>;

    /// Inserts or replaces a dictionary.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn upsert_dictionary(&self, dictionary: Dictionary) -> Result<(), StoreError>;

    /// Inserts or replaces a meta field.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn upsert_meta_field(&self, meta_field: MetaField) -> Result<(), StoreError>;

    /// Inserts or replaces a field.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn upsert_field(&self, field: Field) -> Result<(), StoreError>;

    /// Reports store readiness for liveness probes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unavailable.
    fn readiness(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Rule Store
// ============================================================================

/// Atomic mutation batch applied to the rule graph.
///
/// # Invariants
/// - Applied entirely or not at all, and never observed half-applied.
#[derive(Debug, Clone, Default)]
pub struct RuleBatch {
    /// Rule sets to create.
    pub create_sets: Vec<RecodeRuleSet>,
    /// Rule sets to update in place.
    pub update_sets: Vec<RecodeRuleSet>,
    /// Rule set identifiers to close.
    pub close_sets: Vec<RuleSetId>,
    /// Rules to create.
    pub create_rules: Vec<RecodeRule>,
    /// Rules to update in place.
    pub update_rules: Vec<RecodeRule>,
    /// Rule identifiers to close.
    pub close_rules: Vec<RuleId>,
}

impl RuleBatch {
    /// Returns true when the batch carries no mutations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.create_sets.is_empty()
            && self.update_sets.is_empty()
            && self.close_sets.is_empty()
            && self.create_rules.is_empty()
            && self.update_rules.is_empty()
            && self.close_rules.is_empty()
    }
}

/// Persistence surface for the rule graph.
pub trait RuleStore: Send + Sync {
    /// Loads a rule set by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_rule_set_by_id(&self, id: &RuleSetId) -> Result<Option<RecodeRuleSet>, StoreError>;

    /// Loads a rule set by symbolic name, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_rule_set_by_name(&self, name: &str) -> Result<Option<RecodeRuleSet>, StoreError>;

    /// Loads the active rule set for an ordered (from, to) meta field pair.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_active_rule_set_by_pair(
        &self,
        from: &MetaFieldId,
        to: &MetaFieldId,
    ) -> Result<Option<RecodeRuleSet>, StoreError>;

    /// Lists all active rule sets.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_active_rule_sets(&self) -> Result<Vec<RecodeRuleSet>, StoreError>;

    /// Lists rule sets referencing the meta field on either side.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_rule_sets_by_meta_field(
        &self,
        id: &MetaFieldId,
    ) -> Result<Vec<RecodeRuleSet>, StoreError>;

    /// Lists active rule sets whose source dictionary matches.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_rule_sets_from_dictionary(
        &self,
        from_meta_field_ids: &[MetaFieldId],
    ) -> Result<Vec<RecodeRuleSet>, StoreError>;

    /// Lists rules owned by a rule set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_rules_by_set(&self, id: &RuleSetId) -> Result<Vec<RecodeRule>, StoreError>;

    /// Lists rules of a set keyed to the given source field identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_rules_by_from_field_ids(
        &self,
        id: &RuleSetId,
        from_field_ids: &[FieldId],
    ) -> Result<Vec<RecodeRule>, StoreError>;

    /// Lists rules referencing the field on either side, across all sets.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_rules_by_field_id(&self, id: &FieldId) -> Result<Vec<RecodeRule>, StoreError>;

    /// Counts open rules owned by a rule set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn count_rules(&self, id: &RuleSetId) -> Result<usize, StoreError>;

    /// Applies a mutation batch atomically relative to readers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the batch cannot be applied; no partial
    /// state may remain.
    fn apply_batch(&self, batch: RuleBatch) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: History Store
// ============================================================================

/// Persistence surface for append-only history records.
pub trait HistoryStore: Send + Sync {
    /// Appends a history record unless its identity already exists.
    ///
    /// Returns false when a record with the same (target, event type, event
    /// date) identity is already present, making replay idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn append(&self, history: History) -> Result<bool, StoreError>;

    /// Lists history records for a target identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_by_target(&self, target_id: &str) -> Result<Vec<History>, StoreError>;
}

// ============================================================================
// SECTION: Notification Store
// ============================================================================

/// Persistence surface for aggregated notifications.
pub trait NotificationStore: Send + Sync {
    /// Inserts a new notification bucket.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn insert(&self, notification: Notification) -> Result<(), StoreError>;

    /// Atomically increments the count of an open bucket.
    ///
    /// Returns the new count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the notification does not exist.
    fn increment_count(&self, id: &NotificationId) -> Result<u64, StoreError>;

    /// Finds the open bucket for a key whose window contains `at`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_open_bucket(
        &self,
        key: &NotificationKey,
        at: Timestamp,
    ) -> Result<Option<Notification>, StoreError>;

    /// Lists pending notifications.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_pending(&self) -> Result<Vec<Notification>, StoreError>;

    /// Loads a notification by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_by_id(&self, id: &NotificationId) -> Result<Option<Notification>, StoreError>;

    /// Marks a notification processed.
    ///
    /// Returns false when the notification was already processed, making the
    /// transition idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the notification does not exist.
    fn set_processed(
        &self,
        id: &NotificationId,
        date: Timestamp,
        author: &str,
    ) -> Result<bool, StoreError>;
}

// ============================================================================
// SECTION: Sequences
// ============================================================================

/// Generator of unique identifiers for new documents and events.
///
/// Implementations must never repeat an identifier within one deployment.
pub trait Sequence: Send + Sync {
    /// Returns the next unique identifier for the given prefix.
    fn next_id(&self, prefix: &str) -> String;
}

// ============================================================================
// SECTION: Search Index
// ============================================================================

/// Search index collaborator errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Index collaborator reported an error.
    #[error("index error: {0}")]
    Index(String),
}

/// Acknowledgment returned by an index rebuild.
///
/// # Invariants
/// - `documents` counts the documents the collaborator reindexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildAck {
    /// Entity kind that was rebuilt; `None` for a full rebuild.
    pub entity_kind: Option<EntityKind>,
    /// Number of reindexed documents.
    pub documents: usize,
}

/// Search/filter index collaborator.
pub trait SearchIndex: Send + Sync {
    /// Inserts or replaces an indexed document.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the upsert fails.
    fn upsert(
        &self,
        entity_kind: EntityKind,
        id: &str,
        attributes: &[(String, String)],
    ) -> Result<(), IndexError>;

    /// Deletes an indexed document.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the delete fails.
    fn delete(&self, entity_kind: EntityKind, id: &str) -> Result<(), IndexError>;

    /// Rebuilds the index for one entity kind, or entirely when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the rebuild fails.
    fn rebuild(&self, entity_kind: Option<EntityKind>) -> Result<RebuildAck, IndexError>;
}

// ============================================================================
// SECTION: Event Bus
// ============================================================================

/// Event bus collaborator errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum BusError {
    /// Event publication failed.
    #[error("event publish error: {0}")]
    Publish(String),
}

/// Listener registered on the event bus.
///
/// Listeners must be idempotent: delivery is at-least-once and replays carry
/// the same [`crate::core::EventId`].
pub trait EventListener: Send + Sync {
    /// Handles one delivered event.
    fn on_event(&self, event: &Event);
}

/// Typed publish/subscribe event bus.
///
/// Implementations dispatch events for one target entity in publish order;
/// no ordering is guaranteed across different entities.
pub trait EventBus: Send + Sync {
    /// Publishes an event to all registered listeners.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] when publication fails.
    fn publish(&self, event: &Event) -> Result<(), BusError>;

    /// Registers a listener for all subsequent events.
    fn subscribe(&self, listener: Arc<dyn EventListener>);
}

// ============================================================================
// SECTION: Task Performers
// ============================================================================

/// Task performer errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum PerformerError {
    /// The performer failed while executing the unit of work.
    #[error("task performer failed: {0}")]
    Failed(String),
    /// The performer observed a cancellation request and stopped.
    #[error("task canceled")]
    Canceled,
}

/// Execution context handed to a performer.
///
/// Performers poll [`Self::is_cancel_requested`] at iteration boundaries and
/// report progress through [`Self::publish_progress`].
pub trait TaskContext {
    /// Returns true when cooperative cancellation was requested.
    fn is_cancel_requested(&self) -> bool;

    /// Publishes a progress observation for the running task.
    fn publish_progress(&self, step: &str, total_progress: f64);
}

/// Named unit of work invoked by the task execution substrate.
pub trait TaskPerformer: Send + Sync {
    /// Returns the performer name used for descriptor routing.
    fn name(&self) -> &str;

    /// Executes the unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`PerformerError`] when the work fails or observes a
    /// cancellation request.
    fn perform(
        &self,
        ctx: &dyn TaskContext,
        parameters: &BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, Value>, PerformerError>;
}

/// Registry mapping performer names to implementations.
pub trait TaskPerformerRegistry: Send + Sync {
    /// Resolves a performer by name.
    fn find_performer(&self, name: &str) -> Option<Arc<dyn TaskPerformer>>;
}
