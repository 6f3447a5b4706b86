// crates/refdict-store-memory/src/store.rs
// ============================================================================
// Module: Memory Stores
// Description: In-memory reference implementations of the store interfaces.
// Purpose: Back the engines with snapshot-consistent, lock-guarded state.
// Dependencies: refdict-core, std
// ============================================================================

//! ## Overview
//! These stores keep all state behind `RwLock`-guarded maps. Rule batches are
//! applied inside a single write section, so readers observe a batch entirely
//! or not at all; notification count increments happen under the store lock
//! and therefore never lose updates under concurrent writers. Lookups by
//! named path reuse the case-insensitive path equality of the core model.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::sync::RwLock;

use refdict_core::ChangeKind;
use refdict_core::core::folded_eq;
use refdict_core::Dictionary;
use refdict_core::DictionaryId;
use refdict_core::DictionaryPath;
use refdict_core::Field;
use refdict_core::FieldId;
use refdict_core::Group;
use refdict_core::GroupId;
use refdict_core::History;
use refdict_core::MetaField;
use refdict_core::MetaFieldId;
use refdict_core::MetaFieldPath;
use refdict_core::Notification;
use refdict_core::NotificationId;
use refdict_core::NotificationKey;
use refdict_core::NotifyState;
use refdict_core::RecodeRule;
use refdict_core::RecodeRuleSet;
use refdict_core::Record;
use refdict_core::RecordId;
use refdict_core::RuleId;
use refdict_core::RuleSetId;
use refdict_core::RuleSetState;
use refdict_core::Timestamp;
use refdict_core::interfaces::HierarchyStore;
use refdict_core::interfaces::HistoryStore;
use refdict_core::interfaces::NotificationStore;
use refdict_core::interfaces::RuleBatch;
use refdict_core::interfaces::RuleStore;
use refdict_core::interfaces::StoreError;

// ============================================================================
// SECTION: Lock Helpers
// ============================================================================

/// Maps a poisoned lock into a store error.
fn poisoned() -> StoreError {
    StoreError::Io("memory store lock poisoned".to_string())
}

// ============================================================================
// SECTION: Hierarchy Store
// ============================================================================

/// Mutable hierarchy state guarded by one lock.
#[derive(Default)]
struct HierarchyState {
    /// Groups by identifier.
    groups: BTreeMap<GroupId, Group>,
    /// Dictionaries by identifier.
    dictionaries: BTreeMap<DictionaryId, Dictionary>,
    /// Meta fields by identifier.
    meta_fields: BTreeMap<MetaFieldId, MetaField>,
    /// Fields by identifier.
    fields: BTreeMap<FieldId, Field>,
}

impl HierarchyState {
    /// Derives the named path of a meta field, when its ancestors exist.
    fn meta_field_path(&self, meta_field: &MetaField) -> Option<MetaFieldPath> {
        let dictionary = self.dictionaries.get(&meta_field.dictionary_id)?;
        let group = self.groups.get(&dictionary.group_id)?;
        Some(MetaFieldPath::new(
            group.name.clone(),
            dictionary.name.clone(),
            meta_field.name.clone(),
        ))
    }
}

/// In-memory hierarchy store.
///
/// # Invariants
/// - Writers hold the single write lock; readers see committed state only.
#[derive(Default)]
pub struct MemoryHierarchyStore {
    /// Guarded hierarchy state.
    state: RwLock<HierarchyState>,
}

impl MemoryHierarchyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl HierarchyStore for MemoryHierarchyStore {
    fn find_group_by_name(&self, name: &str) -> Result<Option<Group>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.groups.values().find(|group| folded_eq(&group.name, name)).cloned())
    }

    fn find_group_by_id(&self, id: &GroupId) -> Result<Option<Group>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.groups.get(id).cloned())
    }

    fn find_dictionary_by_path(
        &self,
        path: &DictionaryPath,
    ) -> Result<Option<Dictionary>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        let found = state.dictionaries.values().find(|dictionary| {
            state.groups.get(&dictionary.group_id).is_some_and(|group| {
                DictionaryPath::new(group.name.clone(), dictionary.name.clone()) == *path
            })
        });
        Ok(found.cloned())
    }

    fn find_dictionary_by_id(&self, id: &DictionaryId) -> Result<Option<Dictionary>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.dictionaries.get(id).cloned())
    }

    fn find_dictionaries_by_group(&self, id: &GroupId) -> Result<Vec<Dictionary>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .dictionaries
            .values()
            .filter(|dictionary| dictionary.group_id == *id)
            .cloned()
            .collect())
    }

    fn find_meta_field_by_path(
        &self,
        path: &MetaFieldPath,
    ) -> Result<Option<MetaField>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        let found = state
            .meta_fields
            .values()
            .find(|meta_field| {
                state
                    .meta_field_path(meta_field)
                    .is_some_and(|candidate| candidate == *path)
            })
            .cloned();
        Ok(found)
    }

    fn find_meta_field_by_id(&self, id: &MetaFieldId) -> Result<Option<MetaField>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.meta_fields.get(id).cloned())
    }

    fn find_meta_fields_by_dictionary(
        &self,
        id: &DictionaryId,
    ) -> Result<Vec<MetaField>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        let mut meta_fields: Vec<MetaField> = state
            .meta_fields
            .values()
            .filter(|meta_field| meta_field.dictionary_id == *id)
            .cloned()
            .collect();
        meta_fields.sort_by_key(|meta_field| meta_field.ordinal);
        Ok(meta_fields)
    }

    fn find_primary_meta_field(&self, id: &DictionaryId) -> Result<Option<MetaField>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .meta_fields
            .values()
            .find(|meta_field| {
                meta_field.dictionary_id == *id
                    && meta_field.flags.is_primary()
                    && !meta_field.state.is_closed()
            })
            .cloned())
    }

    fn find_field_by_path(&self, path: &refdict_core::FieldPath) -> Result<Option<Field>, StoreError> {
        let Some(meta_field) = self.find_meta_field_by_path(path.meta_field_path())? else {
            return Ok(None);
        };
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .fields
            .values()
            .find(|field| {
                field.meta_field_id == meta_field.id
                    && !field.state.is_closed()
                    && field.value.as_deref() == path.field_value()
            })
            .cloned())
    }

    fn find_field_by_id(&self, id: &FieldId) -> Result<Option<Field>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.fields.get(id).cloned())
    }

    fn find_fields_by_meta_field(&self, id: &MetaFieldId) -> Result<Vec<Field>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .fields
            .values()
            .filter(|field| field.meta_field_id == *id)
            .cloned()
            .collect())
    }

    fn count_fields(&self, id: &MetaFieldId) -> Result<usize, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .fields
            .values()
            .filter(|field| field.meta_field_id == *id && !field.state.is_closed())
            .count())
    }

    fn find_records(&self, id: &DictionaryId) -> Result<Vec<Record>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        let meta_fields: BTreeMap<&MetaFieldId, &MetaField> = state
            .meta_fields
            .values()
            .filter(|meta_field| meta_field.dictionary_id == *id)
            .map(|meta_field| (&meta_field.id, meta_field))
            .collect();
        let mut records: BTreeMap<RecordId, Record> = BTreeMap::new();
        for field in state.fields.values() {
            let Some(meta_field) = meta_fields.get(&field.meta_field_id) else {
                continue;
            };
            if field.state.is_closed() {
                continue;
            }
            records
                .entry(field.name.clone())
                .or_insert_with(|| Record {
                    id: field.name.clone(),
                    fields: BTreeMap::new(),
                })
                .fields
                .insert(meta_field.name.clone(), field.clone());
        }
        Ok(records.into_values().collect())
    }

    fn upsert_group(&self, group: Group) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.groups.insert(group.id.clone(), group);
        Ok(())
    }

    fn upsert_dictionary(&self, dictionary: Dictionary) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.dictionaries.insert(dictionary.id.clone(), dictionary);
        Ok(())
    }

    fn upsert_meta_field(&self, meta_field: MetaField) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.meta_fields.insert(meta_field.id.clone(), meta_field);
        Ok(())
    }

    fn upsert_field(&self, field: Field) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.fields.insert(field.id.clone(), field);
        Ok(())
    }
}

// ============================================================================
// SECTION: Rule Store
// ============================================================================

/// Mutable rule graph state guarded by one lock.
#[derive(Default)]
struct RuleState {
    /// Rule sets by identifier.
    sets: BTreeMap<RuleSetId, RecodeRuleSet>,
    /// Rules by identifier.
    rules: BTreeMap<RuleId, RecodeRule>,
}

/// In-memory rule store with snapshot-consistent batches.
///
/// # Invariants
/// - `apply_batch` holds the write lock for the whole batch; readers never
///   observe a half-applied batch.
#[derive(Default)]
pub struct MemoryRuleStore {
    /// Guarded rule graph state.
    state: RwLock<RuleState>,
}

impl MemoryRuleStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Returns true when a rule counts as open.
fn rule_open(rule: &RecodeRule) -> bool {
    rule.state.change_kind != ChangeKind::Close
}

impl RuleStore for MemoryRuleStore {
    fn find_rule_set_by_id(&self, id: &RuleSetId) -> Result<Option<RecodeRuleSet>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.sets.get(id).cloned())
    }

    fn find_rule_set_by_name(&self, name: &str) -> Result<Option<RecodeRuleSet>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .sets
            .values()
            .find(|rule_set| rule_set.is_active() && folded_eq(&rule_set.name, name))
            .cloned())
    }

    fn find_active_rule_set_by_pair(
        &self,
        from: &MetaFieldId,
        to: &MetaFieldId,
    ) -> Result<Option<RecodeRuleSet>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .sets
            .values()
            .find(|rule_set| {
                rule_set.is_active()
                    && rule_set.from_meta_field_id == *from
                    && rule_set.to_meta_field_id == *to
            })
            .cloned())
    }

    fn find_active_rule_sets(&self) -> Result<Vec<RecodeRuleSet>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.sets.values().filter(|rule_set| rule_set.is_active()).cloned().collect())
    }

    fn find_rule_sets_by_meta_field(
        &self,
        id: &MetaFieldId,
    ) -> Result<Vec<RecodeRuleSet>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .sets
            .values()
            .filter(|rule_set| {
                rule_set.is_active()
                    && (rule_set.from_meta_field_id == *id || rule_set.to_meta_field_id == *id)
            })
            .cloned()
            .collect())
    }

    fn find_rule_sets_from_dictionary(
        &self,
        from_meta_field_ids: &[MetaFieldId],
    ) -> Result<Vec<RecodeRuleSet>, StoreError> {
        let wanted: HashSet<&MetaFieldId> = from_meta_field_ids.iter().collect();
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .sets
            .values()
            .filter(|rule_set| {
                rule_set.is_active() && wanted.contains(&rule_set.from_meta_field_id)
            })
            .cloned()
            .collect())
    }

    fn find_rules_by_set(&self, id: &RuleSetId) -> Result<Vec<RecodeRule>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .rules
            .values()
            .filter(|rule| rule.rule_set_id == *id && rule_open(rule))
            .cloned()
            .collect())
    }

    fn find_rules_by_from_field_ids(
        &self,
        id: &RuleSetId,
        from_field_ids: &[FieldId],
    ) -> Result<Vec<RecodeRule>, StoreError> {
        let wanted: HashSet<&FieldId> = from_field_ids.iter().collect();
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .rules
            .values()
            .filter(|rule| {
                rule.rule_set_id == *id && rule_open(rule) && wanted.contains(&rule.from_field_id)
            })
            .cloned()
            .collect())
    }

    fn find_rules_by_field_id(&self, id: &FieldId) -> Result<Vec<RecodeRule>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .rules
            .values()
            .filter(|rule| {
                rule_open(rule) && (rule.from_field_id == *id || rule.to_field_id == *id)
            })
            .cloned()
            .collect())
    }

    fn count_rules(&self, id: &RuleSetId) -> Result<usize, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.rules.values().filter(|rule| rule.rule_set_id == *id && rule_open(rule)).count())
    }

    fn apply_batch(&self, batch: RuleBatch) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        for rule_set in &batch.create_sets {
            if state.sets.contains_key(&rule_set.id) {
                return Err(StoreError::Conflict(format!(
                    "rule set '{}' already exists",
                    rule_set.id
                )));
            }
        }
        for rule_set in &batch.update_sets {
            if !state.sets.contains_key(&rule_set.id) {
                return Err(StoreError::Conflict(format!("rule set '{}' is unknown", rule_set.id)));
            }
        }
        for rule in &batch.create_rules {
            if state.rules.contains_key(&rule.id) {
                return Err(StoreError::Conflict(format!("rule '{}' already exists", rule.id)));
            }
        }
        for rule in &batch.update_rules {
            if !state.rules.contains_key(&rule.id) {
                return Err(StoreError::Conflict(format!("rule '{}' is unknown", rule.id)));
            }
        }
        for rule_set in batch.create_sets {
            state.sets.insert(rule_set.id.clone(), rule_set);
        }
        for rule_set in batch.update_sets {
            state.sets.insert(rule_set.id.clone(), rule_set);
        }
        for id in batch.close_sets {
            if let Some(rule_set) = state.sets.get_mut(&id) {
                rule_set.rule_set_state = RuleSetState::Closed;
                rule_set.state.change_kind = ChangeKind::Close;
            }
        }
        for rule in batch.create_rules {
            state.rules.insert(rule.id.clone(), rule);
        }
        for rule in batch.update_rules {
            state.rules.insert(rule.id.clone(), rule);
        }
        for id in batch.close_rules {
            if let Some(rule) = state.rules.get_mut(&id) {
                rule.state.change_kind = ChangeKind::Close;
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: History Store
// ============================================================================

/// In-memory history store with identity deduplication.
///
/// # Invariants
/// - Entries are append-only; identities never repeat.
#[derive(Default)]
pub struct MemoryHistoryStore {
    /// Guarded history log and identity set.
    state: RwLock<(Vec<History>, HashSet<(String, ChangeKind, Timestamp)>)>,
}

impl MemoryHistoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn append(&self, history: History) -> Result<bool, StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        let identity =
            (history.target_id.clone(), history.event_type, history.event_date);
        if !state.1.insert(identity) {
            return Ok(false);
        }
        state.0.push(history);
        Ok(true)
    }

    fn find_by_target(&self, target_id: &str) -> Result<Vec<History>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.0.iter().filter(|history| history.target_id == target_id).cloned().collect())
    }
}

// ============================================================================
// SECTION: Notification Store
// ============================================================================

/// In-memory notification store with lock-atomic counters.
///
/// # Invariants
/// - Count increments happen under the write lock and are never lost.
#[derive(Default)]
pub struct MemoryNotificationStore {
    /// Guarded notification map.
    state: RwLock<BTreeMap<NotificationId, Notification>>,
}

impl MemoryNotificationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotificationStore for MemoryNotificationStore {
    fn insert(&self, notification: Notification) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.insert(notification.id.clone(), notification);
        Ok(())
    }

    fn increment_count(&self, id: &NotificationId) -> Result<u64, StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        let notification = state
            .get_mut(id)
            .ok_or_else(|| StoreError::Invalid(format!("notification '{id}' is unknown")))?;
        notification.count += 1;
        Ok(notification.count)
    }

    fn find_open_bucket(
        &self,
        key: &NotificationKey,
        at: Timestamp,
    ) -> Result<Option<Notification>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .values()
            .find(|notification| {
                notification.processing_state == NotifyState::Pending
                    && notification.start_date <= at
                    && at < notification.end_date
                    && notification.aggregation_key() == *key
            })
            .cloned())
    }

    fn find_pending(&self) -> Result<Vec<Notification>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .values()
            .filter(|notification| notification.processing_state == NotifyState::Pending)
            .cloned()
            .collect())
    }

    fn find_by_id(&self, id: &NotificationId) -> Result<Option<Notification>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.get(id).cloned())
    }

    fn set_processed(
        &self,
        id: &NotificationId,
        date: Timestamp,
        author: &str,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        let notification = state
            .get_mut(id)
            .ok_or_else(|| StoreError::Invalid(format!("notification '{id}' is unknown")))?;
        if notification.processing_state == NotifyState::Processed {
            return Ok(false);
        }
        notification.processing_state = NotifyState::Processed;
        notification.processing_date = Some(date);
        notification.processing_author = Some(author.to_string());
        Ok(true)
    }
}
