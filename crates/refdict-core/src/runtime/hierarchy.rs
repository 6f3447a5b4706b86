// crates/refdict-core/src/runtime/hierarchy.rs
// ============================================================================
// Module: Refdict Hierarchy Engine
// Description: Lifecycle operations over the four-level document tree.
// Purpose: Validate, record, and publish structural changes to the hierarchy.
// Dependencies: crate::core, crate::interfaces, crate::runtime::diffing
// ============================================================================

//! ## Overview
//! The [`HierarchyEngine`] owns the write path of the document tree: name and
//! uniqueness validation, primary-flag invariants, history recording, change
//! event publication, and cascading closure. Closing a parent closes its
//! children first, deepest level first, so listeners never observe an open
//! child under a closed parent. Rule graph consequences are not applied here;
//! the propagation engine reacts to the published change events.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::core::ChangeKind;
use crate::core::CoreError;
use crate::core::Dictionary;
use crate::core::DictionaryId;
use crate::core::DictionaryPath;
use crate::core::Diff;
use crate::core::DocumentState;
use crate::core::EntityKind;
use crate::core::Event;
use crate::core::EventId;
use crate::core::Field;
use crate::core::FieldId;
use crate::core::Group;
use crate::core::GroupId;
use crate::core::History;
use crate::core::HistoryId;
use crate::core::MetaField;
use crate::core::MetaFieldFlags;
use crate::core::MetaFieldId;
use crate::core::MetaFieldPath;
use crate::core::NAME_MAX_LEN;
use crate::core::PermissionMask;
use crate::core::RecordId;
use crate::core::Timestamp;
use crate::core::events::ChangeEvent;
use crate::interfaces::EventBus;
use crate::interfaces::HierarchyStore;
use crate::interfaces::HistoryStore;
use crate::interfaces::Sequence;
use crate::runtime::diffing::DICTIONARY_DESCRIPTOR;
use crate::runtime::diffing::FIELD_DESCRIPTOR;
use crate::runtime::diffing::GROUP_DESCRIPTOR;
use crate::runtime::diffing::META_FIELD_DESCRIPTOR;

// ============================================================================
// SECTION: Change Guards
// ============================================================================

/// Pre-write veto hook consulted before structural changes are applied.
///
/// Guards let downstream engines reject changes that would break their own
/// invariants, before any write happens.
pub trait ChangeGuard: Send + Sync {
    /// Checks an update to a meta field.
    ///
    /// # Errors
    ///
    /// Returns a constraint error to abort the change.
    fn check_meta_field_change(
        &self,
        older: &MetaField,
        newer: &MetaField,
    ) -> Result<(), CoreError> {
        let _ = (older, newer);
        Ok(())
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builder for a [`HierarchyEngine`].
///
/// # Invariants
/// - `build` succeeds only when every collaborator is configured.
#[derive(Default)]
pub struct HierarchyEngineBuilder {
    /// Hierarchy store collaborator.
    hierarchy: Option<Arc<dyn HierarchyStore>>,
    /// History store collaborator.
    history: Option<Arc<dyn HistoryStore>>,
    /// Event bus collaborator.
    bus: Option<Arc<dyn EventBus>>,
    /// Identifier sequence collaborator.
    sequence: Option<Arc<dyn Sequence>>,
    /// Registered pre-write guards.
    guards: Vec<Arc<dyn ChangeGuard>>,
}

impl HierarchyEngineBuilder {
    /// Registers the hierarchy store.
    #[must_use]
    pub fn hierarchy(mut self, hierarchy: Arc<dyn HierarchyStore>) -> Self {
        self.hierarchy = Some(hierarchy);
        self
    }

    /// Registers the history store.
    #[must_use]
    pub fn history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    /// Registers the event bus.
    #[must_use]
    pub fn bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Registers the identifier sequence.
    #[must_use]
    pub fn sequence(mut self, sequence: Arc<dyn Sequence>) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Registers a pre-write change guard.
    #[must_use]
    pub fn guard(mut self, guard: Arc<dyn ChangeGuard>) -> Self {
        self.guards.push(guard);
        self
    }

    /// Builds the engine.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreConflict`] naming the missing collaborator.
    pub fn build(self) -> Result<HierarchyEngine, CoreError> {
        /// Reports a missing collaborator by name.
        fn missing(name: &str) -> CoreError {
            CoreError::StoreConflict {
                message: format!("hierarchy engine collaborator not configured: {name}"),
            }
        }
        Ok(HierarchyEngine {
            hierarchy: self.hierarchy.ok_or_else(|| missing("hierarchy"))?,
            history: self.history.ok_or_else(|| missing("history"))?,
            bus: self.bus.ok_or_else(|| missing("bus"))?,
            sequence: self.sequence.ok_or_else(|| missing("sequence"))?,
            guards: self.guards,
        })
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Write-path engine for the document hierarchy.
///
/// # Invariants
/// - Every applied change records a history entry and publishes an event.
/// - Cascading closure closes children before their parent.
pub struct HierarchyEngine {
    /// Hierarchy store collaborator.
    hierarchy: Arc<dyn HierarchyStore>,
    /// History store collaborator.
    history: Arc<dyn HistoryStore>,
    /// Event bus collaborator.
    bus: Arc<dyn EventBus>,
    /// Identifier sequence collaborator.
    sequence: Arc<dyn Sequence>,
    /// Registered pre-write guards.
    guards: Vec<Arc<dyn ChangeGuard>>,
}

impl HierarchyEngine {
    /// Returns a builder for the engine.
    #[must_use]
    pub fn builder() -> HierarchyEngineBuilder {
        HierarchyEngineBuilder::default()
    }

    // ------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------

    /// Creates a group.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IllegalName`] for an invalid name and
    /// [`CoreError::DuplicateName`] for a case-insensitive collision.
    pub fn create_group(
        &self,
        name: &str,
        owner: &str,
        permissions: PermissionMask,
        now: Timestamp,
        author: &str,
    ) -> Result<Group, CoreError> {
        check_name(name)?;
        if self.hierarchy.find_group_by_name(name)?.is_some() {
            return Err(CoreError::DuplicateName {
                name: name.to_string(),
            });
        }
        let group = Group {
            id: GroupId::new(self.sequence.next_id("group")),
            name: name.to_string(),
            owner: owner.to_string(),
            permissions,
            state: DocumentState::created(now),
        };
        self.hierarchy.upsert_group(group.clone())?;
        self.record(
            EntityKind::Group,
            group.id.as_str(),
            ChangeKind::Create,
            now,
            author,
            Vec::new(),
        )?;
        Ok(group)
    }

    /// Renames a group.
    ///
    /// # Errors
    ///
    /// Returns name validation errors or [`CoreError::UnknownGroup`].
    pub fn rename_group(
        &self,
        id: &GroupId,
        new_name: &str,
        now: Timestamp,
        author: &str,
    ) -> Result<Group, CoreError> {
        check_name(new_name)?;
        let mut group = self.require_group(id)?;
        if let Some(existing) = self.hierarchy.find_group_by_name(new_name)?
            && existing.id != group.id
        {
            return Err(CoreError::DuplicateName {
                name: new_name.to_string(),
            });
        }
        let older = group.clone();
        group.name = new_name.to_string();
        let Some(diffs) = GROUP_DESCRIPTOR.create_diff(&older, &group) else {
            return Ok(older);
        };
        group.state = DocumentState {
            change_kind: ChangeKind::Update,
            change_date: now,
            history_id: group.state.history_id.clone(),
        };
        self.hierarchy.upsert_group(group.clone())?;
        self.record(EntityKind::Group, group.id.as_str(), ChangeKind::Update, now, author, diffs)?;
        Ok(group)
    }

    /// Closes a group, cascading through its dictionaries.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownGroup`] when the group does not exist.
    pub fn close_group(
        &self,
        id: &GroupId,
        now: Timestamp,
        author: &str,
    ) -> Result<Group, CoreError> {
        let mut group = self.require_group(id)?;
        if group.state.is_closed() {
            return Ok(group);
        }
        for dictionary in self.hierarchy.find_dictionaries_by_group(id)? {
            self.close_dictionary(&dictionary.id, now, author)?;
        }
        group.state = DocumentState {
            change_kind: ChangeKind::Close,
            change_date: now,
            history_id: group.state.history_id.clone(),
        };
        self.hierarchy.upsert_group(group.clone())?;
        self.record(
            EntityKind::Group,
            group.id.as_str(),
            ChangeKind::Close,
            now,
            author,
            Vec::new(),
        )?;
        Ok(group)
    }

    /// Loads a group or reports it unknown.
    fn require_group(&self, id: &GroupId) -> Result<Group, CoreError> {
        self.hierarchy.find_group_by_id(id)?.ok_or_else(|| CoreError::UnknownGroup {
            name: id.as_str().to_string(),
        })
    }

    // ------------------------------------------------------------------
    // Dictionaries
    // ------------------------------------------------------------------

    /// Creates a dictionary inside a group.
    ///
    /// # Errors
    ///
    /// Returns name validation errors, [`CoreError::UnknownGroup`], or
    /// [`CoreError::DuplicateName`] for a collision within the group.
    pub fn create_dictionary(
        &self,
        group_id: &GroupId,
        name: &str,
        description: &str,
        now: Timestamp,
        author: &str,
    ) -> Result<Dictionary, CoreError> {
        check_name(name)?;
        let group = self.require_group(group_id)?;
        let path = DictionaryPath::new(group.name.clone(), name);
        if self.hierarchy.find_dictionary_by_path(&path)?.is_some() {
            return Err(CoreError::DuplicateName {
                name: name.to_string(),
            });
        }
        let dictionary = Dictionary {
            id: DictionaryId::new(self.sequence.next_id("dictionary")),
            group_id: group.id,
            name: name.to_string(),
            description: description.to_string(),
            state: DocumentState::created(now),
        };
        self.hierarchy.upsert_dictionary(dictionary.clone())?;
        self.record(
            EntityKind::Dictionary,
            dictionary.id.as_str(),
            ChangeKind::Create,
            now,
            author,
            Vec::new(),
        )?;
        Ok(dictionary)
    }

    /// Renames a dictionary.
    ///
    /// # Errors
    ///
    /// Returns name validation errors or [`CoreError::UnknownDictionary`].
    pub fn rename_dictionary(
        &self,
        id: &DictionaryId,
        new_name: &str,
        now: Timestamp,
        author: &str,
    ) -> Result<Dictionary, CoreError> {
        check_name(new_name)?;
        let mut dictionary = self.require_dictionary(id)?;
        let older = dictionary.clone();
        dictionary.name = new_name.to_string();
        let Some(diffs) = DICTIONARY_DESCRIPTOR.create_diff(&older, &dictionary) else {
            return Ok(older);
        };
        dictionary.state = DocumentState {
            change_kind: ChangeKind::Update,
            change_date: now,
            history_id: dictionary.state.history_id.clone(),
        };
        self.hierarchy.upsert_dictionary(dictionary.clone())?;
        self.record(
            EntityKind::Dictionary,
            dictionary.id.as_str(),
            ChangeKind::Update,
            now,
            author,
            diffs,
        )?;
        Ok(dictionary)
    }

    /// Closes a dictionary, cascading through its meta fields.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownDictionary`] when the dictionary does not
    /// exist.
    pub fn close_dictionary(
        &self,
        id: &DictionaryId,
        now: Timestamp,
        author: &str,
    ) -> Result<Dictionary, CoreError> {
        let mut dictionary = self.require_dictionary(id)?;
        if dictionary.state.is_closed() {
            return Ok(dictionary);
        }
        for meta_field in self.hierarchy.find_meta_fields_by_dictionary(id)? {
            self.close_meta_field(&meta_field.id, now, author)?;
        }
        dictionary.state = DocumentState {
            change_kind: ChangeKind::Close,
            change_date: now,
            history_id: dictionary.state.history_id.clone(),
        };
        self.hierarchy.upsert_dictionary(dictionary.clone())?;
        self.record(
            EntityKind::Dictionary,
            dictionary.id.as_str(),
            ChangeKind::Close,
            now,
            author,
            Vec::new(),
        )?;
        Ok(dictionary)
    }

    /// Loads a dictionary or reports it unknown.
    fn require_dictionary(&self, id: &DictionaryId) -> Result<Dictionary, CoreError> {
        self.hierarchy.find_dictionary_by_id(id)?.ok_or_else(|| {
            CoreError::UnknownDictionary {
                path: DictionaryPath::new("", id.as_str()),
            }
        })
    }

    // ------------------------------------------------------------------
    // Meta fields
    // ------------------------------------------------------------------

    /// Creates a meta field inside a dictionary.
    ///
    /// # Errors
    ///
    /// Returns name validation errors, [`CoreError::DuplicateName`], or
    /// [`CoreError::PrimaryMetaField`] when a second primary column is
    /// declared.
    pub fn create_meta_field(
        &self,
        dictionary_id: &DictionaryId,
        name: &str,
        ordinal: u32,
        flags: MetaFieldFlags,
        now: Timestamp,
        author: &str,
    ) -> Result<MetaField, CoreError> {
        check_name(name)?;
        let dictionary = self.require_dictionary(dictionary_id)?;
        let siblings = self.hierarchy.find_meta_fields_by_dictionary(dictionary_id)?;
        if siblings.iter().any(|sibling| sibling.name.eq_ignore_ascii_case(name)) {
            return Err(CoreError::DuplicateName {
                name: name.to_string(),
            });
        }
        if flags.is_primary()
            && let Some(primary) = self.hierarchy.find_primary_meta_field(dictionary_id)?
        {
            return Err(CoreError::PrimaryMetaField {
                path: self.derive_meta_field_path(&dictionary, &primary.name)?,
            });
        }
        let meta_field = MetaField {
            id: MetaFieldId::new(self.sequence.next_id("meta_field")),
            dictionary_id: dictionary.id.clone(),
            name: name.to_string(),
            ordinal,
            flags,
            state: DocumentState::created(now),
        };
        self.hierarchy.upsert_meta_field(meta_field.clone())?;
        self.record(
            EntityKind::MetaField,
            meta_field.id.as_str(),
            ChangeKind::Create,
            now,
            author,
            Vec::new(),
        )?;
        Ok(meta_field)
    }

    /// Updates a meta field after consulting the registered guards.
    ///
    /// # Errors
    ///
    /// Returns guard vetoes (for example the primary-flag constraint) or
    /// [`CoreError::UnknownMetaField`].
    pub fn update_meta_field(
        &self,
        updated: MetaField,
        now: Timestamp,
        author: &str,
    ) -> Result<MetaField, CoreError> {
        check_name(&updated.name)?;
        let older = self.require_meta_field(&updated.id)?;
        for guard in &self.guards {
            guard.check_meta_field_change(&older, &updated)?;
        }
        let Some(diffs) = META_FIELD_DESCRIPTOR.create_diff(&older, &updated) else {
            return Ok(older);
        };
        let mut updated = updated;
        updated.state = DocumentState {
            change_kind: ChangeKind::Update,
            change_date: now,
            history_id: older.state.history_id.clone(),
        };
        self.hierarchy.upsert_meta_field(updated.clone())?;
        self.record(
            EntityKind::MetaField,
            updated.id.as_str(),
            ChangeKind::Update,
            now,
            author,
            diffs,
        )?;
        Ok(updated)
    }

    /// Closes a meta field, cascading through its fields.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownMetaField`] when the column does not
    /// exist.
    pub fn close_meta_field(
        &self,
        id: &MetaFieldId,
        now: Timestamp,
        author: &str,
    ) -> Result<MetaField, CoreError> {
        let mut meta_field = self.require_meta_field(id)?;
        if meta_field.state.is_closed() {
            return Ok(meta_field);
        }
        for field in self.hierarchy.find_fields_by_meta_field(id)? {
            self.close_field(&field.id, now, author)?;
        }
        meta_field.state = DocumentState {
            change_kind: ChangeKind::Close,
            change_date: now,
            history_id: meta_field.state.history_id.clone(),
        };
        self.hierarchy.upsert_meta_field(meta_field.clone())?;
        self.record(
            EntityKind::MetaField,
            meta_field.id.as_str(),
            ChangeKind::Close,
            now,
            author,
            Vec::new(),
        )?;
        Ok(meta_field)
    }

    /// Loads a meta field or reports it unknown.
    fn require_meta_field(&self, id: &MetaFieldId) -> Result<MetaField, CoreError> {
        self.hierarchy.find_meta_field_by_id(id)?.ok_or_else(|| CoreError::UnknownMetaField {
            path: MetaFieldPath::new("", "", id.as_str()),
        })
    }

    /// Derives the named path of a column within a known dictionary.
    fn derive_meta_field_path(
        &self,
        dictionary: &Dictionary,
        meta_field_name: &str,
    ) -> Result<MetaFieldPath, CoreError> {
        let group = self.require_group(&dictionary.group_id)?;
        Ok(MetaFieldPath::new(
            group.name,
            dictionary.name.clone(),
            meta_field_name,
        ))
    }

    // ------------------------------------------------------------------
    // Fields
    // ------------------------------------------------------------------

    /// Creates a field value under a meta field.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotUniqueFieldValue`] when the column is UNIQUE
    /// and the value collides, or [`CoreError::UnknownMetaField`].
    pub fn create_field(
        &self,
        meta_field_id: &MetaFieldId,
        record_id: RecordId,
        value: Option<String>,
        now: Timestamp,
        author: &str,
    ) -> Result<Field, CoreError> {
        let meta_field = self.require_meta_field(meta_field_id)?;
        self.check_value_unique(&meta_field, value.as_deref(), None)?;
        let field = Field {
            id: FieldId::new(self.sequence.next_id("field")),
            meta_field_id: meta_field.id.clone(),
            name: record_id,
            value,
            state: DocumentState::created(now),
        };
        self.hierarchy.upsert_field(field.clone())?;
        self.record(
            EntityKind::Field,
            field.id.as_str(),
            ChangeKind::Create,
            now,
            author,
            Vec::new(),
        )?;
        Ok(field)
    }

    /// Updates a field value.
    ///
    /// # Errors
    ///
    /// Returns uniqueness violations or [`CoreError::UnknownField`].
    pub fn update_field_value(
        &self,
        id: &FieldId,
        value: Option<String>,
        now: Timestamp,
        author: &str,
    ) -> Result<Field, CoreError> {
        let older = self.require_field(id)?;
        let meta_field = self.require_meta_field(&older.meta_field_id)?;
        self.check_value_unique(&meta_field, value.as_deref(), Some(&older.id))?;
        let mut updated = older.clone();
        updated.value = value;
        let Some(diffs) = FIELD_DESCRIPTOR.create_diff(&older, &updated) else {
            return Ok(older);
        };
        updated.state = DocumentState {
            change_kind: ChangeKind::Update,
            change_date: now,
            history_id: older.state.history_id.clone(),
        };
        self.hierarchy.upsert_field(updated.clone())?;
        self.record(
            EntityKind::Field,
            updated.id.as_str(),
            ChangeKind::Update,
            now,
            author,
            diffs,
        )?;
        Ok(updated)
    }

    /// Closes a field value.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownField`] when the field does not exist.
    pub fn close_field(
        &self,
        id: &FieldId,
        now: Timestamp,
        author: &str,
    ) -> Result<Field, CoreError> {
        let mut field = self.require_field(id)?;
        if field.state.is_closed() {
            return Ok(field);
        }
        field.state = DocumentState {
            change_kind: ChangeKind::Close,
            change_date: now,
            history_id: field.state.history_id.clone(),
        };
        self.hierarchy.upsert_field(field.clone())?;
        self.record(
            EntityKind::Field,
            field.id.as_str(),
            ChangeKind::Close,
            now,
            author,
            Vec::new(),
        )?;
        Ok(field)
    }

    /// Loads a field or reports it unknown.
    fn require_field(&self, id: &FieldId) -> Result<Field, CoreError> {
        self.hierarchy.find_field_by_id(id)?.ok_or_else(|| CoreError::UnknownField {
            path: MetaFieldPath::new("", "", id.as_str()).no_value(),
        })
    }

    /// Enforces the UNIQUE flag for a candidate value.
    fn check_value_unique(
        &self,
        meta_field: &MetaField,
        value: Option<&str>,
        except: Option<&FieldId>,
    ) -> Result<(), CoreError> {
        if !meta_field.flags.is_unique() {
            return Ok(());
        }
        let Some(value) = value else {
            return Ok(());
        };
        let collision = self
            .hierarchy
            .find_fields_by_meta_field(&meta_field.id)?
            .into_iter()
            .filter(|candidate| !candidate.state.is_closed())
            .filter(|candidate| Some(&candidate.id) != except)
            .any(|candidate| candidate.value.as_deref() == Some(value));
        if collision {
            let dictionary = self.require_dictionary(&meta_field.dictionary_id)?;
            return Err(CoreError::NotUniqueFieldValue {
                path: self.derive_meta_field_path(&dictionary, &meta_field.name)?,
                value: value.to_string(),
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------

    /// Appends a history entry and publishes the matching change event.
    ///
    /// A replayed identity (same target, kind, and date) records nothing and
    /// publishes nothing, keeping redelivery idempotent.
    fn record(
        &self,
        entity_kind: EntityKind,
        target_id: &str,
        change_kind: ChangeKind,
        now: Timestamp,
        author: &str,
        diffs: Vec<Diff>,
    ) -> Result<(), CoreError> {
        let history = History {
            id: HistoryId::new(self.sequence.next_id("history")),
            target_id: target_id.to_string(),
            target_type: entity_kind.label().to_string(),
            event_type: change_kind,
            event_date: now,
            event_author: author.to_string(),
            diffs,
        };
        if !self.history.append(history)? {
            return Ok(());
        }
        let event = Event::Change(ChangeEvent {
            event_id: EventId::new(self.sequence.next_id("event")),
            entity_kind,
            change_kind,
            target_ids: vec![target_id.to_string()],
            event_date: now,
        });
        self.bus.publish(&event).map_err(|err| CoreError::StoreConflict {
            message: err.to_string(),
        })
    }
}

// ============================================================================
// SECTION: Validation Helpers
// ============================================================================

/// Validates a document name against emptiness and length bounds.
fn check_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() || name.chars().count() > NAME_MAX_LEN {
        return Err(CoreError::IllegalName {
            name: name.to_string(),
        });
    }
    Ok(())
}
