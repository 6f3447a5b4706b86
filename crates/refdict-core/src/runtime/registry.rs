// crates/refdict-core/src/runtime/registry.rs
// ============================================================================
// Module: Refdict Index Registry
// Description: Explicit registry of indexable attributes per entity type.
// Purpose: Feed the search index collaborator without runtime reflection.
// Dependencies: crate::core, crate::interfaces, crate::runtime::diffing
// ============================================================================

//! ## Overview
//! The index registry is built once at startup from the same hand-written
//! attribute tables the diff engine uses. It answers which attributes of
//! which entity type are filterable or sortable, renders index documents, and
//! drives rebuild-all or rebuild-by-type requests against the search index
//! collaborator, consuming its acknowledgments.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::Dictionary;
use crate::core::EntityKind;
use crate::core::Field;
use crate::core::Group;
use crate::core::MetaField;
use crate::core::Notification;
use crate::core::RecodeRule;
use crate::core::RecodeRuleSet;
use crate::interfaces::IndexError;
use crate::interfaces::RebuildAck;
use crate::interfaces::SearchIndex;
use crate::runtime::diffing::DICTIONARY_DESCRIPTOR;
use crate::runtime::diffing::FIELD_DESCRIPTOR;
use crate::runtime::diffing::GROUP_DESCRIPTOR;
use crate::runtime::diffing::META_FIELD_DESCRIPTOR;
use crate::runtime::diffing::NOTIFICATION_DESCRIPTOR;
use crate::runtime::diffing::RULE_DESCRIPTOR;
use crate::runtime::diffing::RULE_SET_DESCRIPTOR;

// ============================================================================
// SECTION: Indexed Attributes
// ============================================================================

/// Capability flags of one indexable attribute.
///
/// # Invariants
/// - At least one capability is set for every registered attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexCapabilities {
    /// The attribute participates in filters.
    pub filterable: bool,
    /// The attribute participates in sort orders.
    pub sortable: bool,
}

/// One registered indexable attribute.
///
/// # Invariants
/// - `name` matches the declaring attribute table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedAttribute {
    /// Attribute name.
    pub name: &'static str,
    /// Capability flags.
    pub capabilities: IndexCapabilities,
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Startup-built registry of indexable attributes per entity kind.
///
/// # Invariants
/// - Attribute order follows the declaring tables.
pub struct IndexRegistry {
    /// Search index collaborator.
    index: Arc<dyn SearchIndex>,
    /// Registered attributes per entity kind.
    attributes: BTreeMap<&'static str, Vec<IndexedAttribute>>,
}

impl IndexRegistry {
    /// Builds the registry over all entity attribute tables.
    #[must_use]
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        /// Collects the indexable entries of one attribute table.
        fn collect<T>(
            descriptor: &crate::runtime::diffing::EntityDescriptor<T>,
        ) -> Vec<IndexedAttribute> {
            descriptor
                .attributes
                .iter()
                .filter(|spec| spec.filterable || spec.sortable)
                .map(|spec| IndexedAttribute {
                    name: spec.name,
                    capabilities: IndexCapabilities {
                        filterable: spec.filterable,
                        sortable: spec.sortable,
                    },
                })
                .collect()
        }
        let mut attributes = BTreeMap::new();
        attributes.insert(GROUP_DESCRIPTOR.target_type, collect(&GROUP_DESCRIPTOR));
        attributes.insert(DICTIONARY_DESCRIPTOR.target_type, collect(&DICTIONARY_DESCRIPTOR));
        attributes.insert(META_FIELD_DESCRIPTOR.target_type, collect(&META_FIELD_DESCRIPTOR));
        attributes.insert(FIELD_DESCRIPTOR.target_type, collect(&FIELD_DESCRIPTOR));
        attributes.insert(RULE_SET_DESCRIPTOR.target_type, collect(&RULE_SET_DESCRIPTOR));
        attributes.insert(RULE_DESCRIPTOR.target_type, collect(&RULE_DESCRIPTOR));
        attributes.insert(NOTIFICATION_DESCRIPTOR.target_type, collect(&NOTIFICATION_DESCRIPTOR));
        Self {
            index,
            attributes,
        }
    }

    /// Returns the registered attributes for an entity type label.
    #[must_use]
    pub fn attributes(&self, target_type: &str) -> &[IndexedAttribute] {
        self.attributes.get(target_type).map_or(&[], Vec::as_slice)
    }

    /// Upserts one group into the index.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the collaborator rejects the document.
    pub fn index_group(&self, group: &Group) -> Result<(), IndexError> {
        self.index.upsert(
            EntityKind::Group,
            group.id.as_str(),
            &GROUP_DESCRIPTOR.render_indexed(group),
        )
    }

    /// Upserts one dictionary into the index.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the collaborator rejects the document.
    pub fn index_dictionary(&self, dictionary: &Dictionary) -> Result<(), IndexError> {
        self.index.upsert(
            EntityKind::Dictionary,
            dictionary.id.as_str(),
            &DICTIONARY_DESCRIPTOR.render_indexed(dictionary),
        )
    }

    /// Upserts one meta field into the index.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the collaborator rejects the document.
    pub fn index_meta_field(&self, meta_field: &MetaField) -> Result<(), IndexError> {
        self.index.upsert(
            EntityKind::MetaField,
            meta_field.id.as_str(),
            &META_FIELD_DESCRIPTOR.render_indexed(meta_field),
        )
    }

    /// Upserts one field into the index.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the collaborator rejects the document.
    pub fn index_field(&self, field: &Field) -> Result<(), IndexError> {
        self.index.upsert(
            EntityKind::Field,
            field.id.as_str(),
            &FIELD_DESCRIPTOR.render_indexed(field),
        )
    }

    /// Upserts one rule set into the index.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the collaborator rejects the document.
    pub fn index_rule_set(&self, rule_set: &RecodeRuleSet) -> Result<(), IndexError> {
        self.index.upsert(
            EntityKind::RuleSet,
            rule_set.id.as_str(),
            &RULE_SET_DESCRIPTOR.render_indexed(rule_set),
        )
    }

    /// Upserts one rule into the index.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the collaborator rejects the document.
    pub fn index_rule(&self, rule: &RecodeRule) -> Result<(), IndexError> {
        self.index.upsert(EntityKind::Rule, rule.id.as_str(), &RULE_DESCRIPTOR.render_indexed(rule))
    }

    /// Upserts one notification into the index.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the collaborator rejects the document.
    pub fn index_notification(&self, notification: &Notification) -> Result<(), IndexError> {
        self.index.upsert(
            EntityKind::Notification,
            notification.id.as_str(),
            &NOTIFICATION_DESCRIPTOR.render_indexed(notification),
        )
    }

    /// Requests an index rebuild and returns the acknowledgment.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the rebuild fails.
    pub fn rebuild(&self, entity_kind: Option<EntityKind>) -> Result<RebuildAck, IndexError> {
        self.index.rebuild(entity_kind)
    }
}
