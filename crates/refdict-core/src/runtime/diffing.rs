// crates/refdict-core/src/runtime/diffing.rs
// ============================================================================
// Module: Refdict Diff Engine
// Description: Attribute registries, content hashing, and revision diffing.
// Purpose: Detect semantic changes between document revisions for audit records.
// Dependencies: crate::core, serde_json
// ============================================================================

//! ## Overview
//! Each entity type declares an explicit, hand-written attribute table: name,
//! accessor, and capability flags. No runtime reflection is involved; the
//! tables are built once and shared by the diff engine and the index
//! registry. Attributes flagged `hashed` participate in content hashing and
//! diffing; generated identifiers, audit envelopes, and derived paths are
//! excluded so that persistence-level churn never reads as a semantic change.
//! Invariants:
//! - `create_diff(a, b)` is `None` exactly when the content hashes match.
//! - Diffs are emitted in declared attribute order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Value;
use serde_json::json;

use crate::core::Dictionary;
use crate::core::Diff;
use crate::core::Field;
use crate::core::Group;
use crate::core::History;
use crate::core::HistoryId;
use crate::core::MetaField;
use crate::core::Notification;
use crate::core::RecodeRule;
use crate::core::RecodeRuleSet;
use crate::core::Timestamp;
use crate::core::change::ChangeKind;
use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::hashing::hash_canonical_json;

// ============================================================================
// SECTION: Attribute Tables
// ============================================================================

/// One declared attribute of an entity type.
///
/// # Invariants
/// - `render` must be pure and total for every entity instance.
pub struct AttributeSpec<T> {
    /// Attribute name, stable across releases.
    pub name: &'static str,
    /// Participates in content hashing and diffing.
    pub hashed: bool,
    /// Exposed to the search index for filtering.
    pub filterable: bool,
    /// Exposed to the search index for sorting.
    pub sortable: bool,
    /// Renders the attribute value for comparison and indexing.
    pub render: fn(&T) -> Value,
}

/// Declared attribute table of one entity type.
///
/// # Invariants
/// - `attributes` order is stable; diffs and index fields follow it.
pub struct EntityDescriptor<T: 'static> {
    /// Entity type label used in histories and index documents.
    pub target_type: &'static str,
    /// Ordered attribute table.
    pub attributes: &'static [AttributeSpec<T>],
}

impl<T> EntityDescriptor<T> {
    /// Computes the content hash over all hashed attributes.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails.
    pub fn create_hash_code(&self, entity: &T) -> Result<HashDigest, HashError> {
        let content: BTreeMap<&str, Value> = self
            .attributes
            .iter()
            .filter(|spec| spec.hashed)
            .map(|spec| (spec.name, (spec.render)(entity)))
            .collect();
        hash_canonical_json(DEFAULT_HASH_ALGORITHM, &content)
    }

    /// Computes the ordered diff between two revisions.
    ///
    /// Returns `None` when the revisions are semantically identical, which by
    /// construction coincides with equal content hashes.
    #[must_use]
    pub fn create_diff(&self, older: &T, newer: &T) -> Option<Vec<Diff>> {
        let mut diffs = Vec::new();
        for spec in self.attributes.iter().filter(|spec| spec.hashed) {
            let old_value = (spec.render)(older);
            let new_value = (spec.render)(newer);
            if old_value != new_value {
                diffs.push(Diff::new(
                    self.target_type,
                    spec.name,
                    render_label(&old_value),
                    render_label(&new_value),
                ));
            }
        }
        if diffs.is_empty() { None } else { Some(diffs) }
    }

    /// Builds the history record for one change event.
    #[must_use]
    pub fn create_history(
        &self,
        id: HistoryId,
        target_id: &str,
        event_type: ChangeKind,
        event_date: Timestamp,
        event_author: &str,
        diffs: Vec<Diff>,
    ) -> History {
        History {
            id,
            target_id: target_id.to_string(),
            target_type: self.target_type.to_string(),
            event_type,
            event_date,
            event_author: event_author.to_string(),
            diffs,
        }
    }

    /// Renders the indexable attributes of an entity.
    #[must_use]
    pub fn render_indexed(&self, entity: &T) -> Vec<(String, String)> {
        self.attributes
            .iter()
            .filter(|spec| spec.filterable || spec.sortable)
            .map(|spec| (spec.name.to_string(), render_label(&(spec.render)(entity))))
            .collect()
    }
}

/// Renders a comparison value as a diff label.
fn render_label(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Renders an optional string attribute, keeping absence distinct from empty.
fn optional(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::String(text.to_string()))
}

// ============================================================================
// SECTION: Entity Descriptors
// ============================================================================

/// Attribute table for groups.
pub static GROUP_DESCRIPTOR: EntityDescriptor<Group> = EntityDescriptor {
    target_type: "Group",
    attributes: &[
        AttributeSpec {
            name: "id",
            hashed: false,
            filterable: true,
            sortable: false,
            render: |group| Value::String(group.id.as_str().to_string()),
        },
        AttributeSpec {
            name: "name",
            hashed: true,
            filterable: true,
            sortable: true,
            render: |group| Value::String(group.name.clone()),
        },
        AttributeSpec {
            name: "owner",
            hashed: true,
            filterable: true,
            sortable: true,
            render: |group| Value::String(group.owner.clone()),
        },
        AttributeSpec {
            name: "permissions",
            hashed: true,
            filterable: false,
            sortable: false,
            render: |group| json!(group.permissions.bits()),
        },
    ],
};

/// Attribute table for dictionaries.
pub static DICTIONARY_DESCRIPTOR: EntityDescriptor<Dictionary> = EntityDescriptor {
    target_type: "Dictionary",
    attributes: &[
        AttributeSpec {
            name: "id",
            hashed: false,
            filterable: true,
            sortable: false,
            render: |dictionary| Value::String(dictionary.id.as_str().to_string()),
        },
        AttributeSpec {
            name: "group_id",
            hashed: true,
            filterable: true,
            sortable: false,
            render: |dictionary| Value::String(dictionary.group_id.as_str().to_string()),
        },
        AttributeSpec {
            name: "name",
            hashed: true,
            filterable: true,
            sortable: true,
            render: |dictionary| Value::String(dictionary.name.clone()),
        },
        AttributeSpec {
            name: "description",
            hashed: true,
            filterable: false,
            sortable: false,
            render: |dictionary| Value::String(dictionary.description.clone()),
        },
    ],
};

/// Attribute table for meta fields.
pub static META_FIELD_DESCRIPTOR: EntityDescriptor<MetaField> = EntityDescriptor {
    target_type: "MetaField",
    attributes: &[
        AttributeSpec {
            name: "id",
            hashed: false,
            filterable: true,
            sortable: false,
            render: |meta_field| Value::String(meta_field.id.as_str().to_string()),
        },
        AttributeSpec {
            name: "dictionary_id",
            hashed: true,
            filterable: true,
            sortable: false,
            render: |meta_field| Value::String(meta_field.dictionary_id.as_str().to_string()),
        },
        AttributeSpec {
            name: "name",
            hashed: true,
            filterable: true,
            sortable: true,
            render: |meta_field| Value::String(meta_field.name.clone()),
        },
        AttributeSpec {
            name: "ordinal",
            hashed: true,
            filterable: false,
            sortable: true,
            render: |meta_field| json!(meta_field.ordinal),
        },
        AttributeSpec {
            name: "flags",
            hashed: true,
            filterable: true,
            sortable: false,
            render: |meta_field| json!(meta_field.flags.bits()),
        },
    ],
};

/// Attribute table for fields.
pub static FIELD_DESCRIPTOR: EntityDescriptor<Field> = EntityDescriptor {
    target_type: "Field",
    attributes: &[
        AttributeSpec {
            name: "id",
            hashed: false,
            filterable: true,
            sortable: false,
            render: |field| Value::String(field.id.as_str().to_string()),
        },
        AttributeSpec {
            name: "meta_field_id",
            hashed: true,
            filterable: true,
            sortable: false,
            render: |field| Value::String(field.meta_field_id.as_str().to_string()),
        },
        AttributeSpec {
            name: "name",
            hashed: true,
            filterable: true,
            sortable: true,
            render: |field| Value::String(field.name.as_str().to_string()),
        },
        AttributeSpec {
            name: "value",
            hashed: true,
            filterable: true,
            sortable: true,
            render: |field| optional(field.value.as_deref()),
        },
    ],
};

/// Attribute table for recode rule sets. Derived paths are excluded from
/// hashing; they are re-derived from the hierarchy.
pub static RULE_SET_DESCRIPTOR: EntityDescriptor<RecodeRuleSet> = EntityDescriptor {
    target_type: "RecodeRuleSet",
    attributes: &[
        AttributeSpec {
            name: "id",
            hashed: false,
            filterable: true,
            sortable: false,
            render: |rule_set| Value::String(rule_set.id.as_str().to_string()),
        },
        AttributeSpec {
            name: "name",
            hashed: true,
            filterable: true,
            sortable: true,
            render: |rule_set| Value::String(rule_set.name.clone()),
        },
        AttributeSpec {
            name: "from_meta_field_id",
            hashed: true,
            filterable: true,
            sortable: false,
            render: |rule_set| Value::String(rule_set.from_meta_field_id.as_str().to_string()),
        },
        AttributeSpec {
            name: "to_meta_field_id",
            hashed: true,
            filterable: true,
            sortable: false,
            render: |rule_set| Value::String(rule_set.to_meta_field_id.as_str().to_string()),
        },
        AttributeSpec {
            name: "default_field_id",
            hashed: true,
            filterable: true,
            sortable: false,
            render: |rule_set| optional(rule_set.default_field_id.as_ref().map(|id| id.as_str())),
        },
        AttributeSpec {
            name: "rule_set_state",
            hashed: true,
            filterable: true,
            sortable: false,
            render: |rule_set| json!(rule_set.rule_set_state),
        },
        AttributeSpec {
            name: "from_path",
            hashed: false,
            filterable: true,
            sortable: true,
            render: |rule_set| Value::String(rule_set.from_path.to_string()),
        },
        AttributeSpec {
            name: "to_path",
            hashed: false,
            filterable: true,
            sortable: true,
            render: |rule_set| Value::String(rule_set.to_path.to_string()),
        },
    ],
};

/// Attribute table for recode rules. Derived paths are excluded from hashing.
pub static RULE_DESCRIPTOR: EntityDescriptor<RecodeRule> = EntityDescriptor {
    target_type: "RecodeRule",
    attributes: &[
        AttributeSpec {
            name: "id",
            hashed: false,
            filterable: true,
            sortable: false,
            render: |rule| Value::String(rule.id.as_str().to_string()),
        },
        AttributeSpec {
            name: "rule_set_id",
            hashed: true,
            filterable: true,
            sortable: false,
            render: |rule| Value::String(rule.rule_set_id.as_str().to_string()),
        },
        AttributeSpec {
            name: "from_field_id",
            hashed: true,
            filterable: true,
            sortable: false,
            render: |rule| Value::String(rule.from_field_id.as_str().to_string()),
        },
        AttributeSpec {
            name: "to_field_id",
            hashed: true,
            filterable: true,
            sortable: false,
            render: |rule| Value::String(rule.to_field_id.as_str().to_string()),
        },
        AttributeSpec {
            name: "from_value",
            hashed: true,
            filterable: true,
            sortable: true,
            render: |rule| optional(rule.from_path.field_value()),
        },
    ],
};

/// Attribute table for notifications.
pub static NOTIFICATION_DESCRIPTOR: EntityDescriptor<Notification> = EntityDescriptor {
    target_type: "Notification",
    attributes: &[
        AttributeSpec {
            name: "id",
            hashed: false,
            filterable: true,
            sortable: false,
            render: |notification| Value::String(notification.id.as_str().to_string()),
        },
        AttributeSpec {
            name: "kind",
            hashed: true,
            filterable: true,
            sortable: false,
            render: |notification| json!(notification.kind),
        },
        AttributeSpec {
            name: "rule_set_name",
            hashed: true,
            filterable: true,
            sortable: true,
            render: |notification| Value::String(notification.rule_set_name.clone()),
        },
        AttributeSpec {
            name: "from_value",
            hashed: true,
            filterable: true,
            sortable: false,
            render: |notification| optional(notification.from_value.as_deref()),
        },
        AttributeSpec {
            name: "count",
            hashed: true,
            filterable: false,
            sortable: true,
            render: |notification| json!(notification.count),
        },
        AttributeSpec {
            name: "start_date",
            hashed: true,
            filterable: true,
            sortable: true,
            render: |notification| json!(notification.start_date.as_unix_millis()),
        },
        AttributeSpec {
            name: "end_date",
            hashed: true,
            filterable: true,
            sortable: true,
            render: |notification| json!(notification.end_date.as_unix_millis()),
        },
        AttributeSpec {
            name: "processing_state",
            hashed: true,
            filterable: true,
            sortable: false,
            render: |notification| json!(notification.processing_state),
        },
    ],
};
