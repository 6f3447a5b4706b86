// system-tests/tests/index_registry.rs
// ============================================================================
// Module: Index Registry Tests
// Description: Verifies the explicit index registry and rebuild round-trip.
// ============================================================================
//! ## Overview
//! Ensures the startup-built registry exposes the declared indexable
//! attributes per entity type, renders documents into the index collaborator,
//! and drives rebuild-all and rebuild-by-type requests with acknowledgments.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;

use refdict_core::EntityKind;
use refdict_core::interfaces::RuleStore;
use refdict_core::runtime::IndexRegistry;
use refdict_store_memory::MemorySearchIndex;
use system_tests::Harness;

#[test]
fn registry_lists_declared_attributes_in_order() {
    let registry = IndexRegistry::new(Arc::new(MemorySearchIndex::new()));

    let group_attributes: Vec<&str> =
        registry.attributes("Group").iter().map(|attribute| attribute.name).collect();
    assert_eq!(group_attributes, vec!["id", "name", "owner"]);

    let name = registry
        .attributes("Group")
        .iter()
        .find(|attribute| attribute.name == "name")
        .expect("name attribute");
    assert!(name.capabilities.filterable);
    assert!(name.capabilities.sortable);

    // Unknown entity types answer with an empty table, not a panic.
    assert!(registry.attributes("Unknown").is_empty());
}

#[test]
fn indexed_documents_are_counted_by_rebuilds() {
    let harness = Harness::new();
    let now = Harness::ts(0);
    let hr = harness.seed_dictionary("hr", "country", "code", &["RU", "US"], now).expect("seed hr");

    let index = Arc::new(MemorySearchIndex::new());
    let registry = IndexRegistry::new(index.clone());
    registry.index_group(&hr.group).expect("index group");
    registry.index_dictionary(&hr.dictionary).expect("index dictionary");
    registry.index_meta_field(&hr.meta_field).expect("index meta field");
    for field in &hr.fields {
        registry.index_field(field).expect("index field");
    }
    assert_eq!(index.len(), 5);

    let all = registry.rebuild(None).expect("rebuild all");
    assert_eq!(all.documents, 5);
    assert!(all.entity_kind.is_none());

    let fields_only = registry.rebuild(Some(EntityKind::Field)).expect("rebuild fields");
    assert_eq!(fields_only.documents, 2);
    assert_eq!(fields_only.entity_kind, Some(EntityKind::Field));
}

#[test]
fn rule_documents_render_their_value_attributes() {
    let harness = Harness::new();
    let now = Harness::ts(0);
    let hr = harness.seed_dictionary("hr", "country", "code", &["RU"], now).expect("seed hr");
    let crm = harness.seed_dictionary("crm", "country", "code", &["RUS"], now).expect("seed crm");
    let created = harness.link("countries", &hr, &crm, &[("RU", "RUS")], None, now).expect("link");

    let index = Arc::new(MemorySearchIndex::new());
    let registry = IndexRegistry::new(index.clone());
    let stored = harness
        .rule_store
        .find_rule_set_by_id(&created.id)
        .expect("lookup")
        .expect("present");
    registry.index_rule_set(&stored).expect("index rule set");
    assert_eq!(index.len(), 1);
}
