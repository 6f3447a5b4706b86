// system-tests/tests/rule_graph.rs
// ============================================================================
// Module: Rule Graph Tests
// Description: Verifies rule set resolution, composition, and batch mutation.
// ============================================================================
//! ## Overview
//! Drives the resolution engine through operator-level scenarios: direct and
//! transitive resolution by named path, self-mapping rejection, cycle-safe
//! composition, unmatched dictionary detection, and all-or-nothing mutation
//! batches.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use refdict_core::CoreError;
use refdict_core::DocumentState;
use refdict_core::MetaFieldPath;
use refdict_core::RecodeRuleSet;
use refdict_core::RuleSetId;
use refdict_core::RuleSetState;
use refdict_core::interfaces::HierarchyStore;
use refdict_core::interfaces::RuleBatch;
use refdict_core::interfaces::RuleStore;
use refdict_core::interfaces::Sequence;
use system_tests::Harness;

#[test]
fn direct_resolution_ignores_name_casing() {
    let harness = Harness::new();
    let now = Harness::ts(0);
    let hr = harness.seed_dictionary("hr", "country", "code", &["RU", "US"], now).expect("seed hr");
    let crm =
        harness.seed_dictionary("crm", "country", "code", &["RUS", "USA"], now).expect("seed crm");
    harness
        .link("country-mapping", &hr, &crm, &[("RU", "RUS"), ("US", "USA")], None, now)
        .expect("link");

    let resolved = harness
        .engine
        .find_rule_set_by_paths(
            &MetaFieldPath::new("HR", "Country", "CODE"),
            &MetaFieldPath::new("CRM", "COUNTRY", "code"),
            false,
            false,
        )
        .expect("resolve")
        .expect("present");
    assert!(!resolved.is_transitive());
    assert_eq!(resolved.rules.len(), 2);
    let target = resolved.recode(Some("RU")).expect("mapped");
    assert_eq!(target.field_value(), Some("RUS"));
    // Value lookups stay case-sensitive even though names fold.
    assert!(resolved.recode(Some("ru")).is_none());

    // The batch surface resolves pairs independently and quietly.
    let batch = harness
        .engine
        .find_rule_sets_by_paths(
            &[
                (hr.meta_field_path(), crm.meta_field_path()),
                (crm.meta_field_path(), hr.meta_field_path()),
            ],
            false,
        )
        .expect("batch resolve");
    assert!(batch[0].is_some());
    assert!(batch[1].is_none());
}

#[test]
fn quietly_mode_masks_only_absence() {
    let harness = Harness::new();
    let now = Harness::ts(0);
    let hr = harness.seed_dictionary("hr", "country", "code", &["RU"], now).expect("seed hr");
    let crm = harness.seed_dictionary("crm", "country", "code", &["RUS"], now).expect("seed crm");

    let absent = harness
        .engine
        .find_rule_set_by_paths(&hr.meta_field_path(), &crm.meta_field_path(), false, true)
        .expect("quiet resolve");
    assert!(absent.is_none());

    let err = harness
        .engine
        .find_rule_set_by_paths(&hr.meta_field_path(), &crm.meta_field_path(), false, false)
        .unwrap_err();
    assert!(matches!(err, CoreError::UnknownRuleSet { .. }));

    let err = harness
        .engine
        .find_rule_set_by_paths(
            &MetaFieldPath::new("hr", "planet", "code"),
            &crm.meta_field_path(),
            false,
            false,
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::UnknownDictionary { .. }));
}

#[test]
fn self_mapping_is_rejected_before_resolution() {
    let harness = Harness::new();
    let now = Harness::ts(0);
    let hr = harness.seed_dictionary("hr", "country", "code", &["RU"], now).expect("seed hr");

    let err = harness
        .engine
        .find_rule_set_by_paths(&hr.meta_field_path(), &hr.meta_field_path(), true, true)
        .unwrap_err();
    assert!(matches!(err, CoreError::SelfMapping { .. }));

    // Case-mangled spellings of the same path are still a self-mapping.
    let err = harness
        .engine
        .find_rule_set_by_paths(
            &MetaFieldPath::new("HR", "COUNTRY", "CODE"),
            &hr.meta_field_path(),
            false,
            true,
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::SelfMapping { .. }));
}

#[test]
fn self_mapping_rule_sets_abort_the_whole_batch() {
    let harness = Harness::new();
    let now = Harness::ts(0);
    let hr = harness.seed_dictionary("hr", "country", "code", &["RU"], now).expect("seed hr");

    let path = hr.meta_field_path();
    let rule_set = RecodeRuleSet {
        id: RuleSetId::new(harness.sequence.next_id("rule_set")),
        name: "degenerate".to_string(),
        from_meta_field_id: hr.meta_field.id.clone(),
        to_meta_field_id: hr.meta_field.id.clone(),
        from_path: path.clone(),
        to_path: path,
        default_field_id: None,
        default_path: None,
        rule_set_state: RuleSetState::Active,
        state: DocumentState::created(now),
    };
    let batch = RuleBatch {
        create_sets: vec![rule_set],
        ..RuleBatch::default()
    };
    let err = harness.engine.modify(batch, true, now, "tests").unwrap_err();
    assert!(matches!(err, CoreError::SelfMapping { .. }));
    assert!(harness.rule_store.find_active_rule_sets().expect("sets").is_empty());
}

#[test]
fn transitive_resolution_composes_the_chain() {
    let harness = Harness::new();
    let now = Harness::ts(0);
    let hr = harness.seed_dictionary("hr", "country", "code", &["RU", "US"], now).expect("seed hr");
    let mid = harness
        .seed_dictionary("mdm", "country", "iso", &["643", "840"], now)
        .expect("seed mdm");
    let crm = harness
        .seed_dictionary("crm", "country", "code", &["RUS", "USA", "OTHER"], now)
        .expect("seed crm");
    harness
        .link("hr-to-mdm", &hr, &mid, &[("RU", "643"), ("US", "840")], None, now)
        .expect("link hr-mdm");
    harness
        .link("mdm-to-crm", &mid, &crm, &[("643", "RUS"), ("840", "USA")], Some("OTHER"), now)
        .expect("link mdm-crm");

    let resolved = harness
        .engine
        .find_rule_set_by_paths(&hr.meta_field_path(), &crm.meta_field_path(), true, false)
        .expect("resolve")
        .expect("present");
    assert!(resolved.is_transitive());
    assert_eq!(resolved.chain.len(), 2);
    assert_eq!(resolved.rules.len(), 2);
    assert_eq!(resolved.recode(Some("RU")).expect("mapped").field_value(), Some("RUS"));
    assert_eq!(resolved.recode(Some("US")).expect("mapped").field_value(), Some("USA"));
    // The terminal set's default applies to unmapped values.
    assert_eq!(resolved.recode(Some("DE")).expect("default").field_value(), Some("OTHER"));

    // Without transitive filling the pair stays unresolved.
    let direct = harness
        .engine
        .find_rule_set_by_paths(&hr.meta_field_path(), &crm.meta_field_path(), false, true)
        .expect("resolve");
    assert!(direct.is_none());
}

#[test]
fn transitive_resolution_terminates_on_cycles() {
    let harness = Harness::new();
    let now = Harness::ts(0);
    let hr = harness.seed_dictionary("hr", "country", "code", &["RU"], now).expect("seed hr");
    let mid = harness.seed_dictionary("mdm", "country", "iso", &["643"], now).expect("seed mdm");
    let crm = harness.seed_dictionary("crm", "country", "code", &["RUS"], now).expect("seed crm");
    harness.link("hr-to-mdm", &hr, &mid, &[("RU", "643")], None, now).expect("link hr-mdm");
    harness.link("mdm-to-hr", &mid, &hr, &[("643", "RU")], None, now).expect("link mdm-hr");

    // The rule graph now contains the cycle hr -> mdm -> hr; an unreachable
    // target must resolve to absence, not hang.
    let unreachable = harness
        .engine
        .find_rule_set_by_paths(&hr.meta_field_path(), &crm.meta_field_path(), true, true)
        .expect("resolve");
    assert!(unreachable.is_none());

    harness.link("mdm-to-crm", &mid, &crm, &[("643", "RUS")], None, now).expect("link mdm-crm");
    let reachable = harness
        .engine
        .find_rule_set_by_paths(&hr.meta_field_path(), &crm.meta_field_path(), true, false)
        .expect("resolve")
        .expect("present");
    assert_eq!(reachable.recode(Some("RU")).expect("mapped").field_value(), Some("RUS"));
}

#[test]
fn duplicate_active_pairs_are_rejected() {
    let harness = Harness::new();
    let now = Harness::ts(0);
    let hr = harness.seed_dictionary("hr", "country", "code", &["RU"], now).expect("seed hr");
    let crm = harness.seed_dictionary("crm", "country", "code", &["RUS"], now).expect("seed crm");
    harness.link("first", &hr, &crm, &[("RU", "RUS")], None, now).expect("link");

    let err = harness.link("second", &hr, &crm, &[("RU", "RUS")], None, now).unwrap_err();
    assert!(matches!(err, CoreError::DuplicateRuleSet { .. }));
}

#[test]
fn blank_rule_set_names_default_to_the_identifier() {
    let harness = Harness::new();
    let now = Harness::ts(0);
    let hr = harness.seed_dictionary("hr", "country", "code", &["RU"], now).expect("seed hr");
    let crm = harness.seed_dictionary("crm", "country", "code", &["RUS"], now).expect("seed crm");
    let created = harness.link("  ", &hr, &crm, &[("RU", "RUS")], None, now).expect("link");

    let stored = harness
        .rule_store
        .find_rule_set_by_id(&created.id)
        .expect("lookup")
        .expect("present");
    assert_eq!(stored.name, stored.id.as_str());
}

#[test]
fn rules_resolve_by_source_field_identifiers() {
    let harness = Harness::new();
    let now = Harness::ts(0);
    let hr = harness.seed_dictionary("hr", "country", "code", &["RU", "US"], now).expect("seed hr");
    let crm =
        harness.seed_dictionary("crm", "country", "code", &["RUS", "USA"], now).expect("seed crm");
    let created = harness
        .link("countries", &hr, &crm, &[("RU", "RUS"), ("US", "USA")], None, now)
        .expect("link");

    let ru_field = hr.field_id("RU").expect("RU field");
    let rules =
        harness.engine.find_rules_by_field_ids(&created.id, &[ru_field]).expect("rules");
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].to_path.field_value(), Some("RUS"));
}

#[test]
fn records_assemble_fields_by_column_name() {
    let harness = Harness::new();
    let now = Harness::ts(0);
    let hr = harness.seed_dictionary("hr", "country", "code", &["RU", "US"], now).expect("seed hr");

    let records = harness.hierarchy_store.find_records(&hr.dictionary.id).expect("records");
    assert_eq!(records.len(), 2);
    for record in &records {
        let field = record.field("code").expect("primary field present");
        assert_eq!(field.name, record.id);
    }
}

#[test]
fn rule_sets_resolve_by_symbolic_name() {
    let harness = Harness::new();
    let now = Harness::ts(0);
    let hr = harness.seed_dictionary("hr", "country", "code", &["RU"], now).expect("seed hr");
    let crm = harness.seed_dictionary("crm", "country", "code", &["RUS"], now).expect("seed crm");
    harness.link("country-mapping", &hr, &crm, &[("RU", "RUS")], None, now).expect("link");

    let found = harness
        .engine
        .find_rule_set_by_name("Country-Mapping", false)
        .expect("resolve")
        .expect("present");
    assert_eq!(found.name, "country-mapping");

    assert!(harness.engine.find_rule_set_by_name("absent", true).expect("quiet").is_none());
    let err = harness.engine.find_rule_set_by_name("absent", false).unwrap_err();
    assert!(matches!(err, CoreError::UnknownRuleSetName { .. }));
}

#[test]
fn unmatched_dictionaries_follow_the_default_and_coverage_rules() {
    let harness = Harness::new();
    let now = Harness::ts(0);
    let hr = harness.seed_dictionary("hr", "country", "code", &["RU", "US"], now).expect("seed hr");
    let crm = harness
        .seed_dictionary("crm", "country", "code", &["RUS", "USA", "OTHER"], now)
        .expect("seed crm");
    let isolated =
        harness.seed_dictionary("hr", "region", "code", &["77"], now).expect("seed region");

    // Fully mapped without a default: matched.
    harness
        .link("countries", &hr, &crm, &[("RU", "RUS"), ("US", "USA")], None, now)
        .expect("link");
    let unmatched =
        harness.engine.find_unmatched_dictionaries(&hr.group.id).expect("unmatched");
    let names: Vec<&str> =
        unmatched.iter().map(|dictionary| dictionary.name.as_str()).collect();
    // The region dictionary has no outbound sets at all.
    assert_eq!(names, vec![isolated.dictionary.name.as_str()]);

    // A new unmapped value makes the default-less dictionary unmatched.
    harness
        .hierarchy
        .create_field(
            &hr.meta_field.id,
            refdict_core::RecordId::new("country-extra"),
            Some("DE".to_string()),
            Harness::ts(1),
            "tests",
        )
        .expect("extra value");
    let unmatched =
        harness.engine.find_unmatched_dictionaries(&hr.group.id).expect("unmatched");
    assert_eq!(unmatched.len(), 2);
}

#[test]
fn invalid_rules_abort_batches_without_partial_writes() {
    let harness = Harness::new();
    let now = Harness::ts(0);
    let hr = harness.seed_dictionary("hr", "country", "code", &["RU", "US"], now).expect("seed hr");
    let crm = harness.seed_dictionary("crm", "country", "code", &["RUS"], now).expect("seed crm");

    let from_path = hr.meta_field_path();
    let to_path = crm.meta_field_path();
    let rule_set = RecodeRuleSet {
        id: RuleSetId::new(harness.sequence.next_id("rule_set")),
        name: "countries".to_string(),
        from_meta_field_id: hr.meta_field.id.clone(),
        to_meta_field_id: crm.meta_field.id.clone(),
        from_path: from_path.clone(),
        to_path: to_path.clone(),
        default_field_id: None,
        default_path: None,
        rule_set_state: RuleSetState::Active,
        state: DocumentState::created(now),
    };
    let valid_rule = refdict_core::RecodeRule {
        id: refdict_core::RuleId::new(harness.sequence.next_id("rule")),
        rule_set_id: rule_set.id.clone(),
        from_field_id: hr.field_id("RU").expect("RU field"),
        to_field_id: crm.field_id("RUS").expect("RUS field"),
        from_path: from_path.value("RU"),
        to_path: to_path.value("RUS"),
        state: DocumentState::created(now),
    };
    let ghost_rule = refdict_core::RecodeRule {
        id: refdict_core::RuleId::new(harness.sequence.next_id("rule")),
        rule_set_id: rule_set.id.clone(),
        from_field_id: hr.field_id("US").expect("US field"),
        to_field_id: refdict_core::FieldId::new("ghost-field"),
        from_path: from_path.value("US"),
        to_path: to_path.value("MISSING"),
        state: DocumentState::created(now),
    };
    let batch = RuleBatch {
        create_sets: vec![rule_set],
        create_rules: vec![valid_rule, ghost_rule],
        ..RuleBatch::default()
    };

    // One ghost reference must refuse the whole batch, valid members included.
    let err = harness.engine.modify(batch, true, now, "tests").unwrap_err();
    assert!(matches!(err, CoreError::UnknownField { .. }));
    assert!(harness.rule_store.find_active_rule_sets().expect("sets").is_empty());
}
