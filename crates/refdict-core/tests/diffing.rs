// crates/refdict-core/tests/diffing.rs
// ============================================================================
// Module: Diff Engine Tests
// Description: Verifies hash/diff agreement and attribute exclusion rules.
// ============================================================================
//! ## Overview
//! Ensures `create_diff` is empty exactly when content hashes match, that
//! generated identifiers and derived paths never count as changes, and that
//! diffs list attributes in declared order.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use refdict_core::ChangeKind;
use refdict_core::DocumentState;
use refdict_core::Field;
use refdict_core::FieldId;
use refdict_core::Group;
use refdict_core::GroupId;
use refdict_core::MetaFieldId;
use refdict_core::PermissionMask;
use refdict_core::RecordId;
use refdict_core::Timestamp;
use refdict_core::runtime::FIELD_DESCRIPTOR;
use refdict_core::runtime::GROUP_DESCRIPTOR;

fn group(id: &str, name: &str, owner: &str) -> Group {
    Group {
        id: GroupId::new(id),
        name: name.to_string(),
        owner: owner.to_string(),
        permissions: PermissionMask::READ,
        state: DocumentState::created(Timestamp::from_unix_millis(0)),
    }
}

fn field(id: &str, value: Option<&str>) -> Field {
    Field {
        id: FieldId::new(id),
        meta_field_id: MetaFieldId::new("mf-1"),
        name: RecordId::new("record-1"),
        value: value.map(ToString::to_string),
        state: DocumentState::created(Timestamp::from_unix_millis(0)),
    }
}

#[test]
fn identical_content_yields_no_diff_and_equal_hashes() {
    let older = group("g-1", "hr", "ops");
    let newer = group("g-2", "hr", "ops");

    assert!(GROUP_DESCRIPTOR.create_diff(&older, &newer).is_none());
    let hash_older = GROUP_DESCRIPTOR.create_hash_code(&older).expect("hash older");
    let hash_newer = GROUP_DESCRIPTOR.create_hash_code(&newer).expect("hash newer");
    assert_eq!(hash_older, hash_newer);
}

#[test]
fn changed_content_yields_diff_and_distinct_hashes() {
    let older = group("g-1", "hr", "ops");
    let newer = group("g-1", "hr", "platform");

    let diffs = GROUP_DESCRIPTOR.create_diff(&older, &newer).expect("diff present");
    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].attribute, "owner");
    assert_eq!(diffs[0].old_value, "ops");
    assert_eq!(diffs[0].new_value, "platform");

    let hash_older = GROUP_DESCRIPTOR.create_hash_code(&older).expect("hash older");
    let hash_newer = GROUP_DESCRIPTOR.create_hash_code(&newer).expect("hash newer");
    assert_ne!(hash_older, hash_newer);
}

#[test]
fn diff_emptiness_matches_hash_equality_for_value_pairs() {
    let cases = [
        (None, None),
        (None, Some("")),
        (Some(""), Some("")),
        (Some("x"), Some("X")),
        (Some("x"), Some("x")),
    ];
    for (left, right) in cases {
        let older = field("f-1", left);
        let newer = field("f-2", right);
        let diff_empty = FIELD_DESCRIPTOR.create_diff(&older, &newer).is_none();
        let hash_left = FIELD_DESCRIPTOR.create_hash_code(&older).expect("hash left");
        let hash_right = FIELD_DESCRIPTOR.create_hash_code(&newer).expect("hash right");
        assert_eq!(diff_empty, hash_left == hash_right, "case {left:?} vs {right:?}");
    }
}

#[test]
fn absent_value_diffs_against_empty_value() {
    let older = field("f-1", None);
    let newer = field("f-1", Some(""));
    let diffs = FIELD_DESCRIPTOR.create_diff(&older, &newer).expect("diff present");
    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].attribute, "value");
}

#[test]
fn diffs_follow_declared_attribute_order() {
    let older = group("g-1", "hr", "ops");
    let mut newer = older.clone();
    newer.name = "hr2".to_string();
    newer.owner = "platform".to_string();
    newer.permissions = PermissionMask::READ.union(PermissionMask::WRITE);

    let diffs = GROUP_DESCRIPTOR.create_diff(&older, &newer).expect("diff present");
    let attributes: Vec<&str> = diffs.iter().map(|diff| diff.attribute.as_str()).collect();
    assert_eq!(attributes, vec!["name", "owner", "permissions"]);
}

#[test]
fn history_records_carry_the_event_identity() {
    let older = group("g-1", "hr", "ops");
    let newer = group("g-1", "hr", "platform");
    let diffs = GROUP_DESCRIPTOR.create_diff(&older, &newer).expect("diff present");
    let history = GROUP_DESCRIPTOR.create_history(
        refdict_core::HistoryId::new("h-1"),
        "g-1",
        ChangeKind::Update,
        Timestamp::from_unix_millis(42),
        "tester",
        diffs,
    );
    assert_eq!(history.identity(), ("g-1", ChangeKind::Update, Timestamp::from_unix_millis(42)));
    assert_eq!(history.target_type, "Group");
}
