// crates/refdict-tasks/tests/descriptor.rs
// ============================================================================
// Module: Task Descriptor Diff Tests
// Description: Verifies descriptor hashing and map-valued parameter diffing.
// ============================================================================
//! ## Overview
//! Ensures task descriptors diff through the shared attribute-table engine:
//! the whole parameter map renders as one attribute, so any differing entry
//! reports exactly one diff, and hash equality tracks diff emptiness.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use refdict_tasks::DescriptorId;
use refdict_tasks::TASK_DESCRIPTOR_DESCRIPTOR;
use refdict_tasks::TaskDescriptor;
use serde_json::json;

fn descriptor(id: &str, parameters: &[(&str, serde_json::Value)]) -> TaskDescriptor {
    TaskDescriptor {
        id: DescriptorId::new(id),
        performer: "dictionary-recode".to_string(),
        author: "tests".to_string(),
        parameters: parameters
            .iter()
            .map(|(key, value)| ((*key).to_string(), value.clone()))
            .collect(),
    }
}

#[test]
fn identical_descriptors_have_no_diff_regardless_of_id() {
    let older = descriptor("d-1", &[("group", json!("hr")), ("limit", json!(10))]);
    let newer = descriptor("d-2", &[("group", json!("hr")), ("limit", json!(10))]);

    assert!(TASK_DESCRIPTOR_DESCRIPTOR.create_diff(&older, &newer).is_none());
    let hash_older = TASK_DESCRIPTOR_DESCRIPTOR.create_hash_code(&older).expect("hash");
    let hash_newer = TASK_DESCRIPTOR_DESCRIPTOR.create_hash_code(&newer).expect("hash");
    assert_eq!(hash_older, hash_newer);
}

#[test]
fn any_changed_parameter_entry_reports_a_single_diff() {
    let older = descriptor("d-1", &[("group", json!("hr")), ("limit", json!(10))]);
    let newer = descriptor("d-1", &[("group", json!("hr")), ("limit", json!(25))]);

    let diffs = TASK_DESCRIPTOR_DESCRIPTOR.create_diff(&older, &newer).expect("diff present");
    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].attribute, "parameters");
    assert!(diffs[0].old_value.contains("10"));
    assert!(diffs[0].new_value.contains("25"));
}

#[test]
fn added_and_removed_entries_still_collapse_into_one_diff() {
    let older = descriptor("d-1", &[("group", json!("hr"))]);
    let newer = descriptor("d-1", &[("group", json!("hr")), ("dry_run", json!(true))]);

    let diffs = TASK_DESCRIPTOR_DESCRIPTOR.create_diff(&older, &newer).expect("diff present");
    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].attribute, "parameters");

    let hash_older = TASK_DESCRIPTOR_DESCRIPTOR.create_hash_code(&older).expect("hash");
    let hash_newer = TASK_DESCRIPTOR_DESCRIPTOR.create_hash_code(&newer).expect("hash");
    assert_ne!(hash_older, hash_newer);
}

#[test]
fn performer_changes_diff_separately_from_parameters() {
    let older = descriptor("d-1", &[("group", json!("hr"))]);
    let mut newer = older.clone();
    newer.performer = "index-rebuild".to_string();

    let diffs = TASK_DESCRIPTOR_DESCRIPTOR.create_diff(&older, &newer).expect("diff present");
    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].attribute, "performer");
}
