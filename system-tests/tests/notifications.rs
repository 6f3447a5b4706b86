// system-tests/tests/notifications.rs
// ============================================================================
// Module: Notification Aggregation Tests
// Description: Verifies windowed aggregation and the processing lifecycle.
// ============================================================================
//! ## Overview
//! Ensures outcome events fold into per-key window buckets with atomic
//! counts, windows expire into fresh buckets, flushing announces each bucket
//! once, processing is idempotent, and embedded names are truncated.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use refdict_core::MetaFieldPath;
use refdict_core::NotifyKind;
use refdict_core::NotifyState;
use refdict_core::core::notification::DOCUMENT_NAME_LEN;
use refdict_core::interfaces::NotificationStore;
use system_tests::AUTHOR;
use system_tests::Harness;

fn paths() -> (refdict_core::FieldPath, refdict_core::DictionaryPath) {
    let from = MetaFieldPath::new("hr", "country", "code").value("DE");
    let to = refdict_core::DictionaryPath::new("crm", "country");
    (from, to)
}

#[test]
fn repeated_failures_increment_one_bucket() {
    let harness = Harness::new();
    let (from, to) = paths();

    for offset in 0..3 {
        harness
            .aggregator
            .record_failure("countries", &from, &to, NotifyKind::MissingRule, Harness::ts(offset))
            .expect("record");
    }
    let other_value = MetaFieldPath::new("hr", "country", "code").value("FR");
    harness
        .aggregator
        .record_failure("countries", &other_value, &to, NotifyKind::MissingRule, Harness::ts(3))
        .expect("record");

    let pending = harness.aggregator.query_pending().expect("pending");
    assert_eq!(pending.len(), 2);
    let de_bucket = pending
        .iter()
        .find(|notification| notification.from_value.as_deref() == Some("DE"))
        .expect("DE bucket");
    assert_eq!(de_bucket.count, 3);
}

#[test]
fn windows_expire_into_fresh_buckets() {
    let harness = Harness::new();
    let (from, to) = paths();
    let window = harness.config.window_millis();

    harness
        .aggregator
        .record_failure("countries", &from, &to, NotifyKind::MissingRule, Harness::ts(0))
        .expect("record");
    harness
        .aggregator
        .record_failure("countries", &from, &to, NotifyKind::MissingRule, Harness::ts(window + 1))
        .expect("record");

    let pending = harness.aggregator.query_pending().expect("pending");
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|notification| notification.count == 1));
}

#[test]
fn flush_announces_each_expired_bucket_once() {
    let harness = Harness::new();
    let (from, to) = paths();
    let window = harness.config.window_millis();

    harness
        .aggregator
        .record_failure("countries", &from, &to, NotifyKind::MissingRule, Harness::ts(0))
        .expect("record");

    assert!(harness.aggregator.flush(Harness::ts(1)).expect("early flush").is_empty());
    let expired = harness.aggregator.flush(Harness::ts(window + 1)).expect("flush");
    assert_eq!(expired.len(), 1);
    assert!(harness.aggregator.flush(Harness::ts(window + 2)).expect("repeat flush").is_empty());
}

#[test]
fn mark_processed_is_idempotent() {
    let harness = Harness::new();
    let (from, to) = paths();

    harness
        .aggregator
        .record_failure("countries", &from, &to, NotifyKind::MissingRule, Harness::ts(0))
        .expect("record");
    let pending = harness.aggregator.query_pending().expect("pending");
    let id = pending[0].id.clone();

    let first = harness
        .aggregator
        .change_notify_state(&[id.clone()], Harness::ts(1), AUTHOR)
        .expect("first transition");
    assert_eq!(first, vec![id.clone()]);

    let second = harness
        .aggregator
        .change_notify_state(&[id.clone()], Harness::ts(2), AUTHOR)
        .expect("second transition");
    assert!(second.is_empty());

    let stored =
        harness.notification_store.find_by_id(&id).expect("lookup").expect("present");
    assert_eq!(stored.processing_state, NotifyState::Processed);
    assert_eq!(stored.processing_date, Some(Harness::ts(1)));
    assert_eq!(stored.processing_author.as_deref(), Some(AUTHOR));
    assert!(harness.aggregator.query_pending().expect("pending").is_empty());
}

#[test]
fn embedded_names_are_truncated() {
    let harness = Harness::new();
    let (from, to) = paths();
    let long_name = "x".repeat(400);

    harness
        .aggregator
        .record_failure(&long_name, &from, &to, NotifyKind::MissingRule, Harness::ts(0))
        .expect("record");

    let pending = harness.aggregator.query_pending().expect("pending");
    assert_eq!(pending[0].rule_set_name.chars().count(), DOCUMENT_NAME_LEN);
    assert!(pending[0].rule_set_name.ends_with("..."));
}

#[test]
fn successes_and_failures_never_share_a_bucket() {
    let harness = Harness::new();
    let from = MetaFieldPath::new("hr", "country", "code").value("RU");
    let to_value = MetaFieldPath::new("crm", "country", "code").value("RUS");
    let (failed_from, to_dictionary) = paths();

    harness
        .aggregator
        .record_success("countries", &from, &to_value, Harness::ts(0))
        .expect("success");
    harness
        .aggregator
        .record_failure(
            "countries",
            &failed_from,
            &to_dictionary,
            NotifyKind::MissingRule,
            Harness::ts(0),
        )
        .expect("failure");

    let pending = harness.aggregator.query_pending().expect("pending");
    assert_eq!(pending.len(), 2);
}

#[test]
fn notification_store_uses_truncated_names_in_keys() {
    let harness = Harness::new();
    let (from, to) = paths();
    let long_name = "y".repeat(400);

    // Two events with the same overlong name must share one bucket even
    // though only the truncated form is stored.
    harness
        .aggregator
        .record_failure(&long_name, &from, &to, NotifyKind::MissingRule, Harness::ts(0))
        .expect("record");
    harness
        .aggregator
        .record_failure(&long_name, &from, &to, NotifyKind::MissingRule, Harness::ts(1))
        .expect("record");

    let pending = harness.aggregator.query_pending().expect("pending");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].count, 2);
}
