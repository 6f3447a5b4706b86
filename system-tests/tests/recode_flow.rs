// system-tests/tests/recode_flow.rs
// ============================================================================
// Module: Recode Flow Tests
// Description: End-to-end batch recode through the task substrate.
// ============================================================================
//! ## Overview
//! Runs a full batch recode: a performer resolves the rule set, maps every
//! source value, publishes outcome events, and reports hierarchical
//! progress. Asserts the execution result, the aggregated notifications, and
//! the smoothness of the progress stream.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;
use std::sync::Arc;

use refdict_core::Event;
use refdict_core::NotifyKind;
use refdict_tasks::DescriptorId;
use refdict_tasks::TaskDescriptor;
use refdict_tasks::TaskStatus;
use serde_json::json;
use system_tests::Harness;
use system_tests::RECODE_PERFORMER;
use system_tests::RecodePerformer;

fn recode_descriptor(id: &str) -> TaskDescriptor {
    let mut parameters = BTreeMap::new();
    parameters.insert("from_group".to_string(), json!("hr"));
    parameters.insert("from_dictionary".to_string(), json!("country"));
    parameters.insert("from_field".to_string(), json!("code"));
    parameters.insert("to_group".to_string(), json!("crm"));
    parameters.insert("to_dictionary".to_string(), json!("country"));
    parameters.insert("to_field".to_string(), json!("code"));
    TaskDescriptor {
        id: DescriptorId::new(id),
        performer: RECODE_PERFORMER.to_string(),
        author: "tests".to_string(),
        parameters,
    }
}

#[test]
fn batch_recode_aggregates_outcomes_and_reports_progress() {
    let harness = Harness::new();
    let now = Harness::ts(0);
    let hr = harness
        .seed_dictionary("hr", "country", "code", &["RU", "US", "DE"], now)
        .expect("seed hr");
    let crm = harness
        .seed_dictionary("crm", "country", "code", &["RUS", "USA"], now)
        .expect("seed crm");
    harness
        .link("countries", &hr, &crm, &[("RU", "RUS"), ("US", "USA")], None, now)
        .expect("link");
    harness.performers.register(Arc::new(RecodePerformer::new(
        harness.hierarchy_store.clone(),
        harness.engine.clone(),
        harness.bus.clone(),
        harness.sequence.clone(),
    )));
    let launcher = harness.launcher();

    let execution = launcher.submit_sync(recode_descriptor("recode-1")).expect("submit");
    assert_eq!(execution.status, TaskStatus::Finished);
    let result = execution.result.expect("result");
    assert_eq!(result.values.get("total"), Some(&json!(3)));
    assert_eq!(result.values.get("recoded"), Some(&json!(2)));
    assert_eq!(result.values.get("failed"), Some(&json!(1)));

    // Successes fold into one bucket; the unmapped value gets its own.
    let pending = harness.aggregator.query_pending().expect("pending");
    assert_eq!(pending.len(), 2);
    let success = pending
        .iter()
        .find(|notification| notification.kind == NotifyKind::RecodeSuccess)
        .expect("success bucket");
    assert_eq!(success.count, 2);
    assert_eq!(success.rule_set_name, "countries");
    assert_eq!(success.from_group_name, "hr");
    assert_eq!(success.to_dictionary_name, "country");
    let missing = pending
        .iter()
        .find(|notification| notification.kind == NotifyKind::MissingRule)
        .expect("missing-rule bucket");
    assert_eq!(missing.count, 1);
    assert_eq!(missing.from_value.as_deref(), Some("DE"));

    // Progress is monotone, ends complete, and passes through the child
    // tracker's intermediate fractions.
    let progress: Vec<f64> = harness
        .recorder
        .events()
        .iter()
        .filter_map(|event| match event {
            Event::TaskProgress(progress) => Some(progress.total_progress),
            _ => None,
        })
        .collect();
    assert!(progress.windows(2).all(|pair| pair[0] <= pair[1]), "progress must not regress");
    assert_eq!(progress.last().copied(), Some(1.0));
    assert!(progress.len() >= 4);

    launcher.shutdown();
}

#[test]
fn recode_over_a_transitive_chain_uses_the_terminal_default() {
    let harness = Harness::new();
    let now = Harness::ts(0);
    let hr = harness
        .seed_dictionary("hr", "country", "code", &["RU", "DE"], now)
        .expect("seed hr");
    let mid = harness.seed_dictionary("mdm", "country", "iso", &["643"], now).expect("seed mdm");
    let crm = harness
        .seed_dictionary("crm", "country", "code", &["RUS", "OTHER"], now)
        .expect("seed crm");
    harness.link("hr-to-mdm", &hr, &mid, &[("RU", "643")], None, now).expect("link hr-mdm");
    harness
        .link("mdm-to-crm", &mid, &crm, &[("643", "RUS")], Some("OTHER"), now)
        .expect("link mdm-crm");
    harness.performers.register(Arc::new(RecodePerformer::new(
        harness.hierarchy_store.clone(),
        harness.engine.clone(),
        harness.bus.clone(),
        harness.sequence.clone(),
    )));
    let launcher = harness.launcher();

    let execution = launcher.submit_sync(recode_descriptor("recode-1")).expect("submit");
    assert_eq!(execution.status, TaskStatus::Finished);
    let result = execution.result.expect("result");
    // Both values recode: RU through the chain, DE through the default.
    assert_eq!(result.values.get("recoded"), Some(&json!(2)));
    assert_eq!(result.values.get("failed"), Some(&json!(0)));

    launcher.shutdown();
}
