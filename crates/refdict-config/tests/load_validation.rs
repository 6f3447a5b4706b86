// crates/refdict-config/tests/load_validation.rs
// ============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards (path, size, encoding, ranges).
// ============================================================================
//! ## Overview
//! Ensures config input handling is strict and fail-closed: oversized paths
//! and files, non-UTF-8 bytes, unknown keys, and out-of-range values are all
//! rejected, while omitted sections fall back to the documented defaults.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::io::Write;
use std::path::Path;

use refdict_config::ConfigError;
use refdict_config::RefdictConfig;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write");
    file
}

fn assert_invalid(result: Result<RefdictConfig, ConfigError>, needle: &str) {
    match result {
        Err(error) => {
            let message = error.to_string();
            assert!(message.contains(needle), "error '{message}' did not contain '{needle}'");
        }
        Ok(_) => panic!("expected invalid config load"),
    }
}

#[test]
fn load_without_a_file_yields_defaults() {
    let config = RefdictConfig::load(None).expect("defaults");
    assert_eq!(config.notifications.window_secs, 3_600);
    assert_eq!(config.tasks.workers, 4);
    assert_eq!(config.tasks.queue_capacity, 64);
    assert_eq!(config.limits.max_name_len, 255);
}

#[test]
fn load_rejects_path_too_long() {
    let long_path = "a/".repeat(3_000);
    assert_invalid(
        RefdictConfig::load(Some(Path::new(&long_path))),
        "config path exceeds max length",
    );
}

#[test]
fn load_rejects_path_component_too_long() {
    let long_component = "a".repeat(300);
    assert_invalid(
        RefdictConfig::load(Some(Path::new(&long_component))),
        "config path component too long",
    );
}

#[test]
fn load_rejects_oversized_file() {
    let mut file = NamedTempFile::new().expect("temp file");
    let payload = vec![b'a'; 1_048_577];
    file.write_all(&payload).expect("write");
    assert_invalid(RefdictConfig::load(Some(file.path())), "config file exceeds size limit");
}

#[test]
fn load_rejects_non_utf8_file() {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(&[0xFF, 0xFE, 0xFF]).expect("write");
    assert_invalid(RefdictConfig::load(Some(file.path())), "not valid utf-8");
}

#[test]
fn load_rejects_unknown_keys() {
    let file = write_config("[notifications]\nwindow_secs = 60\nsurprise = true\n");
    assert_invalid(RefdictConfig::load(Some(file.path())), "config parse error");
}

#[test]
fn load_rejects_out_of_range_window() {
    let file = write_config("[notifications]\nwindow_secs = 0\n");
    assert_invalid(
        RefdictConfig::load(Some(file.path())),
        "notifications.window_secs",
    );
}

#[test]
fn load_rejects_oversized_worker_pool() {
    let file = write_config("[tasks]\nworkers = 512\n");
    assert_invalid(RefdictConfig::load(Some(file.path())), "tasks.workers");
}

#[test]
fn load_accepts_partial_documents() {
    let file = write_config("[tasks]\nworkers = 8\n");
    let config = RefdictConfig::load(Some(file.path())).expect("valid config");
    assert_eq!(config.tasks.workers, 8);
    assert_eq!(config.tasks.queue_capacity, 64);
    assert_eq!(config.notifications.window_secs, 3_600);
}

#[test]
fn window_millis_scales_seconds() {
    let file = write_config("[notifications]\nwindow_secs = 2\n");
    let config = RefdictConfig::load(Some(file.path())).expect("valid config");
    assert_eq!(config.window_millis(), 2_000);
}
