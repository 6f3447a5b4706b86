// crates/refdict-core/tests/errors.rs
// ============================================================================
// Module: Error Taxonomy Tests
// Description: Verifies error categories and the quietly helper.
// ============================================================================
//! ## Overview
//! Ensures every error variant maps to its documented category and that the
//! quietly mode converts only not-found conditions into absent results.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::missing_docs_in_private_items,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use refdict_core::CoreError;
use refdict_core::DictionaryPath;
use refdict_core::ErrorCategory;
use refdict_core::MetaFieldPath;
use refdict_core::core::quietly_absent;

fn meta_path() -> MetaFieldPath {
    MetaFieldPath::new("hr", "country", "code")
}

#[test]
fn constraint_errors_are_categorized() {
    let errors = [
        CoreError::IllegalName {
            name: String::new(),
        },
        CoreError::DuplicateName {
            name: "hr".to_string(),
        },
        CoreError::SelfMapping {
            path: meta_path(),
        },
        CoreError::NotUniqueFieldValue {
            path: meta_path(),
            value: "RU".to_string(),
        },
        CoreError::PrimaryMetaField {
            path: meta_path(),
        },
    ];
    for error in errors {
        assert_eq!(error.category(), ErrorCategory::Constraint, "{error}");
    }
}

#[test]
fn not_found_errors_are_categorized() {
    let errors = [
        CoreError::UnknownDictionary {
            path: DictionaryPath::new("hr", "country"),
        },
        CoreError::UnknownMetaField {
            path: meta_path(),
        },
        CoreError::UnknownRuleSet {
            from: meta_path(),
            to: MetaFieldPath::new("crm", "country", "code"),
        },
        CoreError::UnknownRuleSetName {
            name: "absent".to_string(),
        },
    ];
    for error in errors {
        assert_eq!(error.category(), ErrorCategory::NotFound, "{error}");
    }
}

#[test]
fn incomplete_data_is_its_own_category() {
    let error = CoreError::IncompletePrimaryKey {
        path: meta_path(),
    };
    assert_eq!(error.category(), ErrorCategory::IncompleteData);
}

#[test]
fn quietly_masks_only_not_found() {
    let not_found: Result<(), CoreError> = Err(CoreError::UnknownRuleSetName {
        name: "absent".to_string(),
    });
    assert_eq!(quietly_absent(not_found, true).unwrap(), None);

    let constraint: Result<(), CoreError> = Err(CoreError::SelfMapping {
        path: meta_path(),
    });
    assert!(quietly_absent(constraint, true).is_err());

    let found: Result<u32, CoreError> = Ok(7);
    assert_eq!(quietly_absent(found, true).unwrap(), Some(7));
}

#[test]
fn errors_render_the_failing_path() {
    let error = CoreError::UnknownRuleSet {
        from: meta_path(),
        to: MetaFieldPath::new("crm", "country", "code"),
    };
    let rendered = error.to_string();
    assert!(rendered.contains("hr.country[code]"));
    assert!(rendered.contains("crm.country[code]"));
}
