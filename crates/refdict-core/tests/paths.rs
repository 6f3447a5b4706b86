// crates/refdict-core/tests/paths.rs
// ============================================================================
// Module: Named Path Tests
// Description: Verifies case-insensitive path identity semantics.
// ============================================================================
//! ## Overview
//! Ensures name segments compare case-insensitively, the value segment
//! compares case-sensitively, and absent values stay distinct from empty
//! ones, including under hashing.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;

use proptest::prelude::*;
use refdict_core::DictionaryPath;
use refdict_core::FieldPath;
use refdict_core::MetaFieldPath;

fn hash_of(value: &impl Hash) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[test]
fn name_segments_are_case_insensitive() {
    assert_eq!(DictionaryPath::new("group", "DICT"), DictionaryPath::new("GROUP", "dict"));
    assert_eq!(
        MetaFieldPath::new("group", "dict", "Code"),
        MetaFieldPath::new("Group", "Dict", "code")
    );
}

#[test]
fn value_segment_is_case_sensitive() {
    let meta = MetaFieldPath::new("group", "dict", "code");
    assert_ne!(meta.value("value"), meta.value("VALUE"));
}

#[test]
fn absent_value_differs_from_empty_value() {
    let meta = MetaFieldPath::new("group", "dict", "code");
    assert_ne!(meta.no_value(), meta.value(""));
    assert_ne!(hash_of(&meta.no_value()), hash_of(&meta.value("")));
}

#[test]
fn equal_paths_agree_on_hash() {
    let lower = MetaFieldPath::new("group", "dict", "code");
    let upper = MetaFieldPath::new("GROUP", "DICT", "CODE");
    assert_eq!(lower, upper);
    assert_eq!(hash_of(&lower), hash_of(&upper));
}

#[test]
fn paths_are_usable_as_map_keys() {
    let mut index: HashMap<FieldPath, &str> = HashMap::new();
    index.insert(MetaFieldPath::new("hr", "country", "code").value("RU"), "mapped");
    assert_eq!(index.get(&MetaFieldPath::new("HR", "Country", "Code").value("RU")), Some(&"mapped"));
    assert_eq!(index.get(&MetaFieldPath::new("hr", "country", "code").value("ru")), None);
}

#[test]
fn unicode_names_fold_beyond_ascii() {
    assert_eq!(
        DictionaryPath::new("Страны", "Справочник"),
        DictionaryPath::new("СТРАНЫ", "СПРАВОЧНИК")
    );
}

proptest! {
    #[test]
    fn uppercasing_names_never_changes_identity(
        group in "[a-zA-Z0-9]{1,12}",
        dictionary in "[a-zA-Z0-9]{1,12}",
        field in "[a-zA-Z0-9]{1,12}",
    ) {
        let lower = MetaFieldPath::new(
            group.to_lowercase(),
            dictionary.to_lowercase(),
            field.to_lowercase(),
        );
        let upper = MetaFieldPath::new(
            group.to_uppercase(),
            dictionary.to_uppercase(),
            field.to_uppercase(),
        );
        prop_assert_eq!(&lower, &upper);
        prop_assert_eq!(hash_of(&lower), hash_of(&upper));
    }

    #[test]
    fn distinct_values_stay_distinct(
        value_a in "[a-zA-Z0-9]{0,12}",
        value_b in "[a-zA-Z0-9]{0,12}",
    ) {
        let meta = MetaFieldPath::new("group", "dict", "code");
        let equal = value_a == value_b;
        prop_assert_eq!(meta.value(value_a) == meta.value(value_b), equal);
    }
}
