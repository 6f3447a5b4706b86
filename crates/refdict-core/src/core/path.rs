// crates/refdict-core/src/core/path.rs
// ============================================================================
// Module: Refdict Named Paths
// Description: Name-based addresses for groups, dictionaries, meta fields, and values.
// Purpose: Provide stable external references that survive identifier regeneration.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Named paths address hierarchy documents by the concatenation of ancestor
//! names instead of generated identifiers. Name segments compare
//! case-insensitively (operators type names in whatever case their source
//! system uses); the optional field-value segment compares case-sensitively,
//! and an absent value is distinct from an empty one.
//! Invariants:
//! - Paths are immutable value types and safe to use as map keys.
//! - Equality and hashing agree on the case-insensitive fold.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Case Folding
// ============================================================================

/// Compares two name segments using Unicode lowercase folding.
///
/// This is the equality every name segment of a path uses; stores reuse it so
/// that name lookups agree with path identity.
#[must_use]
pub fn folded_eq(left: &str, right: &str) -> bool {
    let mut left = left.chars().flat_map(char::to_lowercase);
    let mut right = right.chars().flat_map(char::to_lowercase);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return true,
            (Some(a), Some(b)) if a == b => {}
            _ => return false,
        }
    }
}

/// Feeds the lowercase fold of a name segment into a hasher.
fn folded_hash<H: Hasher>(segment: &str, state: &mut H) {
    for ch in segment.chars().flat_map(char::to_lowercase) {
        state.write_u32(ch as u32);
    }
    // Segment terminator keeps ("ab","c") distinct from ("a","bc").
    state.write_u8(0xFF);
}

// ============================================================================
// SECTION: Dictionary Path
// ============================================================================

/// Name-based address of a dictionary within a group.
///
/// # Invariants
/// - Both segments compare and hash case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictionaryPath {
    /// Group name segment.
    group_name: String,
    /// Dictionary name segment.
    dictionary_name: String,
}

impl DictionaryPath {
    /// Creates a dictionary path from group and dictionary names.
    #[must_use]
    pub fn new(group_name: impl Into<String>, dictionary_name: impl Into<String>) -> Self {
        Self {
            group_name: group_name.into(),
            dictionary_name: dictionary_name.into(),
        }
    }

    /// Returns the group name segment.
    #[must_use]
    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    /// Returns the dictionary name segment.
    #[must_use]
    pub fn dictionary_name(&self) -> &str {
        &self.dictionary_name
    }

    /// Extends this path with a meta field name segment.
    #[must_use]
    pub fn meta_field(&self, field_name: impl Into<String>) -> MetaFieldPath {
        MetaFieldPath::new(self.group_name.clone(), self.dictionary_name.clone(), field_name)
    }
}

impl PartialEq for DictionaryPath {
    fn eq(&self, other: &Self) -> bool {
        folded_eq(&self.group_name, &other.group_name)
            && folded_eq(&self.dictionary_name, &other.dictionary_name)
    }
}

impl Eq for DictionaryPath {}

impl Hash for DictionaryPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        folded_hash(&self.group_name, state);
        folded_hash(&self.dictionary_name, state);
    }
}

impl fmt::Display for DictionaryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group_name, self.dictionary_name)
    }
}

// ============================================================================
// SECTION: Meta Field Path
// ============================================================================

/// Name-based address of a meta field (column) within a dictionary.
///
/// # Invariants
/// - All three segments compare and hash case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFieldPath {
    /// Group name segment.
    group_name: String,
    /// Dictionary name segment.
    dictionary_name: String,
    /// Meta field name segment.
    field_name: String,
}

impl MetaFieldPath {
    /// Creates a meta field path from its three name segments.
    #[must_use]
    pub fn new(
        group_name: impl Into<String>,
        dictionary_name: impl Into<String>,
        field_name: impl Into<String>,
    ) -> Self {
        Self {
            group_name: group_name.into(),
            dictionary_name: dictionary_name.into(),
            field_name: field_name.into(),
        }
    }

    /// Returns the group name segment.
    #[must_use]
    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    /// Returns the dictionary name segment.
    #[must_use]
    pub fn dictionary_name(&self) -> &str {
        &self.dictionary_name
    }

    /// Returns the meta field name segment.
    #[must_use]
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Returns the dictionary prefix of this path.
    #[must_use]
    pub fn dictionary_path(&self) -> DictionaryPath {
        DictionaryPath::new(self.group_name.clone(), self.dictionary_name.clone())
    }

    /// Extends this path with a field value segment.
    #[must_use]
    pub fn value(&self, field_value: impl Into<String>) -> FieldPath {
        FieldPath::new(self.clone(), Some(field_value.into()))
    }

    /// Extends this path with an absent field value segment.
    #[must_use]
    pub fn no_value(&self) -> FieldPath {
        FieldPath::new(self.clone(), None)
    }
}

impl PartialEq for MetaFieldPath {
    fn eq(&self, other: &Self) -> bool {
        folded_eq(&self.group_name, &other.group_name)
            && folded_eq(&self.dictionary_name, &other.dictionary_name)
            && folded_eq(&self.field_name, &other.field_name)
    }
}

impl Eq for MetaFieldPath {}

impl Hash for MetaFieldPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        folded_hash(&self.group_name, state);
        folded_hash(&self.dictionary_name, state);
        folded_hash(&self.field_name, state);
    }
}

impl fmt::Display for MetaFieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}[{}]", self.group_name, self.dictionary_name, self.field_name)
    }
}

// ============================================================================
// SECTION: Field Path
// ============================================================================

/// Name-based address of a concrete field value within a meta field.
///
/// # Invariants
/// - Name segments compare case-insensitively; the value segment compares
///   case-sensitively, and `None` is distinct from `Some("")`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldPath {
    /// Meta field prefix of this path.
    meta: MetaFieldPath,
    /// Optional field value segment.
    field_value: Option<String>,
}

impl FieldPath {
    /// Creates a field path from a meta field prefix and an optional value.
    #[must_use]
    pub const fn new(meta: MetaFieldPath, field_value: Option<String>) -> Self {
        Self {
            meta,
            field_value,
        }
    }

    /// Returns the group name segment.
    #[must_use]
    pub fn group_name(&self) -> &str {
        self.meta.group_name()
    }

    /// Returns the dictionary name segment.
    #[must_use]
    pub fn dictionary_name(&self) -> &str {
        self.meta.dictionary_name()
    }

    /// Returns the meta field name segment.
    #[must_use]
    pub fn field_name(&self) -> &str {
        self.meta.field_name()
    }

    /// Returns the field value segment when present.
    #[must_use]
    pub fn field_value(&self) -> Option<&str> {
        self.field_value.as_deref()
    }

    /// Returns the meta field prefix of this path.
    #[must_use]
    pub const fn meta_field_path(&self) -> &MetaFieldPath {
        &self.meta
    }

    /// Returns the dictionary prefix of this path.
    #[must_use]
    pub fn dictionary_path(&self) -> DictionaryPath {
        self.meta.dictionary_path()
    }

    /// Returns a copy of this path with a replaced value segment.
    #[must_use]
    pub fn with_value(&self, field_value: Option<String>) -> Self {
        Self::new(self.meta.clone(), field_value)
    }
}

impl PartialEq for FieldPath {
    fn eq(&self, other: &Self) -> bool {
        self.meta == other.meta && self.field_value == other.field_value
    }
}

impl Eq for FieldPath {}

impl Hash for FieldPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.meta.hash(state);
        self.field_value.hash(state);
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field_value {
            Some(value) => write!(f, "{}='{}'", self.meta, value),
            None => write!(f, "{}=<none>", self.meta),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::missing_docs_in_private_items,
        reason = "Test-only assertions are permitted."
    )]

    use std::collections::HashMap;

    use super::DictionaryPath;
    use super::FieldPath;
    use super::MetaFieldPath;

    #[test]
    fn name_segments_compare_case_insensitively() {
        let lower = DictionaryPath::new("group", "dict");
        let upper = DictionaryPath::new("GROUP", "Dict");
        assert_eq!(lower, upper);

        let meta_lower = MetaFieldPath::new("group", "DICT", "code");
        let meta_upper = MetaFieldPath::new("GROUP", "dict", "CODE");
        assert_eq!(meta_lower, meta_upper);
    }

    #[test]
    fn value_segment_compares_case_sensitively() {
        let meta = MetaFieldPath::new("group", "dict", "code");
        assert_ne!(meta.value("value"), meta.value("VALUE"));
        assert_eq!(meta.value("value"), meta.value("value"));
    }

    #[test]
    fn absent_value_is_distinct_from_empty_value() {
        let meta = MetaFieldPath::new("group", "dict", "code");
        assert_ne!(meta.no_value(), meta.value(""));
    }

    #[test]
    fn equal_paths_hash_to_the_same_bucket() {
        let mut index: HashMap<MetaFieldPath, u32> = HashMap::new();
        index.insert(MetaFieldPath::new("Group", "Dict", "Code"), 1);
        assert_eq!(index.get(&MetaFieldPath::new("gRoUp", "dIcT", "cOdE")), Some(&1));
    }

    #[test]
    fn segment_boundaries_do_not_collide() {
        let split_early = DictionaryPath::new("ab", "c");
        let split_late = DictionaryPath::new("a", "bc");
        assert_ne!(split_early, split_late);
    }

    #[test]
    fn display_forms_are_stable() {
        let field = FieldPath::new(MetaFieldPath::new("hr", "country", "code"), Some("RU".into()));
        assert_eq!(field.to_string(), "hr.country[code]='RU'");
        assert_eq!(field.meta_field_path().to_string(), "hr.country[code]");
        assert_eq!(field.dictionary_path().to_string(), "hr.country");
    }
}
