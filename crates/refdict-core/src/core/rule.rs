// crates/refdict-core/src/core/rule.rs
// ============================================================================
// Module: Refdict Recode Rules
// Description: Recode rule sets and concrete value mapping rules.
// Purpose: Model the rule graph between meta fields of different dictionaries.
// Dependencies: crate::core::{document, identifiers, path}, serde
// ============================================================================

//! ## Overview
//! A [`RecodeRuleSet`] declares that values of one meta field may be recoded
//! into another meta field, optionally with a default target value. Concrete
//! per-value mappings are [`RecodeRule`] entries inside the set. Both levels
//! carry name-based paths alongside identifiers so the rule graph survives
//! identifier regeneration; the paths are derived data and excluded from
//! content hashing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::document::DocumentState;
use crate::core::identifiers::FieldId;
use crate::core::identifiers::MetaFieldId;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::RuleSetId;
use crate::core::path::FieldPath;
use crate::core::path::MetaFieldPath;

// ============================================================================
// SECTION: Rule Set State
// ============================================================================

/// Lifecycle state of a recode rule set.
///
/// # Invariants
/// - `Active → Closed` is the only transition; closed sets never reopen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSetState {
    /// The set accepts rule changes and participates in resolution.
    Active,
    /// The set is retired; resolution and mutation are refused.
    Closed,
}

// ============================================================================
// SECTION: Recode Rule Set
// ============================================================================

/// Declared mapping between two meta fields of different dictionaries.
///
/// # Invariants
/// - `from_meta_field_id != to_meta_field_id` (self-mapping is rejected).
/// - At most one active set exists per ordered (from, to) pair.
/// - A blank symbolic name defaults to the generated identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecodeRuleSet {
    /// Generated identifier.
    pub id: RuleSetId,
    /// Symbolic name of the set, unique among active sets.
    pub name: String,
    /// Source meta field identifier.
    pub from_meta_field_id: MetaFieldId,
    /// Target meta field identifier.
    pub to_meta_field_id: MetaFieldId,
    /// Name-based address of the source meta field (derived).
    pub from_path: MetaFieldPath,
    /// Name-based address of the target meta field (derived).
    pub to_path: MetaFieldPath,
    /// Default target field applied when no rule matches.
    pub default_field_id: Option<FieldId>,
    /// Name-based address of the default target value (derived).
    pub default_path: Option<FieldPath>,
    /// Lifecycle state.
    pub rule_set_state: RuleSetState,
    /// Audit envelope.
    pub state: DocumentState,
}

impl RecodeRuleSet {
    /// Returns true when the set is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.rule_set_state == RuleSetState::Active
    }

    /// Returns true when the set declares a default target value.
    #[must_use]
    pub const fn has_default(&self) -> bool {
        self.default_field_id.is_some()
    }

    /// Fills a blank symbolic name with the generated identifier.
    #[must_use]
    pub fn with_defaulted_name(mut self) -> Self {
        if self.name.trim().is_empty() {
            self.name = self.id.as_str().to_string();
        }
        self
    }
}

impl fmt::Display for RecodeRuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule set '{}' {} -> {}", self.name, self.from_path, self.to_path)
    }
}

// ============================================================================
// SECTION: Recode Rule
// ============================================================================

/// Concrete value mapping between two fields within a rule set.
///
/// # Invariants
/// - The from/to fields belong to the owning set's from/to meta fields.
/// - `from_field_id != to_field_id` (self-mapping is rejected).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecodeRule {
    /// Generated identifier.
    pub id: RuleId,
    /// Identifier of the owning rule set.
    pub rule_set_id: RuleSetId,
    /// Source field identifier.
    pub from_field_id: FieldId,
    /// Target field identifier.
    pub to_field_id: FieldId,
    /// Name-based address of the source value (derived).
    pub from_path: FieldPath,
    /// Name-based address of the target value (derived).
    pub to_path: FieldPath,
    /// Audit envelope.
    pub state: DocumentState,
}

impl fmt::Display for RecodeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule {} -> {}", self.from_path, self.to_path)
    }
}

// ============================================================================
// SECTION: Effective Rule Views
// ============================================================================

/// Resolved view of a rule set, either direct or composed transitively.
///
/// # Invariants
/// - `chain` lists the traversed set identifiers in composition order; a
///   direct resolution carries exactly one element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRuleSet {
    /// Symbolic name of the view: the set's own name, or the chained names
    /// joined for a composed view.
    pub name: String,
    /// Source meta field address of the effective mapping.
    pub from_path: MetaFieldPath,
    /// Target meta field address of the effective mapping.
    pub to_path: MetaFieldPath,
    /// Traversed rule set identifiers in composition order.
    pub chain: Vec<RuleSetId>,
    /// Effective value mappings joined across the chain.
    pub rules: Vec<EffectiveRule>,
    /// Effective default target, taken from the terminal set.
    pub default_path: Option<FieldPath>,
}

impl ResolvedRuleSet {
    /// Returns true when the view was composed across more than one set.
    #[must_use]
    pub fn is_transitive(&self) -> bool {
        self.chain.len() > 1
    }

    /// Maps a source value through the effective rules.
    ///
    /// Value comparison is case-sensitive; when no rule matches, the
    /// configured default target is returned instead, if any.
    #[must_use]
    pub fn recode(&self, value: Option<&str>) -> Option<&FieldPath> {
        self.rules
            .iter()
            .find(|rule| rule.from_path.field_value() == value)
            .map(|rule| &rule.to_path)
            .or(self.default_path.as_ref())
    }
}

/// One effective value mapping inside a [`ResolvedRuleSet`].
///
/// # Invariants
/// - For composed views, `from` belongs to the chain's source meta field and
///   `to` to its terminal meta field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveRule {
    /// Source field identifier.
    pub from_field_id: FieldId,
    /// Target field identifier.
    pub to_field_id: FieldId,
    /// Source value address.
    pub from_path: FieldPath,
    /// Target value address.
    pub to_path: FieldPath,
}
