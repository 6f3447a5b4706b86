// crates/refdict-core/src/core/error.rs
// ============================================================================
// Module: Refdict Error Taxonomy
// Description: Structured engine errors with a category discriminator.
// Purpose: Report constraint, not-found, and incomplete-data failures uniformly.
// Dependencies: crate::core::{identifiers, path}, thiserror
// ============================================================================

//! ## Overview
//! Engine failures are tagged variants of a single [`CoreError`] enumeration.
//! Each variant carries the failed path or identifier for diagnostics, and
//! [`CoreError::category`] classifies it as a caller-fixable constraint
//! violation, a not-found condition, or incomplete data. Resolution calls
//! offer a `quietly` mode in which not-found conditions become `Ok(None)`
//! instead of errors; constraint violations are never silenced.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::identifiers::RuleSetId;
use crate::core::path::DictionaryPath;
use crate::core::path::FieldPath;
use crate::core::path::MetaFieldPath;

// ============================================================================
// SECTION: Error Categories
// ============================================================================

/// Coarse classification of an engine failure.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Non-retryable, caller-fixable constraint violation.
    Constraint,
    /// A referenced document, rule, or definition does not exist.
    NotFound,
    /// Required data is missing to complete the operation.
    IncompleteData,
}

// ============================================================================
// SECTION: Core Errors
// ============================================================================

/// Engine error with structured diagnostics.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Every variant carries the identifying path or name that failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A document name is empty or exceeds the accepted length.
    #[error("illegal document name: '{name}'")]
    IllegalName {
        /// The rejected name.
        name: String,
    },
    /// A document name collides with an existing sibling.
    #[error("duplicate document name: '{name}'")]
    DuplicateName {
        /// The colliding name.
        name: String,
    },
    /// A rule or rule set maps a source onto itself.
    #[error("mapping '{path}' to itself is not allowed")]
    SelfMapping {
        /// The self-referential meta field address.
        path: MetaFieldPath,
    },
    /// An active rule set already exists for the ordered pair.
    #[error("rule set for '{from}' -> '{to}' already exists")]
    DuplicateRuleSet {
        /// Source meta field address.
        from: MetaFieldPath,
        /// Target meta field address.
        to: MetaFieldPath,
    },
    /// A rule references fields outside its owning set's meta fields.
    #[error("rule '{from}' -> '{to}' does not belong to its rule set")]
    IllegalRule {
        /// Source value address.
        from: FieldPath,
        /// Target value address.
        to: FieldPath,
    },
    /// A field value violates the UNIQUE constraint of its column.
    #[error("value '{value}' is not unique within '{path}'")]
    NotUniqueFieldValue {
        /// Meta field address of the column.
        path: MetaFieldPath,
        /// The duplicated value.
        value: String,
    },
    /// The primary meta field constraint would be violated.
    #[error("primary meta field constraint violated for '{path}'")]
    PrimaryMetaField {
        /// Meta field address whose primary flag is constrained.
        path: MetaFieldPath,
    },
    /// No group matches the requested name.
    #[error("unknown group: '{name}'")]
    UnknownGroup {
        /// The unmatched group name.
        name: String,
    },
    /// No dictionary matches the requested path.
    #[error("unknown dictionary: '{path}'")]
    UnknownDictionary {
        /// The unmatched dictionary address.
        path: DictionaryPath,
    },
    /// No meta field matches the requested path.
    #[error("unknown meta field: '{path}'")]
    UnknownMetaField {
        /// The unmatched meta field address.
        path: MetaFieldPath,
    },
    /// No field matches the requested path.
    #[error("unknown field: '{path}'")]
    UnknownField {
        /// The unmatched value address.
        path: FieldPath,
    },
    /// No rule set matches the requested ordered pair.
    #[error("unknown rule set: '{from}' -> '{to}'")]
    UnknownRuleSet {
        /// Source meta field address.
        from: MetaFieldPath,
        /// Target meta field address.
        to: MetaFieldPath,
    },
    /// No rule set carries the requested symbolic name.
    #[error("unknown rule set name: '{name}'")]
    UnknownRuleSetName {
        /// The unmatched symbolic name.
        name: String,
    },
    /// No rule matches the requested source within a set.
    #[error("unknown rule in set '{rule_set_id}' for source '{from}'")]
    UnknownRule {
        /// Owning rule set identifier.
        rule_set_id: RuleSetId,
        /// Source value address.
        from: FieldPath,
    },
    /// A required primary key value is missing.
    #[error("incomplete primary key for '{path}'")]
    IncompletePrimaryKey {
        /// Meta field address of the incomplete primary column.
        path: MetaFieldPath,
    },
    /// The store reported a consistency conflict the engine does not retry.
    #[error("store conflict: {message}")]
    StoreConflict {
        /// Collaborator-provided conflict description.
        message: String,
    },
}

impl CoreError {
    /// Returns the coarse category of this error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::IllegalName { .. }
            | Self::DuplicateName { .. }
            | Self::SelfMapping { .. }
            | Self::DuplicateRuleSet { .. }
            | Self::IllegalRule { .. }
            | Self::NotUniqueFieldValue { .. }
            | Self::PrimaryMetaField { .. }
            | Self::StoreConflict { .. } => ErrorCategory::Constraint,
            Self::UnknownGroup { .. }
            | Self::UnknownDictionary { .. }
            | Self::UnknownMetaField { .. }
            | Self::UnknownField { .. }
            | Self::UnknownRuleSet { .. }
            | Self::UnknownRuleSetName { .. }
            | Self::UnknownRule { .. } => ErrorCategory::NotFound,
            Self::IncompletePrimaryKey { .. } => ErrorCategory::IncompleteData,
        }
    }

    /// Returns true when the error is a not-found condition.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.category(), ErrorCategory::NotFound)
    }
}

/// Maps a not-found error to `Ok(None)` when `quietly` is set.
///
/// # Errors
///
/// Returns the original error when it is not a not-found condition or when
/// `quietly` is false.
pub fn quietly_absent<T>(result: Result<T, CoreError>, quietly: bool) -> Result<Option<T>, CoreError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if quietly && err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}
