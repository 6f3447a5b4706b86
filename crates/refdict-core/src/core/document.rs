// crates/refdict-core/src/core/document.rs
// ============================================================================
// Module: Refdict Document Hierarchy
// Description: Group, dictionary, meta field, field, and record documents.
// Purpose: Model the four-level ownership tree that recode rules reference.
// Dependencies: crate::core::{change, identifiers, time}, serde
// ============================================================================

//! ## Overview
//! The document hierarchy is a four-level ownership tree: a [`Group`] owns
//! [`Dictionary`] documents, a dictionary owns [`MetaField`] columns, and each
//! column owns [`Field`] cell values grouped into logical [`Record`] rows.
//! Children reference their parent by identifier; parents enumerate children
//! through the store interfaces. Every document carries a [`DocumentState`]
//! audit envelope that is excluded from content hashing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::change::ChangeKind;
use crate::core::identifiers::DictionaryId;
use crate::core::identifiers::FieldId;
use crate::core::identifiers::GroupId;
use crate::core::identifiers::HistoryId;
use crate::core::identifiers::MetaFieldId;
use crate::core::identifiers::RecordId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted length of a document name, in characters.
pub const NAME_MAX_LEN: usize = 255;

// ============================================================================
// SECTION: Audit Envelope
// ============================================================================

/// Audit envelope carried by every hierarchy document.
///
/// # Invariants
/// - Excluded from content hashing and diffing.
/// - `change_kind` reflects the last recorded change event for the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentState {
    /// Kind of the last recorded change.
    pub change_kind: ChangeKind,
    /// Date of the last recorded change.
    pub change_date: Timestamp,
    /// Identifier of the history record describing the last change.
    pub history_id: Option<HistoryId>,
}

impl DocumentState {
    /// Creates an envelope for a freshly created document.
    #[must_use]
    pub const fn created(change_date: Timestamp) -> Self {
        Self {
            change_kind: ChangeKind::Create,
            change_date,
            history_id: None,
        }
    }

    /// Returns true when the document has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.change_kind == ChangeKind::Close
    }
}

// ============================================================================
// SECTION: Permission Mask
// ============================================================================

/// Permission bitmask attached to a group.
///
/// # Invariants
/// - Unknown bits are preserved verbatim for forward compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionMask(u32);

impl PermissionMask {
    /// Holders may read dictionary contents.
    pub const READ: Self = Self(1);
    /// Holders may modify dictionary contents.
    pub const WRITE: Self = Self(1 << 1);
    /// Holders may administer the group itself.
    pub const ADMINISTER: Self = Self(1 << 2);

    /// Creates a mask from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw bits of the mask.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns the union of this mask and `other`.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns true when every bit of `other` is set in this mask.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

// ============================================================================
// SECTION: Meta Field Flags
// ============================================================================

/// Flag bitmask attached to a meta field.
///
/// # Invariants
/// - Exactly one meta field per dictionary carries [`Self::PRIMARY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetaFieldFlags(u8);

impl MetaFieldFlags {
    /// The column forms the primary key of its dictionary.
    pub const PRIMARY: Self = Self(1);
    /// Values of the column must be unique within the dictionary.
    pub const UNIQUE: Self = Self(1 << 1);
    /// The column is hidden from operator-facing listings.
    pub const HIDDEN: Self = Self(1 << 2);

    /// Creates a flag set from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Returns the raw bits of the flag set.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns the union of this flag set and `other`.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns true when every bit of `other` is set in this flag set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true when the primary flag is set.
    #[must_use]
    pub const fn is_primary(self) -> bool {
        self.contains(Self::PRIMARY)
    }

    /// Returns true when the unique flag is set.
    #[must_use]
    pub const fn is_unique(self) -> bool {
        self.contains(Self::UNIQUE)
    }
}

// ============================================================================
// SECTION: Group
// ============================================================================

/// Top-level dictionary namespace, typically an owning source system.
///
/// # Invariants
/// - `name` is non-empty and unique among all groups, case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Generated identifier.
    pub id: GroupId,
    /// Unique group name.
    pub name: String,
    /// Operator or system owning the group.
    pub owner: String,
    /// Permission bitmask for the group.
    pub permissions: PermissionMask,
    /// Audit envelope.
    pub state: DocumentState,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group '{}'", self.name)
    }
}

// ============================================================================
// SECTION: Dictionary
// ============================================================================

/// A reference table of values owned by a group.
///
/// # Invariants
/// - Belongs to exactly one group; `name` is unique within that group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dictionary {
    /// Generated identifier.
    pub id: DictionaryId,
    /// Identifier of the owning group.
    pub group_id: GroupId,
    /// Dictionary name, unique within the group.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Audit envelope.
    pub state: DocumentState,
}

impl fmt::Display for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dictionary '{}'", self.name)
    }
}

// ============================================================================
// SECTION: Meta Field
// ============================================================================

/// A column definition of a dictionary.
///
/// # Invariants
/// - `name` is unique within the owning dictionary.
/// - `ordinal` orders columns for composed keys and display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaField {
    /// Generated identifier.
    pub id: MetaFieldId,
    /// Identifier of the owning dictionary.
    pub dictionary_id: DictionaryId,
    /// Column name, unique within the dictionary.
    pub name: String,
    /// Stable column position.
    pub ordinal: u32,
    /// Column flags.
    pub flags: MetaFieldFlags,
    /// Audit envelope.
    pub state: DocumentState,
}

impl fmt::Display for MetaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "meta field '{}'", self.name)
    }
}

// ============================================================================
// SECTION: Field
// ============================================================================

/// A single cell value tied to a meta field and a logical record.
///
/// # Invariants
/// - `name` equals the owning record identifier.
/// - `value` is unique within the meta field when the column is UNIQUE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Generated identifier.
    pub id: FieldId,
    /// Identifier of the owning meta field.
    pub meta_field_id: MetaFieldId,
    /// Owning record identifier.
    pub name: RecordId,
    /// Cell value; absent values are distinct from empty ones.
    pub value: Option<String>,
    /// Audit envelope.
    pub state: DocumentState,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "field '{}'='{}'", self.name, value),
            None => write!(f, "field '{}'=<none>", self.name),
        }
    }
}

// ============================================================================
// SECTION: Record
// ============================================================================

/// A logical dictionary row assembled from fields keyed by column name.
///
/// # Invariants
/// - At least the primary field is present.
/// - Keys are owning meta field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Record identifier, shared by all member fields.
    pub id: RecordId,
    /// Member fields keyed by meta field name.
    pub fields: BTreeMap<String, Field>,
}

impl Record {
    /// Returns the member field for the given column name, if present.
    #[must_use]
    pub fn field(&self, meta_field_name: &str) -> Option<&Field> {
        self.fields.get(meta_field_name)
    }
}
