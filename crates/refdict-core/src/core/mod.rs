// crates/refdict-core/src/core/mod.rs
// ============================================================================
// Module: Refdict Core Model
// Description: Data model modules for documents, paths, rules, and audit records.
// Purpose: Group the canonical model types behind one namespace.
// Dependencies: serde, serde_jcs, sha2, thiserror, time
// ============================================================================

//! ## Overview
//! The core model is purely descriptive: value types with stable wire forms
//! and no behavior beyond derivation helpers. Engines live under
//! [`crate::runtime`]; collaborator contracts under [`crate::interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod change;
pub mod document;
pub mod error;
pub mod events;
pub mod hashing;
pub mod identifiers;
pub mod notification;
pub mod path;
pub mod rule;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use change::ChangeKind;
pub use change::ChangeSet;
pub use change::Diff;
pub use change::History;
pub use document::Dictionary;
pub use document::DocumentState;
pub use document::Field;
pub use document::Group;
pub use document::MetaField;
pub use document::MetaFieldFlags;
pub use document::NAME_MAX_LEN;
pub use document::PermissionMask;
pub use document::Record;
pub use error::CoreError;
pub use error::ErrorCategory;
pub use error::quietly_absent;
pub use events::ChangeEvent;
pub use events::EntityKind;
pub use events::Event;
pub use events::RecodeFailedEvent;
pub use events::RecodeSuccessEvent;
pub use events::TaskLifecycleEvent;
pub use events::TaskProgressEvent;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use identifiers::DictionaryId;
pub use identifiers::EventId;
pub use identifiers::FieldId;
pub use identifiers::GroupId;
pub use identifiers::HistoryId;
pub use identifiers::MetaFieldId;
pub use identifiers::NotificationId;
pub use identifiers::RecordId;
pub use identifiers::RuleId;
pub use identifiers::RuleSetId;
pub use notification::DOCUMENT_NAME_LEN;
pub use notification::Notification;
pub use notification::NotificationKey;
pub use notification::NotifyKind;
pub use notification::NotifyState;
pub use path::DictionaryPath;
pub use path::FieldPath;
pub use path::MetaFieldPath;
pub use path::folded_eq;
pub use rule::EffectiveRule;
pub use rule::RecodeRule;
pub use rule::RecodeRuleSet;
pub use rule::ResolvedRuleSet;
pub use rule::RuleSetState;
pub use time::Timestamp;
