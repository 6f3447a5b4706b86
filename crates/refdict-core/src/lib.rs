// crates/refdict-core/src/lib.rs
// ============================================================================
// Module: Refdict Core Library
// Description: Data model, collaborator interfaces, and engines for dictionary recoding.
// Purpose: Resolve recode rules and propagate structural changes consistently.
// Dependencies: serde, serde_json, serde_jcs, sha2, thiserror, time
// ============================================================================

//! ## Overview
//! Refdict Core manages hierarchical reference data and the recode rule graph
//! between dictionaries. It addresses documents by case-insensitive named
//! paths, resolves rule sets directly or through transitive chains, computes
//! field-level diffs for audit history, propagates structural changes into
//! the rule graph, and aggregates recode outcomes into notifications.
//! Invariants:
//! - Rules never silently reference closed or missing structure.
//! - Self-mappings are rejected before persistence and composition.
//! - Mutation batches apply atomically relative to readers.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::ChangeKind;
pub use crate::core::ChangeSet;
pub use crate::core::CoreError;
pub use crate::core::Dictionary;
pub use crate::core::DictionaryId;
pub use crate::core::DictionaryPath;
pub use crate::core::Diff;
pub use crate::core::DocumentState;
pub use crate::core::EntityKind;
pub use crate::core::ErrorCategory;
pub use crate::core::Event;
pub use crate::core::EventId;
pub use crate::core::Field;
pub use crate::core::FieldId;
pub use crate::core::FieldPath;
pub use crate::core::Group;
pub use crate::core::GroupId;
pub use crate::core::History;
pub use crate::core::HistoryId;
pub use crate::core::MetaField;
pub use crate::core::MetaFieldFlags;
pub use crate::core::MetaFieldId;
pub use crate::core::MetaFieldPath;
pub use crate::core::Notification;
pub use crate::core::NotificationId;
pub use crate::core::NotificationKey;
pub use crate::core::NotifyKind;
pub use crate::core::NotifyState;
pub use crate::core::PermissionMask;
pub use crate::core::RecodeRule;
pub use crate::core::RecodeRuleSet;
pub use crate::core::Record;
pub use crate::core::RecordId;
pub use crate::core::ResolvedRuleSet;
pub use crate::core::RuleId;
pub use crate::core::RuleSetId;
pub use crate::core::RuleSetState;
pub use crate::core::TaskLifecycleEvent;
pub use crate::core::TaskProgressEvent;
pub use crate::core::Timestamp;
pub use crate::interfaces::BusError;
pub use crate::interfaces::EventBus;
pub use crate::interfaces::EventListener;
pub use crate::interfaces::HierarchyStore;
pub use crate::interfaces::HistoryStore;
pub use crate::interfaces::IndexError;
pub use crate::interfaces::NotificationStore;
pub use crate::interfaces::PerformerError;
pub use crate::interfaces::RebuildAck;
pub use crate::interfaces::RuleBatch;
pub use crate::interfaces::RuleStore;
pub use crate::interfaces::SearchIndex;
pub use crate::interfaces::Sequence;
pub use crate::interfaces::StoreError;
pub use crate::interfaces::TaskContext;
pub use crate::interfaces::TaskPerformer;
pub use crate::interfaces::TaskPerformerRegistry;
pub use crate::runtime::HierarchyEngine;
pub use crate::runtime::IndexRegistry;
pub use crate::runtime::NotificationAggregator;
pub use crate::runtime::PropagationEngine;
pub use crate::runtime::RecodeEngine;
