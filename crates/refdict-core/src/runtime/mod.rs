// crates/refdict-core/src/runtime/mod.rs
// ============================================================================
// Module: Refdict Runtime Engines
// Description: Diffing, resolution, propagation, notification, and indexing engines.
// Purpose: Group the engines operating over the collaborator interfaces.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Runtime engines are synchronous and thread-safe: they own no threads and
//! are invoked within the caller's unit of work, possibly concurrently. Each
//! engine is constructed over the collaborator interfaces and publishes its
//! observations as typed events.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod diffing;
pub mod hierarchy;
pub mod notifier;
pub mod propagation;
pub mod registry;
pub mod resolver;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use diffing::AttributeSpec;
pub use diffing::DICTIONARY_DESCRIPTOR;
pub use diffing::EntityDescriptor;
pub use diffing::FIELD_DESCRIPTOR;
pub use diffing::GROUP_DESCRIPTOR;
pub use diffing::META_FIELD_DESCRIPTOR;
pub use diffing::NOTIFICATION_DESCRIPTOR;
pub use diffing::RULE_DESCRIPTOR;
pub use diffing::RULE_SET_DESCRIPTOR;
pub use hierarchy::ChangeGuard;
pub use hierarchy::HierarchyEngine;
pub use hierarchy::HierarchyEngineBuilder;
pub use notifier::NotificationAggregator;
pub use propagation::PropagationEngine;
pub use registry::IndexCapabilities;
pub use registry::IndexRegistry;
pub use registry::IndexedAttribute;
pub use resolver::DependencyChange;
pub use resolver::RecodeEngine;
pub use resolver::RecodeEngineBuilder;
