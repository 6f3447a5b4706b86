// crates/refdict-store-memory/src/lib.rs
// ============================================================================
// Module: Refdict Memory Store Library
// Description: In-memory reference implementations of the Refdict collaborators.
// Purpose: Back the engines for embedded use and integration testing.
// Dependencies: refdict-core
// ============================================================================

//! ## Overview
//! This crate implements every collaborator interface of `refdict-core` in
//! memory: snapshot-consistent stores, a synchronous event bus, a verbatim
//! search index, an atomic identifier sequence, and a static performer
//! registry. Durable deployments substitute their own store implementations
//! behind the same interfaces.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;
pub mod support;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::MemoryHierarchyStore;
pub use store::MemoryHistoryStore;
pub use store::MemoryNotificationStore;
pub use store::MemoryRuleStore;
pub use support::AtomicSequence;
pub use support::MemorySearchIndex;
pub use support::RecordingListener;
pub use support::StaticPerformerRegistry;
pub use support::SyncEventBus;
