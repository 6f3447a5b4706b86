// crates/refdict-tasks/src/lib.rs
// ============================================================================
// Module: Refdict Tasks Library
// Description: Task execution substrate with cancellation and weighted progress.
// Purpose: Drive long-running batch operations for the Refdict engines.
// Dependencies: refdict-core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The task substrate executes registered performers on a fixed worker pool:
//! asynchronous and blocking submission, at-most-one-concurrent-execution per
//! descriptor, cooperative cancellation, and hierarchical weighted progress
//! reporting through the event bus.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod launcher;
pub mod model;
pub mod progress;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use launcher::TaskError;
pub use launcher::TaskLauncher;
pub use launcher::now_millis;
pub use model::DescriptorId;
pub use model::TASK_DESCRIPTOR_DESCRIPTOR;
pub use model::TaskDescriptor;
pub use model::TaskExecution;
pub use model::TaskResult;
pub use model::TaskStatus;
pub use progress::ProgressTracker;
