// crates/refdict-tasks/src/progress.rs
// ============================================================================
// Module: Hierarchical Progress
// Description: Weighted progress trackers composing across nesting levels.
// Purpose: Report smooth aggregate progress for batch jobs with sub-jobs.
// Dependencies: std
// ============================================================================

//! ## Overview
//! A root tracker advances through `N` weighted steps; a child tracker is
//! scoped to the parent's next step and maps its own progress proportionally
//! into that single step. Each advance recomputes the node's fraction as
//! `(completed_steps + child_fraction) / total_steps` and propagates it up
//! the parent chain, so the root reports a smooth aggregate at every depth.
//! Invariants:
//! - `current_progress` and `total_progress` are in `[0.0, 1.0]`.
//! - Progress is non-decreasing while steps only move forward.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

// ============================================================================
// SECTION: Tracker Nodes
// ============================================================================

/// Mutable progress state of one node.
#[derive(Debug, Default)]
struct ProgressState {
    /// Completed steps of this node.
    current_step: u32,
    /// Current fraction of this node, including child contribution.
    fraction: f64,
}

/// One node in the tracker hierarchy.
#[derive(Debug)]
struct ProgressNode {
    /// Declared step count of this node.
    total_steps: u32,
    /// Guarded mutable state.
    state: Mutex<ProgressState>,
    /// Parent node, absent for the root.
    parent: Option<Arc<ProgressNode>>,
}

impl ProgressNode {
    /// Recomputes this node's fraction and propagates it upward.
    fn advance(&self, child_fraction: f64) {
        let fraction = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            state.fraction =
                (f64::from(state.current_step) + child_fraction) / f64::from(self.total_steps);
            state.fraction
        };
        if let Some(parent) = &self.parent {
            parent.advance(fraction);
        }
    }

    /// Returns this node's current fraction.
    fn fraction(&self) -> f64 {
        self.state.lock().map(|state| state.fraction).unwrap_or(0.0)
    }

    /// Returns the root fraction of the hierarchy.
    fn root_fraction(&self) -> f64 {
        self.parent.as_ref().map_or_else(|| self.fraction(), |parent| parent.root_fraction())
    }
}

// ============================================================================
// SECTION: Tracker
// ============================================================================

/// Weighted hierarchical progress tracker.
///
/// # Invariants
/// - A child occupies exactly one step of its parent; completing the child
///   equals completing that step.
#[derive(Clone, Debug)]
pub struct ProgressTracker {
    /// Node of this tracker in the hierarchy.
    node: Arc<ProgressNode>,
}

impl ProgressTracker {
    /// Creates a root tracker with the given step count.
    ///
    /// A zero step count is clamped to one so the fraction stays defined.
    #[must_use]
    pub fn new(total_steps: u32) -> Self {
        Self {
            node: Arc::new(ProgressNode {
                total_steps: total_steps.max(1),
                state: Mutex::new(ProgressState::default()),
                parent: None,
            }),
        }
    }

    /// Creates a child tracker scoped to this tracker's next step.
    #[must_use]
    pub fn child(&self, total_steps: u32) -> Self {
        Self {
            node: Arc::new(ProgressNode {
                total_steps: total_steps.max(1),
                state: Mutex::new(ProgressState::default()),
                parent: Some(Arc::clone(&self.node)),
            }),
        }
    }

    /// Advances this tracker by one step and propagates upward.
    pub fn next_step(&self) {
        if let Ok(mut state) = self.node.state.lock() {
            state.current_step = state.current_step.saturating_add(1).min(self.node.total_steps);
        }
        self.node.advance(0.0);
    }

    /// Returns this tracker's own fraction.
    #[must_use]
    pub fn current_progress(&self) -> f64 {
        self.node.fraction()
    }

    /// Returns the aggregate fraction of the root tracker.
    #[must_use]
    pub fn total_progress(&self) -> f64 {
        self.node.root_fraction()
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
        clippy::float_cmp,
        clippy::missing_docs_in_private_items,
        reason = "Test-only assertions are permitted."
    )]

    use super::ProgressTracker;

    fn assert_progress(tracker: &ProgressTracker, current: f64, total: f64) {
        assert_eq!(tracker.current_progress(), current);
        assert_eq!(tracker.total_progress(), total);
    }

    #[test]
    fn root_progress_advances_by_step() {
        let root = ProgressTracker::new(2);
        assert_progress(&root, 0.0, 0.0);
        root.next_step();
        assert_progress(&root, 0.5, 0.5);
        root.next_step();
        assert_progress(&root, 1.0, 1.0);
    }

    #[test]
    fn child_progress_scales_into_one_parent_step() {
        let root = ProgressTracker::new(2);
        let child = root.child(4);
        child.next_step();
        assert_progress(&child, 0.25, 0.125);
        child.next_step();
        assert_progress(&child, 0.5, 0.25);
        child.next_step();
        assert_progress(&child, 0.75, 0.375);
        child.next_step();
        assert_progress(&child, 1.0, 0.5);
        // The completed child equals the parent's first step.
        root.next_step();
        assert_progress(&root, 0.5, 0.5);
    }

    #[test]
    fn grandchild_composition_is_recursive() {
        let root = ProgressTracker::new(2);
        root.next_step();
        assert_progress(&root, 0.5, 0.5);
        let child = root.child(4);
        child.next_step();
        assert_progress(&child, 0.25, 0.625);
        let grandchild = child.child(4);
        grandchild.next_step();
        assert_progress(&grandchild, 0.25, 0.65625);
        grandchild.next_step();
        assert_progress(&grandchild, 0.5, 0.6875);
        grandchild.next_step();
        assert_progress(&grandchild, 0.75, 0.71875);
        grandchild.next_step();
        assert_progress(&grandchild, 1.0, 0.75);
        child.next_step();
        assert_progress(&child, 0.5, 0.75);
    }
}
