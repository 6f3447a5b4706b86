// crates/refdict-core/src/runtime/propagation.rs
// ============================================================================
// Module: Refdict Dependency Propagation Engine
// Description: Structural change listener that maintains the rule graph.
// Purpose: Close or re-derive rules affected by hierarchy changes.
// Dependencies: crate::core, crate::interfaces, crate::runtime::resolver
// ============================================================================

//! ## Overview
//! The propagation engine subscribes to structural change events and feeds
//! the affected documents into [`RecodeEngine::modify_by_dependencies`].
//! Delivery is at-least-once, so the engine keeps its own processed-event
//! set; a replayed event identifier is a no-op, and the downstream history
//! identity check provides a second idempotency layer. Failures never leave
//! partial cascades: the underlying mutation is all-or-nothing, and errors
//! are retained for host inspection instead of being swallowed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::CoreError;
use crate::core::EntityKind;
use crate::core::Event;
use crate::core::EventId;
use crate::core::events::ChangeEvent;
use crate::interfaces::EventListener;
use crate::interfaces::HierarchyStore;
use crate::runtime::resolver::DependencyChange;
use crate::runtime::resolver::RecodeEngine;

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Structural change listener maintaining the rule graph.
///
/// # Invariants
/// - Replayed event identifiers are ignored.
/// - Propagation across different entities is commutative; per-entity events
///   are handled in delivery order.
pub struct PropagationEngine {
    /// Hierarchy store used to load changed documents.
    hierarchy: Arc<dyn HierarchyStore>,
    /// Rule engine applying the consequences.
    engine: Arc<RecodeEngine>,
    /// Author recorded on propagated changes.
    author: String,
    /// Processed event identifiers for redelivery deduplication.
    processed: Mutex<HashSet<EventId>>,
    /// Errors retained for host inspection.
    errors: Mutex<Vec<(EventId, CoreError)>>,
}

impl PropagationEngine {
    /// Creates a propagation engine recording changes under `author`.
    #[must_use]
    pub fn new(
        hierarchy: Arc<dyn HierarchyStore>,
        engine: Arc<RecodeEngine>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            hierarchy,
            engine,
            author: author.into(),
            processed: Mutex::new(HashSet::new()),
            errors: Mutex::new(Vec::new()),
        }
    }

    /// Drains the errors retained since the last call.
    #[must_use]
    pub fn drain_errors(&self) -> Vec<(EventId, CoreError)> {
        match self.errors.lock() {
            Ok(mut errors) => errors.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Returns true when the event was not seen before.
    fn first_delivery(&self, event_id: &EventId) -> bool {
        self.processed
            .lock()
            .map(|mut processed| processed.insert(event_id.clone()))
            .unwrap_or(false)
    }

    /// Loads the changed documents and applies the consequences.
    fn propagate(&self, change: &ChangeEvent) -> Result<(), CoreError> {
        let dependencies = match change.entity_kind {
            EntityKind::Group => {
                let mut groups = Vec::new();
                for target_id in &change.target_ids {
                    if let Some(group) =
                        self.hierarchy.find_group_by_id(&target_id.as_str().into())?
                    {
                        groups.push(group);
                    }
                }
                DependencyChange::Groups(groups)
            }
            EntityKind::Dictionary => {
                let mut dictionaries = Vec::new();
                for target_id in &change.target_ids {
                    if let Some(dictionary) =
                        self.hierarchy.find_dictionary_by_id(&target_id.as_str().into())?
                    {
                        dictionaries.push(dictionary);
                    }
                }
                DependencyChange::Dictionaries(dictionaries)
            }
            EntityKind::MetaField => {
                let mut meta_fields = Vec::new();
                for target_id in &change.target_ids {
                    if let Some(meta_field) =
                        self.hierarchy.find_meta_field_by_id(&target_id.as_str().into())?
                    {
                        meta_fields.push(meta_field);
                    }
                }
                DependencyChange::MetaFields(meta_fields)
            }
            EntityKind::Field => {
                let mut fields = Vec::new();
                for target_id in &change.target_ids {
                    if let Some(field) =
                        self.hierarchy.find_field_by_id(&target_id.as_str().into())?
                    {
                        fields.push(field);
                    }
                }
                DependencyChange::Fields(fields)
            }
            // Rule graph and notification events are this engine's own
            // output surface, never its input.
            EntityKind::RuleSet | EntityKind::Rule | EntityKind::Notification => return Ok(()),
        };
        self.engine.modify_by_dependencies(&dependencies, change.event_date, &self.author)?;
        Ok(())
    }
}

impl EventListener for PropagationEngine {
    fn on_event(&self, event: &Event) {
        let Event::Change(change) = event else {
            return;
        };
        if !self.first_delivery(&change.event_id) {
            return;
        }
        if let Err(err) = self.propagate(change)
            && let Ok(mut errors) = self.errors.lock()
        {
            errors.push((change.event_id.clone(), err));
        }
    }
}
