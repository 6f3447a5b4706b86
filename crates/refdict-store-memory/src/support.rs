// crates/refdict-store-memory/src/support.rs
// ============================================================================
// Module: Memory Collaborators
// Description: In-memory event bus, search index, sequence, and performer registry.
// Purpose: Provide the non-store collaborators the engines are wired against.
// Dependencies: refdict-core, std
// ============================================================================

//! ## Overview
//! Reference implementations of the remaining collaborator interfaces. The
//! bus dispatches synchronously in publish order, which realizes the
//! per-entity ordering guarantee without a queue; the index stores rendered
//! documents verbatim; the sequence is a single atomic counter.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use refdict_core::EntityKind;
use refdict_core::Event;
use refdict_core::interfaces::BusError;
use refdict_core::interfaces::EventBus;
use refdict_core::interfaces::EventListener;
use refdict_core::interfaces::IndexError;
use refdict_core::interfaces::RebuildAck;
use refdict_core::interfaces::SearchIndex;
use refdict_core::interfaces::Sequence;
use refdict_core::interfaces::TaskPerformer;
use refdict_core::interfaces::TaskPerformerRegistry;

// ============================================================================
// SECTION: Event Bus
// ============================================================================

/// Synchronous in-process event bus.
///
/// # Invariants
/// - Listeners are invoked in registration order, in the publisher's thread;
///   events for one entity therefore arrive in publish order.
#[derive(Default)]
pub struct SyncEventBus {
    /// Registered listeners.
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl SyncEventBus {
    /// Creates a bus with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventBus for SyncEventBus {
    fn publish(&self, event: &Event) -> Result<(), BusError> {
        // Dispatch outside the lock: listeners may publish follow-up events.
        let listeners = self
            .listeners
            .read()
            .map_err(|_| BusError::Publish("event bus lock poisoned".to_string()))?
            .clone();
        for listener in &listeners {
            listener.on_event(event);
        }
        Ok(())
    }

    fn subscribe(&self, listener: Arc<dyn EventListener>) {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.push(listener);
        }
    }
}

/// Listener that records every delivered event.
///
/// # Invariants
/// - Events are stored in delivery order.
#[derive(Default)]
pub struct RecordingListener {
    /// Recorded events.
    events: Mutex<Vec<Event>>,
}

impl RecordingListener {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

impl EventListener for RecordingListener {
    fn on_event(&self, event: &Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

// ============================================================================
// SECTION: Search Index
// ============================================================================

/// In-memory search index storing rendered documents.
///
/// # Invariants
/// - Documents are keyed by (entity kind, identifier).
#[derive(Default)]
pub struct MemorySearchIndex {
    /// Indexed documents.
    documents: RwLock<BTreeMap<(String, String), Vec<(String, String)>>>,
}

impl MemorySearchIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of indexed documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.read().map(|documents| documents.len()).unwrap_or(0)
    }

    /// Returns true when nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SearchIndex for MemorySearchIndex {
    fn upsert(
        &self,
        entity_kind: EntityKind,
        id: &str,
        attributes: &[(String, String)],
    ) -> Result<(), IndexError> {
        let mut documents = self
            .documents
            .write()
            .map_err(|_| IndexError::Index("search index lock poisoned".to_string()))?;
        documents.insert((entity_kind.label().to_string(), id.to_string()), attributes.to_vec());
        Ok(())
    }

    fn delete(&self, entity_kind: EntityKind, id: &str) -> Result<(), IndexError> {
        let mut documents = self
            .documents
            .write()
            .map_err(|_| IndexError::Index("search index lock poisoned".to_string()))?;
        documents.remove(&(entity_kind.label().to_string(), id.to_string()));
        Ok(())
    }

    fn rebuild(&self, entity_kind: Option<EntityKind>) -> Result<RebuildAck, IndexError> {
        let documents = self
            .documents
            .read()
            .map_err(|_| IndexError::Index("search index lock poisoned".to_string()))?;
        let count = match entity_kind {
            Some(kind) => documents.keys().filter(|(label, _)| label == kind.label()).count(),
            None => documents.len(),
        };
        Ok(RebuildAck {
            entity_kind,
            documents: count,
        })
    }
}

// ============================================================================
// SECTION: Sequence
// ============================================================================

/// Monotonic atomic identifier sequence.
///
/// # Invariants
/// - Identifiers never repeat within one instance.
#[derive(Default)]
pub struct AtomicSequence {
    /// Next counter value.
    counter: AtomicU64,
}

impl AtomicSequence {
    /// Creates a sequence starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sequence for AtomicSequence {
    fn next_id(&self, prefix: &str) -> String {
        let value = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}-{value:08}")
    }
}

// ============================================================================
// SECTION: Performer Registry
// ============================================================================

/// Static registry of task performers built at wiring time.
///
/// # Invariants
/// - Names are unique; later registrations replace earlier ones.
#[derive(Default)]
pub struct StaticPerformerRegistry {
    /// Performers by name.
    performers: RwLock<BTreeMap<String, Arc<dyn TaskPerformer>>>,
}

impl StaticPerformerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a performer under its own name.
    pub fn register(&self, performer: Arc<dyn TaskPerformer>) {
        if let Ok(mut performers) = self.performers.write() {
            performers.insert(performer.name().to_string(), performer);
        }
    }
}

impl TaskPerformerRegistry for StaticPerformerRegistry {
    fn find_performer(&self, name: &str) -> Option<Arc<dyn TaskPerformer>> {
        self.performers.read().ok()?.get(name).cloned()
    }
}
