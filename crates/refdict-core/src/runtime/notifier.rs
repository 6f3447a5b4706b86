// crates/refdict-core/src/runtime/notifier.rs
// ============================================================================
// Module: Refdict Notification Engine
// Description: Time-bucketed aggregation of recode outcomes.
// Purpose: Collapse per-value recode events into operator-facing notifications.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Every recode attempt emits a success or failure event. The aggregator
//! folds them into time-bucketed [`Notification`] documents keyed by rule
//! set, source, target, and classification: an open bucket for the key gets
//! an atomic count increment, otherwise a new pending bucket opens. Expired
//! buckets are announced once through the event bus. Marking notifications
//! processed is idempotent and is the only retirement path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::ChangeKind;
use crate::core::CoreError;
use crate::core::DictionaryPath;
use crate::core::EntityKind;
use crate::core::Event;
use crate::core::EventId;
use crate::core::FieldPath;
use crate::core::Notification;
use crate::core::NotificationId;
use crate::core::NotificationKey;
use crate::core::NotifyKind;
use crate::core::NotifyState;
use crate::core::Timestamp;
use crate::core::events::ChangeEvent;
use crate::core::notification::truncate_document_name;
use crate::interfaces::EventBus;
use crate::interfaces::EventListener;
use crate::interfaces::NotificationStore;
use crate::interfaces::Sequence;

// ============================================================================
// SECTION: Aggregator
// ============================================================================

/// Windowed aggregator of recode outcome events.
///
/// # Invariants
/// - Count increments are atomic per open (key, window) bucket.
/// - Replayed event identifiers never double-count.
pub struct NotificationAggregator {
    /// Notification store collaborator.
    store: Arc<dyn NotificationStore>,
    /// Event bus for expiry announcements.
    bus: Arc<dyn EventBus>,
    /// Identifier sequence collaborator.
    sequence: Arc<dyn Sequence>,
    /// Aggregation window length in milliseconds.
    window_millis: i64,
    /// Processed event identifiers for redelivery deduplication.
    processed: Mutex<HashSet<EventId>>,
    /// Buckets already announced by a flush.
    announced: Mutex<HashSet<NotificationId>>,
}

impl NotificationAggregator {
    /// Creates an aggregator with the given window length.
    #[must_use]
    pub fn new(
        store: Arc<dyn NotificationStore>,
        bus: Arc<dyn EventBus>,
        sequence: Arc<dyn Sequence>,
        window_millis: i64,
    ) -> Self {
        Self {
            store,
            bus,
            sequence,
            window_millis,
            processed: Mutex::new(HashSet::new()),
            announced: Mutex::new(HashSet::new()),
        }
    }

    // ------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------

    /// Records one successful recode outcome.
    ///
    /// # Errors
    ///
    /// Returns store-mapped errors when the bucket cannot be written.
    pub fn record_success(
        &self,
        rule_set_name: &str,
        from_path: &FieldPath,
        to_path: &FieldPath,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        let key = NotificationKey {
            kind: NotifyKind::RecodeSuccess,
            rule_set_name: truncate_document_name(rule_set_name),
            from_group_name: truncate_document_name(from_path.group_name()),
            from_dictionary_name: truncate_document_name(from_path.dictionary_name()),
            from_value: None,
            to_group_name: truncate_document_name(to_path.group_name()),
            to_dictionary_name: truncate_document_name(to_path.dictionary_name()),
        };
        self.append(key, now)
    }

    /// Records one failed recode outcome.
    ///
    /// The failing source value participates in the aggregation key so each
    /// unmapped value surfaces as its own notification.
    ///
    /// # Errors
    ///
    /// Returns store-mapped errors when the bucket cannot be written.
    pub fn record_failure(
        &self,
        rule_set_name: &str,
        from_path: &FieldPath,
        to_path: &DictionaryPath,
        kind: NotifyKind,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        let key = NotificationKey {
            kind,
            rule_set_name: truncate_document_name(rule_set_name),
            from_group_name: truncate_document_name(from_path.group_name()),
            from_dictionary_name: truncate_document_name(from_path.dictionary_name()),
            from_value: from_path.field_value().map(truncate_document_name),
            to_group_name: truncate_document_name(to_path.group_name()),
            to_dictionary_name: truncate_document_name(to_path.dictionary_name()),
        };
        self.append(key, now)
    }

    /// Folds one outcome into its open bucket or opens a new one.
    fn append(&self, key: NotificationKey, now: Timestamp) -> Result<(), CoreError> {
        if let Some(bucket) = self.store.find_open_bucket(&key, now)? {
            self.store.increment_count(&bucket.id)?;
            return Ok(());
        }
        let notification = Notification {
            id: NotificationId::new(self.sequence.next_id("notification")),
            kind: key.kind,
            rule_set_name: key.rule_set_name,
            from_group_name: key.from_group_name,
            from_dictionary_name: key.from_dictionary_name,
            from_value: key.from_value,
            to_group_name: key.to_group_name,
            to_dictionary_name: key.to_dictionary_name,
            count: 1,
            start_date: now,
            end_date: now.saturating_add_millis(self.window_millis),
            processing_state: NotifyState::Pending,
            processing_date: None,
            processing_author: None,
        };
        Ok(self.store.insert(notification)?)
    }

    // ------------------------------------------------------------------
    // Queries and lifecycle
    // ------------------------------------------------------------------

    /// Lists pending notifications.
    ///
    /// # Errors
    ///
    /// Returns store-mapped errors when the lookup fails.
    pub fn query_pending(&self) -> Result<Vec<Notification>, CoreError> {
        Ok(self.store.find_pending()?)
    }

    /// Marks notifications processed; the only retirement path.
    ///
    /// Already processed identifiers are skipped without error, so replaying
    /// the call yields the same end state.
    ///
    /// # Errors
    ///
    /// Returns store-mapped errors for unknown identifiers.
    pub fn change_notify_state(
        &self,
        ids: &[NotificationId],
        now: Timestamp,
        author: &str,
    ) -> Result<Vec<NotificationId>, CoreError> {
        let mut transitioned = Vec::new();
        for id in ids {
            if self.store.set_processed(id, now, author)? {
                transitioned.push(id.clone());
            }
        }
        Ok(transitioned)
    }

    /// Announces buckets whose window expired, once per bucket.
    ///
    /// Returns the newly announced notifications.
    ///
    /// # Errors
    ///
    /// Returns store-mapped errors when the lookup or publication fails.
    pub fn flush(&self, now: Timestamp) -> Result<Vec<Notification>, CoreError> {
        let pending = self.store.find_pending()?;
        let mut expired = Vec::new();
        {
            let mut announced = self.announced.lock().map_err(|_| CoreError::StoreConflict {
                message: "notification aggregator poisoned".to_string(),
            })?;
            for notification in pending {
                if notification.end_date <= now && announced.insert(notification.id.clone()) {
                    expired.push(notification);
                }
            }
        }
        if expired.is_empty() {
            return Ok(expired);
        }
        let event = Event::Change(ChangeEvent {
            event_id: EventId::new(self.sequence.next_id("event")),
            entity_kind: EntityKind::Notification,
            change_kind: ChangeKind::Create,
            target_ids: expired.iter().map(|notification| notification.id.to_string()).collect(),
            event_date: now,
        });
        self.bus.publish(&event).map_err(|err| CoreError::StoreConflict {
            message: err.to_string(),
        })?;
        Ok(expired)
    }

    /// Returns true when the event was not seen before.
    fn first_delivery(&self, event_id: &EventId) -> bool {
        self.processed
            .lock()
            .map(|mut processed| processed.insert(event_id.clone()))
            .unwrap_or(false)
    }
}

impl EventListener for NotificationAggregator {
    fn on_event(&self, event: &Event) {
        match event {
            Event::RecodeSuccess(success) => {
                if self.first_delivery(&success.event_id) {
                    // Aggregation failures are surfaced by the recording
                    // caller; listener delivery has no error channel.
                    let _ = self.record_success(
                        &success.rule_set_name,
                        &success.from_path,
                        &success.to_path,
                        success.event_date,
                    );
                }
            }
            Event::RecodeFailed(failed) => {
                if self.first_delivery(&failed.event_id) {
                    let _ = self.record_failure(
                        &failed.rule_set_name,
                        &failed.from_path,
                        &failed.to_path,
                        failed.kind,
                        failed.event_date,
                    );
                }
            }
            Event::Change(_) | Event::TaskLifecycle(_) | Event::TaskProgress(_) => {}
        }
    }
}
