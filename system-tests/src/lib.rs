// system-tests/src/lib.rs
// ============================================================================
// Module: Refdict System Test Harness
// Description: Shared wiring of stores, engines, and the task substrate.
// Purpose: Drive end-to-end recode scenarios against the in-memory stack.
// Dependencies: refdict-config, refdict-core, refdict-store-memory, refdict-tasks
// ============================================================================

//! ## Overview
//! The harness wires the full in-memory stack the way an embedding host
//! would: stores, event bus, hierarchy and recode engines, the propagation
//! listener, the notification aggregator, and a performer registry. Tests
//! drive operator-level scenarios through it and assert on the observable
//! surfaces (rule graph, history, notifications, events, progress).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use refdict_config::RefdictConfig;
use refdict_core::CoreError;
use refdict_core::Dictionary;
use refdict_core::DocumentState;
use refdict_core::Field;
use refdict_core::FieldId;
use refdict_core::FieldPath;
use refdict_core::Group;
use refdict_core::MetaField;
use refdict_core::MetaFieldFlags;
use refdict_core::MetaFieldPath;
use refdict_core::PermissionMask;
use refdict_core::RecodeRule;
use refdict_core::RecodeRuleSet;
use refdict_core::RecordId;
use refdict_core::RuleId;
use refdict_core::RuleSetId;
use refdict_core::RuleSetState;
use refdict_core::Timestamp;
use refdict_core::interfaces::EventBus;
use refdict_core::interfaces::HierarchyStore;
use refdict_core::interfaces::RuleBatch;
use refdict_core::interfaces::Sequence;
use refdict_core::runtime::HierarchyEngine;
use refdict_core::runtime::NotificationAggregator;
use refdict_core::runtime::PropagationEngine;
use refdict_core::runtime::RecodeEngine;
use refdict_store_memory::AtomicSequence;
use refdict_store_memory::MemoryHierarchyStore;
use refdict_store_memory::MemoryHistoryStore;
use refdict_store_memory::MemoryNotificationStore;
use refdict_store_memory::MemoryRuleStore;
use refdict_store_memory::RecordingListener;
use refdict_store_memory::StaticPerformerRegistry;
use refdict_store_memory::SyncEventBus;
use refdict_tasks::TaskLauncher;

// ============================================================================
// SECTION: Harness
// ============================================================================

/// Author recorded on harness-driven changes.
pub const AUTHOR: &str = "system-tests";

/// Fully wired in-memory Refdict stack.
pub struct Harness {
    /// Hierarchy store.
    pub hierarchy_store: Arc<MemoryHierarchyStore>,
    /// Rule store.
    pub rule_store: Arc<MemoryRuleStore>,
    /// History store.
    pub history_store: Arc<MemoryHistoryStore>,
    /// Notification store.
    pub notification_store: Arc<MemoryNotificationStore>,
    /// Event bus.
    pub bus: Arc<SyncEventBus>,
    /// Identifier sequence.
    pub sequence: Arc<AtomicSequence>,
    /// Event recorder subscribed to the bus.
    pub recorder: Arc<RecordingListener>,
    /// Hierarchy write engine.
    pub hierarchy: Arc<HierarchyEngine>,
    /// Rule resolution engine.
    pub engine: Arc<RecodeEngine>,
    /// Propagation listener.
    pub propagation: Arc<PropagationEngine>,
    /// Notification aggregator.
    pub aggregator: Arc<NotificationAggregator>,
    /// Performer registry.
    pub performers: Arc<StaticPerformerRegistry>,
    /// Validated configuration.
    pub config: RefdictConfig,
}

impl Harness {
    /// Wires a fresh stack with default configuration.
    ///
    /// # Panics
    ///
    /// Panics when wiring fails; the harness is test-only.
    #[must_use]
    #[allow(clippy::expect_used, reason = "Harness wiring failures should abort the test.")]
    pub fn new() -> Self {
        let config = RefdictConfig::load(None).expect("default config");
        let hierarchy_store = Arc::new(MemoryHierarchyStore::new());
        let rule_store = Arc::new(MemoryRuleStore::new());
        let history_store = Arc::new(MemoryHistoryStore::new());
        let notification_store = Arc::new(MemoryNotificationStore::new());
        let bus = Arc::new(SyncEventBus::new());
        let sequence = Arc::new(AtomicSequence::new());

        let engine = Arc::new(
            RecodeEngine::builder()
                .hierarchy(hierarchy_store.clone())
                .rules(rule_store.clone())
                .history(history_store.clone())
                .bus(bus.clone())
                .sequence(sequence.clone())
                .build()
                .expect("recode engine"),
        );
        let hierarchy = Arc::new(
            HierarchyEngine::builder()
                .hierarchy(hierarchy_store.clone())
                .history(history_store.clone())
                .bus(bus.clone())
                .sequence(sequence.clone())
                .guard(engine.clone())
                .build()
                .expect("hierarchy engine"),
        );
        let propagation =
            Arc::new(PropagationEngine::new(hierarchy_store.clone(), engine.clone(), AUTHOR));
        bus.subscribe(propagation.clone());
        let aggregator = Arc::new(NotificationAggregator::new(
            notification_store.clone(),
            bus.clone(),
            sequence.clone(),
            config.window_millis(),
        ));
        bus.subscribe(aggregator.clone());
        let recorder = Arc::new(RecordingListener::new());
        bus.subscribe(recorder.clone());

        Self {
            hierarchy_store,
            rule_store,
            history_store,
            notification_store,
            bus,
            sequence,
            recorder,
            hierarchy,
            engine,
            propagation,
            aggregator,
            performers: Arc::new(StaticPerformerRegistry::new()),
            config,
        }
    }

    /// Builds a launcher over the harness performers and bus.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, reason = "Config ranges fit in usize.")]
    pub fn launcher(&self) -> TaskLauncher {
        TaskLauncher::new(
            self.performers.clone(),
            self.bus.clone(),
            self.sequence.clone(),
            self.config.tasks.workers as usize,
            self.config.tasks.queue_capacity as usize,
        )
    }

    /// Returns a deterministic timestamp `offset` milliseconds into the run.
    #[must_use]
    pub const fn ts(offset: i64) -> Timestamp {
        Timestamp::from_unix_millis(1_700_000_000_000 + offset)
    }

    /// Creates a group, a dictionary, its primary column, and one field per
    /// value, returning the seeded structure.
    ///
    /// # Errors
    ///
    /// Returns engine errors from any of the creation steps.
    pub fn seed_dictionary(
        &self,
        group_name: &str,
        dictionary_name: &str,
        column_name: &str,
        values: &[&str],
        now: Timestamp,
    ) -> Result<Seeded, CoreError> {
        let group = match self.hierarchy_store.find_group_by_name(group_name)? {
            Some(existing) => existing,
            None => self.hierarchy.create_group(
                group_name,
                AUTHOR,
                PermissionMask::READ.union(PermissionMask::WRITE),
                now,
                AUTHOR,
            )?,
        };
        let dictionary =
            self.hierarchy.create_dictionary(&group.id, dictionary_name, "", now, AUTHOR)?;
        let meta_field = self.hierarchy.create_meta_field(
            &dictionary.id,
            column_name,
            0,
            MetaFieldFlags::PRIMARY.union(MetaFieldFlags::UNIQUE),
            now,
            AUTHOR,
        )?;
        let mut fields = Vec::new();
        for (position, value) in values.iter().enumerate() {
            fields.push(self.hierarchy.create_field(
                &meta_field.id,
                RecordId::new(format!("{dictionary_name}-{position}")),
                Some((*value).to_string()),
                now,
                AUTHOR,
            )?);
        }
        Ok(Seeded {
            group,
            dictionary,
            meta_field,
            fields,
        })
    }

    /// Creates an active rule set mapping values between two seeded
    /// dictionaries through the validated mutation path.
    ///
    /// # Errors
    ///
    /// Returns validation or store errors from the engine.
    pub fn link(
        &self,
        name: &str,
        from: &Seeded,
        to: &Seeded,
        pairs: &[(&str, &str)],
        default_to: Option<&str>,
        now: Timestamp,
    ) -> Result<RecodeRuleSet, CoreError> {
        let from_path = from.meta_field_path();
        let to_path = to.meta_field_path();
        let default_field = default_to.and_then(|value| to.field_by_value(value));
        let rule_set = RecodeRuleSet {
            id: RuleSetId::new(self.sequence.next_id("rule_set")),
            name: name.to_string(),
            from_meta_field_id: from.meta_field.id.clone(),
            to_meta_field_id: to.meta_field.id.clone(),
            from_path: from_path.clone(),
            to_path: to_path.clone(),
            default_field_id: default_field.map(|field| field.id.clone()),
            default_path: default_field.and_then(|field| {
                field.value.as_ref().map(|value| to_path.value(value.clone()))
            }),
            rule_set_state: RuleSetState::Active,
            state: DocumentState::created(now),
        };
        let mut batch = RuleBatch {
            create_sets: vec![rule_set.clone()],
            ..RuleBatch::default()
        };
        for (from_value, to_value) in pairs {
            let from_field = from.field_by_value(from_value).ok_or_else(|| {
                CoreError::UnknownField {
                    path: from_path.value((*from_value).to_string()),
                }
            })?;
            let to_field = to.field_by_value(to_value).ok_or_else(|| {
                CoreError::UnknownField {
                    path: to_path.value((*to_value).to_string()),
                }
            })?;
            batch.create_rules.push(RecodeRule {
                id: RuleId::new(self.sequence.next_id("rule")),
                rule_set_id: rule_set.id.clone(),
                from_field_id: from_field.id.clone(),
                to_field_id: to_field.id.clone(),
                from_path: from_path.value((*from_value).to_string()),
                to_path: to_path.value((*to_value).to_string()),
                state: DocumentState::created(now),
            });
        }
        self.engine.modify(batch, true, now, AUTHOR)?;
        Ok(rule_set)
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SECTION: Recode Performer
// ============================================================================

/// Performer name under which [`RecodePerformer`] registers.
pub const RECODE_PERFORMER: &str = "dictionary-recode";

/// Batch recode performer: maps every value of a source column into the
/// target dictionary, publishing one outcome event per value and smooth
/// hierarchical progress.
pub struct RecodePerformer {
    /// Hierarchy store for source value enumeration.
    hierarchy_store: Arc<MemoryHierarchyStore>,
    /// Resolution engine.
    engine: Arc<RecodeEngine>,
    /// Event bus for outcome events.
    bus: Arc<SyncEventBus>,
    /// Identifier sequence for event identifiers.
    sequence: Arc<AtomicSequence>,
}

impl RecodePerformer {
    /// Creates a performer over the harness collaborators.
    #[must_use]
    pub const fn new(
        hierarchy_store: Arc<MemoryHierarchyStore>,
        engine: Arc<RecodeEngine>,
        bus: Arc<SyncEventBus>,
        sequence: Arc<AtomicSequence>,
    ) -> Self {
        Self {
            hierarchy_store,
            engine,
            bus,
            sequence,
        }
    }

    /// Reads one required string parameter.
    fn parameter(
        parameters: &std::collections::BTreeMap<String, serde_json::Value>,
        name: &str,
    ) -> Result<String, refdict_core::interfaces::PerformerError> {
        parameters
            .get(name)
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| {
                refdict_core::interfaces::PerformerError::Failed(format!(
                    "missing task parameter: {name}"
                ))
            })
    }
}

impl refdict_core::interfaces::TaskPerformer for RecodePerformer {
    fn name(&self) -> &str {
        RECODE_PERFORMER
    }

    fn perform(
        &self,
        ctx: &dyn refdict_core::interfaces::TaskContext,
        parameters: &std::collections::BTreeMap<String, serde_json::Value>,
    ) -> Result<
        std::collections::BTreeMap<String, serde_json::Value>,
        refdict_core::interfaces::PerformerError,
    > {
        use refdict_core::interfaces::PerformerError;

        let from_path = MetaFieldPath::new(
            Self::parameter(parameters, "from_group")?,
            Self::parameter(parameters, "from_dictionary")?,
            Self::parameter(parameters, "from_field")?,
        );
        let to_path = MetaFieldPath::new(
            Self::parameter(parameters, "to_group")?,
            Self::parameter(parameters, "to_dictionary")?,
            Self::parameter(parameters, "to_field")?,
        );
        let now = refdict_tasks::now_millis();

        let tracker = refdict_tasks::ProgressTracker::new(2);
        ctx.publish_progress("resolving", tracker.total_progress());
        let resolved = self
            .engine
            .find_rule_set_by_paths(&from_path, &to_path, true, false)
            .map_err(|err| PerformerError::Failed(err.to_string()))?
            .ok_or_else(|| PerformerError::Failed("rule set resolved to nothing".to_string()))?;
        let from_meta = self
            .engine
            .resolve_meta_field(&from_path)
            .map_err(|err| PerformerError::Failed(err.to_string()))?;
        let sources = self
            .hierarchy_store
            .find_fields_by_meta_field(&from_meta.id)
            .map_err(|err| PerformerError::Failed(err.to_string()))?;
        tracker.next_step();
        ctx.publish_progress("resolved", tracker.total_progress());

        let rule_set_name = resolved.name.clone();
        let total = u32::try_from(sources.len().max(1)).unwrap_or(u32::MAX);
        let recoding = tracker.child(total);
        let mut recoded = 0_u64;
        let mut failed = 0_u64;
        for field in &sources {
            if ctx.is_cancel_requested() {
                return Err(PerformerError::Canceled);
            }
            let source_path =
                FieldPath::new(from_path.clone(), field.value.clone());
            match resolved.recode(field.value.as_deref()) {
                Some(target) => {
                    recoded += 1;
                    let event = refdict_core::Event::RecodeSuccess(
                        refdict_core::RecodeSuccessEvent {
                            event_id: refdict_core::EventId::new(self.sequence.next_id("event")),
                            rule_set_name: rule_set_name.clone(),
                            from_path: source_path,
                            to_path: target.clone(),
                            event_date: now,
                        },
                    );
                    let _ = self.bus.publish(&event);
                }
                None => {
                    failed += 1;
                    let event = refdict_core::Event::RecodeFailed(refdict_core::RecodeFailedEvent {
                        event_id: refdict_core::EventId::new(self.sequence.next_id("event")),
                        rule_set_name: rule_set_name.clone(),
                        from_path: source_path,
                        to_path: resolved.to_path.dictionary_path(),
                        kind: refdict_core::NotifyKind::MissingRule,
                        cause: "no rule matches the source value".to_string(),
                        event_date: now,
                    });
                    let _ = self.bus.publish(&event);
                }
            }
            recoding.next_step();
            ctx.publish_progress("recoding", recoding.total_progress());
        }

        let mut values = std::collections::BTreeMap::new();
        values.insert("total".to_string(), serde_json::json!(sources.len()));
        values.insert("recoded".to_string(), serde_json::json!(recoded));
        values.insert("failed".to_string(), serde_json::json!(failed));
        Ok(values)
    }
}

// ============================================================================
// SECTION: Seeded Structure
// ============================================================================

/// One seeded dictionary with its primary column and fields.
pub struct Seeded {
    /// Owning group.
    pub group: Group,
    /// Seeded dictionary.
    pub dictionary: Dictionary,
    /// Primary column.
    pub meta_field: MetaField,
    /// Created fields in seed order.
    pub fields: Vec<Field>,
}

impl Seeded {
    /// Returns the named path of the primary column.
    #[must_use]
    pub fn meta_field_path(&self) -> MetaFieldPath {
        MetaFieldPath::new(
            self.group.name.clone(),
            self.dictionary.name.clone(),
            self.meta_field.name.clone(),
        )
    }

    /// Finds a seeded field by its value.
    #[must_use]
    pub fn field_by_value(&self, value: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.value.as_deref() == Some(value))
    }

    /// Returns the identifier of the field holding `value`.
    #[must_use]
    pub fn field_id(&self, value: &str) -> Option<FieldId> {
        self.field_by_value(value).map(|field| field.id.clone())
    }
}
