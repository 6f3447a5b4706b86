// crates/refdict-core/src/runtime/resolver.rs
// ============================================================================
// Module: Refdict Rule Resolution Engine
// Description: Rule set resolution, transitive composition, and batch mutation.
// Purpose: Answer recode queries and keep the rule graph consistent under change.
// Dependencies: crate::core, crate::interfaces, crate::runtime::diffing
// ============================================================================

//! ## Overview
//! The [`RecodeEngine`] resolves rule sets by named path, composes transitive
//! chains across intermediate dictionaries, and applies validated mutation
//! batches atomically. It owns no threads; callers invoke it synchronously
//! and may do so concurrently.
//! Invariants:
//! - Self-mappings are rejected before any store access or composition.
//! - Transitive resolution visits each meta field at most once and therefore
//!   terminates on cyclic graphs.
//! - `modify` validates the whole batch before writing anything.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::core::ChangeKind;
use crate::core::ChangeSet;
use crate::core::CoreError;
use crate::core::Dictionary;
use crate::core::EffectiveRule;
use crate::core::EntityKind;
use crate::core::Event;
use crate::core::EventId;
use crate::core::Field;
use crate::core::FieldId;
use crate::core::FieldPath;
use crate::core::Group;
use crate::core::GroupId;
use crate::core::History;
use crate::core::HistoryId;
use crate::core::MetaField;
use crate::core::MetaFieldId;
use crate::core::MetaFieldPath;
use crate::core::RecodeRule;
use crate::core::RecodeRuleSet;
use crate::core::ResolvedRuleSet;
use crate::core::RuleSetId;
use crate::core::Timestamp;
use crate::core::events::ChangeEvent;
use crate::interfaces::EventBus;
use crate::interfaces::HierarchyStore;
use crate::interfaces::HistoryStore;
use crate::interfaces::RuleBatch;
use crate::interfaces::RuleStore;
use crate::interfaces::Sequence;
use crate::runtime::diffing::RULE_DESCRIPTOR;
use crate::runtime::diffing::RULE_SET_DESCRIPTOR;

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builder for a [`RecodeEngine`].
///
/// # Invariants
/// - `build` succeeds only when every collaborator is configured.
#[derive(Default)]
pub struct RecodeEngineBuilder {
    /// Hierarchy store collaborator.
    hierarchy: Option<Arc<dyn HierarchyStore>>,
    /// Rule store collaborator.
    rules: Option<Arc<dyn RuleStore>>,
    /// History store collaborator.
    history: Option<Arc<dyn HistoryStore>>,
    /// Event bus collaborator.
    bus: Option<Arc<dyn EventBus>>,
    /// Identifier sequence collaborator.
    sequence: Option<Arc<dyn Sequence>>,
}

impl RecodeEngineBuilder {
    /// Registers the hierarchy store.
    #[must_use]
    pub fn hierarchy(mut self, hierarchy: Arc<dyn HierarchyStore>) -> Self {
        self.hierarchy = Some(hierarchy);
        self
    }

    /// Registers the rule store.
    #[must_use]
    pub fn rules(mut self, rules: Arc<dyn RuleStore>) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Registers the history store.
    #[must_use]
    pub fn history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    /// Registers the event bus.
    #[must_use]
    pub fn bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Registers the identifier sequence.
    #[must_use]
    pub fn sequence(mut self, sequence: Arc<dyn Sequence>) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Builds the engine.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreConflict`] naming the missing collaborator.
    pub fn build(self) -> Result<RecodeEngine, CoreError> {
        /// Reports a missing collaborator by name.
        fn missing(name: &str) -> CoreError {
            CoreError::StoreConflict {
                message: format!("recode engine collaborator not configured: {name}"),
            }
        }
        Ok(RecodeEngine {
            hierarchy: self.hierarchy.ok_or_else(|| missing("hierarchy"))?,
            rules: self.rules.ok_or_else(|| missing("rules"))?,
            history: self.history.ok_or_else(|| missing("history"))?,
            bus: self.bus.ok_or_else(|| missing("bus"))?,
            sequence: self.sequence.ok_or_else(|| missing("sequence"))?,
        })
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Rule resolution and mutation engine over the store collaborators.
///
/// # Invariants
/// - Shared-reference methods only; safe under concurrent callers.
pub struct RecodeEngine {
    /// Hierarchy store collaborator.
    hierarchy: Arc<dyn HierarchyStore>,
    /// Rule store collaborator.
    rules: Arc<dyn RuleStore>,
    /// History store collaborator.
    history: Arc<dyn HistoryStore>,
    /// Event bus collaborator.
    bus: Arc<dyn EventBus>,
    /// Identifier sequence collaborator.
    sequence: Arc<dyn Sequence>,
}

impl RecodeEngine {
    /// Returns a builder for the engine.
    #[must_use]
    pub fn builder() -> RecodeEngineBuilder {
        RecodeEngineBuilder::default()
    }

    // ------------------------------------------------------------------
    // Path resolution
    // ------------------------------------------------------------------

    /// Resolves a meta field by named path, distinguishing an unknown
    /// dictionary from an unknown column for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownDictionary`] or
    /// [`CoreError::UnknownMetaField`] carrying the failed path.
    pub fn resolve_meta_field(&self, path: &MetaFieldPath) -> Result<MetaField, CoreError> {
        if let Some(meta_field) = self.hierarchy.find_meta_field_by_path(path)? {
            return Ok(meta_field);
        }
        let dictionary_path = path.dictionary_path();
        if self.hierarchy.find_dictionary_by_path(&dictionary_path)?.is_none() {
            return Err(CoreError::UnknownDictionary {
                path: dictionary_path,
            });
        }
        Err(CoreError::UnknownMetaField {
            path: path.clone(),
        })
    }

    // ------------------------------------------------------------------
    // Rule set resolution
    // ------------------------------------------------------------------

    /// Loads a rule set by symbolic name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IllegalName`] for a blank name and
    /// [`CoreError::UnknownRuleSetName`] when absent and not quiet.
    pub fn find_rule_set_by_name(
        &self,
        name: &str,
        quietly: bool,
    ) -> Result<Option<RecodeRuleSet>, CoreError> {
        if name.trim().is_empty() {
            return Err(CoreError::IllegalName {
                name: name.to_string(),
            });
        }
        match self.rules.find_rule_set_by_name(name)? {
            Some(rule_set) => Ok(Some(rule_set)),
            None if quietly => Ok(None),
            None => Err(CoreError::UnknownRuleSetName {
                name: name.to_string(),
            }),
        }
    }

    /// Resolves the effective rule set for an ordered (from, to) pair.
    ///
    /// With `fill_transitive`, a missing direct set is composed from a chain
    /// of active sets when one connects the pair.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SelfMapping`] for identical endpoints, not-found
    /// errors for unknown paths, and [`CoreError::UnknownRuleSet`] when no
    /// mapping exists and `quietly` is false.
    pub fn find_rule_set_by_paths(
        &self,
        from: &MetaFieldPath,
        to: &MetaFieldPath,
        fill_transitive: bool,
        quietly: bool,
    ) -> Result<Option<ResolvedRuleSet>, CoreError> {
        if from == to {
            return Err(CoreError::SelfMapping {
                path: from.clone(),
            });
        }
        let from_meta = match self.quiet_meta_field(from, quietly)? {
            Some(meta_field) => meta_field,
            None => return Ok(None),
        };
        let to_meta = match self.quiet_meta_field(to, quietly)? {
            Some(meta_field) => meta_field,
            None => return Ok(None),
        };
        if from_meta.id == to_meta.id {
            return Err(CoreError::SelfMapping {
                path: from.clone(),
            });
        }
        if let Some(rule_set) = self.rules.find_active_rule_set_by_pair(&from_meta.id, &to_meta.id)? {
            return Ok(Some(self.direct_view(&rule_set)?));
        }
        if fill_transitive
            && let Some(view) = self.compose_transitive(&from_meta, &to_meta)?
        {
            return Ok(Some(view));
        }
        if quietly {
            return Ok(None);
        }
        Err(CoreError::UnknownRuleSet {
            from: from.clone(),
            to: to.clone(),
        })
    }

    /// Resolves several ordered pairs in one call.
    ///
    /// Each pair resolves quietly; absent mappings yield `None` in the
    /// matching output position instead of failing the batch.
    ///
    /// # Errors
    ///
    /// Returns the first constraint error (for example a self-mapping);
    /// absence is never an error here.
    pub fn find_rule_sets_by_paths(
        &self,
        pairs: &[(MetaFieldPath, MetaFieldPath)],
        fill_transitive: bool,
    ) -> Result<Vec<Option<ResolvedRuleSet>>, CoreError> {
        let mut resolved = Vec::with_capacity(pairs.len());
        for (from, to) in pairs {
            resolved.push(self.find_rule_set_by_paths(from, to, fill_transitive, true)?);
        }
        Ok(resolved)
    }

    /// Resolves a meta field, mapping not-found to `None` when quiet.
    fn quiet_meta_field(
        &self,
        path: &MetaFieldPath,
        quietly: bool,
    ) -> Result<Option<MetaField>, CoreError> {
        match self.resolve_meta_field(path) {
            Ok(meta_field) => Ok(Some(meta_field)),
            Err(err) if quietly && err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Builds the resolved view of one direct rule set.
    fn direct_view(&self, rule_set: &RecodeRuleSet) -> Result<ResolvedRuleSet, CoreError> {
        let rules = self.rules.find_rules_by_set(&rule_set.id)?;
        Ok(ResolvedRuleSet {
            name: rule_set.name.clone(),
            from_path: rule_set.from_path.clone(),
            to_path: rule_set.to_path.clone(),
            chain: vec![rule_set.id.clone()],
            rules: rules
                .into_iter()
                .map(|rule| EffectiveRule {
                    from_field_id: rule.from_field_id,
                    to_field_id: rule.to_field_id,
                    from_path: rule.from_path,
                    to_path: rule.to_path,
                })
                .collect(),
            default_path: rule_set.default_path.clone(),
        })
    }

    /// Composes a transitive chain from `from` to `to` breadth-first.
    ///
    /// The search visits each meta field at most once, so it terminates in at
    /// most as many steps as there are distinct active rule sets, cycles
    /// included. The first complete chain wins.
    fn compose_transitive(
        &self,
        from: &MetaField,
        to: &MetaField,
    ) -> Result<Option<ResolvedRuleSet>, CoreError> {
        let active = self.rules.find_active_rule_sets()?;
        let mut adjacency: HashMap<&MetaFieldId, Vec<&RecodeRuleSet>> = HashMap::new();
        for rule_set in &active {
            adjacency.entry(&rule_set.from_meta_field_id).or_default().push(rule_set);
        }
        for neighbors in adjacency.values_mut() {
            neighbors.sort_by(|a, b| a.id.cmp(&b.id));
        }

        let mut visited: HashSet<&MetaFieldId> = HashSet::new();
        visited.insert(&from.id);
        let mut queue: VecDeque<(&MetaFieldId, Vec<&RecodeRuleSet>)> = VecDeque::new();
        queue.push_back((&from.id, Vec::new()));

        while let Some((current, chain)) = queue.pop_front() {
            let Some(neighbors) = adjacency.get(current) else {
                continue;
            };
            for &rule_set in neighbors {
                let mut next_chain = chain.clone();
                next_chain.push(rule_set);
                if rule_set.to_meta_field_id == to.id {
                    return Ok(Some(self.compose_chain(&next_chain)?));
                }
                if visited.insert(&rule_set.to_meta_field_id) {
                    queue.push_back((&rule_set.to_meta_field_id, next_chain));
                }
            }
        }
        Ok(None)
    }

    /// Joins the rules of a chain of sets into one effective view.
    fn compose_chain(&self, chain: &[&RecodeRuleSet]) -> Result<ResolvedRuleSet, CoreError> {
        let mut effective: Vec<EffectiveRule> = Vec::new();
        for (position, rule_set) in chain.iter().enumerate() {
            let segment = self.rules.find_rules_by_set(&rule_set.id)?;
            if position == 0 {
                effective = segment
                    .into_iter()
                    .map(|rule| EffectiveRule {
                        from_field_id: rule.from_field_id,
                        to_field_id: rule.to_field_id,
                        from_path: rule.from_path,
                        to_path: rule.to_path,
                    })
                    .collect();
                continue;
            }
            let by_from: HashMap<FieldId, RecodeRule> =
                segment.into_iter().map(|rule| (rule.from_field_id.clone(), rule)).collect();
            effective = effective
                .into_iter()
                .filter_map(|joined| {
                    by_from.get(&joined.to_field_id).map(|next| EffectiveRule {
                        from_field_id: joined.from_field_id,
                        to_field_id: next.to_field_id.clone(),
                        from_path: joined.from_path,
                        to_path: next.to_path.clone(),
                    })
                })
                .collect();
        }
        let first = chain.first().ok_or_else(|| CoreError::StoreConflict {
            message: "transitive chain is empty".to_string(),
        })?;
        let last = chain.last().ok_or_else(|| CoreError::StoreConflict {
            message: "transitive chain is empty".to_string(),
        })?;
        Ok(ResolvedRuleSet {
            name: chain
                .iter()
                .map(|rule_set| rule_set.name.as_str())
                .collect::<Vec<_>>()
                .join("->"),
            from_path: first.from_path.clone(),
            to_path: last.to_path.clone(),
            chain: chain.iter().map(|rule_set| rule_set.id.clone()).collect(),
            rules: effective,
            default_path: last.default_path.clone(),
        })
    }

    // ------------------------------------------------------------------
    // Rule queries
    // ------------------------------------------------------------------

    /// Lists rules of a set keyed to the given source field identifiers.
    ///
    /// # Errors
    ///
    /// Returns store-mapped errors when the lookup fails.
    pub fn find_rules_by_field_ids(
        &self,
        rule_set_id: &RuleSetId,
        from_field_ids: &[FieldId],
    ) -> Result<Vec<RecodeRule>, CoreError> {
        Ok(self.rules.find_rules_by_from_field_ids(rule_set_id, from_field_ids)?)
    }

    /// Finds dictionaries of a group that are not fully recodable.
    ///
    /// A dictionary is unmatched when it has no outbound rule sets, or when
    /// at least one outbound set without a default target leaves at least one
    /// primary value without a rule. A default-less set whose every primary
    /// value is mapped does not mark the dictionary unmatched.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownGroup`] when the group does not exist.
    pub fn find_unmatched_dictionaries(
        &self,
        group_id: &GroupId,
    ) -> Result<Vec<Dictionary>, CoreError> {
        if self.hierarchy.find_group_by_id(group_id)?.is_none() {
            return Err(CoreError::UnknownGroup {
                name: group_id.as_str().to_string(),
            });
        }
        let dictionaries = self.hierarchy.find_dictionaries_by_group(group_id)?;
        let mut unmatched = Vec::new();
        for dictionary in dictionaries {
            if self.is_dictionary_unmatched(&dictionary)? {
                unmatched.push(dictionary);
            }
        }
        Ok(unmatched)
    }

    /// Applies the unmatched-dictionary predicate to one dictionary.
    fn is_dictionary_unmatched(&self, dictionary: &Dictionary) -> Result<bool, CoreError> {
        let meta_fields = self.hierarchy.find_meta_fields_by_dictionary(&dictionary.id)?;
        let meta_field_ids: Vec<MetaFieldId> =
            meta_fields.iter().map(|meta_field| meta_field.id.clone()).collect();
        let outbound = self.rules.find_rule_sets_from_dictionary(&meta_field_ids)?;
        if outbound.is_empty() {
            return Ok(true);
        }
        let Some(primary) = self.hierarchy.find_primary_meta_field(&dictionary.id)? else {
            // A dictionary without a primary column cannot be recoded at all.
            return Ok(true);
        };
        let record_count = self.hierarchy.count_fields(&primary.id)?;
        for rule_set in &outbound {
            if rule_set.has_default() {
                continue;
            }
            let rule_count = self.rules.count_rules(&rule_set.id)?;
            if rule_count != record_count {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Applies a rule graph mutation batch, all-or-nothing.
    ///
    /// With `need_validation`, every member is checked before any write:
    /// self-mappings, unknown meta fields, rules outside their set's columns,
    /// rules keyed to valueless primary fields, and duplicate active pairs
    /// all abort the whole batch. Updates whose diff is empty are dropped as
    /// no-ops before the batch is applied.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure, or store-mapped errors when the
    /// atomic apply fails.
    pub fn modify(
        &self,
        batch: RuleBatch,
        need_validation: bool,
        now: Timestamp,
        author: &str,
    ) -> Result<Vec<ChangeSet>, CoreError> {
        let mut batch = batch;
        if need_validation {
            for rule_set in batch.create_sets.iter().chain(batch.update_sets.iter()) {
                self.validate_rule_set(rule_set)?;
            }
            let batch_sets: Vec<&RecodeRuleSet> =
                batch.create_sets.iter().chain(batch.update_sets.iter()).collect();
            for rule in batch.create_rules.iter().chain(batch.update_rules.iter()) {
                self.validate_rule(rule, &batch_sets)?;
            }
            for rule_set in &batch.create_sets {
                if self
                    .rules
                    .find_active_rule_set_by_pair(
                        &rule_set.from_meta_field_id,
                        &rule_set.to_meta_field_id,
                    )?
                    .is_some()
                {
                    return Err(CoreError::DuplicateRuleSet {
                        from: rule_set.from_path.clone(),
                        to: rule_set.to_path.clone(),
                    });
                }
            }
        }
        batch.create_sets = batch
            .create_sets
            .into_iter()
            .map(RecodeRuleSet::with_defaulted_name)
            .collect();
        self.drop_noop_updates(&mut batch)?;
        // Audit entries follow the successful apply so a store failure never
        // leaves history for changes that were not written.
        let applied = batch.clone();
        self.rules.apply_batch(batch)?;
        let change_sets = self.record_batch(&applied, now, author)?;
        for change_set in &change_sets {
            self.publish_rule_change(change_set, now)?;
        }
        Ok(change_sets)
    }

    /// Validates one rule set against structure and self-mapping constraints.
    fn validate_rule_set(&self, rule_set: &RecodeRuleSet) -> Result<(), CoreError> {
        if rule_set.from_meta_field_id == rule_set.to_meta_field_id
            || rule_set.from_path == rule_set.to_path
        {
            return Err(CoreError::SelfMapping {
                path: rule_set.from_path.clone(),
            });
        }
        self.resolve_meta_field(&rule_set.from_path)?;
        self.resolve_meta_field(&rule_set.to_path)?;
        Ok(())
    }

    /// Validates one rule against its owning set and field structure.
    ///
    /// The owning set may arrive in the same batch, so in-batch sets are
    /// consulted before the store.
    fn validate_rule(&self, rule: &RecodeRule, batch_sets: &[&RecodeRuleSet]) -> Result<(), CoreError> {
        if rule.from_field_id == rule.to_field_id {
            return Err(CoreError::SelfMapping {
                path: rule.from_path.meta_field_path().clone(),
            });
        }
        let in_batch =
            batch_sets.iter().find(|candidate| candidate.id == rule.rule_set_id).copied();
        let rule_set = match in_batch {
            Some(rule_set) => rule_set.clone(),
            None => self.rules.find_rule_set_by_id(&rule.rule_set_id)?.ok_or_else(|| {
                CoreError::UnknownRuleSetName {
                    name: rule.rule_set_id.as_str().to_string(),
                }
            })?,
        };
        let from_field = self.require_field(&rule.from_field_id, &rule.from_path)?;
        let to_field = self.require_field(&rule.to_field_id, &rule.to_path)?;
        if from_field.meta_field_id != rule_set.from_meta_field_id
            || to_field.meta_field_id != rule_set.to_meta_field_id
        {
            return Err(CoreError::IllegalRule {
                from: rule.from_path.clone(),
                to: rule.to_path.clone(),
            });
        }
        if from_field.value.is_none() {
            return Err(CoreError::IncompletePrimaryKey {
                path: rule.from_path.meta_field_path().clone(),
            });
        }
        Ok(())
    }

    /// Loads a field by identifier, reporting the named path on failure.
    fn require_field(
        &self,
        id: &FieldId,
        path: &FieldPath,
    ) -> Result<Field, CoreError> {
        self.hierarchy.find_field_by_id(id)?.ok_or_else(|| CoreError::UnknownField {
            path: path.clone(),
        })
    }

    /// Drops updates identical to the stored revision.
    ///
    /// Equality here covers derived paths as well: a re-derived path must
    /// still be written even though it is excluded from the content hash, so
    /// the hashed diff alone cannot decide the no-op.
    fn drop_noop_updates(&self, batch: &mut RuleBatch) -> Result<(), CoreError> {
        let mut kept_sets = Vec::with_capacity(batch.update_sets.len());
        for rule_set in batch.update_sets.drain(..) {
            match self.rules.find_rule_set_by_id(&rule_set.id)? {
                Some(existing) if existing == rule_set => {}
                _ => kept_sets.push(rule_set),
            }
        }
        batch.update_sets = kept_sets;

        let mut kept_rules = Vec::with_capacity(batch.update_rules.len());
        for rule in batch.update_rules.drain(..) {
            let existing = self
                .rules
                .find_rules_by_set(&rule.rule_set_id)?
                .into_iter()
                .find(|candidate| candidate.id == rule.id);
            match existing {
                Some(existing) if existing == rule => {}
                _ => kept_rules.push(rule),
            }
        }
        batch.update_rules = kept_rules;
        Ok(())
    }

    /// Records history entries for a batch and groups them into change sets.
    fn record_batch(
        &self,
        batch: &RuleBatch,
        now: Timestamp,
        author: &str,
    ) -> Result<Vec<ChangeSet>, CoreError> {
        let mut change_sets = Vec::new();

        let mut set_changes: Vec<(ChangeKind, Vec<String>)> = Vec::new();
        if !batch.create_sets.is_empty() {
            set_changes.push((
                ChangeKind::Create,
                batch.create_sets.iter().map(|rule_set| rule_set.id.to_string()).collect(),
            ));
        }
        if !batch.update_sets.is_empty() {
            set_changes.push((
                ChangeKind::Update,
                batch.update_sets.iter().map(|rule_set| rule_set.id.to_string()).collect(),
            ));
        }
        if !batch.close_sets.is_empty() {
            set_changes.push((
                ChangeKind::Close,
                batch.close_sets.iter().map(ToString::to_string).collect(),
            ));
        }
        for (kind, targets) in set_changes {
            change_sets.push(self.record_changes(RULE_SET_DESCRIPTOR.target_type, kind, &targets, now, author)?);
        }

        let mut rule_changes: Vec<(ChangeKind, Vec<String>)> = Vec::new();
        if !batch.create_rules.is_empty() {
            rule_changes.push((
                ChangeKind::Create,
                batch.create_rules.iter().map(|rule| rule.id.to_string()).collect(),
            ));
        }
        if !batch.update_rules.is_empty() {
            rule_changes.push((
                ChangeKind::Update,
                batch.update_rules.iter().map(|rule| rule.id.to_string()).collect(),
            ));
        }
        if !batch.close_rules.is_empty() {
            rule_changes.push((
                ChangeKind::Close,
                batch.close_rules.iter().map(ToString::to_string).collect(),
            ));
        }
        for (kind, targets) in rule_changes {
            change_sets.push(self.record_changes(RULE_DESCRIPTOR.target_type, kind, &targets, now, author)?);
        }

        Ok(change_sets.into_iter().filter(|change_set| !change_set.is_empty()).collect())
    }

    /// Appends one history entry per target, skipping replayed identities.
    fn record_changes(
        &self,
        target_type: &str,
        kind: ChangeKind,
        target_ids: &[String],
        now: Timestamp,
        author: &str,
    ) -> Result<ChangeSet, CoreError> {
        let mut change_set = ChangeSet::new(target_type, kind);
        for target_id in target_ids {
            let history = History {
                id: HistoryId::new(self.sequence.next_id("history")),
                target_id: target_id.clone(),
                target_type: target_type.to_string(),
                event_type: kind,
                event_date: now,
                event_author: author.to_string(),
                diffs: Vec::new(),
            };
            if self.history.append(history.clone())? {
                change_set.push(history);
            }
        }
        Ok(change_set)
    }

    /// Publishes a structural change event for one applied change set.
    fn publish_rule_change(&self, change_set: &ChangeSet, now: Timestamp) -> Result<(), CoreError> {
        let entity_kind = if change_set.target_type == RULE_SET_DESCRIPTOR.target_type {
            EntityKind::RuleSet
        } else {
            EntityKind::Rule
        };
        let event = Event::Change(ChangeEvent {
            event_id: EventId::new(self.sequence.next_id("event")),
            entity_kind,
            change_kind: change_set.change_kind,
            target_ids: change_set
                .histories
                .iter()
                .map(|history| history.target_id.clone())
                .collect(),
            event_date: now,
        });
        self.bus.publish(&event).map_err(|err| CoreError::StoreConflict {
            message: err.to_string(),
        })
    }

    // ------------------------------------------------------------------
    // Dependency maintenance
    // ------------------------------------------------------------------

    /// Rejects removal or reassignment of a referenced PRIMARY flag.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PrimaryMetaField`] when rule sets still reference
    /// the column positionally.
    pub fn check_meta_field_change(
        &self,
        older: &MetaField,
        newer: &MetaField,
    ) -> Result<(), CoreError> {
        if older.flags.is_primary()
            && !newer.flags.is_primary()
            && !self.rules.find_rule_sets_by_meta_field(&older.id)?.is_empty()
        {
            return Err(CoreError::PrimaryMetaField {
                path: self.meta_field_path(older)?,
            });
        }
        Ok(())
    }

    /// Recomputes rules and rule sets affected by changed dependencies.
    ///
    /// Renames re-derive the stored named paths; closures cascade into the
    /// rule graph: a closed meta field closes every referencing set (rules
    /// first), a closed field closes only the rules keyed to it, and closed
    /// dictionaries or groups are expressed through their meta fields.
    ///
    /// # Errors
    ///
    /// Returns validation or store-mapped errors; no partial cascade remains.
    pub fn modify_by_dependencies(
        &self,
        dependencies: &DependencyChange,
        now: Timestamp,
        author: &str,
    ) -> Result<Vec<ChangeSet>, CoreError> {
        let batch = match dependencies {
            DependencyChange::MetaFields(meta_fields) => self.batch_for_meta_fields(meta_fields)?,
            DependencyChange::Fields(fields) => self.batch_for_fields(fields)?,
            DependencyChange::Dictionaries(dictionaries) => {
                let mut meta_fields = Vec::new();
                for dictionary in dictionaries {
                    meta_fields
                        .extend(self.hierarchy.find_meta_fields_by_dictionary(&dictionary.id)?);
                }
                // Dictionary closure reaches the rule graph via its columns;
                // renamed dictionaries only re-derive paths.
                let carried: Vec<MetaField> = meta_fields
                    .into_iter()
                    .map(|meta_field| self.carry_kind(meta_field, dictionaries))
                    .collect();
                self.batch_for_meta_fields(&carried)?
            }
            DependencyChange::Groups(groups) => {
                let mut meta_fields = Vec::new();
                for group in groups {
                    for dictionary in self.hierarchy.find_dictionaries_by_group(&group.id)? {
                        meta_fields
                            .extend(self.hierarchy.find_meta_fields_by_dictionary(&dictionary.id)?);
                    }
                }
                let closing = groups
                    .iter()
                    .any(|group| group.state.change_kind == ChangeKind::Close);
                let carried: Vec<MetaField> = meta_fields
                    .into_iter()
                    .map(|mut meta_field| {
                        if closing {
                            meta_field.state.change_kind = ChangeKind::Close;
                        }
                        meta_field
                    })
                    .collect();
                self.batch_for_meta_fields(&carried)?
            }
        };
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        self.modify(batch, false, now, author)
    }

    /// Marks carried meta fields closed when their dictionary closed.
    fn carry_kind(&self, mut meta_field: MetaField, dictionaries: &[Dictionary]) -> MetaField {
        let closed = dictionaries.iter().any(|dictionary| {
            dictionary.id == meta_field.dictionary_id
                && dictionary.state.change_kind == ChangeKind::Close
        });
        if closed {
            meta_field.state.change_kind = ChangeKind::Close;
        }
        meta_field
    }

    /// Builds the maintenance batch for changed meta fields.
    fn batch_for_meta_fields(&self, meta_fields: &[MetaField]) -> Result<RuleBatch, CoreError> {
        let mut batch = RuleBatch::default();
        for meta_field in meta_fields {
            let referencing = self.rules.find_rule_sets_by_meta_field(&meta_field.id)?;
            if referencing.is_empty() {
                continue;
            }
            if meta_field.state.change_kind == ChangeKind::Close {
                for rule_set in referencing {
                    if !rule_set.is_active() {
                        continue;
                    }
                    // Rules close before their owning set so no rule ever
                    // references a closed set mid-cascade.
                    for rule in self.rules.find_rules_by_set(&rule_set.id)? {
                        batch.close_rules.push(rule.id);
                    }
                    batch.close_sets.push(rule_set.id);
                }
                continue;
            }
            for mut rule_set in referencing {
                if !rule_set.is_active() {
                    continue;
                }
                let renamed = self.rederive_set_paths(&mut rule_set, meta_field)?;
                if renamed {
                    batch.update_sets.push(rule_set);
                }
            }
        }
        dedup_batch(&mut batch);
        Ok(batch)
    }

    /// Re-derives the stored paths of a set touching the changed column.
    fn rederive_set_paths(
        &self,
        rule_set: &mut RecodeRuleSet,
        meta_field: &MetaField,
    ) -> Result<bool, CoreError> {
        let fresh = self.meta_field_path(meta_field)?;
        let mut changed = false;
        if rule_set.from_meta_field_id == meta_field.id && rule_set.from_path != fresh {
            rule_set.from_path = fresh.clone();
            changed = true;
        }
        if rule_set.to_meta_field_id == meta_field.id && rule_set.to_path != fresh {
            rule_set.to_path = fresh;
            changed = true;
        }
        Ok(changed)
    }

    /// Derives the current named path of a meta field from the hierarchy.
    fn meta_field_path(&self, meta_field: &MetaField) -> Result<MetaFieldPath, CoreError> {
        let dictionary = self
            .hierarchy
            .find_dictionary_by_id(&meta_field.dictionary_id)?
            .ok_or_else(|| CoreError::UnknownMetaField {
                path: MetaFieldPath::new("", "", meta_field.name.clone()),
            })?;
        let group = self.hierarchy.find_group_by_id(&dictionary.group_id)?.ok_or_else(|| {
            CoreError::UnknownGroup {
                name: dictionary.group_id.as_str().to_string(),
            }
        })?;
        Ok(MetaFieldPath::new(group.name, dictionary.name, meta_field.name.clone()))
    }

    /// Builds the maintenance batch for changed fields.
    fn batch_for_fields(&self, fields: &[Field]) -> Result<RuleBatch, CoreError> {
        let mut batch = RuleBatch::default();
        for field in fields {
            let referencing = self.rules.find_rules_by_field_id(&field.id)?;
            if field.state.change_kind == ChangeKind::Close {
                // Only the rules keyed to the field close; the owning set
                // stays active for its remaining values.
                for rule in referencing {
                    batch.close_rules.push(rule.id);
                }
                continue;
            }
            for mut rule in referencing {
                let mut changed = false;
                if rule.from_field_id == field.id {
                    let fresh = rule.from_path.with_value(field.value.clone());
                    if rule.from_path != fresh {
                        rule.from_path = fresh;
                        changed = true;
                    }
                }
                if rule.to_field_id == field.id {
                    let fresh = rule.to_path.with_value(field.value.clone());
                    if rule.to_path != fresh {
                        rule.to_path = fresh;
                        changed = true;
                    }
                }
                if changed {
                    batch.update_rules.push(rule);
                }
            }
        }
        dedup_batch(&mut batch);
        Ok(batch)
    }
}

impl crate::runtime::hierarchy::ChangeGuard for RecodeEngine {
    fn check_meta_field_change(
        &self,
        older: &MetaField,
        newer: &MetaField,
    ) -> Result<(), CoreError> {
        Self::check_meta_field_change(self, older, newer)
    }
}

// ============================================================================
// SECTION: Dependency Changes
// ============================================================================

/// Changed dependencies of one entity kind handed to the engine.
///
/// # Invariants
/// - Members carry their post-change state, including the audit envelope.
#[derive(Debug, Clone)]
pub enum DependencyChange {
    /// Changed groups.
    Groups(Vec<Group>),
    /// Changed dictionaries.
    Dictionaries(Vec<Dictionary>),
    /// Changed meta fields.
    MetaFields(Vec<MetaField>),
    /// Changed fields.
    Fields(Vec<Field>),
}

/// Removes duplicate close targets accumulated across cascade branches.
fn dedup_batch(batch: &mut RuleBatch) {
    let mut seen_sets = HashSet::new();
    batch.close_sets.retain(|id| seen_sets.insert(id.clone()));
    let mut seen_rules = HashSet::new();
    batch.close_rules.retain(|id| seen_rules.insert(id.clone()));
}
