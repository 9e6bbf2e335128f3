//! The knowledge graph engine.
//!
//! [`AtomEngine`] is the thread-safe handle over an [`AtomGraph`]. Readers
//! share a read lock; mutations take the write lock, and batches take it
//! once for the whole batch. Change events are published after the lock is
//! released, so slow subscribers never hold up writers.
//!
//! ## Atom lifecycle
//!
//! ```text
//! Proposed --validate--> Rejected
//!          \-----------> Stored --update--> Stored
//!                               \--delete--> Removed
//! ```
//!
//! Deletes are hard deletes.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::{Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use uuid::Uuid;

use crate::analytics::{AnalyticsLedger, AtomMetrics, InteractionKind};
use crate::cache::{CacheStats, ValidationCache, ValidationCacheKey};
use crate::cancel::CancellationToken;
use crate::canonical::canonical_hash_hex;
use crate::config::AtomConfig;
use crate::error::{AtomError, Result};
use crate::events::{SubscriberHub, Subscription};
use crate::index::query_terms;
use crate::precision::PrecisionConstants;
use crate::snapshot::{AtomSnapshot, DuplicateStrategy, ExportOptions, ImportOptions};
use crate::store::graph::sort_most_recent_first;
use crate::store::{AtomGraph, EdgePolicy};
use crate::types::{
    AtomConnection, AtomEvent, AtomEventKind, AtomId, AtomPatch, AtomSearchQuery,
    AtomSearchResult, AtomType, AtomValidationResult, EventImpact, EvidenceLevel, KnowledgeAtom,
    Pagination, QueryAnalysis,
};
use crate::validation::validate_atom;

/// Window used by [`GraphStats::recently_updated`].
pub const RECENT_WINDOW_DAYS: i64 = 30;

/// Suggestions offered per search.
const MAX_SUGGESTIONS: usize = 5;

/// Outcome of a batch ingestion or import.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// One validation result per processed atom, in input order.
    pub results: Vec<AtomValidationResult>,
    /// Ids of atoms that failed validation.
    pub failed_ids: Vec<AtomId>,
    /// Atoms stored (created or replaced).
    pub stored: usize,
    /// Valid atoms left out because their id was already stored.
    pub skipped: usize,
    /// Whether the batch stopped early on cancellation.
    pub cancelled: bool,
}

impl BatchReport {
    /// Number of atoms that failed validation.
    pub fn failed(&self) -> usize {
        self.failed_ids.len()
    }
}

/// Aggregate quality indicators.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    /// Mean confidence over all connections (0 without connections).
    pub average_confidence: f64,
    /// Share of atoms with STRONG evidence, in percent.
    pub high_evidence_percentage: f64,
    /// Share of atoms older than `maxAgeDays`, in percent.
    pub outdated_atoms_percentage: f64,
}

/// Point-in-time engine statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    /// Schema version.
    pub version: String,
    /// Stored atoms.
    pub atom_count: usize,
    /// Derived connections.
    pub connection_count: usize,
    /// Distinct index terms.
    pub term_count: usize,
    /// Atoms per category.
    pub categories: BTreeMap<String, usize>,
    /// Atoms per type.
    pub types: BTreeMap<AtomType, usize>,
    /// Atoms per evidence level.
    pub evidence_levels: BTreeMap<EvidenceLevel, usize>,
    /// Atoms updated within the last 30 days.
    pub recently_updated: usize,
    /// Quality indicators.
    pub quality: QualityMetrics,
    /// Validation cache counters.
    pub validation_cache: CacheStats,
    /// Live subscribers.
    pub subscriber_count: usize,
    /// Interactions recorded.
    pub total_interactions: u64,
    /// Whether the index awaits a rebuild.
    pub index_stale: bool,
    /// xxh64 fingerprint of atoms and connections.
    pub fingerprint: Option<String>,
}

/// Thread-safe knowledge graph engine.
#[derive(Debug)]
pub struct AtomEngine {
    config: AtomConfig,
    constants: PrecisionConstants,
    graph: RwLock<AtomGraph>,
    cache: ValidationCache,
    hub: SubscriberHub,
    analytics: Mutex<AnalyticsLedger>,
    index_stale: AtomicBool,
    shut_down: AtomicBool,
}

impl Default for AtomEngine {
    fn default() -> Self {
        Self::build(AtomConfig::default(), PrecisionConstants::default())
    }
}

impl AtomEngine {
    /// Create an engine after checking the configuration.
    pub fn new(config: AtomConfig) -> Result<Self> {
        Self::with_constants(config, PrecisionConstants::default())
    }

    /// Create an engine with a custom precision table.
    pub fn with_constants(config: AtomConfig, constants: PrecisionConstants) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, constants))
    }

    fn build(config: AtomConfig, constants: PrecisionConstants) -> Self {
        tracing::info!(
            cache_size = config.performance.cache_size,
            max_connections = config.performance.max_connections,
            strict_mode = config.validation.strict_mode,
            "Atom engine initialized"
        );
        Self {
            graph: RwLock::new(AtomGraph::new(EdgePolicy::from_config(&config))),
            cache: ValidationCache::new(config.performance.cache_size),
            hub: SubscriberHub::new(config.graph.subscriber_buffer, config.graph.overflow_policy),
            analytics: Mutex::new(AnalyticsLedger::new()),
            index_stale: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            config,
            constants,
        }
    }

    /// Configuration in effect.
    pub fn config(&self) -> &AtomConfig {
        &self.config
    }

    /// Precision table in effect.
    pub fn constants(&self) -> &PrecisionConstants {
        &self.constants
    }

    /// Whether [`Self::shutdown`] was called.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_shut_down() {
            Err(AtomError::ShutDown)
        } else {
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Validate an atom without storing it. Results are cached until shutdown.
    pub fn validate(&self, atom: &KnowledgeAtom) -> AtomValidationResult {
        let now = Utc::now();
        if self.is_shut_down() {
            return validate_atom(atom, &self.constants, &self.config.validation, now);
        }
        self.cache.get_or_insert_with(ValidationCacheKey::compute(atom, now), || {
            validate_atom(atom, &self.constants, &self.config.validation, now)
        })
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Validate and store an atom.
    ///
    /// An atom with an existing id replaces it and is published as `update`.
    pub fn add_atom(&self, atom: KnowledgeAtom) -> Result<AtomValidationResult> {
        self.ensure_running()?;

        let result = self.validate(&atom);
        if !result.is_valid {
            tracing::warn!(atom_id = %atom.id, errors = result.errors.len(), "Atom rejected");
            return Err(AtomError::Validation {
                atom_id: atom.id,
                result: Box::new(result),
            });
        }

        let event = {
            let mut graph = self.graph.write();
            let event = self.store_locked(&mut graph, atom);
            self.assert_consistent(&graph);
            event
        };
        self.finish(vec![event]);
        Ok(result)
    }

    /// Merge a patch into a stored atom.
    ///
    /// `last_updated` is always refreshed. With `autoValidate` on, an invalid
    /// merged atom is rejected and the stored atom is left unchanged.
    pub fn update_atom(&self, id: &AtomId, patch: &AtomPatch) -> Result<KnowledgeAtom> {
        self.ensure_running()?;

        let event;
        let merged;
        {
            let mut graph = self.graph.write();
            let current = graph.get(id).ok_or_else(|| AtomError::NotFound(id.clone()))?;
            merged = patch.apply(current, Utc::now());

            if self.config.validation.auto_validate {
                let result = self.validate(&merged);
                if !result.is_valid {
                    tracing::warn!(atom_id = %id, errors = result.errors.len(), "Update rejected");
                    return Err(AtomError::Validation {
                        atom_id: id.clone(),
                        result: Box::new(result),
                    });
                }
            }

            let outcome = graph
                .update(merged.clone(), patch.touches_index(), patch.touches_connections())
                .ok_or_else(|| AtomError::NotFound(id.clone()))?;

            let mut categories = BTreeSet::new();
            categories.insert(merged.category.clone());
            categories.insert(outcome.previous.category.clone());

            tracing::debug!(
                atom_id = %id,
                reindexed = outcome.reindexed,
                related = outcome.related_updated.len(),
                "Atom updated"
            );
            self.audit(AtomEventKind::Update, id);
            self.assert_consistent(&graph);

            event = AtomEvent::new(
                AtomEventKind::Update,
                id.clone(),
                EventImpact {
                    related_atoms_updated: outcome.related_updated,
                    categories_affected: categories.into_iter().collect(),
                    search_index_updated: outcome.reindexed,
                },
            );
        }
        self.finish(vec![event]);
        Ok(merged)
    }

    /// Remove an atom and every connection touching it.
    ///
    /// Returns `false` when the id was not stored.
    pub fn delete_atom(&self, id: &AtomId) -> Result<bool> {
        self.ensure_running()?;

        let event = {
            let mut graph = self.graph.write();
            let Some(removed) = graph.remove(id) else {
                return Ok(false);
            };
            tracing::debug!(atom_id = %id, related = removed.related_updated.len(), "Atom deleted");
            self.audit(AtomEventKind::Delete, id);
            self.assert_consistent(&graph);

            AtomEvent::new(
                AtomEventKind::Delete,
                id.clone(),
                EventImpact {
                    related_atoms_updated: removed.related_updated,
                    categories_affected: vec![removed.atom.category],
                    search_index_updated: true,
                },
            )
        };
        self.finish(vec![event]);
        Ok(true)
    }

    /// Validate and store each atom independently under one write lock.
    ///
    /// Invalid atoms are reported, not raised. Cancellation is checked
    /// between atoms.
    pub fn process_batch(
        &self,
        atoms: Vec<KnowledgeAtom>,
        cancel: &CancellationToken,
    ) -> Result<BatchReport> {
        self.ensure_running()?;
        Ok(self.ingest(atoms, DuplicateStrategy::Replace, cancel))
    }

    fn ingest(
        &self,
        atoms: Vec<KnowledgeAtom>,
        duplicates: DuplicateStrategy,
        cancel: &CancellationToken,
    ) -> BatchReport {
        let total = atoms.len();
        let mut report = BatchReport::default();
        let mut events = Vec::new();
        {
            let mut graph = self.graph.write();
            for atom in atoms {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    break;
                }

                let result = self.validate(&atom);
                if !result.is_valid {
                    tracing::warn!(atom_id = %atom.id, errors = result.errors.len(), "Batch atom rejected");
                    report.failed_ids.push(atom.id.clone());
                } else if duplicates == DuplicateStrategy::Skip && graph.contains(&atom.id) {
                    report.skipped += 1;
                } else {
                    events.push(self.store_locked(&mut graph, atom));
                    report.stored += 1;
                }
                report.results.push(result);
            }
            self.assert_consistent(&graph);
        }
        self.finish(events);

        tracing::info!(
            total,
            stored = report.stored,
            failed = report.failed(),
            skipped = report.skipped,
            cancelled = report.cancelled,
            "Batch processed"
        );
        report
    }

    fn store_locked(&self, graph: &mut AtomGraph, atom: KnowledgeAtom) -> AtomEvent {
        let id = atom.id.clone();
        let mut categories = BTreeSet::new();
        categories.insert(atom.category.clone());

        let outcome = graph.insert(atom);
        let kind = match &outcome.replaced {
            Some(previous) => {
                categories.insert(previous.category.clone());
                AtomEventKind::Update
            }
            None => AtomEventKind::Create,
        };

        tracing::debug!(
            atom_id = %id,
            kind = %kind,
            related = outcome.related_updated.len(),
            tokens_added = outcome.index_delta.added,
            "Atom stored"
        );
        self.audit(kind, &id);

        AtomEvent::new(
            kind,
            id,
            EventImpact {
                related_atoms_updated: outcome.related_updated,
                categories_affected: categories.into_iter().collect(),
                search_index_updated: outcome.index_delta.is_changed(),
            },
        )
    }

    /// Publish events and record lifecycle analytics.
    fn finish(&self, events: Vec<AtomEvent>) {
        if events.is_empty() {
            return;
        }
        {
            let mut ledger = self.analytics.lock();
            for event in &events {
                match event.kind {
                    AtomEventKind::Create => {
                        ledger.record(InteractionKind::Create, &event.atom_id, event.timestamp)
                    }
                    AtomEventKind::Update => {
                        ledger.record(InteractionKind::Update, &event.atom_id, event.timestamp)
                    }
                    AtomEventKind::Delete => ledger.forget(&event.atom_id),
                }
            }
        }
        for event in &events {
            self.hub.publish(event);
        }
    }

    fn audit(&self, kind: AtomEventKind, id: &AtomId) {
        if self.config.security.audit_trail {
            tracing::info!(target: "atomic_knowledge::audit", action = %kind, atom_id = %id, "Audit");
        }
    }

    /// Fail loudly in debug builds if the graph's derived structures diverge.
    fn assert_consistent(&self, graph: &AtomGraph) {
        if !cfg!(debug_assertions) {
            return;
        }
        if !self.index_stale.load(Ordering::Acquire) {
            if let Err(e) = graph.check_index() {
                tracing::error!(error = %e, "Search index diverged from atom store");
                panic!("search index inconsistent: {}", e);
            }
        }
        assert!(graph.edges_consistent(), "connection adjacency inconsistent");
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Fetch an atom.
    pub fn get_atom(&self, id: &AtomId) -> Option<KnowledgeAtom> {
        self.graph.read().get(id).cloned()
    }

    /// Number of stored atoms.
    pub fn atom_count(&self) -> usize {
        self.graph.read().len()
    }

    /// Atoms in a category, in id order.
    pub fn atoms_by_category(&self, category: &str) -> Vec<KnowledgeAtom> {
        self.graph.read().by_category(category).into_iter().cloned().collect()
    }

    /// Atoms of a type, in id order.
    pub fn atoms_by_type(&self, atom_type: AtomType) -> Vec<KnowledgeAtom> {
        self.graph.read().by_type(atom_type).into_iter().cloned().collect()
    }

    /// Atoms with exactly the given evidence level, in id order.
    pub fn high_evidence_atoms(&self, level: EvidenceLevel) -> Vec<KnowledgeAtom> {
        self.graph.read().by_evidence(level).into_iter().cloned().collect()
    }

    /// Connections leaving an atom.
    pub fn connections_from(&self, id: &AtomId) -> Vec<AtomConnection> {
        self.graph.read().connections_from(id).into_iter().cloned().collect()
    }

    /// Connections arriving at an atom.
    pub fn connections_to(&self, id: &AtomId) -> Vec<AtomConnection> {
        self.graph.read().connections_to(id).into_iter().cloned().collect()
    }

    /// The connection `source → target`.
    pub fn connection(&self, source: &AtomId, target: &AtomId) -> Option<AtomConnection> {
        self.graph.read().connection(source, target).cloned()
    }

    /// Search stored atoms.
    ///
    /// Text terms are ANDed; filters narrow further. Results are most recent
    /// first, ties by id. Facets count the whole store, not the matches.
    pub fn search(&self, query: &AtomSearchQuery) -> AtomSearchResult {
        let started = Instant::now();
        self.ensure_index();

        let graph = self.graph.read();
        let text = query.text.as_deref().map(str::trim).filter(|t| !t.is_empty());

        let mut matches: Vec<&KnowledgeAtom> = match text {
            Some(text) => graph
                .index()
                .lookup_all(text)
                .iter()
                .filter_map(|id| graph.get(id))
                .filter(|atom| query.matches_filters(atom))
                .collect(),
            None => graph.atoms().filter(|atom| query.matches_filters(atom)).collect(),
        };
        sort_most_recent_first(&mut matches);

        let total_count = matches.len();
        let pagination = Pagination::compute(
            query.page.unwrap_or(1),
            query.page_size.unwrap_or(self.config.performance.cache_size),
            total_count,
        );
        let atoms = matches[pagination.window(total_count)]
            .iter()
            .map(|atom| (*atom).clone())
            .collect();

        let query_analysis = text.map(|text| {
            let terms = query_terms(text);
            let mut suggestions: Vec<String> = Vec::new();
            for term in &terms {
                for suggestion in graph.index().suggest(term, MAX_SUGGESTIONS) {
                    if !terms.contains(&suggestion) && !suggestions.contains(&suggestion) {
                        suggestions.push(suggestion);
                    }
                }
            }
            suggestions.truncate(MAX_SUGGESTIONS);
            QueryAnalysis {
                terms,
                filters_used: query.filters_used(),
                suggestions,
            }
        });

        let result = AtomSearchResult {
            atoms,
            total_count,
            facets: graph.facets(),
            pagination,
            search_time_us: started.elapsed().as_micros() as u64,
            query_analysis,
        };
        tracing::debug!(
            total = result.total_count,
            elapsed_us = result.search_time_us,
            "Search completed"
        );
        result
    }

    /// Rebuild the index first if [`Self::clear_cache`] dropped it.
    fn ensure_index(&self) {
        if !self.index_stale.load(Ordering::Acquire) {
            return;
        }
        let mut graph = self.graph.write();
        if self.index_stale.load(Ordering::Acquire) {
            graph.rebuild_index();
            self.index_stale.store(false, Ordering::Release);
            tracing::info!(terms = graph.index().term_count(), "Stale search index rebuilt");
        }
    }

    // ------------------------------------------------------------------
    // Export / import
    // ------------------------------------------------------------------

    /// Export a snapshot of the selected atoms.
    pub fn export_atoms(
        &self,
        options: &ExportOptions,
        cancel: &CancellationToken,
    ) -> Result<AtomSnapshot> {
        let text_filter = options
            .filter
            .as_ref()
            .and_then(|q| q.text.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty());
        if text_filter.is_some() {
            self.ensure_index();
        }

        let graph = self.graph.read();
        let text_matches = text_filter.map(|text| graph.index().lookup_all(text));

        let candidates: Vec<&KnowledgeAtom> = match &options.atom_ids {
            Some(ids) => {
                let wanted: BTreeSet<&AtomId> = ids.iter().collect();
                wanted.into_iter().filter_map(|id| graph.get(id)).collect()
            }
            None => graph.atoms().collect(),
        };

        let mut atoms = Vec::with_capacity(candidates.len());
        for atom in candidates {
            if cancel.is_cancelled() {
                tracing::info!(exported = atoms.len(), "Export cancelled");
                return Err(AtomError::Cancelled);
            }
            let passes_filter = options.filter.as_ref().map_or(true, |q| q.matches_filters(atom));
            let passes_text = text_matches.as_ref().map_or(true, |ids| ids.contains(&atom.id));
            if passes_filter && passes_text {
                atoms.push(atom.clone());
            }
        }

        let connections: Vec<AtomConnection> = if options.include_relationships {
            let selected: BTreeSet<&AtomId> = atoms.iter().map(|a| &a.id).collect();
            graph
                .connections()
                .filter(|c| selected.contains(&c.source_atom_id) && selected.contains(&c.target_atom_id))
                .cloned()
                .collect()
        } else {
            Vec::new()
        };
        drop(graph);

        let snapshot = AtomSnapshot::build(
            atoms,
            connections,
            options.include_metadata,
            options.include_relationships,
            options.signing_key.as_deref(),
            Utc::now(),
        )?;
        tracing::info!(
            atoms = snapshot.metadata.atom_count,
            connections = snapshot.metadata.connection_count,
            signed = snapshot.signature.is_some(),
            "Snapshot exported"
        );
        Ok(snapshot)
    }

    /// Export a snapshot as JSON into `writer`.
    pub fn export_to_writer<W: Write>(
        &self,
        options: &ExportOptions,
        cancel: &CancellationToken,
        writer: W,
    ) -> Result<AtomSnapshot> {
        let snapshot = self.export_atoms(options, cancel)?;
        snapshot.write_to(writer)?;
        Ok(snapshot)
    }

    /// Verify a snapshot and ingest its atoms as a batch.
    ///
    /// Atoms keep their recorded `last_updated`.
    pub fn import_atoms(
        &self,
        snapshot: AtomSnapshot,
        options: &ImportOptions,
        cancel: &CancellationToken,
    ) -> Result<BatchReport> {
        self.ensure_running()?;
        if let Err(e) = snapshot.verify(options.verification_key.as_deref()) {
            tracing::warn!(error = %e, "Snapshot rejected");
            return Err(e);
        }
        tracing::info!(atoms = snapshot.atoms.len(), version = %snapshot.version, "Importing snapshot");
        Ok(self.ingest(snapshot.atoms, options.duplicate_strategy, cancel))
    }

    /// Read a JSON snapshot from `reader` and import it.
    pub fn import_from_reader<R: Read>(
        &self,
        reader: R,
        options: &ImportOptions,
        cancel: &CancellationToken,
    ) -> Result<BatchReport> {
        let snapshot = AtomSnapshot::read_from(reader)?;
        self.import_atoms(snapshot, options, cancel)
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Drop the validation cache and the search index.
    ///
    /// Atoms and connections are untouched. The next search rebuilds the
    /// index.
    pub fn clear_cache(&self) {
        self.cache.clear();
        let mut graph = self.graph.write();
        graph.clear_index();
        self.index_stale.store(true, Ordering::Release);
        tracing::info!("Validation cache and search index cleared");
    }

    /// Rebuild the search index from the stored atoms.
    pub fn rebuild_index(&self) {
        let mut graph = self.graph.write();
        graph.rebuild_index();
        self.index_stale.store(false, Ordering::Release);
        tracing::info!(terms = graph.index().term_count(), "Search index rebuilt");
    }

    /// Stop accepting mutations, close every subscription and drop the
    /// validation cache.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.hub.close_all();
        self.cache.clear();
        tracing::info!(atoms = self.atom_count(), "Atom engine shut down");
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    /// Receive change events from now on.
    ///
    /// After shutdown the returned subscription is already closed.
    pub fn subscribe(&self) -> Subscription {
        let subscription = self.hub.subscribe();
        if self.is_shut_down() {
            subscription.unsubscribe();
        }
        subscription
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: &Uuid) -> bool {
        self.hub.unsubscribe(id)
    }

    // ------------------------------------------------------------------
    // Analytics
    // ------------------------------------------------------------------

    /// Record a reader interaction with a stored atom.
    pub fn record_interaction(&self, kind: InteractionKind, id: &AtomId) -> Result<()> {
        if !self.graph.read().contains(id) {
            return Err(AtomError::NotFound(id.clone()));
        }
        self.analytics.lock().record(kind, id, Utc::now());
        tracing::debug!(atom_id = %id, kind = ?kind, "Interaction recorded");
        Ok(())
    }

    /// Interaction counters of an atom.
    pub fn atom_metrics(&self, id: &AtomId) -> Option<AtomMetrics> {
        self.analytics.lock().metrics(id).cloned()
    }

    /// The `count` most popular atoms, ties by id.
    pub fn popular_atoms(&self, count: usize) -> Vec<KnowledgeAtom> {
        let graph = self.graph.read();
        let ranked = self.analytics.lock().rank(graph.atoms().map(|a| &a.id), count);
        ranked.iter().filter_map(|id| graph.get(id).cloned()).collect()
    }

    /// Atoms updated within the last `days` days, most recent first.
    pub fn recently_updated_atoms(&self, days: u32) -> Vec<KnowledgeAtom> {
        let cutoff = Utc::now() - Duration::days(i64::from(days));
        self.graph.read().updated_since(cutoff).into_iter().cloned().collect()
    }

    /// Current statistics.
    pub fn stats(&self) -> GraphStats {
        let now = Utc::now();
        let graph = self.graph.read();
        let facets = graph.facets();
        let atom_count = graph.len();
        let connection_count = graph.connection_count();

        let percent = |n: usize| {
            if atom_count == 0 {
                0.0
            } else {
                n as f64 * 100.0 / atom_count as f64
            }
        };
        let max_age = Duration::days(i64::from(self.config.validation.criteria.max_age_days));
        let outdated = graph.atoms().filter(|a| now - a.last_updated > max_age).count();
        let strong = facets.evidence_levels.get(&EvidenceLevel::Strong).copied().unwrap_or(0);
        let average_confidence = if connection_count == 0 {
            0.0
        } else {
            graph.connections().map(|c| c.confidence).sum::<f64>() / connection_count as f64
        };
        let recently_updated = graph.updated_since(now - Duration::days(RECENT_WINDOW_DAYS)).len();

        let atoms: Vec<&KnowledgeAtom> = graph.atoms().collect();
        let connections: Vec<&AtomConnection> = graph.connections().collect();
        let fingerprint = canonical_hash_hex(&(atoms, connections)).ok();

        GraphStats {
            version: crate::ATOM_SCHEMA_VERSION.to_string(),
            atom_count,
            connection_count,
            term_count: graph.index().term_count(),
            categories: facets.categories,
            types: facets.types,
            evidence_levels: facets.evidence_levels,
            recently_updated,
            quality: QualityMetrics {
                average_confidence,
                high_evidence_percentage: percent(strong),
                outdated_atoms_percentage: percent(outdated),
            },
            validation_cache: self.cache.stats(),
            subscriber_count: self.hub.subscriber_count(),
            total_interactions: self.analytics.lock().total_interactions(),
            index_stale: self.index_stale.load(Ordering::Acquire),
            fingerprint,
        }
    }
}
