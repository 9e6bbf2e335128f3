//! Usage analytics.
//!
//! An in-memory ledger of interactions per atom. Popularity is the number
//! of reader interactions; lifecycle interactions (create, update, delete)
//! are counted but do not make an atom popular.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::AtomId;

/// Kind of interaction with an atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    /// Atom was displayed.
    View,
    /// Atom details were expanded.
    Expand,
    /// Atom was shared.
    Share,
    /// Atom was cited.
    Cite,
    /// Atom was referenced from other content.
    Reference,
    /// Atom was bookmarked.
    Bookmark,
    /// A note was attached to the atom.
    Note,
    /// Atom was stored.
    Create,
    /// Atom was modified.
    Update,
    /// Atom was removed.
    Delete,
}

impl InteractionKind {
    /// Parse from the lowercase wire name.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "view" => Some(Self::View),
            "expand" => Some(Self::Expand),
            "share" => Some(Self::Share),
            "cite" => Some(Self::Cite),
            "reference" => Some(Self::Reference),
            "bookmark" => Some(Self::Bookmark),
            "note" => Some(Self::Note),
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    /// Whether the interaction is a mutation rather than a reader action.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::Delete)
    }
}

/// Interaction counters for one atom.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomMetrics {
    /// Count per interaction kind.
    pub counts: BTreeMap<InteractionKind, u64>,
    /// Views per UTC day.
    pub daily_views: BTreeMap<NaiveDate, u64>,
    /// Most recent interaction.
    pub last_interaction: Option<DateTime<Utc>>,
}

impl AtomMetrics {
    /// Count for one kind.
    pub fn count(&self, kind: InteractionKind) -> u64 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// Reader interactions, the popularity measure.
    pub fn popularity(&self) -> u64 {
        self.counts
            .iter()
            .filter(|(kind, _)| !kind.is_lifecycle())
            .map(|(_, n)| n)
            .sum()
    }
}

/// Interaction ledger keyed by atom id.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsLedger {
    per_atom: BTreeMap<AtomId, AtomMetrics>,
    total: u64,
}

impl AnalyticsLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one interaction.
    pub fn record(&mut self, kind: InteractionKind, atom_id: &AtomId, at: DateTime<Utc>) {
        let metrics = self.per_atom.entry(atom_id.clone()).or_default();
        *metrics.counts.entry(kind).or_insert(0) += 1;
        if kind == InteractionKind::View {
            *metrics.daily_views.entry(at.date_naive()).or_insert(0) += 1;
        }
        metrics.last_interaction = Some(metrics.last_interaction.map_or(at, |prev| prev.max(at)));
        self.total += 1;
    }

    /// Counters for an atom.
    pub fn metrics(&self, atom_id: &AtomId) -> Option<&AtomMetrics> {
        self.per_atom.get(atom_id)
    }

    /// Popularity of an atom (0 when never seen).
    pub fn popularity(&self, atom_id: &AtomId) -> u64 {
        self.per_atom.get(atom_id).map_or(0, AtomMetrics::popularity)
    }

    /// Drop the counters of a removed atom.
    pub fn forget(&mut self, atom_id: &AtomId) {
        self.per_atom.remove(atom_id);
    }

    /// Interactions recorded since creation, including forgotten atoms.
    pub fn total_interactions(&self) -> u64 {
        self.total
    }

    /// Rank candidate ids by popularity descending, ties by id.
    pub fn rank<'a>(&self, candidates: impl IntoIterator<Item = &'a AtomId>, limit: usize) -> Vec<AtomId> {
        let mut ranked: Vec<(u64, &AtomId)> = candidates
            .into_iter()
            .map(|id| (self.popularity(id), id))
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        ranked.into_iter().take(limit).map(|(_, id)| id.clone()).collect()
    }
}
