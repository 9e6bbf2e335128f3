//! In-memory atom graph.
//!
//! Owns the atoms, the derived connections and the search index, and keeps
//! the three consistent across every mutation. Not synchronized; the engine
//! wraps it in a lock.
//!
//! Connections are a typed collection keyed by [`ConnectionId`], with
//! outgoing and incoming adjacency maps for O(degree) traversal and removal.
//! Uses BTreeMap/BTreeSet for deterministic iteration order.
//!
//! The kept edges of an atom are re-derived whenever one of its declared
//! targets is replaced, updated or removed, so the `max_connections` cap
//! always reflects the current strengths. Only the arrival of a brand-new
//! atom is subject to declaration order (see [`EdgePolicy::backfill_dangling`]).

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::config::AtomConfig;
use crate::connection::build_connection;
use crate::index::{IndexConsistencyError, IndexDelta, SearchIndex};
use crate::types::{
    AtomConnection, AtomId, AtomType, ConnectionId, EvidenceLevel, KnowledgeAtom, SearchFacets,
};

/// How connections are derived from `related_atoms` declarations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgePolicy {
    /// Maximum outgoing connections kept per atom.
    pub max_connections: usize,
    /// Confidence stamped on every derived connection.
    pub confidence: f64,
    /// Build edges from atoms that declared an id before it existed.
    pub backfill_dangling: bool,
}

impl EdgePolicy {
    /// Extract the edge policy from engine configuration.
    pub fn from_config(config: &AtomConfig) -> Self {
        Self {
            max_connections: config.performance.max_connections,
            confidence: config.graph.baseline_confidence,
            backfill_dangling: config.graph.backfill_dangling,
        }
    }
}

impl Default for EdgePolicy {
    fn default() -> Self {
        Self::from_config(&AtomConfig::default())
    }
}

/// Result of inserting an atom.
#[derive(Debug, Clone)]
pub struct InsertOutcome {
    /// The atom previously stored under the same id, if any.
    pub replaced: Option<KnowledgeAtom>,
    /// Other atoms whose connections changed.
    pub related_updated: Vec<AtomId>,
    /// Index change for the inserted atom.
    pub index_delta: IndexDelta,
}

/// Result of replacing an existing atom's content.
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    /// The atom as it was before the update.
    pub previous: KnowledgeAtom,
    /// Other atoms whose connections changed.
    pub related_updated: Vec<AtomId>,
    /// Whether the index was touched.
    pub reindexed: bool,
}

/// Result of removing an atom.
#[derive(Debug, Clone)]
pub struct RemovedAtom {
    /// The removed atom.
    pub atom: KnowledgeAtom,
    /// Atoms that lost a connection to or from the removed atom.
    pub related_updated: Vec<AtomId>,
}

/// Atoms, connections and search index under one owner.
#[derive(Debug, Clone, Default)]
pub struct AtomGraph {
    /// Atoms by id.
    atoms: BTreeMap<AtomId, KnowledgeAtom>,
    /// Connections by `source→target` id.
    connections: BTreeMap<ConnectionId, AtomConnection>,
    /// Source -> targets.
    outgoing: BTreeMap<AtomId, BTreeSet<AtomId>>,
    /// Target -> sources.
    incoming: BTreeMap<AtomId, BTreeSet<AtomId>>,
    /// Inverted text index.
    index: SearchIndex,
    policy: EdgePolicy,
}

impl AtomGraph {
    /// Create an empty graph.
    pub fn new(policy: EdgePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Edge policy in effect.
    pub fn policy(&self) -> &EdgePolicy {
        &self.policy
    }

    /// Number of atoms.
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// Whether the graph holds no atoms.
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Number of connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Whether an atom is stored.
    pub fn contains(&self, id: &AtomId) -> bool {
        self.atoms.contains_key(id)
    }

    /// Fetch an atom.
    pub fn get(&self, id: &AtomId) -> Option<&KnowledgeAtom> {
        self.atoms.get(id)
    }

    /// All atoms in id order.
    pub fn atoms(&self) -> impl Iterator<Item = &KnowledgeAtom> {
        self.atoms.values()
    }

    /// All connections in id order.
    pub fn connections(&self) -> impl Iterator<Item = &AtomConnection> {
        self.connections.values()
    }

    /// The search index.
    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    /// Insert an atom, replacing any atom with the same id.
    pub fn insert(&mut self, atom: KnowledgeAtom) -> InsertOutcome {
        let id = atom.id.clone();
        let replaced = self.atoms.insert(id.clone(), atom);
        let index_delta = match self.atoms.get(&id) {
            Some(stored) => self.index.index_atom(stored),
            None => IndexDelta::default(),
        };

        let mut related = BTreeSet::new();
        related.extend(self.rebuild_outgoing(&id));
        if replaced.is_some() || self.policy.backfill_dangling {
            related.extend(self.rederive_declarers(&id));
        }
        related.remove(&id);

        InsertOutcome {
            replaced,
            related_updated: related.into_iter().collect(),
            index_delta,
        }
    }

    /// Replace a stored atom with an updated version of itself.
    ///
    /// `reindex` and `reconnect` limit the work to what the change can affect.
    /// Returns `None` when no atom with that id exists.
    pub fn update(
        &mut self,
        atom: KnowledgeAtom,
        reindex: bool,
        reconnect: bool,
    ) -> Option<UpdateOutcome> {
        let id = atom.id.clone();
        let previous = self.atoms.get_mut(&id).map(|slot| std::mem::replace(slot, atom))?;

        let mut reindexed = false;
        if reindex {
            if let Some(stored) = self.atoms.get(&id) {
                reindexed = self.index.index_atom(stored).is_changed();
            }
        }

        let mut related = BTreeSet::new();
        if reconnect {
            related.extend(self.rebuild_outgoing(&id));
            related.extend(self.rederive_declarers(&id));
        }
        related.remove(&id);

        Some(UpdateOutcome {
            previous,
            related_updated: related.into_iter().collect(),
            reindexed,
        })
    }

    /// Remove an atom with its index entries and every connection touching it.
    pub fn remove(&mut self, id: &AtomId) -> Option<RemovedAtom> {
        let atom = self.atoms.remove(id)?;
        self.index.remove_atom(id);

        let mut related = BTreeSet::new();
        related.extend(self.detach_outgoing(id));
        related.extend(self.rederive_declarers(id));

        Some(RemovedAtom {
            atom,
            related_updated: related.into_iter().collect(),
        })
    }

    /// Connections leaving `id`, ordered by target id.
    pub fn connections_from(&self, id: &AtomId) -> Vec<&AtomConnection> {
        self.outgoing
            .get(id)
            .map(|targets| {
                targets
                    .iter()
                    .filter_map(|t| self.connections.get(&ConnectionId::between(id, t)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Connections arriving at `id`, ordered by source id.
    pub fn connections_to(&self, id: &AtomId) -> Vec<&AtomConnection> {
        self.incoming
            .get(id)
            .map(|sources| {
                sources
                    .iter()
                    .filter_map(|s| self.connections.get(&ConnectionId::between(s, id)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The connection `source → target`, if derived.
    pub fn connection(&self, source: &AtomId, target: &AtomId) -> Option<&AtomConnection> {
        self.connections.get(&ConnectionId::between(source, target))
    }

    /// Atoms in a category.
    pub fn by_category(&self, category: &str) -> Vec<&KnowledgeAtom> {
        self.atoms.values().filter(|a| a.category == category).collect()
    }

    /// Atoms of a type.
    pub fn by_type(&self, atom_type: AtomType) -> Vec<&KnowledgeAtom> {
        self.atoms.values().filter(|a| a.atom_type == atom_type).collect()
    }

    /// Atoms with exactly this evidence level.
    pub fn by_evidence(&self, level: EvidenceLevel) -> Vec<&KnowledgeAtom> {
        self.atoms.values().filter(|a| a.evidence_level == level).collect()
    }

    /// Atoms updated at or after `cutoff`, most recent first.
    pub fn updated_since(&self, cutoff: DateTime<Utc>) -> Vec<&KnowledgeAtom> {
        let mut recent: Vec<&KnowledgeAtom> =
            self.atoms.values().filter(|a| a.last_updated >= cutoff).collect();
        sort_most_recent_first(&mut recent);
        recent
    }

    /// Facet counts over every stored atom.
    pub fn facets(&self) -> SearchFacets {
        SearchFacets::count(self.atoms.values())
    }

    /// Drop the search index. Lookups find nothing until [`Self::rebuild_index`].
    pub fn clear_index(&mut self) {
        self.index.clear();
    }

    /// Rebuild the search index from the stored atoms.
    pub fn rebuild_index(&mut self) {
        self.index.rebuild(self.atoms.values());
    }

    /// Check the index against the stored atoms.
    pub fn check_index(&self) -> Result<(), IndexConsistencyError> {
        self.index.check_consistency(self.atoms.keys())
    }

    /// Whether connections and adjacency maps agree and only reference
    /// stored atoms.
    pub fn edges_consistent(&self) -> bool {
        let adjacency_edges: usize = self.outgoing.values().map(BTreeSet::len).sum();
        let reverse_edges: usize = self.incoming.values().map(BTreeSet::len).sum();
        if adjacency_edges != self.connections.len() || reverse_edges != self.connections.len() {
            return false;
        }
        self.connections.values().all(|c| {
            self.atoms.contains_key(&c.source_atom_id)
                && self.atoms.contains_key(&c.target_atom_id)
                && self
                    .outgoing
                    .get(&c.source_atom_id)
                    .is_some_and(|t| t.contains(&c.target_atom_id))
                && self
                    .incoming
                    .get(&c.target_atom_id)
                    .is_some_and(|s| s.contains(&c.source_atom_id))
        })
    }

    /// Recompute the outgoing connections of `id` from its declarations.
    ///
    /// Keeps the strongest `max_connections`, ties broken by target id.
    /// Returns every target that gained or lost an edge.
    fn rebuild_outgoing(&mut self, id: &AtomId) -> BTreeSet<AtomId> {
        let mut touched = self.detach_outgoing(id);

        let Some(source) = self.atoms.get(id) else {
            return touched;
        };
        let declared: BTreeSet<&AtomId> = source.related_atoms.iter().collect();
        let mut candidates: Vec<AtomConnection> = declared
            .into_iter()
            .filter(|target| *target != id)
            .filter_map(|target| self.atoms.get(target))
            .map(|target| build_connection(source, target, self.policy.confidence))
            .collect();

        candidates.sort_by(|a, b| {
            b.strength
                .partial_cmp(&a.strength)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.target_atom_id.cmp(&b.target_atom_id))
        });
        candidates.truncate(self.policy.max_connections);

        for connection in candidates {
            touched.insert(connection.target_atom_id.clone());
            self.link(connection);
        }
        touched
    }

    /// Rebuild the outgoing connections of every atom that declares `id`.
    ///
    /// A changed or removed target can reorder which declarations survive
    /// the cap, so each declarer is re-derived in full.
    fn rederive_declarers(&mut self, id: &AtomId) -> BTreeSet<AtomId> {
        let declarers: BTreeSet<AtomId> = self
            .atoms
            .values()
            .filter(|a| a.id != *id && a.related_atoms.contains(id))
            .map(|a| a.id.clone())
            .collect();
        for declarer in &declarers {
            self.rebuild_outgoing(declarer);
        }
        declarers
    }

    fn link(&mut self, connection: AtomConnection) {
        self.outgoing
            .entry(connection.source_atom_id.clone())
            .or_default()
            .insert(connection.target_atom_id.clone());
        self.incoming
            .entry(connection.target_atom_id.clone())
            .or_default()
            .insert(connection.source_atom_id.clone());
        self.connections.insert(connection.id.clone(), connection);
    }

    fn detach_outgoing(&mut self, id: &AtomId) -> BTreeSet<AtomId> {
        let targets = self.outgoing.remove(id).unwrap_or_default();
        for target in &targets {
            self.connections.remove(&ConnectionId::between(id, target));
            remove_adjacent(&mut self.incoming, target, id);
        }
        targets
    }
}

fn remove_adjacent(map: &mut BTreeMap<AtomId, BTreeSet<AtomId>>, key: &AtomId, value: &AtomId) {
    if let Some(set) = map.get_mut(key) {
        set.remove(value);
        if set.is_empty() {
            map.remove(key);
        }
    }
}

/// Sort by `last_updated` descending, ties by id ascending.
pub fn sort_most_recent_first(atoms: &mut [&KnowledgeAtom]) {
    atoms.sort_by(|a, b| {
        b.last_updated
            .cmp(&a.last_updated)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_atom(id: &str, related: &[&str]) -> KnowledgeAtom {
        let mut atom = KnowledgeAtom::new(
            id,
            AtomType::Mechanism,
            "neuro",
            format!("Title for {}", id),
            format!("Content describing {}", id),
            EvidenceLevel::Moderate,
        );
        atom.related_atoms = related.iter().map(|r| AtomId::from(*r)).collect();
        atom
    }

    fn assert_consistent(graph: &AtomGraph) {
        assert!(graph.edges_consistent());
        graph.check_index().unwrap();
    }

    #[test]
    fn test_insert_builds_edges_to_existing_atoms() {
        let mut graph = AtomGraph::new(EdgePolicy::default());
        graph.insert(make_atom("b", &[]));
        let outcome = graph.insert(make_atom("a", &["b", "missing", "a"]));

        assert!(outcome.replaced.is_none());
        assert_eq!(outcome.related_updated, vec![AtomId::from("b")]);
        assert_eq!(graph.connection_count(), 1);

        let conn = graph.connection(&"a".into(), &"b".into()).unwrap();
        assert_eq!(conn.confidence, 0.8);
        assert!(conn.strength > 0.0);
        assert_eq!(graph.connections_to(&"b".into()).len(), 1);
        assert_consistent(&graph);
    }

    #[test]
    fn test_declaration_order_without_backfill() {
        let mut graph = AtomGraph::new(EdgePolicy::default());
        graph.insert(make_atom("a", &["b"]));
        graph.insert(make_atom("b", &[]));

        assert_eq!(graph.connection_count(), 0);
        assert_consistent(&graph);
    }

    #[test]
    fn test_backfill_dangling_declarations() {
        let policy = EdgePolicy {
            backfill_dangling: true,
            ..EdgePolicy::default()
        };
        let mut graph = AtomGraph::new(policy);
        graph.insert(make_atom("a", &["b"]));
        let outcome = graph.insert(make_atom("b", &[]));

        assert_eq!(outcome.related_updated, vec![AtomId::from("a")]);
        assert!(graph.connection(&"a".into(), &"b".into()).is_some());
        assert_consistent(&graph);
    }

    #[test]
    fn test_max_connections_keeps_strongest() {
        let policy = EdgePolicy {
            max_connections: 2,
            ..EdgePolicy::default()
        };
        let mut graph = AtomGraph::new(policy);
        for (id, level) in [
            ("t1", EvidenceLevel::Insufficient),
            ("t2", EvidenceLevel::Strong),
            ("t3", EvidenceLevel::Moderate),
        ] {
            let mut atom = make_atom(id, &[]);
            atom.evidence_level = level;
            graph.insert(atom);
        }
        graph.insert(make_atom("src", &["t1", "t2", "t3"]));

        let targets: Vec<&str> = graph
            .connections_from(&"src".into())
            .iter()
            .map(|c| c.target_atom_id.as_str())
            .collect();
        assert_eq!(targets, vec!["t2", "t3"]);
        assert_consistent(&graph);
    }

    #[test]
    fn test_remove_drops_all_touching_edges() {
        let mut graph = AtomGraph::new(EdgePolicy::default());
        graph.insert(make_atom("c", &[]));
        graph.insert(make_atom("b", &["c"]));
        graph.insert(make_atom("a", &["b"]));

        let removed = graph.remove(&"b".into()).unwrap();
        assert_eq!(removed.related_updated, vec![AtomId::from("a"), AtomId::from("c")]);
        assert_eq!(graph.connection_count(), 0);
        assert!(graph.connections_from(&"a".into()).is_empty());
        assert!(graph.index().tokens_of(&"b".into()).is_none());
        assert!(graph.remove(&"b".into()).is_none());
        assert_consistent(&graph);
    }

    #[test]
    fn test_update_refreshes_incoming_strength() {
        let mut graph = AtomGraph::new(EdgePolicy::default());
        graph.insert(make_atom("b", &[]));
        graph.insert(make_atom("a", &["b"]));
        let before = graph.connection(&"a".into(), &"b".into()).unwrap().strength;

        let mut b = graph.get(&"b".into()).unwrap().clone();
        b.evidence_level = EvidenceLevel::Strong;
        let outcome = graph.update(b, false, true).unwrap();

        let after = graph.connection(&"a".into(), &"b".into()).unwrap().strength;
        assert!(after > before);
        assert_eq!(outcome.related_updated, vec![AtomId::from("a")]);
        assert_eq!(outcome.previous.evidence_level, EvidenceLevel::Moderate);
        assert_consistent(&graph);
    }

    fn capped_graph() -> AtomGraph {
        let mut graph = AtomGraph::new(EdgePolicy {
            max_connections: 2,
            ..EdgePolicy::default()
        });
        let mut x = make_atom("x", &[]);
        x.evidence_level = EvidenceLevel::Insufficient;
        graph.insert(x);
        graph.insert(make_atom("y", &[]));
        graph.insert(make_atom("z", &[]));
        graph.insert(make_atom("s", &["x", "y", "z"]));
        graph
    }

    fn targets_of<'a>(graph: &'a AtomGraph, id: &str) -> Vec<&'a str> {
        graph
            .connections_from(&id.into())
            .iter()
            .map(|c| c.target_atom_id.as_str())
            .collect()
    }

    #[test]
    fn test_stronger_target_displaces_kept_edge() {
        let mut graph = capped_graph();
        assert_eq!(targets_of(&graph, "s"), vec!["y", "z"]);

        let mut x = graph.get(&"x".into()).unwrap().clone();
        x.evidence_level = EvidenceLevel::Strong;
        let outcome = graph.update(x, false, true).unwrap();

        assert_eq!(targets_of(&graph, "s"), vec!["x", "y"]);
        assert_eq!(outcome.related_updated, vec![AtomId::from("s")]);
        assert_consistent(&graph);
    }

    #[test]
    fn test_replaced_target_displaces_kept_edge() {
        let mut graph = capped_graph();
        let mut x = make_atom("x", &[]);
        x.evidence_level = EvidenceLevel::Strong;
        graph.insert(x);

        assert_eq!(targets_of(&graph, "s"), vec!["x", "y"]);
        assert_consistent(&graph);
    }

    #[test]
    fn test_removed_target_frees_slot_for_declared_atom() {
        let mut graph = capped_graph();
        let removed = graph.remove(&"y".into()).unwrap();

        assert_eq!(targets_of(&graph, "s"), vec!["x", "z"]);
        assert_eq!(removed.related_updated, vec![AtomId::from("s")]);
        assert_consistent(&graph);
    }

    #[test]
    fn test_update_missing_atom_is_none() {
        let mut graph = AtomGraph::new(EdgePolicy::default());
        assert!(graph.update(make_atom("x", &[]), true, true).is_none());
    }

    #[test]
    fn test_replace_keeps_incoming_edges() {
        let mut graph = AtomGraph::new(EdgePolicy::default());
        graph.insert(make_atom("b", &[]));
        graph.insert(make_atom("a", &["b"]));

        let outcome = graph.insert(make_atom("b", &["a"]));
        assert!(outcome.replaced.is_some());
        assert_eq!(graph.connection_count(), 2);
        assert_consistent(&graph);
    }

    #[test]
    fn test_clear_and_rebuild_index() {
        let mut graph = AtomGraph::new(EdgePolicy::default());
        graph.insert(make_atom("a", &[]));
        graph.clear_index();
        assert!(graph.index().is_empty());
        assert!(graph.check_index().is_err());

        graph.rebuild_index();
        assert!(graph.index().lookup("describing").is_some());
        assert_consistent(&graph);
    }
}
