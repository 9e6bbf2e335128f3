//! Connection types for the knowledge graph.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::atom::AtomId;

/// Kind of relationship between two atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipType {
    /// Source strengthens the target's effect.
    Enhances,
    /// Source weakens the target's effect.
    Inhibits,
    /// Source must be understood first.
    Prerequisite,
    /// Source acts as a cofactor.
    Cofactor,
    /// Source mediates the target.
    Mediates,
    /// Source depends on the target.
    Requires,
    /// Source prevents the target.
    Prevents,
    /// Generic correlation (auto-derived default).
    Correlates,
    /// Source interacts with the target.
    Interacts,
}

impl RelationshipType {
    /// Parse relationship type from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "enhances" => Some(Self::Enhances),
            "inhibits" => Some(Self::Inhibits),
            "prerequisite" => Some(Self::Prerequisite),
            "cofactor" => Some(Self::Cofactor),
            "mediates" => Some(Self::Mediates),
            "requires" => Some(Self::Requires),
            "prevents" => Some(Self::Prevents),
            "correlates" | "" => Some(Self::Correlates),
            "interacts" => Some(Self::Interacts),
            _ => None,
        }
    }
}

impl Default for RelationshipType {
    fn default() -> Self {
        Self::Correlates
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Enhances => "enhances",
            Self::Inhibits => "inhibits",
            Self::Prerequisite => "prerequisite",
            Self::Cofactor => "cofactor",
            Self::Mediates => "mediates",
            Self::Requires => "requires",
            Self::Prevents => "prevents",
            Self::Correlates => "correlates",
            Self::Interacts => "interacts",
        };
        f.write_str(s)
    }
}

/// Identifier of a connection, derived from its ordered endpoint pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Separator between source and target ids.
    pub const SEPARATOR: char = '→';

    /// Derive the id for `source → target`.
    pub fn between(source: &AtomId, target: &AtomId) -> Self {
        Self(format!("{}{}{}", source, Self::SEPARATOR, target))
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A derived, directed, weighted edge between two atoms.
///
/// Ordered by (source, target) for deterministic iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomConnection {
    /// Deterministic id.
    pub id: ConnectionId,
    /// Declaring atom.
    pub source_atom_id: AtomId,
    /// Declared atom.
    pub target_atom_id: AtomId,
    /// Relationship classification.
    pub relationship_type: RelationshipType,
    /// Combined evidence and similarity score in [0, 0.9].
    pub strength: f64,
    /// Confidence in the relationship [0, 1].
    pub confidence: f64,
}

impl AtomConnection {
    /// Create a new connection.
    pub fn new(
        source: AtomId,
        target: AtomId,
        relationship_type: RelationshipType,
        strength: f64,
        confidence: f64,
    ) -> Self {
        Self {
            id: ConnectionId::between(&source, &target),
            source_atom_id: source,
            target_atom_id: target,
            relationship_type,
            strength,
            confidence,
        }
    }

    /// Whether either endpoint is `id`.
    pub fn touches(&self, id: &AtomId) -> bool {
        &self.source_atom_id == id || &self.target_atom_id == id
    }
}
