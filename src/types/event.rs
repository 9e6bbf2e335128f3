//! Change notifications published to subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::atom::AtomId;

/// Kind of mutation that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtomEventKind {
    /// A new atom was stored.
    Create,
    /// An existing atom was modified or replaced.
    Update,
    /// An atom was removed.
    Delete,
}

impl fmt::Display for AtomEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Side effects of a mutation on the rest of the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventImpact {
    /// Atoms whose connections changed as a consequence.
    pub related_atoms_updated: Vec<AtomId>,
    /// Categories whose membership changed.
    pub categories_affected: Vec<String>,
    /// Whether the search index was touched.
    pub search_index_updated: bool,
}

/// A change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomEvent {
    /// Unique event id.
    pub id: Uuid,
    /// When the mutation happened.
    pub timestamp: DateTime<Utc>,
    /// Kind of mutation.
    pub kind: AtomEventKind,
    /// Affected atom.
    pub atom_id: AtomId,
    /// Side effects.
    pub impact: EventImpact,
}

impl AtomEvent {
    /// Create a new event stamped now.
    pub fn new(kind: AtomEventKind, atom_id: AtomId, impact: EventImpact) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
            atom_id,
            impact,
        }
    }
}
