//! Connection strength scoring between atoms.
//!
//! Formula:
//! ```text
//! strength = (weight(a) + weight(b)) / 2 * (0.7 + 0.3 * similarity(a, b))
//! ```
//!
//! where `weight` is the evidence weight of an atom and `similarity` is the
//! Dice coefficient over lowercase whitespace tokens of `title + content`.
//! Both factors are symmetric, so `strength(a, b) == strength(b, a)`, and the
//! result is bounded by the largest evidence weight (0.9).

use std::collections::HashMap;

use crate::types::{AtomConnection, EvidenceLevel, KnowledgeAtom, RelationshipType};

/// Share of the strength that does not depend on textual similarity.
const BASE_FACTOR: f64 = 0.7;

/// Share of the strength scaled by textual similarity.
const SIMILARITY_FACTOR: f64 = 0.3;

/// Evidence weight of a level.
pub fn evidence_weight(level: EvidenceLevel) -> f64 {
    match level {
        EvidenceLevel::Strong => 0.9,
        EvidenceLevel::Moderate => 0.6,
        EvidenceLevel::Weak => 0.3,
        EvidenceLevel::Insufficient => 0.1,
    }
}

/// Dice coefficient between the whitespace tokens of two strings.
///
/// Tokens are compared as multisets, which keeps the measure symmetric and
/// within [0, 1]. Identical strings score 1.0.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }

    let tokens_a: Vec<&str> = a.split_whitespace().collect();
    let tokens_b: Vec<&str> = b.split_whitespace().collect();
    let total = tokens_a.len() + tokens_b.len();
    if total == 0 {
        return 0.0;
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in &tokens_b {
        *counts.entry(token).or_insert(0) += 1;
    }

    let mut common = 0usize;
    for token in &tokens_a {
        if let Some(count) = counts.get_mut(token) {
            if *count > 0 {
                *count -= 1;
                common += 1;
            }
        }
    }

    (2 * common) as f64 / total as f64
}

/// Lowercased `title content` used for similarity.
fn comparable_text(atom: &KnowledgeAtom) -> String {
    format!("{} {}", atom.title, atom.content).to_lowercase()
}

/// Combined evidence and similarity strength between two atoms.
pub fn connection_strength(a: &KnowledgeAtom, b: &KnowledgeAtom) -> f64 {
    let weight = (evidence_weight(a.evidence_level) + evidence_weight(b.evidence_level)) / 2.0;
    let similarity = text_similarity(&comparable_text(a), &comparable_text(b));
    weight * (BASE_FACTOR + SIMILARITY_FACTOR * similarity)
}

/// Build the auto-derived `source → target` connection.
pub fn build_connection(
    source: &KnowledgeAtom,
    target: &KnowledgeAtom,
    confidence: f64,
) -> AtomConnection {
    AtomConnection::new(
        source.id.clone(),
        target.id.clone(),
        RelationshipType::Correlates,
        connection_strength(source, target),
        confidence,
    )
}
