//! Validation result types.

use serde::{Deserialize, Serialize};

use super::atom::AtomId;

/// Issues grouped by kind, for display next to an atom.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssues {
    /// Missing or too-short required fields.
    pub missing_fields: Vec<String>,
    /// Values outside physiological or formal bounds.
    pub inconsistent_data: Vec<String>,
    /// Claims not backed by the data attached to them.
    pub questionable_claims: Vec<String>,
    /// Staleness and citation problems.
    pub outdated_references: Vec<String>,
}

impl ValidationIssues {
    /// Whether no issue of any kind was recorded.
    pub fn is_empty(&self) -> bool {
        self.missing_fields.is_empty()
            && self.inconsistent_data.is_empty()
            && self.questionable_claims.is_empty()
            && self.outdated_references.is_empty()
    }
}

/// Outcome of validating a single atom.
///
/// `quality_score` is a heuristic in [0, 100], not a probability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomValidationResult {
    /// Validated atom.
    pub atom_id: AtomId,
    /// True when there are no errors.
    pub is_valid: bool,
    /// Errors that prevent storage.
    pub errors: Vec<String>,
    /// Non-blocking warnings.
    pub warnings: Vec<String>,
    /// Heuristic completeness score.
    pub quality_score: u32,
    /// Structured issue breakdown.
    pub issues: ValidationIssues,
    /// Human-readable remediation steps.
    pub recommended_actions: Vec<String>,
}

impl AtomValidationResult {
    /// Whether the result carries any error or warning.
    pub fn has_findings(&self) -> bool {
        !self.errors.is_empty() || !self.warnings.is_empty()
    }
}
