//! Search query and result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::atom::{AtomType, EvidenceLevel, KnowledgeAtom};

/// Filters for [`crate::AtomEngine::search`].
///
/// All set filters are intersected. Empty lists mean "no filter".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AtomSearchQuery {
    /// Free text, matched as whole tokens (all must match).
    pub text: Option<String>,
    /// Allowed categories.
    pub categories: Vec<String>,
    /// Allowed atom types.
    pub types: Vec<AtomType>,
    /// Allowed evidence levels.
    pub evidence_levels: Vec<EvidenceLevel>,
    /// Only atoms updated at or after this instant.
    pub updated_since: Option<DateTime<Utc>>,
    /// Only atoms updated strictly before this instant.
    pub updated_before: Option<DateTime<Utc>>,
    /// Require (or exclude) biomarker data.
    pub has_biomarkers: Option<bool>,
    /// Require (or exclude) neuroimaging data.
    pub has_neuroimaging: Option<bool>,
    /// 1-based page number.
    pub page: Option<usize>,
    /// Page size; defaults to the configured cache size.
    pub page_size: Option<usize>,
}

impl AtomSearchQuery {
    /// Query matching free text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Restrict to a category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    /// Restrict to an atom type.
    pub fn with_type(mut self, atom_type: AtomType) -> Self {
        self.types.push(atom_type);
        self
    }

    /// Restrict to an evidence level.
    pub fn with_evidence(mut self, level: EvidenceLevel) -> Self {
        self.evidence_levels.push(level);
        self
    }

    /// Select a page.
    pub fn with_page(mut self, page: usize, page_size: usize) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    /// Names of the non-text filters that are set.
    pub fn filters_used(&self) -> Vec<String> {
        let mut used = Vec::new();
        if !self.categories.is_empty() {
            used.push("categories".to_string());
        }
        if !self.types.is_empty() {
            used.push("types".to_string());
        }
        if !self.evidence_levels.is_empty() {
            used.push("evidenceLevels".to_string());
        }
        if self.updated_since.is_some() || self.updated_before.is_some() {
            used.push("dateRange".to_string());
        }
        if self.has_biomarkers.is_some() {
            used.push("hasBiomarkers".to_string());
        }
        if self.has_neuroimaging.is_some() {
            used.push("hasNeuroimaging".to_string());
        }
        used
    }

    /// Whether an atom passes every non-text filter.
    pub fn matches_filters(&self, atom: &KnowledgeAtom) -> bool {
        if !self.categories.is_empty() && !self.categories.contains(&atom.category) {
            return false;
        }
        if !self.types.is_empty() && !self.types.contains(&atom.atom_type) {
            return false;
        }
        if !self.evidence_levels.is_empty() && !self.evidence_levels.contains(&atom.evidence_level) {
            return false;
        }
        if let Some(since) = self.updated_since {
            if atom.last_updated < since {
                return false;
            }
        }
        if let Some(before) = self.updated_before {
            if atom.last_updated >= before {
                return false;
            }
        }
        if let Some(wanted) = self.has_biomarkers {
            if atom.has_biomarkers() != wanted {
                return false;
            }
        }
        if let Some(wanted) = self.has_neuroimaging {
            if atom.has_neuroimaging() != wanted {
                return false;
            }
        }
        true
    }
}

/// Counts of atoms grouped by categorical fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFacets {
    /// Count per category.
    pub categories: BTreeMap<String, usize>,
    /// Count per atom type.
    pub types: BTreeMap<AtomType, usize>,
    /// Count per evidence level.
    pub evidence_levels: BTreeMap<EvidenceLevel, usize>,
    /// Count per date bucket (only `all` is populated).
    pub date_ranges: BTreeMap<String, usize>,
}

impl SearchFacets {
    /// Count the given atoms.
    pub fn count<'a>(atoms: impl IntoIterator<Item = &'a KnowledgeAtom>) -> Self {
        let mut facets = Self::default();
        for atom in atoms {
            *facets.categories.entry(atom.category.clone()).or_insert(0) += 1;
            *facets.types.entry(atom.atom_type).or_insert(0) += 1;
            *facets.evidence_levels.entry(atom.evidence_level).or_insert(0) += 1;
            *facets.date_ranges.entry("all".to_string()).or_insert(0) += 1;
        }
        facets
    }
}

/// Page metadata for a search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// 1-based page number.
    pub page: usize,
    /// Page size.
    pub page_size: usize,
    /// Number of pages.
    pub total_pages: usize,
    /// Whether a later page exists.
    pub has_next: bool,
    /// Whether an earlier page exists.
    pub has_previous: bool,
}

impl Pagination {
    /// Compute pagination for `total` matches.
    ///
    /// A zero page or page size is treated as 1.
    pub fn compute(page: usize, page_size: usize, total: usize) -> Self {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let total_pages = total.div_ceil(page_size);
        Self {
            page,
            page_size,
            total_pages,
            has_next: page < total_pages,
            has_previous: page > 1,
        }
    }

    /// Range of item offsets covered by this page, clamped to `total`.
    pub fn window(&self, total: usize) -> std::ops::Range<usize> {
        let start = (self.page - 1).saturating_mul(self.page_size).min(total);
        let end = start.saturating_add(self.page_size).min(total);
        start..end
    }
}

/// Breakdown of how a text query was interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryAnalysis {
    /// Normalized query terms.
    pub terms: Vec<String>,
    /// Non-text filters that were applied.
    pub filters_used: Vec<String>,
    /// Index terms similar to the query.
    pub suggestions: Vec<String>,
}

/// Result of a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomSearchResult {
    /// Atoms on the requested page, most recent first.
    pub atoms: Vec<KnowledgeAtom>,
    /// Number of matches across all pages.
    pub total_count: usize,
    /// Facet counts over the whole store, not the filtered subset.
    pub facets: SearchFacets,
    /// Page metadata.
    pub pagination: Pagination,
    /// Elapsed search time in microseconds.
    pub search_time_us: u64,
    /// Present when the query had text.
    pub query_analysis: Option<QueryAnalysis>,
}
