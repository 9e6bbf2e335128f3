//! Validation engine for knowledge atoms.
//!
//! ## Checks
//!
//! | Check | Runs when | Outcome |
//! |-------|-----------|---------|
//! | Structural (id, title ≥ 5, content ≥ 10) | always | error |
//! | Neuroimaging statistics | `enabled`, data present | warning |
//! | Study size / effect size | `enabled`, data present | warning |
//! | Biomarker physiological range | `enabled`, recognized name | error |
//! | STRONG without references | `enabled` | warning |
//! | Staleness (`maxAgeDays`) | `enabled` | warning |
//! | Id pattern, required references | `strictMode` | error |
//! | Minimum evidence, metadata, citation year | `strictMode` | warning |
//!
//! ## Quality Score
//!
//! ```text
//! score = min(100, max(0, 100 - 15·errors - 5·warnings) + 20·[STRONG] + 10·[refs ≥ 3])
//! ```
//!
//! The score is a heuristic summary of completeness, not a probability.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex_lite::Regex;

use crate::config::ValidationConfig;
use crate::precision::PrecisionConstants;
use crate::types::{
    AtomMetadata, AtomValidationResult, EvidenceLevel, KnowledgeAtom, NeuroimagingData,
    ValidationIssues,
};

/// Minimum trimmed title length, in characters.
pub const MIN_TITLE_CHARS: usize = 5;

/// Minimum trimmed content length, in characters.
pub const MIN_CONTENT_CHARS: usize = 10;

/// Maximum id length in strict mode.
pub const MAX_STRICT_ID_CHARS: usize = 50;

/// Highest quality score.
pub const MAX_QUALITY_SCORE: u32 = 100;

const ERROR_PENALTY: u32 = 15;
const WARNING_PENALTY: u32 = 5;
const STRONG_EVIDENCE_BONUS: u32 = 20;
const REFERENCE_BONUS: u32 = 10;
const REFERENCE_BONUS_THRESHOLD: usize = 3;

const ACTION_FIX_STRUCTURE: &str = "Review and fix validation errors";
const ACTION_CHECK_DATA: &str = "Re-check reported measurements against physiological ranges";
const ACTION_REVIEW_CLAIMS: &str = "Review study statistics and the asserted evidence level";
const ACTION_ADD_REFERENCES: &str = "Add scientific references";
const ACTION_UPDATE_RESEARCH: &str = "Update with recent research";

fn strict_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9_.-]+$").expect("static id pattern is valid"))
}

fn citation_year_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:^|\D)(?:1[89]|20)\d{2}(?:\D|$)").expect("static year pattern is valid")
    })
}

/// Accumulates findings and the remediation they call for.
#[derive(Default)]
struct Findings {
    errors: Vec<String>,
    warnings: Vec<String>,
    issues: ValidationIssues,
    actions: Vec<&'static str>,
}

impl Findings {
    fn suggest(&mut self, action: &'static str) {
        if !self.actions.contains(&action) {
            self.actions.push(action);
        }
    }

    fn missing_field(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.issues.missing_fields.push(message.clone());
        self.errors.push(message);
        self.suggest(ACTION_FIX_STRUCTURE);
    }

    fn inconsistent(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.issues.inconsistent_data.push(message.clone());
        self.errors.push(message);
        self.suggest(ACTION_CHECK_DATA);
    }

    fn questionable(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.issues.questionable_claims.push(message.clone());
        self.warnings.push(message);
        self.suggest(ACTION_REVIEW_CLAIMS);
    }

    fn unreferenced(&mut self, message: impl Into<String>, is_error: bool) {
        let message = message.into();
        self.issues.questionable_claims.push(message.clone());
        if is_error {
            self.errors.push(message);
        } else {
            self.warnings.push(message);
        }
        self.suggest(ACTION_ADD_REFERENCES);
    }

    fn outdated(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.issues.outdated_references.push(message.clone());
        self.warnings.push(message);
        self.suggest(ACTION_UPDATE_RESEARCH);
    }
}

/// Validate an atom against the structural rules and the precision table.
///
/// Pure: the result depends only on the arguments. `now` anchors the
/// staleness check.
pub fn validate_atom(
    atom: &KnowledgeAtom,
    constants: &PrecisionConstants,
    config: &ValidationConfig,
    now: DateTime<Utc>,
) -> AtomValidationResult {
    let mut findings = Findings::default();

    check_structure(atom, &mut findings);

    if config.enabled {
        if let Some(metadata) = &atom.metadata {
            check_metadata(metadata, constants, &mut findings);
        }

        if atom.evidence_level == EvidenceLevel::Strong && atom.references.is_empty() {
            findings.unreferenced("STRONG evidence level requires at least one reference", false);
        }

        let age_days = (now - atom.last_updated).num_days();
        if age_days > i64::from(config.criteria.max_age_days) {
            findings.outdated(format!("Atom data may be outdated ({} days old)", age_days));
        }
    }

    if config.strict_mode {
        check_strict(atom, config, &mut findings);
    }

    let quality_score = quality_score(
        findings.errors.len(),
        findings.warnings.len(),
        atom.evidence_level,
        atom.references.len(),
    );

    AtomValidationResult {
        atom_id: atom.id.clone(),
        is_valid: findings.errors.is_empty(),
        errors: findings.errors,
        warnings: findings.warnings,
        quality_score,
        issues: findings.issues,
        recommended_actions: findings.actions.into_iter().map(String::from).collect(),
    }
}

/// Heuristic quality score in [0, 100].
///
/// Non-increasing in `errors` and `warnings` with everything else fixed.
pub fn quality_score(
    errors: usize,
    warnings: usize,
    evidence_level: EvidenceLevel,
    reference_count: usize,
) -> u32 {
    let penalty = (errors as u64) * u64::from(ERROR_PENALTY)
        + (warnings as u64) * u64::from(WARNING_PENALTY);
    let mut score = u64::from(MAX_QUALITY_SCORE).saturating_sub(penalty) as u32;

    if evidence_level == EvidenceLevel::Strong {
        score += STRONG_EVIDENCE_BONUS;
    }
    if reference_count >= REFERENCE_BONUS_THRESHOLD {
        score += REFERENCE_BONUS;
    }

    score.min(MAX_QUALITY_SCORE)
}

fn check_structure(atom: &KnowledgeAtom, findings: &mut Findings) {
    if atom.id.is_blank() {
        findings.missing_field("Atom ID is required");
    }
    if atom.title.trim().chars().count() < MIN_TITLE_CHARS {
        findings.missing_field(format!("Title must be at least {} characters", MIN_TITLE_CHARS));
    }
    if atom.content.trim().chars().count() < MIN_CONTENT_CHARS {
        findings.missing_field(format!(
            "Content must be at least {} characters",
            MIN_CONTENT_CHARS
        ));
    }
}

fn check_metadata(metadata: &AtomMetadata, constants: &PrecisionConstants, findings: &mut Findings) {
    let stats = &constants.statistical;

    if let Some(imaging) = &metadata.neuroimaging_data {
        check_neuroimaging(imaging, constants, findings);
    }

    if let Some(study_size) = metadata.study_size {
        if study_size < stats.min_sample_size {
            findings.questionable(format!(
                "Study size ({}) is below the minimum of {} participants",
                study_size, stats.min_sample_size
            ));
        }
    }

    if let Some(effect_size) = metadata.effect_size {
        if effect_size.abs() < constants.effect_size.minimal {
            findings.questionable(format!(
                "Effect size ({:.2}) is below the minimal benchmark of {:.1}",
                effect_size, constants.effect_size.minimal
            ));
        }
    }

    for biomarker in metadata.biomarkers.iter().flatten() {
        let Some(range) = constants.biomarker_range(&biomarker.name) else {
            continue;
        };
        if !range.contains(biomarker.value) {
            findings.inconsistent(format!(
                "{} value {} {} is outside the physiological range {}-{} {}",
                range.name, biomarker.value, biomarker.unit, range.min, range.max, range.unit
            ));
        }
        if let Some(baseline) = biomarker.baseline {
            if !range.contains(baseline) {
                findings.inconsistent(format!(
                    "{} baseline {} {} is outside the physiological range {}-{} {}",
                    range.name, baseline, biomarker.unit, range.min, range.max, range.unit
                ));
            }
        }
    }
}

fn check_neuroimaging(
    imaging: &NeuroimagingData,
    constants: &PrecisionConstants,
    findings: &mut Findings,
) {
    let stats = &constants.statistical;
    let scanner = &constants.neuroimaging;

    if imaging.sample_size < stats.min_sample_size {
        findings.questionable(format!(
            "Small study size ({}) may limit statistical power",
            imaging.sample_size
        ));
    }

    if let Some(p_value) = imaging.p_value {
        if p_value > stats.p_value_significance {
            findings.questionable(format!(
                "Results may not be statistically significant (p > {})",
                stats.p_value_significance
            ));
        }
    }

    if let Some(ci) = imaging.ci95 {
        if ci.width() > ci.upper * stats.max_ci_width_ratio {
            findings.questionable("Wide confidence interval indicates high uncertainty");
        }
    }

    if imaging.technique.uses_magnet() {
        if let Some(tesla) = imaging.field_strength_tesla {
            if tesla < scanner.mri_field_strength_tesla {
                findings.questionable(format!(
                    "Scanner field strength {}T is below the {}T minimum",
                    tesla, scanner.mri_field_strength_tesla
                ));
            }
        }
    }

    if let Some(directions) = imaging.dwi_directions {
        if directions < scanner.dwi_directions {
            findings.questionable(format!(
                "Diffusion imaging used {} directions (minimum {})",
                directions, scanner.dwi_directions
            ));
        }
    }
}

fn check_strict(atom: &KnowledgeAtom, config: &ValidationConfig, findings: &mut Findings) {
    let criteria = &config.criteria;

    if !atom.id.is_blank() {
        let id = atom.id.as_str();
        if id.chars().count() > MAX_STRICT_ID_CHARS || !strict_id_pattern().is_match(id) {
            findings.missing_field(format!(
                "Atom ID must match [a-z0-9_.-] and be at most {} characters",
                MAX_STRICT_ID_CHARS
            ));
        }
    }

    if criteria.require_references && atom.references.is_empty() {
        findings.unreferenced("At least one reference is required", true);
    }

    if atom.evidence_level < criteria.minimum_evidence {
        findings.questionable(format!(
            "Evidence level {} is below the required minimum {}",
            atom.evidence_level, criteria.minimum_evidence
        ));
    }

    if criteria.require_metadata && atom.metadata.is_none() {
        findings.questionable("Scientific metadata is required");
    }

    for reference in &atom.references {
        if !citation_year_pattern().is_match(reference) {
            findings.outdated(format!("Reference has no publication year: {}", reference));
        }
    }
}
