//! Precision constants for scientific data.
//!
//! A fixed reference table of rigor thresholds consumed by the validation
//! engine. Pure data: nothing here has behavior beyond lookups.
//!
//! | Group | Contents |
//! |-------|----------|
//! | Statistical | sample sizes, p-value cut-offs, effect-size bands |
//! | Neuroimaging | scanner field strength, DWI directions, scan volume |
//! | Biochemical | physiological ranges per biomarker |
//! | Temporal | study-design intervals |

use serde::{Deserialize, Serialize};

/// Statistical requirements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalConstants {
    /// Smallest sample with acceptable statistical power.
    pub min_sample_size: u32,
    /// Preferred sample size.
    pub preferred_sample_size: u32,
    /// Large sample threshold.
    pub large_sample_size: u32,
    /// Very large sample threshold.
    pub very_large_sample_size: u32,
    /// Default confidence level for intervals.
    pub confidence_interval_default: f64,
    /// Significance cut-off.
    pub p_value_significance: f64,
    /// High-significance cut-off.
    pub p_value_high_significance: f64,
    /// Extreme-significance cut-off.
    pub p_value_extreme_significance: f64,
    /// Ratio of CI width to its upper bound above which uncertainty is high.
    pub max_ci_width_ratio: f64,
}

/// Neuroimaging requirements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuroimagingConstants {
    /// Minimum MRI field strength in Tesla.
    pub mri_field_strength_tesla: f64,
    /// Minimum diffusion directions for DTI.
    pub dwi_directions: u32,
    /// Echo time resolution in ms.
    pub echo_time_resolution_ms: f64,
    /// BOLD fMRI repetition window in minutes.
    pub bold_fmri_tr_minutes: u32,
    /// Minimal scanning volume in mm³.
    pub scanning_volume_mm3_minimal: u32,
}

/// Physiological range of a biomarker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BiomarkerRange {
    /// Canonical biomarker name.
    pub name: &'static str,
    /// Accepted aliases (lowercase).
    pub aliases: &'static [&'static str],
    /// Lower bound, inclusive.
    pub min: f64,
    /// Upper bound, inclusive.
    pub max: f64,
    /// Unit the bounds are expressed in.
    pub unit: &'static str,
}

impl BiomarkerRange {
    /// Whether `value` lies within the range.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Whether `name` refers to this biomarker.
    pub fn matches(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        self.name == name || self.aliases.contains(&name.as_str())
    }
}

/// Effect-size benchmark bands (Cohen's d).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectSizeBands {
    /// Below this an effect is negligible.
    pub minimal: f64,
    /// Small effect.
    pub small: f64,
    /// Medium effect.
    pub medium: f64,
    /// Large effect.
    pub large: f64,
    /// Very large effect.
    pub very_large: f64,
}

/// Classification of an effect size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectSizeBand {
    /// Below the minimal band.
    Negligible,
    /// At least minimal.
    Minimal,
    /// At least small.
    Small,
    /// At least medium.
    Medium,
    /// At least large.
    Large,
    /// At least very large.
    VeryLarge,
}

impl EffectSizeBands {
    /// Classify an effect size by its magnitude.
    pub fn classify(&self, effect_size: f64) -> EffectSizeBand {
        let magnitude = effect_size.abs();
        if magnitude >= self.very_large {
            EffectSizeBand::VeryLarge
        } else if magnitude >= self.large {
            EffectSizeBand::Large
        } else if magnitude >= self.medium {
            EffectSizeBand::Medium
        } else if magnitude >= self.small {
            EffectSizeBand::Small
        } else if magnitude >= self.minimal {
            EffectSizeBand::Minimal
        } else {
            EffectSizeBand::Negligible
        }
    }
}

/// Study-design intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalConstants {
    /// Hours to peak drug concentration.
    pub drug_peak_time_hours: u32,
    /// Sleep cycle analysis window in minutes.
    pub sleep_cycle_analysis_minutes: u32,
    /// Minimum longitudinal study length in months.
    pub longitudinal_study_months: u32,
    /// Chronobiological adjustment in weeks.
    pub chronobiological_adjustment_weeks: u32,
    /// Neuroplasticity window in months.
    pub neuroplasticity_months: u32,
}

/// The full precision table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrecisionConstants {
    /// Statistical requirements.
    pub statistical: StatisticalConstants,
    /// Neuroimaging requirements.
    pub neuroimaging: NeuroimagingConstants,
    /// Biomarker physiological ranges.
    pub biomarkers: &'static [BiomarkerRange],
    /// Effect-size bands.
    pub effect_size: EffectSizeBands,
    /// Study-design intervals.
    pub temporal: TemporalConstants,
}

/// Physiological ranges recognized by the validator.
pub const BIOMARKER_RANGES: &[BiomarkerRange] = &[
    BiomarkerRange { name: "serum_gaba", aliases: &["gaba"], min: 20.0, max: 90.0, unit: "pmol/L" },
    BiomarkerRange { name: "plasma_tyrosine", aliases: &["tyrosine"], min: 100.0, max: 300.0, unit: "nM" },
    BiomarkerRange { name: "cortisol_am", aliases: &["cortisol"], min: 50.0, max: 350.0, unit: "nmol/L" },
    BiomarkerRange { name: "il6", aliases: &["il-6"], min: 0.5, max: 20.0, unit: "pg/mL" },
    BiomarkerRange { name: "crp", aliases: &["c-reactive_protein"], min: 0.1, max: 10.0, unit: "mg/L" },
    BiomarkerRange { name: "tnf_alpha", aliases: &["tnf-alpha", "tnf"], min: 5.0, max: 200.0, unit: "pg/mL" },
];

impl PrecisionConstants {
    /// Look up the range for a biomarker name or alias.
    pub fn biomarker_range(&self, name: &str) -> Option<&BiomarkerRange> {
        self.biomarkers.iter().find(|r| r.matches(name))
    }
}

impl Default for PrecisionConstants {
    fn default() -> Self {
        Self {
            statistical: StatisticalConstants {
                min_sample_size: 30,
                preferred_sample_size: 100,
                large_sample_size: 500,
                very_large_sample_size: 1000,
                confidence_interval_default: 0.95,
                p_value_significance: 0.05,
                p_value_high_significance: 0.01,
                p_value_extreme_significance: 0.001,
                max_ci_width_ratio: 0.2,
            },
            neuroimaging: NeuroimagingConstants {
                mri_field_strength_tesla: 3.0,
                dwi_directions: 64,
                echo_time_resolution_ms: 2.0,
                bold_fmri_tr_minutes: 6,
                scanning_volume_mm3_minimal: 1200,
            },
            biomarkers: BIOMARKER_RANGES,
            effect_size: EffectSizeBands {
                minimal: 0.2,
                small: 0.5,
                medium: 0.8,
                large: 1.2,
                very_large: 2.0,
            },
            temporal: TemporalConstants {
                drug_peak_time_hours: 1,
                sleep_cycle_analysis_minutes: 30,
                longitudinal_study_months: 12,
                chronobiological_adjustment_weeks: 4,
                neuroplasticity_months: 6,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_biomarker_lookup_by_alias() {
        let constants = PrecisionConstants::default();
        let gaba = constants.biomarker_range("GABA").unwrap();
        assert_eq!(gaba.name, "serum_gaba");
        assert!(gaba.contains(20.0));
        assert!(gaba.contains(90.0));
        assert!(!gaba.contains(90.5));
        assert!(constants.biomarker_range("dopamine").is_none());
    }

    #[test]
    fn test_effect_size_bands() {
        let bands = PrecisionConstants::default().effect_size;
        assert_eq!(bands.classify(0.1), EffectSizeBand::Negligible);
        assert_eq!(bands.classify(0.2), EffectSizeBand::Minimal);
        assert_eq!(bands.classify(-0.9), EffectSizeBand::Medium);
        assert_eq!(bands.classify(2.5), EffectSizeBand::VeryLarge);
    }
}
