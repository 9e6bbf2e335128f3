//! Knowledge atom types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an atom in the knowledge graph.
///
/// Wraps a string and implements `Ord` for deterministic ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AtomId(String);

impl AtomId {
    /// Create a new AtomId.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AtomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AtomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for AtomId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Kind of claim an atom makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtomType {
    /// Abstract concept.
    Concept,
    /// Single established fact.
    Fact,
    /// Biological mechanism of action.
    Mechanism,
    /// Interaction between substances.
    Interaction,
    /// Summary of a research study.
    Study,
    /// Practical guideline or recommendation.
    Guideline,
}

impl AtomType {
    /// All atom types in declaration order.
    pub const ALL: [AtomType; 6] = [
        Self::Concept,
        Self::Fact,
        Self::Mechanism,
        Self::Interaction,
        Self::Study,
        Self::Guideline,
    ];

    /// Parse atom type from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "concept" => Some(Self::Concept),
            "fact" => Some(Self::Fact),
            "mechanism" => Some(Self::Mechanism),
            "interaction" => Some(Self::Interaction),
            "study" => Some(Self::Study),
            "guideline" => Some(Self::Guideline),
            _ => None,
        }
    }
}

impl Default for AtomType {
    fn default() -> Self {
        Self::Fact
    }
}

impl fmt::Display for AtomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concept => write!(f, "concept"),
            Self::Fact => write!(f, "fact"),
            Self::Mechanism => write!(f, "mechanism"),
            Self::Interaction => write!(f, "interaction"),
            Self::Study => write!(f, "study"),
            Self::Guideline => write!(f, "guideline"),
        }
    }
}

/// Strength-of-evidence tag asserted by the atom's author.
///
/// Ordered from weakest to strongest so that `level >= EvidenceLevel::Moderate`
/// reads naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceLevel {
    /// Not enough evidence to support the claim.
    Insufficient,
    /// Preliminary or conflicting evidence.
    Weak,
    /// Consistent evidence from smaller studies.
    Moderate,
    /// Replicated evidence from well-powered studies.
    Strong,
}

impl EvidenceLevel {
    /// All levels from strongest to weakest.
    pub const ALL: [EvidenceLevel; 4] = [
        Self::Strong,
        Self::Moderate,
        Self::Weak,
        Self::Insufficient,
    ];

    /// Parse evidence level from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "STRONG" => Some(Self::Strong),
            "MODERATE" => Some(Self::Moderate),
            "WEAK" => Some(Self::Weak),
            "INSUFFICIENT" => Some(Self::Insufficient),
            _ => None,
        }
    }
}

impl Default for EvidenceLevel {
    fn default() -> Self {
        Self::Insufficient
    }
}

impl fmt::Display for EvidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strong => write!(f, "STRONG"),
            Self::Moderate => write!(f, "MODERATE"),
            Self::Weak => write!(f, "WEAK"),
            Self::Insufficient => write!(f, "INSUFFICIENT"),
        }
    }
}

/// Direction of a reported effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectDirection {
    /// Beneficial effect.
    Positive,
    /// Harmful or reducing effect.
    Negative,
    /// No measurable effect.
    Neutral,
}

/// Neuroimaging technique used by a study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImagingTechnique {
    /// Positron emission tomography.
    #[serde(rename = "PET")]
    Pet,
    /// Structural magnetic resonance imaging.
    #[serde(rename = "MRI")]
    Mri,
    /// Functional MRI.
    #[serde(rename = "fMRI")]
    Fmri,
    /// Electroencephalography.
    #[serde(rename = "EEG")]
    Eeg,
    /// Magnetoencephalography.
    #[serde(rename = "MEG")]
    Meg,
    /// Diffusion tensor imaging.
    #[serde(rename = "DTI")]
    Dti,
}

impl ImagingTechnique {
    /// Whether the technique relies on an MRI scanner.
    pub fn uses_magnet(&self) -> bool {
        matches!(self, Self::Mri | Self::Fmri | Self::Dti)
    }
}

/// Inclusive numeric range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgeRange {
    /// Lower bound.
    pub min: u32,
    /// Upper bound.
    pub max: u32,
}

/// 95% confidence interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
}

impl ConfidenceInterval {
    /// Width of the interval.
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Dosage reported alongside a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DosageInformation {
    /// Substance name.
    pub substance: String,
    /// Dose, e.g. "2000 IU".
    pub dose: String,
    /// Duration, e.g. "12 weeks".
    pub duration: String,
    /// Timing, e.g. "with breakfast".
    pub timing: String,
}

/// Neuroimaging parameters of the underlying study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeuroimagingData {
    /// Imaging technique.
    pub technique: ImagingTechnique,
    /// Number of participants scanned.
    pub sample_size: u32,
    /// Described effect.
    pub effect: String,
    /// Magnitude of change.
    pub change: f64,
    /// Unit of `change`.
    pub unit: String,
    /// Reported p-value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
    /// Reported 95% confidence interval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ci95: Option<ConfidenceInterval>,
    /// Scanner field strength in Tesla.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_strength_tesla: Option<f64>,
    /// Number of diffusion directions (DTI).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dwi_directions: Option<u32>,
}

/// A single biomarker reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Biomarker {
    /// Biomarker name, e.g. `serum_gaba`.
    pub name: String,
    /// Measured value (post-intervention when a baseline is given).
    pub value: f64,
    /// Pre-intervention value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<f64>,
    /// Unit of measurement.
    pub unit: String,
    /// Reported significance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub significance: Option<String>,
}

/// Genetic modifiers of the claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneticFactors {
    /// Genes involved.
    pub genes: Vec<String>,
    /// Relevant polymorphisms.
    pub polymorphisms: Vec<String>,
    /// Whether the effect is genotype specific.
    pub genotype_specificity: bool,
}

/// Optional structured scientific data attached to an atom.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AtomMetadata {
    /// Total study size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub study_size: Option<u32>,
    /// Reported confidence [0, 1].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Effect size (Cohen's d).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect_size: Option<f64>,
    /// Whether the result reached significance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistical_significance: Option<bool>,
    /// Direction of the effect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect_direction: Option<EffectDirection>,
    /// Population studied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_population: Option<String>,
    /// Age range of participants.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_range: Option<AgeRange>,
    /// Dosage details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dosage_information: Option<DosageInformation>,
    /// Neuroimaging parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neuroimaging_data: Option<NeuroimagingData>,
    /// Biomarker readings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biomarkers: Option<Vec<Biomarker>>,
    /// Genetic modifiers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genetic_factors: Option<GeneticFactors>,
}

/// A discrete unit of scientific claim with evidence metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeAtom {
    /// Unique atom identifier.
    pub id: AtomId,
    /// Kind of claim.
    #[serde(rename = "type")]
    pub atom_type: AtomType,
    /// Free-form category used for faceting.
    pub category: String,
    /// English title.
    pub title: String,
    /// Polish title.
    #[serde(default)]
    pub polish_title: String,
    /// English content.
    pub content: String,
    /// Polish content.
    #[serde(default)]
    pub polish_content: String,
    /// Asserted evidence level.
    pub evidence_level: EvidenceLevel,
    /// Last modification time.
    pub last_updated: DateTime<Utc>,
    /// Ordered citations.
    #[serde(default)]
    pub references: Vec<String>,
    /// Ids this atom declares a relationship to. May dangle.
    #[serde(default)]
    pub related_atoms: Vec<AtomId>,
    /// Structured scientific data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AtomMetadata>,
}

impl KnowledgeAtom {
    /// Create an atom with the required fields; the rest start empty.
    pub fn new(
        id: impl Into<AtomId>,
        atom_type: AtomType,
        category: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        evidence_level: EvidenceLevel,
    ) -> Self {
        Self {
            id: id.into(),
            atom_type,
            category: category.into(),
            title: title.into(),
            polish_title: String::new(),
            content: content.into(),
            polish_content: String::new(),
            evidence_level,
            last_updated: Utc::now(),
            references: Vec::new(),
            related_atoms: Vec::new(),
            metadata: None,
        }
    }

    /// Set the Polish title and content.
    pub fn with_polish(mut self, title: impl Into<String>, content: impl Into<String>) -> Self {
        self.polish_title = title.into();
        self.polish_content = content.into();
        self
    }

    /// Append a citation.
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.references.push(reference.into());
        self
    }

    /// Declare a relationship to another atom.
    pub fn with_related(mut self, id: impl Into<AtomId>) -> Self {
        self.related_atoms.push(id.into());
        self
    }

    /// Attach scientific metadata.
    pub fn with_metadata(mut self, metadata: AtomMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Override the modification time.
    pub fn with_last_updated(mut self, at: DateTime<Utc>) -> Self {
        self.last_updated = at;
        self
    }

    /// Whether the atom carries any biomarker readings.
    pub fn has_biomarkers(&self) -> bool {
        self.metadata
            .as_ref()
            .and_then(|m| m.biomarkers.as_ref())
            .is_some_and(|b| !b.is_empty())
    }

    /// Whether the atom carries neuroimaging data.
    pub fn has_neuroimaging(&self) -> bool {
        self.metadata
            .as_ref()
            .is_some_and(|m| m.neuroimaging_data.is_some())
    }
}

/// Partial update for an existing atom.
///
/// `None` leaves a field untouched. `metadata: Some(None)` clears metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AtomPatch {
    /// New atom type.
    #[serde(rename = "type")]
    pub atom_type: Option<AtomType>,
    /// New category.
    pub category: Option<String>,
    /// New English title.
    pub title: Option<String>,
    /// New Polish title.
    pub polish_title: Option<String>,
    /// New English content.
    pub content: Option<String>,
    /// New Polish content.
    pub polish_content: Option<String>,
    /// New evidence level.
    pub evidence_level: Option<EvidenceLevel>,
    /// Replacement citations.
    pub references: Option<Vec<String>>,
    /// Replacement relationship declarations.
    pub related_atoms: Option<Vec<AtomId>>,
    /// Replacement metadata. JSON `null` clears it; an absent key leaves it.
    #[serde(deserialize_with = "present_field", skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Option<AtomMetadata>>,
}

/// Wrap any present value, `null` included, so it can be told apart from a
/// missing key.
fn present_field<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl AtomPatch {
    /// Whether any field that feeds the search index is set.
    pub fn touches_index(&self) -> bool {
        self.title.is_some()
            || self.polish_title.is_some()
            || self.content.is_some()
            || self.polish_content.is_some()
            || self.references.is_some()
            || self.related_atoms.is_some()
    }

    /// Whether any field that feeds connection strength is set.
    pub fn touches_connections(&self) -> bool {
        self.title.is_some()
            || self.content.is_some()
            || self.evidence_level.is_some()
            || self.related_atoms.is_some()
    }

    /// Apply the patch to an atom, returning the merged copy.
    ///
    /// `last_updated` is always set to `now`.
    pub fn apply(&self, atom: &KnowledgeAtom, now: DateTime<Utc>) -> KnowledgeAtom {
        let mut merged = atom.clone();
        if let Some(t) = self.atom_type {
            merged.atom_type = t;
        }
        if let Some(c) = &self.category {
            merged.category = c.clone();
        }
        if let Some(t) = &self.title {
            merged.title = t.clone();
        }
        if let Some(t) = &self.polish_title {
            merged.polish_title = t.clone();
        }
        if let Some(c) = &self.content {
            merged.content = c.clone();
        }
        if let Some(c) = &self.polish_content {
            merged.polish_content = c.clone();
        }
        if let Some(level) = self.evidence_level {
            merged.evidence_level = level;
        }
        if let Some(refs) = &self.references {
            merged.references = refs.clone();
        }
        if let Some(related) = &self.related_atoms {
            merged.related_atoms = related.clone();
        }
        if let Some(metadata) = &self.metadata {
            merged.metadata = metadata.clone();
        }
        merged.last_updated = now;
        merged
    }
}
