//! Core types for the knowledge graph.

pub mod atom;
pub mod connection;
pub mod validation;
pub mod search;
pub mod event;

pub use atom::{
    AtomId, AtomType, EvidenceLevel, KnowledgeAtom, AtomMetadata, AtomPatch,
    NeuroimagingData, ImagingTechnique, ConfidenceInterval, Biomarker,
    DosageInformation, GeneticFactors, AgeRange, EffectDirection,
};
pub use connection::{AtomConnection, ConnectionId, RelationshipType};
pub use validation::{AtomValidationResult, ValidationIssues};
pub use search::{AtomSearchQuery, AtomSearchResult, SearchFacets, Pagination, QueryAnalysis};
pub use event::{AtomEvent, AtomEventKind, EventImpact};
