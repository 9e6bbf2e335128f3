//! # atomic-knowledge-kernel
//!
//! In-process store for discrete, validated scientific claims ("knowledge
//! atoms") with a token-level search index and evidence-weighted connections.
//!
//! The engine answers three questions:
//!
//! > Is this claim well-formed and scientifically plausible?
//! > Which stored claims mention these terms?
//! > How strongly are two declared-related claims connected?
//!
//! ## Architecture
//!
//! ```text
//! KnowledgeAtom → validate_atom → AtomGraph ─┬─ atoms
//!                    ↑                        ├─ connections (outgoing / incoming)
//!           PrecisionConstants                └─ SearchIndex (forward / reverse)
//!                                    ↓
//!                 AtomEngine (RwLock, LRU cache, events, analytics)
//!                                    ↓
//!                   AtomSnapshot (checksum + optional HMAC)
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Atoms, connections and index buckets iterate in id order
//! - Search results order by `last_updated` descending, ties by id
//! - Connection strength is symmetric in its two atoms
//! - Snapshot checksums are computed over canonical JSON

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod precision;
pub mod config;
pub mod error;
pub mod validation;
pub mod connection;
pub mod index;
pub mod store;
pub mod cache;
pub mod events;
pub mod analytics;
pub mod snapshot;
pub mod engine;
pub mod canonical;
pub mod cancel;
pub mod telemetry;

// Re-exports
pub use types::{
    AgeRange, AtomConnection, AtomEvent, AtomEventKind, AtomId, AtomMetadata, AtomPatch,
    AtomSearchQuery, AtomSearchResult, AtomType, AtomValidationResult, Biomarker,
    ConfidenceInterval, ConnectionId, DosageInformation, EffectDirection, EventImpact,
    EvidenceLevel, GeneticFactors, ImagingTechnique, KnowledgeAtom, NeuroimagingData,
    Pagination, QueryAnalysis, RelationshipType, SearchFacets, ValidationIssues,
};
pub use precision::{BiomarkerRange, PrecisionConstants, BIOMARKER_RANGES};
pub use config::{
    AtomConfig, GraphConfig, OverflowPolicy, PerformanceConfig, SecurityConfig, UpdateFrequency,
    ValidationConfig, ValidationCriteria, VersionControlConfig,
};
pub use error::{AtomError, ConfigError, Result, SnapshotError};
pub use validation::{quality_score, validate_atom};
pub use connection::{build_connection, connection_strength, evidence_weight, text_similarity};
pub use index::{IndexConsistencyError, SearchIndex};
pub use store::{AtomGraph, EdgePolicy};
pub use cache::{CacheStats, ValidationCache};
pub use events::{SubscriberHub, Subscription};
pub use analytics::{AnalyticsLedger, AtomMetrics, InteractionKind};
pub use snapshot::{AtomSnapshot, DuplicateStrategy, ExportOptions, ImportOptions, SnapshotMetadata};
pub use engine::{AtomEngine, BatchReport, GraphStats, QualityMetrics};
pub use canonical::{canonical_hash, canonical_hash_hex, to_canonical_bytes};
pub use cancel::CancellationToken;
pub use telemetry::{init_tracing, LogFormat};

/// Schema version written into snapshots and reported by stats.
pub const ATOM_SCHEMA_VERSION: &str = "1.0.0";
