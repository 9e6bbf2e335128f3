//! Error types for the knowledge graph engine.

use thiserror::Error;

use crate::types::{AtomId, AtomValidationResult};

/// Malformed engine configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A numeric field that must be positive was zero.
    #[error("Config field `{0}` must be greater than zero")]
    Zero(&'static str),

    /// A ratio field was outside [0, 1].
    #[error("Config field `{field}` must be within [0, 1], got {value}")]
    OutOfUnitRange {
        /// Offending field.
        field: &'static str,
        /// Supplied value.
        value: f64,
    },

    /// The configuration document could not be parsed.
    #[error("Config could not be parsed: {0}")]
    Parse(String),

    /// The configuration file could not be read.
    #[error("Config file could not be read: {0}")]
    Read(String),
}

/// Problems with an export snapshot presented for import.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// The snapshot uses a format this engine cannot read.
    #[error("Unsupported snapshot format: {0}")]
    UnsupportedFormat(String),

    /// The snapshot was written by an incompatible schema version.
    #[error("Unsupported snapshot version: {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version found in the snapshot.
        found: String,
        /// Version this engine writes.
        expected: String,
    },

    /// The atom payload does not match the recorded checksum.
    #[error("Snapshot checksum mismatch: expected {expected}, computed {computed}")]
    ChecksumMismatch {
        /// Checksum recorded in the snapshot.
        expected: String,
        /// Checksum of the atoms actually present.
        computed: String,
    },

    /// A signing key was supplied but the snapshot is unsigned.
    #[error("Snapshot is not signed")]
    MissingSignature,

    /// The signature does not verify under the supplied key.
    #[error("Snapshot signature is invalid")]
    InvalidSignature,
}

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum AtomError {
    /// The atom failed validation and was not stored.
    #[error("Invalid atom {atom_id}: {}", result.errors.join(", "))]
    Validation {
        /// Rejected atom.
        atom_id: AtomId,
        /// Full validation outcome, for display.
        result: Box<AtomValidationResult>,
    },

    /// The referenced atom does not exist.
    #[error("Atom not found: {0}")]
    NotFound(AtomId),

    /// Malformed configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Snapshot could not be imported.
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// The operation was cancelled before completion.
    #[error("Operation cancelled")]
    Cancelled,

    /// The engine has been shut down.
    #[error("Engine has been shut down")]
    ShutDown,

    /// IO error while reading or writing a snapshot.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AtomError {
    /// Validation result carried by a `Validation` error.
    pub fn validation_result(&self) -> Option<&AtomValidationResult> {
        match self {
            Self::Validation { result, .. } => Some(result),
            _ => None,
        }
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, AtomError>;
