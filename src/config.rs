//! Engine configuration.
//!
//! Every field has a documented default. A configuration document may set
//! any subset of fields; unset fields keep their defaults individually, so
//! `{"validation": {"strictMode": true}}` changes exactly one flag and leaves
//! the rest of the `validation` group (including `criteria`) at defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::types::EvidenceLevel;

/// How often version metadata is refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateFrequency {
    /// On every change.
    Realtime,
    /// Hourly.
    Hourly,
    /// Daily.
    Daily,
    /// Weekly.
    Weekly,
}

/// What to do when a subscriber's mailbox is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest undelivered event.
    DropOldest,
    /// Close the subscription.
    Disconnect,
}

/// Version-control options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VersionControlConfig {
    /// Whether version tracking is on.
    pub enabled: bool,
    /// Whether version metadata refreshes automatically.
    pub auto_update: bool,
    /// Refresh frequency.
    pub frequency: UpdateFrequency,
}

impl Default for VersionControlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_update: true,
            frequency: UpdateFrequency::Daily,
        }
    }
}

/// Thresholds applied by the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationCriteria {
    /// Lowest evidence level accepted without a strict-mode warning.
    pub minimum_evidence: EvidenceLevel,
    /// Strict mode: atoms without references are rejected.
    pub require_references: bool,
    /// Age after which an atom is reported as outdated.
    pub max_age_days: u32,
    /// Strict mode: atoms without metadata are flagged.
    pub require_metadata: bool,
}

impl Default for ValidationCriteria {
    fn default() -> Self {
        Self {
            minimum_evidence: EvidenceLevel::Moderate,
            require_references: true,
            max_age_days: 1826,
            require_metadata: false,
        }
    }
}

/// Validation options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationConfig {
    /// Run domain, evidence and recency checks. Structural checks always run.
    pub enabled: bool,
    /// Apply the stricter schema rules.
    pub strict_mode: bool,
    /// Re-validate atoms on update.
    pub auto_validate: bool,
    /// Thresholds.
    pub criteria: ValidationCriteria,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strict_mode: false,
            auto_validate: true,
            criteria: ValidationCriteria::default(),
        }
    }
}

/// Performance options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceConfig {
    /// Validation cache capacity and default search page size.
    pub cache_size: usize,
    /// Accepted for compatibility; the engine holds everything in memory.
    pub prefetch_enabled: bool,
    /// Accepted for compatibility; the engine holds everything in memory.
    pub lazy_loading: bool,
    /// Maximum outgoing connections kept per atom.
    pub max_connections: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            cache_size: 1000,
            prefetch_enabled: true,
            lazy_loading: true,
            max_connections: 10,
        }
    }
}

/// Security toggles. Enforcement belongs to the host application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityConfig {
    /// Host enforces access control.
    pub access_control: bool,
    /// Host authenticates writers.
    pub authentication: bool,
    /// Host encrypts exported snapshots.
    pub encryption: bool,
    /// Emit an audit log line for every mutation.
    pub audit_trail: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            access_control: false,
            authentication: true,
            encryption: false,
            audit_trail: false,
        }
    }
}

/// Graph construction and notification options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphConfig {
    /// Confidence assigned to auto-derived connections.
    ///
    /// A fixed constant, not a statistic derived from the references.
    pub baseline_confidence: f64,
    /// Build edges from existing atoms that already declare a newly added id.
    pub backfill_dangling: bool,
    /// Events buffered per subscriber.
    pub subscriber_buffer: usize,
    /// Policy when a subscriber's buffer is full.
    pub overflow_policy: OverflowPolicy,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            baseline_confidence: 0.8,
            backfill_dangling: false,
            subscriber_buffer: 256,
            overflow_policy: OverflowPolicy::DropOldest,
        }
    }
}

/// Process-wide engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AtomConfig {
    /// Version-control options.
    pub version_control: VersionControlConfig,
    /// Validation options.
    pub validation: ValidationConfig,
    /// Performance options.
    pub performance: PerformanceConfig,
    /// Security toggles.
    pub security: SecurityConfig,
    /// Graph construction options.
    pub graph: GraphConfig,
}

impl AtomConfig {
    /// Parse a (possibly partial) JSON document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Check semantic constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.performance.cache_size == 0 {
            return Err(ConfigError::Zero("performance.cacheSize"));
        }
        if self.performance.max_connections == 0 {
            return Err(ConfigError::Zero("performance.maxConnections"));
        }
        if self.validation.criteria.max_age_days == 0 {
            return Err(ConfigError::Zero("validation.criteria.maxAgeDays"));
        }
        if self.graph.subscriber_buffer == 0 {
            return Err(ConfigError::Zero("graph.subscriberBuffer"));
        }
        let confidence = self.graph.baseline_confidence;
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ConfigError::OutOfUnitRange {
                field: "graph.baselineConfidence",
                value: confidence,
            });
        }
        Ok(())
    }
}
