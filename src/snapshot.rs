//! Export snapshots.
//!
//! A snapshot is a self-describing JSON document holding a set of atoms and,
//! optionally, the connections among them. Integrity is protected by a
//! SHA-256 checksum over the canonical atoms JSON; authenticity by an
//! optional HMAC-SHA256 signature.
//!
//! ```text
//! checksum  = sha256_hex(canonical_json(atoms))
//! signature = hex(hmac_sha256(key, "checksum|version|timestamp")[..16])
//! ```

use std::collections::BTreeMap;
use std::io::{Read, Write};

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::canonical::canonical_sha256_hex;
use crate::error::{Result, SnapshotError};
use crate::types::{AtomConnection, AtomId, AtomSearchQuery, AtomType, EvidenceLevel, KnowledgeAtom};

/// Serialization format written into every snapshot.
pub const SNAPSHOT_FORMAT: &str = "json";

/// Schema version written into every snapshot.
pub const SNAPSHOT_VERSION: &str = crate::ATOM_SCHEMA_VERSION;

/// Bytes of the HMAC kept in the signature.
const SIGNATURE_BYTES: usize = 16;

/// Counts describing a snapshot's contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    /// Number of atoms.
    pub atom_count: usize,
    /// Number of connections.
    pub connection_count: usize,
    /// Atoms per category.
    pub categories: BTreeMap<String, usize>,
    /// Atoms per type.
    pub types: BTreeMap<AtomType, usize>,
    /// Atoms per evidence level.
    pub evidence_levels: BTreeMap<EvidenceLevel, usize>,
}

impl SnapshotMetadata {
    fn describe(atoms: &[KnowledgeAtom], connections: &[AtomConnection]) -> Self {
        let mut metadata = Self {
            atom_count: atoms.len(),
            connection_count: connections.len(),
            ..Self::default()
        };
        for atom in atoms {
            *metadata.categories.entry(atom.category.clone()).or_insert(0) += 1;
            *metadata.types.entry(atom.atom_type).or_insert(0) += 1;
            *metadata.evidence_levels.entry(atom.evidence_level).or_insert(0) += 1;
        }
        metadata
    }
}

/// Exported atoms with integrity metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomSnapshot {
    /// Serialization format, always `json`.
    pub format: String,
    /// Schema version.
    pub version: String,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
    /// Whether atom metadata was kept.
    pub include_metadata: bool,
    /// Whether connections were exported.
    pub include_relationships: bool,
    /// Exported atoms in id order.
    pub atoms: Vec<KnowledgeAtom>,
    /// Connections among the exported atoms.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connections: Vec<AtomConnection>,
    /// Content counts.
    pub metadata: SnapshotMetadata,
    /// SHA-256 hex over the canonical atoms JSON.
    pub checksum: String,
    /// Optional HMAC signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl AtomSnapshot {
    /// Assemble a snapshot, stripping metadata or connections as requested.
    pub fn build(
        mut atoms: Vec<KnowledgeAtom>,
        connections: Vec<AtomConnection>,
        include_metadata: bool,
        include_relationships: bool,
        signing_key: Option<&[u8]>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        if !include_metadata {
            for atom in &mut atoms {
                atom.metadata = None;
            }
        }
        let connections = if include_relationships { connections } else { Vec::new() };

        let checksum = canonical_sha256_hex(&atoms)?;
        let metadata = SnapshotMetadata::describe(&atoms, &connections);

        let mut snapshot = Self {
            format: SNAPSHOT_FORMAT.to_string(),
            version: SNAPSHOT_VERSION.to_string(),
            timestamp,
            include_metadata,
            include_relationships,
            atoms,
            connections,
            metadata,
            checksum,
            signature: None,
        };
        if let Some(key) = signing_key {
            snapshot.signature = Some(snapshot.sign(key));
        }
        Ok(snapshot)
    }

    fn signing_input(&self) -> String {
        format!("{}|{}|{}", self.checksum, self.version, self.timestamp.to_rfc3339())
    }

    fn mac(&self, key: &[u8]) -> Hmac<Sha256> {
        let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key size");
        mac.update(self.signing_input().as_bytes());
        mac
    }

    /// Compute the signature for this snapshot under `key`.
    pub fn sign(&self, key: &[u8]) -> String {
        let digest = self.mac(key).finalize().into_bytes();
        hex::encode(&digest[..SIGNATURE_BYTES])
    }

    /// Check format, version, checksum and (when a key is given) signature.
    pub fn verify(&self, verification_key: Option<&[u8]>) -> Result<()> {
        if self.format != SNAPSHOT_FORMAT {
            return Err(SnapshotError::UnsupportedFormat(self.format.clone()).into());
        }
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: self.version.clone(),
                expected: SNAPSHOT_VERSION.to_string(),
            }
            .into());
        }

        let computed = canonical_sha256_hex(&self.atoms)?;
        if computed != self.checksum {
            return Err(SnapshotError::ChecksumMismatch {
                expected: self.checksum.clone(),
                computed,
            }
            .into());
        }

        if let Some(key) = verification_key {
            let signature = self.signature.as_deref().ok_or(SnapshotError::MissingSignature)?;
            let valid = match hex::decode(signature) {
                Ok(bytes) if bytes.len() == SIGNATURE_BYTES => {
                    let expected = self.mac(key).finalize().into_bytes();
                    // Constant-time comparison
                    bytes
                        .iter()
                        .zip(expected[..SIGNATURE_BYTES].iter())
                        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                        == 0
                }
                _ => false,
            };
            if !valid {
                return Err(SnapshotError::InvalidSignature.into());
            }
        }
        Ok(())
    }

    /// Write as pretty JSON.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Read from JSON.
    pub fn read_from<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }
}

/// What to export.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Export only these ids (missing ids are skipped).
    pub atom_ids: Option<Vec<AtomId>>,
    /// Export only atoms matching this query.
    pub filter: Option<AtomSearchQuery>,
    /// Keep atom metadata.
    pub include_metadata: bool,
    /// Export connections whose endpoints are both exported.
    pub include_relationships: bool,
    /// Sign the snapshot with this key.
    pub signing_key: Option<Vec<u8>>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            atom_ids: None,
            filter: None,
            include_metadata: true,
            include_relationships: true,
            signing_key: None,
        }
    }
}

/// What to do with an imported atom whose id is already stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateStrategy {
    /// Keep the stored atom.
    Skip,
    /// Replace the stored atom.
    #[default]
    Replace,
}

/// How to import a snapshot.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Require a valid signature under this key.
    pub verification_key: Option<Vec<u8>>,
    /// Handling of ids already stored.
    pub duplicate_strategy: DuplicateStrategy,
}
