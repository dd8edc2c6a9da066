//! Deterministic solution record identifiers.
//!
//! A record is keyed by its `(device_type, problem)` pair, so upserting the
//! same pair twice overwrites the first point. The full SHA-256 digest is the
//! record id; Qdrant point ids must be integers or UUIDs, so the point id is
//! the UUID formed from the first 16 digest bytes.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Separates key fields so ("ab", "c") and ("a", "bc") hash differently.
const KEY_SEPARATOR: u8 = 0x1f;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId([u8; 32]);

impl RecordId {
    /// Derive the id for a device/problem pair. Surrounding whitespace is ignored.
    pub fn new(device_type: &str, problem: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(device_type.trim().as_bytes());
        hasher.update([KEY_SEPARATOR]);
        hasher.update(problem.trim().as_bytes());
        Self(hasher.finalize().into())
    }

    /// 64-character lowercase hex digest.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The vector database point id.
    pub fn point_id(&self) -> Uuid {
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&self.0[..16]);
        Uuid::from_bytes(bytes)
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}
