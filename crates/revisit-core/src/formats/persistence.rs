//! # Persistence Format
//!
//! Binary serialization for partitions and whole-store snapshots.
//!
//! File and table I/O live in the storage backends and the app layer; this
//! module only turns values into bytes and back.
//!
//! Format: Header (5 bytes) + postcard-serialized payload.
//! - 4 bytes: Magic ("RVST")
//! - 1 byte: Version
//!
//! Size and header are validated before the payload is parsed.

use crate::store::Partition;
use crate::{RevisitError, primitives};
use serde::{Serialize, de::DeserializeOwned};

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum accepted size of an encoded value.
///
/// Checked BEFORE deserialization so a corrupt length cannot force a huge
/// allocation.
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 256 * 1024 * 1024; // 256 MB

/// Minimum valid size (header only).
const HEADER_SIZE: usize = 5;

// =============================================================================
// HEADER
// =============================================================================

/// The persistence header precedes every encoded value.
#[derive(Debug, Clone, Copy)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a new header with current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), RevisitError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(RevisitError::DeserializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(RevisitError::DeserializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RevisitError> {
        if bytes.len() < HEADER_SIZE {
            return Err(RevisitError::DeserializationError(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ENCODING
// =============================================================================

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, RevisitError> {
    let payload = postcard::to_stdvec(value)
        .map_err(|e| RevisitError::SerializationError(e.to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
    bytes.extend_from_slice(&PersistenceHeader::new().to_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

fn decode<T: DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T, RevisitError> {
    if bytes.len() < HEADER_SIZE {
        return Err(RevisitError::DeserializationError(format!(
            "Data too short: minimum {} bytes required",
            HEADER_SIZE
        )));
    }
    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(RevisitError::DeserializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }

    PersistenceHeader::from_bytes(bytes)?.validate()?;

    postcard::from_bytes(&bytes[HEADER_SIZE..]).map_err(|e| {
        RevisitError::DeserializationError(format!("Failed to deserialize {}: {}", what, e))
    })
}

/// Serialize one partition (header + payload).
pub fn partition_to_bytes(partition: &Partition) -> Result<Vec<u8>, RevisitError> {
    encode(partition)
}

/// Deserialize one partition.
pub fn partition_from_bytes(bytes: &[u8]) -> Result<Partition, RevisitError> {
    decode(bytes, "partition")
}

/// Serialize a whole-store snapshot (header + payload).
pub fn snapshot_to_bytes(partitions: &[Partition]) -> Result<Vec<u8>, RevisitError> {
    encode(&partitions)
}

/// Deserialize a whole-store snapshot.
pub fn snapshot_from_bytes(bytes: &[u8]) -> Result<Vec<Partition>, RevisitError> {
    decode(bytes, "snapshot")
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Entry, PartitionKey, ProblemId, SheetType, Timestamp};

    fn sample() -> Partition {
        let records = ["P1", "P2"].iter().enumerate().map(|(i, p)| {
            Entry::solved(
                ProblemId::new(*p),
                SheetType::new("apnaCollege"),
                Timestamp::from_millis(i as i64),
            )
            .to_record()
        });
        Partition::from_records(PartitionKey::new("u1", "apnaCollege"), 3, records)
    }

    #[test]
    fn header_roundtrip() {
        let header = PersistenceHeader::new();
        let restored = PersistenceHeader::from_bytes(&header.to_bytes()).expect("parse header");

        assert_eq!(restored.magic, *primitives::MAGIC_BYTES);
        assert_eq!(restored.version, primitives::FORMAT_VERSION);
    }

    #[test]
    fn snapshot_bytes_are_bit_exact() {
        let bytes1 = snapshot_to_bytes(&[sample()]).expect("first serialize");
        let restored = snapshot_from_bytes(&bytes1).expect("deserialize");
        let bytes2 = snapshot_to_bytes(&restored).expect("second serialize");

        assert_eq!(
            bytes1, bytes2,
            "save -> load -> save must produce identical bytes"
        );
    }

    #[test]
    fn partition_keeps_revision() {
        let bytes = partition_to_bytes(&sample()).expect("serialize");
        let restored = partition_from_bytes(&bytes).expect("deserialize");
        assert_eq!(restored.revision(), 3);
        assert_eq!(restored.len(), 2);
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = vec![0u8; 10];
        bytes[0..4].copy_from_slice(b"XXXX");

        assert!(partition_from_bytes(&bytes).is_err());
    }

    #[test]
    fn truncated_data_rejected() {
        assert!(matches!(
            snapshot_from_bytes(b"RVS"),
            Err(RevisitError::DeserializationError(_))
        ));
    }
}
