//! Backstack persistence snapshots
//!
//! This module provides the serializable form of a backstack: an ordered
//! list of instances with their ids, keys, and persisted metadata, wrapped
//! in a versioned, checksummed JSON envelope for corruption detection.
//! Transient metadata is dropped; restoring a saved backstack and saving it
//! again is lossless for everything else.

use std::collections::BTreeMap;
use std::collections::HashSet;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::backstack::Backstack;
use crate::instance::{InstanceId, NavigationInstance};
use crate::key::NavigationKey;
use crate::metadata::Metadata;

/// Current snapshot schema version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Snapshot error types
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Corruption detected
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// Version mismatch
    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected version
        expected: u32,
        /// Found version
        found: u32,
    },

    /// Duplicate instance id in a snapshot
    #[error("Duplicate instance id in snapshot: {0}")]
    DuplicateInstance(String),
}

/// Result type for snapshot operations
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// One backstack entry in serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSnapshot<K> {
    /// The instance's stable id.
    pub id: String,
    /// The serialized navigation key.
    pub key: K,
    /// Persisted (non-transient) metadata entries.
    #[serde(default = "BTreeMap::new")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// A serializable backstack: ordered entries, bottom to top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackstackSnapshot<K> {
    /// Entries in navigation order; the last entry is topmost.
    pub entries: Vec<InstanceSnapshot<K>>,
}

/// Versioned snapshot container with a corruption checksum.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEnvelope<K> {
    version: u32,
    checksum: String,
    data: BackstackSnapshot<K>,
}

fn checksum_of<K: Serialize>(data: &BackstackSnapshot<K>) -> Result<String> {
    let json = serde_json::to_string(data)?;
    Ok(format!("{:x}", md5::compute(&json)))
}

impl<K: NavigationKey + Serialize> Backstack<K> {
    /// Capture this backstack as a serializable snapshot.
    pub fn snapshot(&self) -> BackstackSnapshot<K> {
        BackstackSnapshot {
            entries: self
                .iter()
                .map(|entry| InstanceSnapshot {
                    id: entry.id().as_str().to_string(),
                    key: entry.key().clone(),
                    metadata: entry.metadata().persisted_entries(),
                })
                .collect(),
        }
    }
}

impl<K: NavigationKey> BackstackSnapshot<K> {
    /// Rebuild the backstack, reconstructing instances with their saved ids.
    pub fn restore(&self) -> Result<Backstack<K>> {
        let mut seen = HashSet::new();
        for entry in &self.entries {
            if !seen.insert(entry.id.as_str()) {
                return Err(SnapshotError::DuplicateInstance(entry.id.clone()));
            }
        }

        let mut stack = Backstack::new();
        for entry in &self.entries {
            stack = stack.pushed(NavigationInstance::from_parts(
                InstanceId::from_string(entry.id.clone()),
                entry.key.clone(),
                Metadata::from_persisted(entry.metadata.clone()),
            ));
        }
        Ok(stack)
    }
}

impl<K: NavigationKey + Serialize> BackstackSnapshot<K> {
    /// Encode the snapshot as versioned, checksummed JSON.
    pub fn to_json(&self) -> Result<String> {
        let envelope = SnapshotEnvelope {
            version: SNAPSHOT_VERSION,
            checksum: checksum_of(self)?,
            data: self.clone(),
        };
        Ok(serde_json::to_string(&envelope)?)
    }
}

impl<K: NavigationKey + Serialize + DeserializeOwned> BackstackSnapshot<K> {
    /// Decode a snapshot from its JSON envelope, verifying version and
    /// checksum.
    pub fn from_json(json: &str) -> Result<Self> {
        let envelope: SnapshotEnvelope<K> = serde_json::from_str(json)?;

        if envelope.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::VersionMismatch {
                expected: SNAPSHOT_VERSION,
                found: envelope.version,
            });
        }

        let computed = checksum_of(&envelope.data)?;
        if computed != envelope.checksum {
            return Err(SnapshotError::Corruption(format!(
                "Checksum mismatch: expected {}, got {}",
                envelope.checksum, computed
            )));
        }

        Ok(envelope.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataKey;

    const SCROLL: MetadataKey<f64> = MetadataKey::persisted("test.scroll");
    const DRAFT: MetadataKey<String> = MetadataKey::transient("test.draft");

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum Key {
        Home,
        Detail(u32),
    }

    impl NavigationKey for Key {}

    #[test]
    fn test_round_trip_preserves_ids_and_order() {
        let stack = Backstack::from_keys([Key::Home, Key::Detail(1), Key::Detail(2)]);

        let restored = stack.snapshot().restore().unwrap();

        let before: Vec<_> = stack.iter().map(|e| e.id().clone()).collect();
        let after: Vec<_> = restored.iter().map(|e| e.id().clone()).collect();
        assert_eq!(before, after);
        assert_eq!(restored.keys(), stack.keys());
    }

    #[test]
    fn test_save_restore_save_is_lossless_for_persisted_metadata() {
        let stack = Backstack::from_keys([Key::Home]);
        stack.active().unwrap().metadata().set(&SCROLL, 120.5);
        stack
            .active()
            .unwrap()
            .metadata()
            .set(&DRAFT, "unsent".to_string());

        let first = stack.snapshot();
        let second = first.restore().unwrap().snapshot();

        assert_eq!(first, second);

        let restored = second.restore().unwrap();
        assert_eq!(restored.active().unwrap().metadata().get(&SCROLL), Some(120.5));
        // Transient entries do not survive.
        assert_eq!(restored.active().unwrap().metadata().get(&DRAFT), None);
    }

    #[test]
    fn test_json_envelope_round_trip() {
        let stack = Backstack::from_keys([Key::Home, Key::Detail(7)]);
        let snapshot = stack.snapshot();

        let json = snapshot.to_json().unwrap();
        let decoded = BackstackSnapshot::<Key>::from_json(&json).unwrap();

        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_tampered_envelope_is_corruption() {
        let stack = Backstack::from_keys([Key::Detail(1)]);
        let json = stack.snapshot().to_json().unwrap();

        let tampered = json.replace("\"Detail\":1", "\"Detail\":2");
        assert_ne!(tampered, json);

        let err = BackstackSnapshot::<Key>::from_json(&tampered).unwrap_err();
        assert!(matches!(err, SnapshotError::Corruption(_)));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let stack = Backstack::from_keys([Key::Home]);
        let json = stack.snapshot().to_json().unwrap();

        let future = json.replace("\"version\":1", "\"version\":99");
        let err = BackstackSnapshot::<Key>::from_json(&future).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::VersionMismatch {
                expected: SNAPSHOT_VERSION,
                found: 99
            }
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected_on_restore() {
        let snapshot = BackstackSnapshot {
            entries: vec![
                InstanceSnapshot {
                    id: "same".to_string(),
                    key: Key::Home,
                    metadata: BTreeMap::new(),
                },
                InstanceSnapshot {
                    id: "same".to_string(),
                    key: Key::Detail(1),
                    metadata: BTreeMap::new(),
                },
            ],
        };

        let err = snapshot.restore().unwrap_err();
        assert!(matches!(err, SnapshotError::DuplicateInstance(id) if id == "same"));
    }
}
