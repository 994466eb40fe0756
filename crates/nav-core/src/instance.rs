//! Instance identity
//!
//! A navigation instance wraps a user-supplied key with a stable unique id
//! and a shared metadata bag. Two instances carrying equal keys but distinct
//! ids are distinct backstack entries.

use std::fmt;

use uuid::Uuid;

use crate::key::NavigationKey;
use crate::metadata::Metadata;

/// Stable unique identifier of a navigation instance.
///
/// Generated once at instance creation and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(String);

impl InstanceId {
    /// Generate a fresh unique id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Rebuild an id from its string form, as when restoring a snapshot.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An identity-bearing entry in a backstack.
///
/// Cloning an instance shares its metadata bag; the clone refers to the same
/// logical destination.
#[derive(Debug, Clone)]
pub struct NavigationInstance<K: NavigationKey> {
    id: InstanceId,
    key: K,
    metadata: Metadata,
}

impl<K: NavigationKey> NavigationInstance<K> {
    /// Create an instance for a key, generating a fresh id.
    pub fn new(key: K) -> Self {
        Self {
            id: InstanceId::generate(),
            key,
            metadata: Metadata::new(),
        }
    }

    /// Create an instance for a new key that inherits a deep copy of
    /// another instance's metadata.
    ///
    /// Used by interceptors rewriting one key into another while keeping
    /// result correlation and other entries intact.
    pub fn derived(key: K, from: &NavigationInstance<K>) -> Self {
        Self {
            id: InstanceId::generate(),
            key,
            metadata: from.metadata.deep_clone(),
        }
    }

    /// Rebuild an instance from stored parts, as when restoring a snapshot.
    pub(crate) fn from_parts(id: InstanceId, key: K, metadata: Metadata) -> Self {
        Self { id, key, metadata }
    }

    /// The stable id of this instance.
    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    /// The navigation key this instance was created for.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// The shared metadata bag.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

impl<K: NavigationKey> PartialEq for NavigationInstance<K> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.key == other.key
    }
}
