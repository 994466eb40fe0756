//! Typed instance metadata
//!
//! This module provides the open key→value bag attached to every navigation
//! instance. Entries are addressed by typed tokens so values are written and
//! read type-safely; entries marked transient are dropped from persistence
//! snapshots.

use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Typed token addressing one metadata entry.
///
/// Tokens created with [`MetadataKey::persisted`] survive snapshots; tokens
/// created with [`MetadataKey::transient`] exist only for the life of the
/// process.
pub struct MetadataKey<T> {
    name: &'static str,
    transient: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> MetadataKey<T> {
    /// Create a token whose entries are included in backstack snapshots.
    pub const fn persisted(name: &'static str) -> Self {
        Self {
            name,
            transient: false,
            _marker: PhantomData,
        }
    }

    /// Create a token whose entries are dropped from backstack snapshots.
    pub const fn transient(name: &'static str) -> Self {
        Self {
            name,
            transient: true,
            _marker: PhantomData,
        }
    }

    /// The entry name this token addresses.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Whether entries written through this token are excluded from snapshots.
    pub const fn is_transient(&self) -> bool {
        self.transient
    }
}

/// Result-correlation id linking a child instance back to its requester.
pub const RESULT_CHANNEL: MetadataKey<String> = MetadataKey::persisted("waypoint.result-channel");

#[derive(Clone)]
struct Slot {
    value: Option<Arc<dyn Any + Send + Sync>>,
    json: Option<serde_json::Value>,
    transient: bool,
}

/// The metadata bag shared by all clones of a navigation instance.
///
/// Cloning a [`Metadata`] shares the underlying storage; the same bag may be
/// observed from the backstack and from result-flow bookkeeping. Mutation
/// happens only through the typed [`set`]/[`remove`] surface.
///
/// [`set`]: Metadata::set
/// [`remove`]: Metadata::remove
#[derive(Clone, Default)]
pub struct Metadata {
    slots: Arc<RwLock<BTreeMap<String, Slot>>>,
}

impl Metadata {
    /// Create an empty metadata bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write an entry through a typed token, replacing any previous value.
    pub fn set<T>(&self, key: &MetadataKey<T>, value: T)
    where
        T: Serialize + Send + Sync + 'static,
    {
        let json = match serde_json::to_value(&value) {
            Ok(json) => Some(json),
            Err(err) => {
                tracing::error!(
                    key = key.name(),
                    %err,
                    "metadata value failed to serialize; entry will not persist"
                );
                None
            }
        };
        let slot = Slot {
            value: Some(Arc::new(value)),
            json,
            transient: key.is_transient(),
        };
        self.slots.write().insert(key.name().to_string(), slot);
    }

    /// Read an entry through a typed token.
    ///
    /// Entries restored from a snapshot are decoded on demand; a missing
    /// entry or a type mismatch yields `None`.
    pub fn get<T>(&self, key: &MetadataKey<T>) -> Option<T>
    where
        T: Clone + DeserializeOwned + 'static,
    {
        let slots = self.slots.read();
        let slot = slots.get(key.name())?;

        if let Some(value) = &slot.value {
            if let Some(typed) = value.downcast_ref::<T>() {
                return Some(typed.clone());
            }
        }

        slot.json
            .as_ref()
            .and_then(|json| serde_json::from_value(json.clone()).ok())
    }

    /// Whether an entry exists for the given token.
    pub fn contains<T>(&self, key: &MetadataKey<T>) -> bool {
        self.slots.read().contains_key(key.name())
    }

    /// Remove an entry, returning whether one was present.
    pub fn remove<T>(&self, key: &MetadataKey<T>) -> bool {
        self.slots.write().remove(key.name()).is_some()
    }

    /// Whether the bag holds no entries.
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Create an independent copy of this bag.
    ///
    /// Used when an interceptor rewrites a key into a fresh instance that
    /// should inherit the original's entries without sharing storage.
    pub fn deep_clone(&self) -> Self {
        let slots = self.slots.read().clone();
        Self {
            slots: Arc::new(RwLock::new(slots)),
        }
    }

    /// Non-transient entries as JSON, for snapshotting.
    pub(crate) fn persisted_entries(&self) -> BTreeMap<String, serde_json::Value> {
        self.slots
            .read()
            .iter()
            .filter(|(_, slot)| !slot.transient)
            .filter_map(|(name, slot)| slot.json.clone().map(|json| (name.clone(), json)))
            .collect()
    }

    /// Rebuild a bag from snapshot entries.
    pub(crate) fn from_persisted(entries: BTreeMap<String, serde_json::Value>) -> Self {
        let slots = entries
            .into_iter()
            .map(|(name, json)| {
                (
                    name,
                    Slot {
                        value: None,
                        json: Some(json),
                        transient: false,
                    },
                )
            })
            .collect();
        Self {
            slots: Arc::new(RwLock::new(slots)),
        }
    }
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.slots.read().keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCROLL: MetadataKey<f32> = MetadataKey::persisted("test.scroll");
    const DRAFT: MetadataKey<String> = MetadataKey::transient("test.draft");

    #[test]
    fn test_set_and_get_typed() {
        let metadata = Metadata::new();
        metadata.set(&SCROLL, 42.5);

        assert_eq!(metadata.get(&SCROLL), Some(42.5));
        assert!(metadata.contains(&SCROLL));
    }

    #[test]
    fn test_get_missing_entry() {
        let metadata = Metadata::new();
        assert_eq!(metadata.get(&SCROLL), None);
    }

    #[test]
    fn test_set_replaces_previous_value() {
        let metadata = Metadata::new();
        metadata.set(&SCROLL, 1.0);
        metadata.set(&SCROLL, 2.0);

        assert_eq!(metadata.get(&SCROLL), Some(2.0));
    }

    #[test]
    fn test_remove_entry() {
        let metadata = Metadata::new();
        metadata.set(&DRAFT, "hello".to_string());

        assert!(metadata.remove(&DRAFT));
        assert!(!metadata.remove(&DRAFT));
        assert_eq!(metadata.get(&DRAFT), None);
    }

    #[test]
    fn test_clones_share_storage() {
        let metadata = Metadata::new();
        let alias = metadata.clone();

        metadata.set(&SCROLL, 7.0);
        assert_eq!(alias.get(&SCROLL), Some(7.0));
    }

    #[test]
    fn test_deep_clone_is_independent() {
        let metadata = Metadata::new();
        metadata.set(&SCROLL, 1.0);

        let copy = metadata.deep_clone();
        metadata.set(&SCROLL, 2.0);

        assert_eq!(copy.get(&SCROLL), Some(1.0));
        assert_eq!(metadata.get(&SCROLL), Some(2.0));
    }

    #[test]
    fn test_transient_entries_excluded_from_persistence() {
        let metadata = Metadata::new();
        metadata.set(&SCROLL, 3.0);
        metadata.set(&DRAFT, "unsent".to_string());

        let persisted = metadata.persisted_entries();
        assert!(persisted.contains_key("test.scroll"));
        assert!(!persisted.contains_key("test.draft"));
    }

    #[test]
    fn test_restored_entries_decode_on_demand() {
        let metadata = Metadata::new();
        metadata.set(&SCROLL, 9.0);

        let restored = Metadata::from_persisted(metadata.persisted_entries());
        assert_eq!(restored.get(&SCROLL), Some(9.0));
    }

    #[test]
    fn test_result_channel_token_round_trip() {
        let metadata = Metadata::new();
        metadata.set(&RESULT_CHANNEL, "owner@pick".to_string());

        let restored = Metadata::from_persisted(metadata.persisted_entries());
        assert_eq!(restored.get(&RESULT_CHANNEL), Some("owner@pick".to_string()));
    }
}
