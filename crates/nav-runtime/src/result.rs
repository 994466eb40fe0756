//! Result channels
//!
//! A result channel correlates a completed or closed destination back to the
//! destination that requested it, by a stable id shared through instance
//! metadata. Channels are registered with typed callbacks and attached or
//! detached as their owning scope mounts and unmounts; results arriving
//! while detached are buffered or dropped per channel, so callbacks never
//! fire against torn-down UI state.

use std::any::{type_name, Any};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use nav_core::instance::InstanceId;

/// Stable correlation id shared between a requester's channel and the
/// instances obligated to resolve it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultChannelId(String);

impl ResultChannelId {
    /// Generate a fresh unique channel id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Derive a deterministic id from an owning instance and a tag, so a
    /// destination re-registering after process death lands on the same
    /// channel.
    pub fn for_owner(owner: &InstanceId, tag: &str) -> Self {
        Self(format!("{owner}@{tag}"))
    }

    /// Rebuild an id from its string form.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ResultChannelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResultChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What to do with results that arrive while a channel is detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePolicy {
    /// Hold deliveries and flush them when the channel reattaches.
    Buffer,
    /// Discard deliveries, logging each drop.
    Drop,
}

enum ChannelEvent {
    Result(Box<dyn Any + Send>),
    Closed,
}

struct ChannelEntry {
    attached: bool,
    policy: QueuePolicy,
    on_result: Arc<dyn Fn(Box<dyn Any + Send>) + Send + Sync>,
    on_closed: Arc<dyn Fn() + Send + Sync>,
    queued: VecDeque<ChannelEvent>,
}

/// Registry of result channels, owned by the navigation controller.
#[derive(Default)]
pub struct ResultChannels {
    entries: Mutex<HashMap<String, ChannelEntry>>,
}

impl ResultChannels {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel with typed callbacks, buffering deliveries while
    /// detached.
    ///
    /// Channels start detached; call [`attach`](Self::attach) once the
    /// owning scope is mounted. Re-registering an id replaces the previous
    /// channel.
    pub fn register<T: Send + 'static>(
        &self,
        id: &ResultChannelId,
        on_result: impl Fn(T) + Send + Sync + 'static,
        on_closed: impl Fn() + Send + Sync + 'static,
    ) {
        self.register_with_policy(id, QueuePolicy::Buffer, on_result, on_closed);
    }

    /// Register a channel with an explicit queue policy for deliveries that
    /// arrive while detached.
    pub fn register_with_policy<T: Send + 'static>(
        &self,
        id: &ResultChannelId,
        policy: QueuePolicy,
        on_result: impl Fn(T) + Send + Sync + 'static,
        on_closed: impl Fn() + Send + Sync + 'static,
    ) {
        let channel = id.to_string();
        let typed = Arc::new(move |payload: Box<dyn Any + Send>| match payload.downcast::<T>() {
            Ok(result) => on_result(*result),
            Err(_) => {
                tracing::error!(
                    channel = %channel,
                    expected = type_name::<T>(),
                    "result payload type mismatch; dropping result"
                );
            }
        });

        let entry = ChannelEntry {
            attached: false,
            policy,
            on_result: typed,
            on_closed: Arc::new(on_closed),
            queued: VecDeque::new(),
        };
        self.entries.lock().insert(id.as_str().to_string(), entry);
    }

    /// Attach a channel, flushing any buffered deliveries.
    pub fn attach(&self, id: &ResultChannelId) {
        let flushed = {
            let mut entries = self.entries.lock();
            let Some(entry) = entries.get_mut(id.as_str()) else {
                tracing::warn!(channel = %id, "attach on unregistered result channel");
                return;
            };
            entry.attached = true;

            let queued: Vec<_> = entry.queued.drain(..).collect();
            let on_result = Arc::clone(&entry.on_result);
            let on_closed = Arc::clone(&entry.on_closed);
            (queued, on_result, on_closed)
        };

        let (queued, on_result, on_closed) = flushed;
        for event in queued {
            match event {
                ChannelEvent::Result(payload) => on_result(payload),
                ChannelEvent::Closed => on_closed(),
            }
        }
    }

    /// Detach a channel; further deliveries follow its queue policy.
    pub fn detach(&self, id: &ResultChannelId) {
        if let Some(entry) = self.entries.lock().get_mut(id.as_str()) {
            entry.attached = false;
        }
    }

    /// Remove a channel entirely, discarding anything buffered.
    pub fn unregister(&self, id: &ResultChannelId) -> bool {
        self.entries.lock().remove(id.as_str()).is_some()
    }

    /// Whether a channel is registered.
    pub fn is_registered(&self, id: &ResultChannelId) -> bool {
        self.entries.lock().contains_key(id.as_str())
    }

    /// Whether a channel is currently attached.
    pub fn is_attached(&self, id: &ResultChannelId) -> bool {
        self.entries
            .lock()
            .get(id.as_str())
            .map(|entry| entry.attached)
            .unwrap_or(false)
    }

    /// Drop every channel, as on controller uninstall.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Deliver a completion payload to a channel.
    pub(crate) fn deliver_result(&self, channel: &str, payload: Box<dyn Any + Send>) {
        let callback = {
            let mut entries = self.entries.lock();
            let Some(entry) = entries.get_mut(channel) else {
                tracing::warn!(channel = %channel, "result delivered for unregistered channel; dropping");
                return;
            };
            if !entry.attached {
                match entry.policy {
                    QueuePolicy::Buffer => {
                        entry.queued.push_back(ChannelEvent::Result(payload));
                    }
                    QueuePolicy::Drop => {
                        tracing::warn!(channel = %channel, "result delivered while detached; dropping");
                    }
                }
                return;
            }
            Arc::clone(&entry.on_result)
        };
        callback(payload);
    }

    /// Deliver a closed notification to a channel.
    pub(crate) fn deliver_closed(&self, channel: &str) {
        let callback = {
            let mut entries = self.entries.lock();
            let Some(entry) = entries.get_mut(channel) else {
                tracing::debug!(channel = %channel, "closed notification for unregistered channel; dropping");
                return;
            };
            if !entry.attached {
                match entry.policy {
                    QueuePolicy::Buffer => entry.queued.push_back(ChannelEvent::Closed),
                    QueuePolicy::Drop => {
                        tracing::warn!(channel = %channel, "closed notification while detached; dropping");
                    }
                }
                return;
            }
            Arc::clone(&entry.on_closed)
        };
        callback();
    }
}

impl fmt::Debug for ResultChannels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultChannels")
            .field("registered", &self.entries.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn collector() -> (Arc<Mutex<Vec<String>>>, impl Fn(String) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |value: String| sink.lock().push(value))
    }

    #[test]
    fn test_attached_channel_receives_typed_result() {
        let channels = ResultChannels::new();
        let id = ResultChannelId::new();
        let (seen, on_result) = collector();

        channels.register(&id, on_result, || {});
        channels.attach(&id);
        channels.deliver_result(id.as_str(), Box::new("X".to_string()));

        assert_eq!(*seen.lock(), vec!["X".to_string()]);
    }

    #[test]
    fn test_detached_channel_buffers_until_attach() {
        let channels = ResultChannels::new();
        let id = ResultChannelId::new();
        let (seen, on_result) = collector();

        channels.register(&id, on_result, || {});
        channels.deliver_result(id.as_str(), Box::new("early".to_string()));
        assert!(seen.lock().is_empty());

        channels.attach(&id);
        assert_eq!(*seen.lock(), vec!["early".to_string()]);
    }

    #[test]
    fn test_drop_policy_discards_detached_deliveries() {
        let channels = ResultChannels::new();
        let id = ResultChannelId::new();
        let (seen, on_result) = collector();

        channels.register_with_policy(&id, QueuePolicy::Drop, on_result, || {});
        channels.deliver_result(id.as_str(), Box::new("lost".to_string()));

        channels.attach(&id);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_closed_notification_reaches_callback() {
        let channels = ResultChannels::new();
        let id = ResultChannelId::new();
        let closed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closed);

        channels.register(&id, |_: String| {}, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        channels.attach(&id);
        channels.deliver_closed(id.as_str());

        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_type_mismatch_is_dropped_not_invoked() {
        let channels = ResultChannels::new();
        let id = ResultChannelId::new();
        let (seen, on_result) = collector();

        channels.register(&id, on_result, || {});
        channels.attach(&id);
        channels.deliver_result(id.as_str(), Box::new(42_u32));

        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_unknown_channel_is_a_logged_miss() {
        let channels = ResultChannels::new();
        // Must not panic.
        channels.deliver_result("nobody-home", Box::new("X".to_string()));
        channels.deliver_closed("nobody-home");
    }

    #[test]
    fn test_unregister_stops_delivery() {
        let channels = ResultChannels::new();
        let id = ResultChannelId::new();
        let (seen, on_result) = collector();

        channels.register(&id, on_result, || {});
        channels.attach(&id);
        assert!(channels.unregister(&id));
        channels.deliver_result(id.as_str(), Box::new("late".to_string()));

        assert!(seen.lock().is_empty());
        assert!(!channels.is_registered(&id));
    }

    #[test]
    fn test_owner_derived_ids_are_stable() {
        let owner = InstanceId::from_string("abc");
        assert_eq!(
            ResultChannelId::for_owner(&owner, "pick"),
            ResultChannelId::for_owner(&owner, "pick")
        );
        assert_eq!(ResultChannelId::for_owner(&owner, "pick").as_str(), "abc@pick");
    }
}
