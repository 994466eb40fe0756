//! Navigation containers
//!
//! A container owns one backstack, a mutable interceptor chain, an
//! empty-backstack policy, and a non-reentrant execution guard, and exposes
//! [`execute`](NavigationContainer::execute) as the single mutation entry
//! point. Committed backstacks are published through a watch channel that
//! rendering surfaces subscribe to; an aggregate operation is observable
//! there as exactly one transition.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::watch;

use nav_core::backstack::Backstack;
use nav_core::instance::{InstanceId, NavigationInstance};
use nav_core::key::NavigationKey;
use nav_core::metadata::RESULT_CHANNEL;
use nav_core::operation::{AppliedOperation, Operation, ResultIntent, ResultPayload};
use nav_core::snapshot::BackstackSnapshot;
use nav_core::transition::Transition;

use crate::context::NavigationContext;
use crate::controller::{NavigationController, Result as ControllerResult};
use crate::empty::{EmptyDecision, EmptyPolicy};
use crate::interceptor::{run_chain, ChainOutcome, NavigationInterceptor};

/// Identifies a container within its controller, e.g. a tab or a dialog
/// host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerKey(String);

impl ContainerKey {
    /// Create a container key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How an execute call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The operation was committed and the backstack swapped.
    Applied,
    /// An interceptor or the empty policy cancelled the operation; the
    /// backstack is unchanged.
    Cancelled,
}

/// Handle for removing a container-local interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterceptorHandle(u64);

struct ContainerState<K: NavigationKey> {
    backstack: Backstack<K>,
    /// Terminal result states recorded at commit, keyed by instance id.
    /// Entries survive across execute calls for instances still on the
    /// stack (a delegator awaiting its delegate) and are consumed when the
    /// instance leaves.
    pending_results: HashMap<InstanceId, ResultIntent>,
}

enum PendingDelivery {
    Result { channel: String, payload: ResultPayload },
    Closed { channel: String },
}

/// Builder for a [`NavigationContainer`].
pub struct ContainerBuilder<K: NavigationKey> {
    key: ContainerKey,
    controller: Arc<NavigationController<K>>,
    initial: Vec<K>,
    empty_policy: EmptyPolicy<K>,
    interceptors: Vec<Arc<dyn NavigationInterceptor<K>>>,
    parent: Option<Weak<NavigationContainer<K>>>,
}

impl<K: NavigationKey> ContainerBuilder<K> {
    /// Set the root key; the container starts with one instance of it.
    pub fn root(mut self, key: K) -> Self {
        self.initial = vec![key];
        self
    }

    /// Set the initial backstack keys, bottom to top.
    pub fn initial_keys(mut self, keys: impl IntoIterator<Item = K>) -> Self {
        self.initial = keys.into_iter().collect();
        self
    }

    /// Set the empty-backstack policy; the default allows empty.
    pub fn empty_policy(mut self, policy: EmptyPolicy<K>) -> Self {
        self.empty_policy = policy;
        self
    }

    /// Add a container-local interceptor.
    pub fn interceptor(mut self, interceptor: impl NavigationInterceptor<K> + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Set the parent container, used by the `CloseParent` empty policy.
    pub fn parent(mut self, parent: &Arc<NavigationContainer<K>>) -> Self {
        self.parent = Some(Arc::downgrade(parent));
        self
    }

    /// Build the container and register it with its controller.
    ///
    /// Fails if the controller is not installed.
    pub fn build(self) -> ControllerResult<Arc<NavigationContainer<K>>> {
        let backstack = Backstack::from_keys(self.initial);
        let (backstack_tx, _) = watch::channel(backstack.clone());

        let interceptors = self
            .interceptors
            .into_iter()
            .enumerate()
            .map(|(index, interceptor)| (index as u64, interceptor))
            .collect::<Vec<_>>();
        let next_interceptor_id = interceptors.len() as u64;

        let container = Arc::new(NavigationContainer {
            key: self.key,
            controller: Arc::clone(&self.controller),
            parent: self.parent,
            interceptors: RwLock::new(interceptors),
            next_interceptor_id: AtomicU64::new(next_interceptor_id),
            empty_policy: self.empty_policy,
            state: Mutex::new(ContainerState {
                backstack,
                pending_results: HashMap::new(),
            }),
            backstack_tx,
        });

        self.controller
            .register_container(container.key.clone(), Arc::downgrade(&container))?;
        Ok(container)
    }
}

/// The owning unit of one backstack.
pub struct NavigationContainer<K: NavigationKey> {
    key: ContainerKey,
    controller: Arc<NavigationController<K>>,
    parent: Option<Weak<NavigationContainer<K>>>,
    interceptors: RwLock<Vec<(u64, Arc<dyn NavigationInterceptor<K>>)>>,
    next_interceptor_id: AtomicU64,
    empty_policy: EmptyPolicy<K>,
    state: Mutex<ContainerState<K>>,
    backstack_tx: watch::Sender<Backstack<K>>,
}

impl<K: NavigationKey> NavigationContainer<K> {
    /// Start building a container registered under the given key.
    pub fn builder(
        key: impl Into<String>,
        controller: &Arc<NavigationController<K>>,
    ) -> ContainerBuilder<K> {
        ContainerBuilder {
            key: ContainerKey::new(key),
            controller: Arc::clone(controller),
            initial: Vec::new(),
            empty_policy: EmptyPolicy::default(),
            interceptors: Vec::new(),
            parent: None,
        }
    }

    /// This container's key.
    pub fn key(&self) -> &ContainerKey {
        &self.key
    }

    /// The last committed backstack.
    pub fn backstack(&self) -> Backstack<K> {
        self.backstack_tx.borrow().clone()
    }

    /// The topmost instance of the last committed backstack.
    pub fn active(&self) -> Option<NavigationInstance<K>> {
        self.backstack().active().cloned()
    }

    /// Whether this container is the controller's active container.
    pub fn is_active(&self) -> bool {
        self.controller.active_container().as_ref() == Some(&self.key)
    }

    /// Subscribe to committed backstacks.
    ///
    /// The rendering surface consumes this stream; each applied execute call
    /// publishes at most one new value.
    pub fn subscribe(&self) -> watch::Receiver<Backstack<K>> {
        self.backstack_tx.subscribe()
    }

    /// Add a container-local interceptor, effective from the next execute
    /// call.
    pub fn add_interceptor(
        &self,
        interceptor: impl NavigationInterceptor<K> + 'static,
    ) -> InterceptorHandle {
        let id = self.next_interceptor_id.fetch_add(1, Ordering::SeqCst);
        self.interceptors.write().push((id, Arc::new(interceptor)));
        InterceptorHandle(id)
    }

    /// Remove a container-local interceptor, effective from the next execute
    /// call. Returns whether the handle was registered.
    pub fn remove_interceptor(&self, handle: InterceptorHandle) -> bool {
        let mut interceptors = self.interceptors.write();
        let before = interceptors.len();
        interceptors.retain(|(id, _)| *id != handle.0);
        interceptors.len() != before
    }

    /// Execute a navigation operation, the single mutation entry point.
    ///
    /// The operation passes through the container-local interceptor chain,
    /// then the controller's global chain; the surviving operation's
    /// transform produces a candidate backstack; the empty policy is
    /// consulted if the candidate is empty. On acceptance the backstack is
    /// swapped, the transition computed, result deliveries and
    /// active-container bookkeeping performed. Result callbacks and deferred
    /// side effects run after the execution lock is released, so they may
    /// navigate again.
    ///
    /// # Panics
    ///
    /// Panics on re-entrant invocation: an interceptor or result callback
    /// navigating synchronously while an operation is in flight is a
    /// programming error.
    pub fn execute(
        &self,
        context: &NavigationContext<K>,
        operation: Operation<K>,
    ) -> ExecutionOutcome {
        let Some(mut state) = self.state.try_lock() else {
            panic!(
                "re-entrant execute() on navigation container '{}': an interceptor or \
                 result callback attempted to navigate synchronously while an operation \
                 was in flight",
                self.key,
            );
        };

        tracing::debug!(
            container = %self.key,
            operation = %operation.describe(),
            context = %context.describe(),
            "executing navigation operation"
        );

        // Container-local interceptors, then the controller's global chain.
        let local: Vec<_> = self
            .interceptors
            .read()
            .iter()
            .map(|(_, interceptor)| Arc::clone(interceptor))
            .collect();
        let operation = match run_chain(&local, context, operation) {
            ChainOutcome::Proceed(operation) => operation,
            ChainOutcome::Cancelled(effect) => {
                tracing::debug!(container = %self.key, "operation cancelled by container interceptor");
                drop(state);
                if let Some(effect) = effect {
                    effect();
                }
                return ExecutionOutcome::Cancelled;
            }
        };
        let operation = match run_chain(self.controller.global_interceptors(), context, operation) {
            ChainOutcome::Proceed(operation) => operation,
            ChainOutcome::Cancelled(effect) => {
                tracing::debug!(container = %self.key, "operation cancelled by global interceptor");
                drop(state);
                if let Some(effect) = effect {
                    effect();
                }
                return ExecutionOutcome::Cancelled;
            }
        };

        let AppliedOperation {
            backstack: candidate,
            results,
            effects,
        } = operation.apply(&state.backstack);

        // The one authoritative empty check: a candidate that would empty a
        // non-empty container is submitted to the policy.
        if candidate.is_empty() && !state.backstack.is_empty() {
            let transition = Transition::new(state.backstack.clone(), candidate.clone());
            match self.decide_empty(&transition) {
                EmptyDecision::Allow => {}
                EmptyDecision::Deny => {
                    tracing::debug!(
                        container = %self.key,
                        before = %transition.from().key_sequence(),
                        after = %transition.to().key_sequence(),
                        "empty backstack denied; retaining current backstack"
                    );
                    drop(state);
                    return ExecutionOutcome::Cancelled;
                }
                EmptyDecision::DenyWith(effect) => {
                    tracing::debug!(
                        container = %self.key,
                        before = %transition.from().key_sequence(),
                        after = %transition.to().key_sequence(),
                        "empty backstack denied with side effect; retaining current backstack"
                    );
                    drop(state);
                    effect();
                    return ExecutionOutcome::Cancelled;
                }
            }
        }

        // Commit: record result intents, swap the backstack, diff.
        for (instance, intent) in results {
            state.pending_results.insert(instance.id().clone(), intent);
        }
        let previous = std::mem::replace(&mut state.backstack, candidate.clone());
        let transition = Transition::new(previous, candidate.clone());

        let deliveries = Self::collect_deliveries(&mut state, &transition);

        // Intents for instances no longer on the stack and not delivered
        // above have nothing left to resolve.
        state
            .pending_results
            .retain(|id, _| candidate.contains(id));

        if transition.is_change() {
            self.backstack_tx.send_replace(candidate);
            self.controller.note_backstack_changed(&self.key);
        }

        drop(state);

        // Post-unlock work: deliveries first, then deferred side effects.
        let channels = self.controller.channels();
        for delivery in deliveries {
            match delivery {
                PendingDelivery::Result { channel, payload } => {
                    channels.deliver_result(&channel, payload);
                }
                PendingDelivery::Closed { channel } => channels.deliver_closed(&channel),
            }
        }
        for effect in effects {
            effect();
        }

        ExecutionOutcome::Applied
    }

    fn collect_deliveries(
        state: &mut ContainerState<K>,
        transition: &Transition<K>,
    ) -> Vec<PendingDelivery> {
        let mut deliveries = Vec::new();
        for closed in transition.closed() {
            let intent = state
                .pending_results
                .remove(closed.id())
                .unwrap_or(ResultIntent::Closed { silent: false });
            let channel = closed.metadata().get(&RESULT_CHANNEL);

            match intent {
                ResultIntent::Completed(payload) => match channel {
                    Some(channel) => {
                        deliveries.push(PendingDelivery::Result {
                            channel,
                            payload: payload.unwrap_or_else(|| Box::new(())),
                        });
                    }
                    None => {
                        if payload.is_some() {
                            tracing::warn!(
                                key = %closed.key().describe(),
                                "instance completed with a result but carries no result \
                                 channel; dropping payload"
                            );
                        }
                    }
                },
                ResultIntent::Closed { silent } => {
                    if !silent {
                        if let Some(channel) = channel {
                            deliveries.push(PendingDelivery::Closed { channel });
                        }
                    }
                }
                // The delegate carries the correlation id forward; the
                // requester resolves when the delegate terminates.
                ResultIntent::Delegated(_) => {}
            }
        }
        deliveries
    }

    fn decide_empty(&self, transition: &Transition<K>) -> EmptyDecision {
        match &self.empty_policy {
            EmptyPolicy::AllowEmpty => EmptyDecision::Allow,
            EmptyPolicy::CloseParent => match &self.parent {
                Some(parent) => {
                    let parent = parent.clone();
                    EmptyDecision::DenyWith(Box::new(move || {
                        if let Some(parent) = parent.upgrade() {
                            if let Some(active) = parent.active() {
                                let _ = parent
                                    .execute(&NavigationContext::root(), Operation::close(active));
                            }
                        }
                    }))
                }
                None => {
                    tracing::warn!(
                        container = %self.key,
                        "CloseParent empty policy on a container with no parent"
                    );
                    EmptyDecision::Deny
                }
            },
            EmptyPolicy::Action(action) => {
                if action() {
                    EmptyDecision::Deny
                } else {
                    EmptyDecision::Allow
                }
            }
            EmptyPolicy::Interceptor(interceptor) => interceptor.on_empty(transition),
        }
    }

    /// Capture the current backstack as a snapshot.
    pub fn save(&self) -> BackstackSnapshot<K>
    where
        K: Serialize,
    {
        self.backstack().snapshot()
    }

    /// Replace the backstack from a snapshot.
    ///
    /// Restoration is a persistence operation, not navigation: no
    /// interceptors run, no results are delivered, and the container does
    /// not become active. Pending result states are reset.
    ///
    /// # Panics
    ///
    /// Panics when called while an execute is in flight, like
    /// [`execute`](Self::execute).
    pub fn restore(&self, snapshot: &BackstackSnapshot<K>) -> nav_core::snapshot::Result<()> {
        let backstack = snapshot.restore()?;
        let Some(mut state) = self.state.try_lock() else {
            panic!(
                "re-entrant restore() on navigation container '{}' while an operation \
                 was in flight",
                self.key,
            );
        };
        state.backstack = backstack.clone();
        state.pending_results.clear();
        drop(state);
        self.backstack_tx.send_replace(backstack);
        Ok(())
    }
}

impl<K: NavigationKey> fmt::Debug for NavigationContainer<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationContainer")
            .field("key", &self.key)
            .field("backstack", &self.backstack().key_sequence())
            .field("empty_policy", &self.empty_policy)
            .finish()
    }
}
