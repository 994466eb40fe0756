//! Navigation operations
//!
//! An operation is the unit of navigational intent: a pure transform over a
//! backstack tagged with its semantic kind. Operations are consumed exactly
//! once by a container's `execute`; applying one yields the candidate
//! backstack together with the result intents and deferred side effects the
//! commit must honor.
//!
//! Construction is side-effect-free: result state is recorded only when the
//! engine commits the candidate, so an operation cancelled by an interceptor
//! leaves no trace.

use std::any::Any;
use std::fmt;

use crate::backstack::Backstack;
use crate::instance::{InstanceId, NavigationInstance};
use crate::key::NavigationKey;
use crate::metadata::RESULT_CHANNEL;

/// Type-erased completion payload carried by a `Complete` operation.
pub type ResultPayload = Box<dyn Any + Send>;

/// A closure scheduled to run after the execution lock is released.
pub type DeferredEffect = Box<dyn FnOnce() + Send>;

/// The terminal result an operation assigns to an instance it removes.
pub enum ResultIntent {
    /// The instance was closed without producing a result.
    Closed {
        /// Suppress the closed notification to the requester.
        silent: bool,
    },
    /// The instance completed, optionally with a payload.
    Completed(Option<ResultPayload>),
    /// The instance handed its result obligation to a delegate.
    Delegated(InstanceId),
}

impl fmt::Debug for ResultIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed { silent } => f.debug_struct("Closed").field("silent", silent).finish(),
            Self::Completed(payload) => f
                .debug_tuple("Completed")
                .field(&payload.is_some())
                .finish(),
            Self::Delegated(id) => f.debug_tuple("Delegated").field(id).finish(),
        }
    }
}

/// A navigation operation: a pure backstack transform plus its semantic tag.
pub enum Operation<K: NavigationKey> {
    /// Put an instance on top of the backstack, moving it there if its id is
    /// already present.
    Open {
        /// The instance to open.
        instance: NavigationInstance<K>,
    },
    /// Remove an instance, notifying its requester that it closed.
    Close {
        /// The instance to close.
        instance: NavigationInstance<K>,
        /// Suppress the closed notification.
        silent: bool,
    },
    /// Remove an instance with a completion result, also removing every
    /// other instance sharing its result-correlation id.
    Complete {
        /// The instance to complete.
        instance: NavigationInstance<K>,
        /// The completion payload, when the key declares a result contract.
        payload: Option<ResultPayload>,
    },
    /// Hand an instance's result obligation to a delegate, which is pushed
    /// onto the backstack and resolves the requester's callback when it
    /// eventually terminates.
    CompleteFrom {
        /// The instance delegating its result.
        instance: NavigationInstance<K>,
        /// The replacement instance that will produce the real result.
        delegate: NavigationInstance<K>,
    },
    /// Apply several operations as one atomic backstack swap.
    Aggregate {
        /// Sub-operations, applied in order as a left fold.
        operations: Vec<Operation<K>>,
    },
    /// Run a closure after a successful commit; the backstack is unchanged.
    SideEffect {
        /// The closure to run after the execution lock is released.
        effect: DeferredEffect,
    },
}

impl<K: NavigationKey> Operation<K> {
    /// Open a key, creating a fresh instance for it.
    pub fn open(key: K) -> Self {
        Self::open_instance(NavigationInstance::new(key))
    }

    /// Open an existing instance.
    pub fn open_instance(instance: NavigationInstance<K>) -> Self {
        Self::Open { instance }
    }

    /// Open a key whose completion should be delivered to the given result
    /// channel.
    pub fn open_for_result(key: K, channel: impl Into<String>) -> Self {
        let instance = NavigationInstance::new(key);
        instance.metadata().set(&RESULT_CHANNEL, channel.into());
        Self::Open { instance }
    }

    /// Close an instance, notifying its requester.
    pub fn close(instance: NavigationInstance<K>) -> Self {
        Self::Close {
            instance,
            silent: false,
        }
    }

    /// Close an instance without notifying its requester.
    pub fn close_silent(instance: NavigationInstance<K>) -> Self {
        Self::Close {
            instance,
            silent: true,
        }
    }

    /// Complete an instance whose key declares no result contract.
    ///
    /// # Panics
    ///
    /// Panics if the key expects a completion result; use
    /// [`complete_with`](Self::complete_with) for such keys.
    pub fn complete(instance: NavigationInstance<K>) -> Self {
        assert!(
            !instance.key().expects_result(),
            "navigation key {} expects a completion result but complete() was called \
             without one; use complete_with()",
            instance.key().describe(),
        );
        Self::Complete {
            instance,
            payload: None,
        }
    }

    /// Complete an instance with a typed result payload.
    ///
    /// # Panics
    ///
    /// Panics if the key does not declare a result contract; use
    /// [`complete`](Self::complete) for such keys.
    pub fn complete_with<R: Send + 'static>(instance: NavigationInstance<K>, result: R) -> Self {
        assert!(
            instance.key().expects_result(),
            "navigation key {} does not declare a completion result but complete_with() \
             was given one; use complete()",
            instance.key().describe(),
        );
        Self::Complete {
            instance,
            payload: Some(Box::new(result)),
        }
    }

    /// Delegate an instance's pending result to a replacement instance.
    ///
    /// The delegate inherits the instance's result-correlation id and is
    /// pushed onto the backstack; when the delegate eventually completes or
    /// closes, the original requester's callback resolves transparently.
    pub fn complete_from(
        instance: NavigationInstance<K>,
        delegate: NavigationInstance<K>,
    ) -> Self {
        Self::CompleteFrom { instance, delegate }
    }

    /// Bundle operations into one atomic backstack swap.
    pub fn aggregate(operations: Vec<Operation<K>>) -> Self {
        Self::Aggregate { operations }
    }

    /// Schedule a closure to run after a successful commit.
    pub fn side_effect(effect: impl FnOnce() + Send + 'static) -> Self {
        Self::SideEffect {
            effect: Box::new(effect),
        }
    }

    /// Short label for logging.
    pub fn describe(&self) -> String {
        match self {
            Self::Open { instance } => format!("open({})", instance.key().describe()),
            Self::Close { instance, silent } => {
                if *silent {
                    format!("close-silent({})", instance.key().describe())
                } else {
                    format!("close({})", instance.key().describe())
                }
            }
            Self::Complete { instance, .. } => {
                format!("complete({})", instance.key().describe())
            }
            Self::CompleteFrom { instance, delegate } => format!(
                "complete-from({} <- {})",
                instance.key().describe(),
                delegate.key().describe(),
            ),
            Self::Aggregate { operations } => {
                let inner: Vec<_> = operations.iter().map(Operation::describe).collect();
                format!("aggregate[{}]", inner.join(", "))
            }
            Self::SideEffect { .. } => "side-effect".to_string(),
        }
    }

    /// Apply the transform against the current backstack.
    ///
    /// Consumes the operation, returning the candidate backstack together
    /// with the result intents for every instance the operation terminates
    /// and the side-effect closures to run after commit.
    pub fn apply(self, current: &Backstack<K>) -> AppliedOperation<K> {
        let mut applied = AppliedOperation {
            backstack: current.clone(),
            results: Vec::new(),
            effects: Vec::new(),
        };
        self.apply_into(&mut applied);
        applied
    }

    fn apply_into(self, applied: &mut AppliedOperation<K>) {
        match self {
            Self::Open { instance } => {
                applied.backstack = applied.backstack.pushed(instance);
            }
            Self::Close { instance, silent } => {
                applied.backstack = applied.backstack.removed(instance.id());
                applied.results.push((instance, ResultIntent::Closed { silent }));
            }
            Self::Complete { instance, payload } => {
                let channel = instance.metadata().get(&RESULT_CHANNEL);
                let completed_id = instance.id().clone();
                applied.backstack = applied.backstack.filtered(|entry| {
                    if entry.id() == &completed_id {
                        return false;
                    }
                    match &channel {
                        // Delegation chains share one correlation id; every
                        // link leaves the backstack with the terminal entry.
                        Some(channel) => {
                            entry.metadata().get(&RESULT_CHANNEL).as_ref() != Some(channel)
                        }
                        None => true,
                    }
                });
                applied
                    .results
                    .push((instance, ResultIntent::Completed(payload)));
            }
            Self::CompleteFrom { instance, delegate } => {
                if let Some(channel) = instance.metadata().get(&RESULT_CHANNEL) {
                    delegate.metadata().set(&RESULT_CHANNEL, channel);
                }
                applied.results.push((
                    instance,
                    ResultIntent::Delegated(delegate.id().clone()),
                ));
                applied.backstack = applied.backstack.pushed(delegate);
            }
            Self::Aggregate { operations } => {
                for operation in operations {
                    operation.apply_into(applied);
                }
            }
            Self::SideEffect { effect } => applied.effects.push(effect),
        }
    }
}

impl<K: NavigationKey> fmt::Debug for Operation<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// The outcome of applying an operation's transform.
pub struct AppliedOperation<K: NavigationKey> {
    /// The candidate backstack.
    pub backstack: Backstack<K>,
    /// Terminal result intents, keyed by the instance they terminate.
    pub results: Vec<(NavigationInstance<K>, ResultIntent)>,
    /// Side-effect closures to run after a successful commit.
    pub effects: Vec<DeferredEffect>,
}
