//! Empty-backstack policy
//!
//! Consulted only when an accepted operation would leave a container's
//! backstack empty. Denial behaves exactly like interceptor cancellation:
//! the candidate is discarded, the current backstack is retained, and an
//! optional side effect runs after the execution lock is released.

use std::fmt;

use nav_core::key::NavigationKey;
use nav_core::operation::DeferredEffect;
use nav_core::transition::Transition;

/// The tri-state outcome of consulting an empty-backstack policy.
pub enum EmptyDecision {
    /// Commit the empty backstack.
    Allow,
    /// Discard the candidate and retain the current backstack.
    Deny,
    /// Discard the candidate, retain the current backstack, then run a
    /// closure once the execution lock is released.
    DenyWith(DeferredEffect),
}

impl fmt::Debug for EmptyDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("Allow"),
            Self::Deny => f.write_str("Deny"),
            Self::DenyWith(_) => f.write_str("DenyWith"),
        }
    }
}

/// A policy hook observing the emptying transition before deciding.
pub trait EmptyInterceptor<K: NavigationKey>: Send + Sync {
    /// Decide whether the container may commit an empty backstack.
    fn on_empty(&self, transition: &Transition<K>) -> EmptyDecision;
}

/// The rule governing whether a container may hold zero instances.
pub enum EmptyPolicy<K: NavigationKey> {
    /// An empty backstack is a legal committed state.
    AllowEmpty,
    /// Deny the empty backstack and close the parent container's active
    /// destination instead.
    CloseParent,
    /// Consult a closure; returning `true` means the closure handled the
    /// event and the empty backstack is denied.
    Action(Box<dyn Fn() -> bool + Send + Sync>),
    /// Consult a full interceptor observing the emptying transition.
    Interceptor(Box<dyn EmptyInterceptor<K>>),
}

impl<K: NavigationKey> EmptyPolicy<K> {
    /// Build an [`EmptyPolicy::Action`] from a closure.
    pub fn action(action: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self::Action(Box::new(action))
    }

    /// Build an [`EmptyPolicy::Interceptor`] from an interceptor.
    pub fn interceptor(interceptor: impl EmptyInterceptor<K> + 'static) -> Self {
        Self::Interceptor(Box::new(interceptor))
    }
}

impl<K: NavigationKey> Default for EmptyPolicy<K> {
    fn default() -> Self {
        Self::AllowEmpty
    }
}

impl<K: NavigationKey> fmt::Debug for EmptyPolicy<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllowEmpty => f.write_str("AllowEmpty"),
            Self::CloseParent => f.write_str("CloseParent"),
            Self::Action(_) => f.write_str("Action"),
            Self::Interceptor(_) => f.write_str("Interceptor"),
        }
    }
}
