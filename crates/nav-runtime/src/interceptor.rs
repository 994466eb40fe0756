//! Interceptor chains
//!
//! Interceptors are ordered policies that observe, rewrite, or cancel an
//! operation before it is applied. Chains run left to right in registration
//! order; the output of one interceptor is the input of the next, so a
//! replacement from an earlier interceptor is matched by later ones against
//! the new key. Cancellation short-circuits the whole execute call, leaving
//! the backstack untouched.

use std::sync::Arc;

use nav_core::instance::NavigationInstance;
use nav_core::key::NavigationKey;
use nav_core::operation::{DeferredEffect, Operation};

use crate::context::NavigationContext;

/// The terminal action an interceptor hook chooses for an operation.
///
/// Exactly one action per hook invocation; the type makes choosing none
/// inexpressible, and the default hook implementations choose
/// [`Continue`](Self::Continue).
pub enum InterceptorDecision<K: NavigationKey> {
    /// Let the operation pass through unchanged.
    Continue,
    /// Substitute a different operation; later interceptors see the
    /// replacement.
    ReplaceWith(Operation<K>),
    /// Abandon the execute call; the backstack stays as it was.
    Cancel,
    /// Abandon the execute call, then run a closure once the execution lock
    /// is released.
    CancelWith(DeferredEffect),
}

/// A policy consulted before operations are applied.
///
/// The per-kind hooks receive the instance the operation targets and choose
/// a terminal [`InterceptorDecision`]. The catch-all
/// [`before_intercept`](Self::before_intercept) runs first on each
/// interceptor and may rewrite the raw operation wholesale, including
/// injecting or reordering the members of an aggregate.
pub trait NavigationInterceptor<K: NavigationKey>: Send + Sync {
    /// Rewrite the raw operation before the per-kind hooks run.
    fn before_intercept(
        &self,
        context: &NavigationContext<K>,
        operation: Operation<K>,
    ) -> Operation<K> {
        let _ = context;
        operation
    }

    /// Called when an instance is about to open.
    fn on_open(
        &self,
        context: &NavigationContext<K>,
        instance: &NavigationInstance<K>,
    ) -> InterceptorDecision<K> {
        let _ = (context, instance);
        InterceptorDecision::Continue
    }

    /// Called when an instance is about to close.
    fn on_close(
        &self,
        context: &NavigationContext<K>,
        instance: &NavigationInstance<K>,
    ) -> InterceptorDecision<K> {
        let _ = (context, instance);
        InterceptorDecision::Continue
    }

    /// Called when an instance is about to complete, including when it
    /// delegates its result.
    fn on_complete(
        &self,
        context: &NavigationContext<K>,
        instance: &NavigationInstance<K>,
    ) -> InterceptorDecision<K> {
        let _ = (context, instance);
        InterceptorDecision::Continue
    }
}

impl<K: NavigationKey, T: NavigationInterceptor<K> + ?Sized> NavigationInterceptor<K> for Arc<T> {
    fn before_intercept(
        &self,
        context: &NavigationContext<K>,
        operation: Operation<K>,
    ) -> Operation<K> {
        (**self).before_intercept(context, operation)
    }

    fn on_open(
        &self,
        context: &NavigationContext<K>,
        instance: &NavigationInstance<K>,
    ) -> InterceptorDecision<K> {
        (**self).on_open(context, instance)
    }

    fn on_close(
        &self,
        context: &NavigationContext<K>,
        instance: &NavigationInstance<K>,
    ) -> InterceptorDecision<K> {
        (**self).on_close(context, instance)
    }

    fn on_complete(
        &self,
        context: &NavigationContext<K>,
        instance: &NavigationInstance<K>,
    ) -> InterceptorDecision<K> {
        (**self).on_complete(context, instance)
    }
}

/// The outcome of running an operation through a chain.
pub(crate) enum ChainOutcome<K: NavigationKey> {
    /// The (possibly rewritten) operation to keep processing.
    Proceed(Operation<K>),
    /// The operation was cancelled, optionally with a deferred side effect.
    Cancelled(Option<DeferredEffect>),
}

enum Dispatched<K: NavigationKey> {
    Proceed(Operation<K>),
    Cancelled(Option<DeferredEffect>),
}

/// Run an operation through interceptors in registration order.
pub(crate) fn run_chain<K: NavigationKey>(
    interceptors: &[Arc<dyn NavigationInterceptor<K>>],
    context: &NavigationContext<K>,
    mut operation: Operation<K>,
) -> ChainOutcome<K> {
    for interceptor in interceptors {
        operation = interceptor.before_intercept(context, operation);
        match dispatch(interceptor.as_ref(), context, operation) {
            Dispatched::Proceed(next) => operation = next,
            Dispatched::Cancelled(effect) => return ChainOutcome::Cancelled(effect),
        }
    }
    ChainOutcome::Proceed(operation)
}

fn dispatch<K: NavigationKey>(
    interceptor: &dyn NavigationInterceptor<K>,
    context: &NavigationContext<K>,
    operation: Operation<K>,
) -> Dispatched<K> {
    match operation {
        Operation::Open { instance } => match interceptor.on_open(context, &instance) {
            InterceptorDecision::Continue => Dispatched::Proceed(Operation::Open { instance }),
            InterceptorDecision::ReplaceWith(replacement) => Dispatched::Proceed(replacement),
            InterceptorDecision::Cancel => Dispatched::Cancelled(None),
            InterceptorDecision::CancelWith(effect) => Dispatched::Cancelled(Some(effect)),
        },
        Operation::Close { instance, silent } => match interceptor.on_close(context, &instance) {
            InterceptorDecision::Continue => {
                Dispatched::Proceed(Operation::Close { instance, silent })
            }
            InterceptorDecision::ReplaceWith(replacement) => Dispatched::Proceed(replacement),
            InterceptorDecision::Cancel => Dispatched::Cancelled(None),
            InterceptorDecision::CancelWith(effect) => Dispatched::Cancelled(Some(effect)),
        },
        Operation::Complete { instance, payload } => {
            match interceptor.on_complete(context, &instance) {
                InterceptorDecision::Continue => {
                    Dispatched::Proceed(Operation::Complete { instance, payload })
                }
                InterceptorDecision::ReplaceWith(replacement) => Dispatched::Proceed(replacement),
                InterceptorDecision::Cancel => Dispatched::Cancelled(None),
                InterceptorDecision::CancelWith(effect) => Dispatched::Cancelled(Some(effect)),
            }
        }
        Operation::CompleteFrom { instance, delegate } => {
            match interceptor.on_complete(context, &instance) {
                InterceptorDecision::Continue => {
                    Dispatched::Proceed(Operation::CompleteFrom { instance, delegate })
                }
                InterceptorDecision::ReplaceWith(replacement) => Dispatched::Proceed(replacement),
                InterceptorDecision::Cancel => Dispatched::Cancelled(None),
                InterceptorDecision::CancelWith(effect) => Dispatched::Cancelled(Some(effect)),
            }
        }
        Operation::Aggregate { operations } => {
            let mut rebuilt = Vec::with_capacity(operations.len());
            for sub in operations {
                match dispatch(interceptor, context, sub) {
                    Dispatched::Proceed(kept) => rebuilt.push(kept),
                    // An aggregate is one atomic intent; cancelling any
                    // member abandons the whole call.
                    Dispatched::Cancelled(effect) => return Dispatched::Cancelled(effect),
                }
            }
            Dispatched::Proceed(Operation::Aggregate { operations: rebuilt })
        }
        Operation::SideEffect { effect } => Dispatched::Proceed(Operation::SideEffect { effect }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    enum Key {
        A,
        B,
        C,
        Other,
    }

    impl NavigationKey for Key {}

    /// Rewrites opens of one key into opens of another, counting invocations.
    struct Rewrite {
        from: Key,
        to: Key,
        calls: AtomicUsize,
    }

    impl Rewrite {
        fn new(from: Key, to: Key) -> Self {
            Self {
                from,
                to,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl NavigationInterceptor<Key> for Rewrite {
        fn on_open(
            &self,
            _context: &NavigationContext<Key>,
            instance: &NavigationInstance<Key>,
        ) -> InterceptorDecision<Key> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if instance.key() == &self.from {
                InterceptorDecision::ReplaceWith(Operation::open(self.to.clone()))
            } else {
                InterceptorDecision::Continue
            }
        }
    }

    struct CancelOpens {
        calls: AtomicUsize,
    }

    impl NavigationInterceptor<Key> for CancelOpens {
        fn on_open(
            &self,
            _context: &NavigationContext<Key>,
            _instance: &NavigationInstance<Key>,
        ) -> InterceptorDecision<Key> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            InterceptorDecision::Cancel
        }
    }

    fn chain(
        interceptors: Vec<Arc<dyn NavigationInterceptor<Key>>>,
        operation: Operation<Key>,
    ) -> ChainOutcome<Key> {
        run_chain(&interceptors, &NavigationContext::root(), operation)
    }

    #[test]
    fn test_rewrite_chain_is_deterministic() {
        let first = Arc::new(Rewrite::new(Key::A, Key::B));
        let second = Arc::new(Rewrite::new(Key::B, Key::C));

        let outcome = chain(
            vec![first.clone(), second.clone()],
            Operation::open(Key::A),
        );

        let ChainOutcome::Proceed(operation) = outcome else {
            panic!("rewrite chain should proceed");
        };
        let Operation::Open { instance } = operation else {
            panic!("rewrite chain should produce an open");
        };

        // The second interceptor matched against the first one's output.
        assert_eq!(instance.key(), &Key::C);
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_short_circuits_later_interceptors() {
        let canceller = Arc::new(CancelOpens {
            calls: AtomicUsize::new(0),
        });
        let rewrite = Arc::new(Rewrite::new(Key::A, Key::B));

        let outcome = chain(
            vec![canceller.clone(), rewrite.clone()],
            Operation::open(Key::A),
        );

        assert!(matches!(outcome, ChainOutcome::Cancelled(None)));
        assert_eq!(canceller.calls.load(Ordering::SeqCst), 1);
        assert_eq!(rewrite.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_with_effect_carries_the_effect() {
        struct DenyWithEffect;

        impl NavigationInterceptor<Key> for DenyWithEffect {
            fn on_close(
                &self,
                _context: &NavigationContext<Key>,
                _instance: &NavigationInstance<Key>,
            ) -> InterceptorDecision<Key> {
                InterceptorDecision::CancelWith(Box::new(|| {}))
            }
        }

        let outcome = chain(
            vec![Arc::new(DenyWithEffect)],
            Operation::close(NavigationInstance::new(Key::A)),
        );

        assert!(matches!(outcome, ChainOutcome::Cancelled(Some(_))));
    }

    #[test]
    fn test_aggregate_members_dispatch_individually() {
        let rewrite = Arc::new(Rewrite::new(Key::A, Key::B));

        let outcome = chain(
            vec![rewrite.clone()],
            Operation::aggregate(vec![
                Operation::open(Key::A),
                Operation::open(Key::Other),
            ]),
        );

        let ChainOutcome::Proceed(Operation::Aggregate { operations }) = outcome else {
            panic!("aggregate should proceed as an aggregate");
        };

        assert_eq!(operations.len(), 2);
        let Operation::Open { instance } = &operations[0] else {
            panic!("first member should stay an open");
        };
        assert_eq!(instance.key(), &Key::B);
        assert_eq!(rewrite.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cancelled_aggregate_member_abandons_whole_call() {
        let canceller = Arc::new(CancelOpens {
            calls: AtomicUsize::new(0),
        });

        let outcome = chain(
            vec![canceller],
            Operation::aggregate(vec![
                Operation::close(NavigationInstance::new(Key::A)),
                Operation::open(Key::B),
            ]),
        );

        assert!(matches!(outcome, ChainOutcome::Cancelled(None)));
    }

    #[test]
    fn test_before_intercept_rewrites_raw_operation() {
        struct ExpandToAggregate;

        impl NavigationInterceptor<Key> for ExpandToAggregate {
            fn before_intercept(
                &self,
                _context: &NavigationContext<Key>,
                operation: Operation<Key>,
            ) -> Operation<Key> {
                match operation {
                    Operation::Open { instance } if instance.key() == &Key::A => {
                        Operation::aggregate(vec![
                            Operation::open(Key::Other),
                            Operation::Open { instance },
                        ])
                    }
                    other => other,
                }
            }
        }

        let outcome = chain(vec![Arc::new(ExpandToAggregate)], Operation::open(Key::A));

        let ChainOutcome::Proceed(Operation::Aggregate { operations }) = outcome else {
            panic!("expanded operation should be an aggregate");
        };
        assert_eq!(operations.len(), 2);
    }
}
