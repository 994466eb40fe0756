//! Backstack transitions
//!
//! A transition is the diff between two backstack snapshots, computed once
//! per execute call and consumed by result delivery and active-container
//! bookkeeping. It is never persisted.

use crate::backstack::Backstack;
use crate::instance::NavigationInstance;
use crate::key::NavigationKey;

/// The diff between a previous and a next backstack.
///
/// Membership is decided by instance identity: an instance counts as
/// retained when its id appears on both sides, regardless of position.
#[derive(Debug, Clone)]
pub struct Transition<K: NavigationKey> {
    from: Backstack<K>,
    to: Backstack<K>,
}

impl<K: NavigationKey> Transition<K> {
    /// Create a transition between two backstack snapshots.
    pub fn new(from: Backstack<K>, to: Backstack<K>) -> Self {
        Self { from, to }
    }

    /// The backstack before the swap.
    pub fn from(&self) -> &Backstack<K> {
        &self.from
    }

    /// The backstack after the swap.
    pub fn to(&self) -> &Backstack<K> {
        &self.to
    }

    /// Instances present after the swap but not before.
    pub fn opened(&self) -> Vec<&NavigationInstance<K>> {
        self.to
            .iter()
            .filter(|entry| !self.from.contains(entry.id()))
            .collect()
    }

    /// Instances present before the swap but not after.
    pub fn closed(&self) -> Vec<&NavigationInstance<K>> {
        self.from
            .iter()
            .filter(|entry| !self.to.contains(entry.id()))
            .collect()
    }

    /// Instances present on both sides.
    pub fn retained(&self) -> Vec<&NavigationInstance<K>> {
        self.from
            .iter()
            .filter(|entry| self.to.contains(entry.id()))
            .collect()
    }

    /// Whether the swap changed the backstack at all.
    pub fn is_change(&self) -> bool {
        self.from != self.to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Key {
        Home,
        Detail(u32),
        Compose,
    }

    impl NavigationKey for Key {}

    #[test]
    fn test_diff_sets() {
        let home = NavigationInstance::new(Key::Home);
        let detail = NavigationInstance::new(Key::Detail(1));
        let compose = NavigationInstance::new(Key::Compose);

        let from = Backstack::new()
            .pushed(home.clone())
            .pushed(detail.clone());
        let to = Backstack::new()
            .pushed(home.clone())
            .pushed(compose.clone());

        let transition = Transition::new(from, to);

        let opened: Vec<_> = transition.opened().iter().map(|e| e.id().clone()).collect();
        let closed: Vec<_> = transition.closed().iter().map(|e| e.id().clone()).collect();
        let retained: Vec<_> = transition
            .retained()
            .iter()
            .map(|e| e.id().clone())
            .collect();

        assert_eq!(opened, vec![compose.id().clone()]);
        assert_eq!(closed, vec![detail.id().clone()]);
        assert_eq!(retained, vec![home.id().clone()]);
        assert!(transition.is_change());
    }

    #[test]
    fn test_reorder_is_retained_not_opened() {
        let home = NavigationInstance::new(Key::Home);
        let detail = NavigationInstance::new(Key::Detail(1));

        let from = Backstack::new()
            .pushed(home.clone())
            .pushed(detail.clone());
        let to = from.pushed(home.clone());

        let transition = Transition::new(from, to);

        assert!(transition.opened().is_empty());
        assert!(transition.closed().is_empty());
        assert_eq!(transition.retained().len(), 2);
        assert!(transition.is_change());
    }

    #[test]
    fn test_identical_snapshots_are_not_a_change() {
        let stack = Backstack::from_keys([Key::Home]);
        let transition = Transition::new(stack.clone(), stack);
        assert!(!transition.is_change());
    }
}
