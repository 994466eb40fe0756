//! Navigation controller
//!
//! The controller is the explicitly constructed root of a navigation setup:
//! it carries the global interceptor chain, the binding registry mapping key
//! variants to destination factories, the result-channel registry, and the
//! container registry with active-container tracking. There is no global
//! singleton; tests construct an isolated controller per test and install it
//! explicitly.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use thiserror::Error;

use nav_core::instance::NavigationInstance;
use nav_core::key::NavigationKey;

use crate::container::{ContainerKey, NavigationContainer};
use crate::interceptor::NavigationInterceptor;
use crate::result::ResultChannels;

/// Controller error types
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Install called on an installed controller
    #[error("Navigation controller is already installed")]
    AlreadyInstalled,

    /// An operation that requires an installed controller
    #[error("Navigation controller is not installed")]
    NotInstalled,

    /// No binding matched a navigation key
    #[error("No binding registered for navigation key: {0}")]
    UnboundKey(String),

    /// A container key with no registration
    #[error("Unknown container: {0}")]
    UnknownContainer(String),
}

/// Result type for controller operations
pub type Result<T> = std::result::Result<T, ControllerError>;

/// A destination produced by a binding factory; opaque to the engine.
pub type BoxedDestination = Box<dyn Any + Send>;

/// Maps a set of navigation key variants to a destination factory.
///
/// Bindings are the dependency-injection boundary: the engine only consumes
/// "which factory matches this key", not how the factory was assembled.
pub struct NavigationBinding<K: NavigationKey> {
    name: &'static str,
    matches: Box<dyn Fn(&K) -> bool + Send + Sync>,
    factory: Box<dyn Fn(&NavigationInstance<K>) -> BoxedDestination + Send + Sync>,
}

impl<K: NavigationKey> NavigationBinding<K> {
    /// Create a binding from a match predicate and a destination factory.
    pub fn new(
        name: &'static str,
        matches: impl Fn(&K) -> bool + Send + Sync + 'static,
        factory: impl Fn(&NavigationInstance<K>) -> BoxedDestination + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            matches: Box::new(matches),
            factory: Box::new(factory),
        }
    }

    /// The binding's name, for logs.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Builder collecting global interceptors and bindings at construction.
pub struct ControllerBuilder<K: NavigationKey> {
    interceptors: Vec<Arc<dyn NavigationInterceptor<K>>>,
    bindings: Vec<NavigationBinding<K>>,
}

impl<K: NavigationKey> ControllerBuilder<K> {
    /// Add a global interceptor; global interceptors run after every
    /// container's local chain, in the order added here.
    pub fn interceptor(mut self, interceptor: impl NavigationInterceptor<K> + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Add a destination binding.
    pub fn binding(mut self, binding: NavigationBinding<K>) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Build the controller. It starts uninstalled.
    pub fn build(self) -> Arc<NavigationController<K>> {
        Arc::new(NavigationController {
            global_interceptors: self.interceptors,
            bindings: self.bindings,
            channels: ResultChannels::new(),
            containers: Mutex::new(HashMap::new()),
            active: Mutex::new(None),
            installed: AtomicBool::new(false),
        })
    }
}

/// The root object owning global navigation state.
pub struct NavigationController<K: NavigationKey> {
    global_interceptors: Vec<Arc<dyn NavigationInterceptor<K>>>,
    bindings: Vec<NavigationBinding<K>>,
    channels: ResultChannels,
    containers: Mutex<HashMap<ContainerKey, Weak<NavigationContainer<K>>>>,
    active: Mutex<Option<ContainerKey>>,
    installed: AtomicBool,
}

impl<K: NavigationKey> NavigationController<K> {
    /// Start building a controller.
    pub fn builder() -> ControllerBuilder<K> {
        ControllerBuilder {
            interceptors: Vec::new(),
            bindings: Vec::new(),
        }
    }

    /// Install the controller, allowing containers to register.
    pub fn install(&self) -> Result<()> {
        if self
            .installed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ControllerError::AlreadyInstalled);
        }
        tracing::debug!("navigation controller installed");
        Ok(())
    }

    /// Uninstall the controller, clearing container registrations and
    /// result channels.
    pub fn uninstall(&self) -> Result<()> {
        if self
            .installed
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ControllerError::NotInstalled);
        }
        self.containers.lock().clear();
        *self.active.lock() = None;
        self.channels.clear();
        tracing::debug!("navigation controller uninstalled");
        Ok(())
    }

    /// Whether the controller is installed.
    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }

    /// The result-channel registry.
    pub fn channels(&self) -> &ResultChannels {
        &self.channels
    }

    /// Resolve an instance to its bound destination.
    pub fn resolve(&self, instance: &NavigationInstance<K>) -> Result<BoxedDestination> {
        self.bindings
            .iter()
            .find(|binding| (binding.matches)(instance.key()))
            .map(|binding| {
                tracing::debug!(
                    binding = binding.name(),
                    key = %instance.key().describe(),
                    "resolved destination binding"
                );
                (binding.factory)(instance)
            })
            .ok_or_else(|| ControllerError::UnboundKey(instance.key().describe()))
    }

    /// The key of the container that last changed its backstack, if any.
    pub fn active_container(&self) -> Option<ContainerKey> {
        self.active.lock().clone()
    }

    /// Explicitly mark a registered container active.
    pub fn set_active(&self, key: &ContainerKey) -> Result<()> {
        if !self.containers.lock().contains_key(key) {
            return Err(ControllerError::UnknownContainer(key.as_str().to_string()));
        }
        *self.active.lock() = Some(key.clone());
        Ok(())
    }

    /// Look up a registered container.
    pub fn container(&self, key: &ContainerKey) -> Option<Arc<NavigationContainer<K>>> {
        self.containers.lock().get(key).and_then(Weak::upgrade)
    }

    pub(crate) fn register_container(
        &self,
        key: ContainerKey,
        container: Weak<NavigationContainer<K>>,
    ) -> Result<()> {
        if !self.is_installed() {
            return Err(ControllerError::NotInstalled);
        }
        self.containers.lock().insert(key.clone(), container);
        // The first container registered becomes active by default.
        let mut active = self.active.lock();
        if active.is_none() {
            *active = Some(key);
        }
        Ok(())
    }

    pub(crate) fn note_backstack_changed(&self, key: &ContainerKey) {
        let mut active = self.active.lock();
        if active.as_ref() != Some(key) {
            tracing::debug!(container = %key, "active container changed");
            *active = Some(key.clone());
        }
    }

    pub(crate) fn global_interceptors(&self) -> &[Arc<dyn NavigationInterceptor<K>>] {
        &self.global_interceptors
    }
}

impl<K: NavigationKey> std::fmt::Debug for NavigationController<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationController")
            .field("installed", &self.is_installed())
            .field("containers", &self.containers.lock().len())
            .field("bindings", &self.bindings.len())
            .finish()
    }
}
