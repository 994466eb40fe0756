//! Waypoint: typed navigation for mobile and cross-platform shells
//!
//! Waypoint manages a stack of destination instances, routes typed
//! navigation operations between them through interceptor chains, and
//! delivers typed results back from child destinations to their requesters.
//!
//! # Architecture
//!
//! - [`nav_core`] - the data model: keys, instances, typed metadata, the
//!   duplicate-free backstack, operations, transitions, and snapshots
//! - [`nav_runtime`] - the execution layer: interceptor chains,
//!   empty-backstack policies, containers, the controller, and result
//!   channels
//!
//! # Example
//!
//! ```rust
//! use waypoint::{
//!     NavigationContainer, NavigationContext, NavigationController, NavigationKey, Operation,
//! };
//!
//! #[derive(Debug, Clone, PartialEq)]
//! enum Route {
//!     Home,
//!     Settings,
//! }
//!
//! impl NavigationKey for Route {}
//!
//! let controller = NavigationController::builder().build();
//! controller.install().unwrap();
//!
//! let container = NavigationContainer::builder("main", &controller)
//!     .root(Route::Home)
//!     .build()
//!     .unwrap();
//!
//! container.execute(&NavigationContext::root(), Operation::open(Route::Settings));
//! assert_eq!(container.backstack().keys(), vec![&Route::Home, &Route::Settings]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use nav_core;
pub use nav_runtime;

pub use nav_core::backstack::Backstack;
pub use nav_core::instance::{InstanceId, NavigationInstance};
pub use nav_core::key::NavigationKey;
pub use nav_core::metadata::{Metadata, MetadataKey, RESULT_CHANNEL};
pub use nav_core::operation::{Operation, ResultIntent};
pub use nav_core::snapshot::{BackstackSnapshot, InstanceSnapshot, SnapshotError};
pub use nav_core::transition::Transition;

pub use nav_runtime::container::{
    ContainerKey, ExecutionOutcome, InterceptorHandle, NavigationContainer,
};
pub use nav_runtime::context::NavigationContext;
pub use nav_runtime::controller::{
    ControllerError, NavigationBinding, NavigationController,
};
pub use nav_runtime::empty::{EmptyDecision, EmptyInterceptor, EmptyPolicy};
pub use nav_runtime::interceptor::{InterceptorDecision, NavigationInterceptor};
pub use nav_runtime::result::{QueuePolicy, ResultChannelId, ResultChannels};
