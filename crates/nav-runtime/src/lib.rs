//! Navigation runtime for Waypoint
//!
//! This crate provides the execution layer over the core data model:
//! interceptor chains, empty-backstack policies, the container state
//! machine, the controller, and typed result channels.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod container;
pub mod context;
pub mod controller;
pub mod empty;
pub mod interceptor;
pub mod result;
