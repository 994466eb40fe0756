//! Core navigation data model for Waypoint
//!
//! This crate provides the identity-bearing instance model, the ordered
//! duplicate-free backstack, typed navigation operations, transition diffs,
//! and serializable backstack snapshots.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backstack;
pub mod instance;
pub mod key;
pub mod metadata;
pub mod operation;
pub mod snapshot;
pub mod transition;
