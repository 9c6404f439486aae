//! Array Capability
//!
//! This module defines what it means for a node to produce an array: a
//! declared [`Shape`] and [`Bounds`], a row-major `f64` value buffer, and a
//! coalesced diff of pending changes relative to the last commit.
//!
//! The buffer and diff live in per-trial [`Cell`]s owned by an evaluation
//! state, never in the node itself; the node only declares the static
//! facts (shape, bounds) and the recompute rules. This is what lets many
//! candidate solutions be evaluated concurrently over one immutable graph.

mod cell;
mod shape;
mod update;

pub use cell::{Cell, Diff};
pub use shape::{Bounds, Shape};
pub use update::Update;
