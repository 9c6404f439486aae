//! Model Graph
//!
//! This module implements the dependency graph that holds an optimization
//! model: decision variables at the roots, operator nodes above them, with
//! objective and constraint expressions at the leaves of interest.
//!
//! # Overview
//!
//! The graph is a directed acyclic graph where:
//!
//! - Nodes produce arrays (decision variables, operators, reductions)
//! - An edge from A to B exists iff B reads A's output
//!
//! # Design Decisions
//!
//! 1. Nodes live in an append-only arena and are addressed by index. No
//!    node is ever freed individually; the arena is dropped as a unit.
//!
//! 2. The graph carries no evaluation values. Buffers and diffs live in
//!    per-trial states, so one immutable graph serves many concurrent
//!    candidate solutions.
//!
//! 3. Topological ranks are maintained eagerly so that propagation can
//!    simply sort the affected nodes instead of re-deriving an order.

mod arena;
mod propagator;

pub use arena::{Graph, NodeId, NodeOps};
