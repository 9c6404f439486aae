//! Ripple Core
//!
//! This crate is the incremental evaluation engine behind a nonlinear
//! optimization model: a directed acyclic graph of decision variables and
//! mathematical operators, re-evaluated thousands of times per second by
//! local-search and annealing solvers. It implements:
//!
//! - The model graph: an append-only arena of nodes with topological ranks
//! - The array contract: shapes, bounds, value buffers and coalesced diffs
//! - Per-trial evaluation states with a propagate/commit/revert protocol
//! - Operator node families (elementwise, n-ary, reductions, quadratic
//!   energies) and directly mutable decision variables (integers,
//!   binaries, permutations, sets, disjoint partitions)
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: node arena, topological ranks, propagation driver
//! - `array`: shapes, bounds, update records, per-node value cells
//! - `state`: one candidate solution's buffers, diffs and trial lifecycle
//! - `nodes`: the node families and their `Graph` constructors
//!
//! The graph is built once and then never changes; any number of states
//! can evaluate it independently. A solver proposes a move by mutating a
//! decision variable inside a state, propagates the change to everything
//! downstream, inspects the objective and constraint buffers, and then
//! either commits the move or reverts it. Rejected moves cost time
//! proportional to the diff, not to the model.
//!
//! # Example
//!
//! ```rust
//! use ripple_core::{BinaryOp, Graph, ReduceOp};
//!
//! // objective = sum((x - c)^2) over a 3-vector of integers
//! let mut graph = Graph::new();
//! let x = graph.integer(3, 0.0, 10.0).unwrap();
//! let c = graph.constant(&[1.0, 5.0, 9.0]).unwrap();
//! let diff = graph.binary_op(BinaryOp::Subtract, x.node(), c).unwrap();
//! let sq = graph.unary(ripple_core::UnaryOp::Square, diff).unwrap();
//! let objective = graph.reduce(ReduceOp::Sum, sq, None).unwrap();
//!
//! let mut state = graph.initialize_state();
//! graph.propagate(&mut state);
//! state.commit();
//! let before = state.scalar(objective);
//!
//! // Propose a move, inspect, and keep or roll back.
//! x.set(&mut state, 1, 5.0).unwrap();
//! graph.propagate(&mut state);
//! if state.scalar(objective) <= before {
//!     state.commit();
//! } else {
//!     state.revert();
//! }
//! assert!(state.scalar(objective) <= before);
//! ```

pub mod array;
pub mod graph;
pub mod nodes;
pub mod state;

mod error;

pub use array::{Bounds, Cell, Diff, Shape, Update};
pub use error::ModelError;
pub use graph::{Graph, NodeId, NodeOps};
pub use nodes::{
    BinaryOp, BinaryVar, DisjointBitSetsVar, DisjointListsVar, IntegerVar, ListVar,
    QuadraticModel, ReduceOp, SetVar, UnaryOp,
};
pub use state::State;
