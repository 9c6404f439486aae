//! Node Families
//!
//! Every node the engine knows how to evaluate lives here, grouped by
//! family:
//!
//! - `decision`: directly mutable sources (integers, binaries) plus
//!   constants, and the shared source-node machinery.
//! - `collections`: permutation and subset variables.
//! - `disjoint`: partitions of one domain across sibling arrays.
//! - `elementwise`: unary, binary and n-ary operator nodes.
//! - `reduce`: fold-to-scalar nodes.
//! - `quadratic`: sparse linear+quadratic energy over a binary array.
//! - `ops`: the operator enums the families are parameterized by.
//!
//! Construction happens through `Graph` methods colocated with each
//! family, so a family's validation rules, propagation logic and tests
//! sit in one file.

mod collections;
mod decision;
mod disjoint;
mod elementwise;
mod ops;
mod quadratic;
mod reduce;

pub use collections::{ListVar, SetVar};
pub use decision::{BinaryVar, IntegerVar};
pub use disjoint::{DisjointBitSetsVar, DisjointListsVar};
pub use elementwise::{BinaryOpNode, NaryOpNode, UnaryOpNode};
pub use ops::{BinaryOp, ReduceOp, UnaryOp};
pub use quadratic::{QuadraticModel, QuadraticModelNode};
pub use reduce::ReduceNode;
