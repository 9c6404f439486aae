//! Fold-to-scalar nodes.
//!
//! A reduce node folds one array operand down to a single value. The
//! from-scratch form is a plain fold of the operator over an init value
//! and the operand buffer; propagation instead corrects the committed
//! scalar using only the operand's diff whenever an exact correction
//! exists, and falls back to a full refold when it does not:
//!
//! - Sum corrects exactly for every kind of update.
//! - Prod corrects exactly except through zero, where the old factor
//!   cannot be divided back out.
//! - Max, Min and All refold when an update may invalidate the
//!   accumulator (the current extremum shrinking, the possibly-only zero
//!   vanishing) and on any structural change.
//!
//! Either path re-establishes the same invariant: the scalar equals a
//! from-scratch fold over the operand's current buffer.
//!
//! # Init values
//!
//! Construction takes an optional init. Operators with an identity (Sum,
//! Prod, All) supply it automatically. Max and Min have none, so over a
//! dynamic operand that may become empty the init is required and its
//! absence is a construction error; over a fixed-shape operand the fold
//! can always seed from the first element instead.

use smallvec::smallvec;

use crate::array::{Bounds, Cell, Shape, Update};
use crate::error::ModelError;
use crate::graph::{Graph, NodeId, NodeOps};
use crate::state::State;

use super::ops::ReduceOp;

/// Scalar fold of a single array operand.
#[derive(Debug)]
pub struct ReduceNode {
    id: NodeId,
    op: ReduceOp,
    operand: NodeId,
    init: Option<f64>,
    shape: Shape,
    bounds: Bounds,
}

impl ReduceNode {
    fn seed(&self) -> Option<f64> {
        self.init.or(self.op.identity())
    }

    /// Fold over the operand's entire current buffer.
    fn fold_all(&self, src: &Cell) -> f64 {
        match self.seed() {
            Some(seed) => src.buff().iter().fold(seed, |acc, &x| self.op.apply(acc, x)),
            None => src
                .buff()
                .iter()
                .copied()
                .reduce(|a, b| self.op.apply(a, b))
                .expect("fixed-shape operand is never empty"),
        }
    }

    /// Correct the committed scalar from the operand diff alone. `None`
    /// means no exact correction exists and the caller must refold.
    fn incremental(&self, base: f64, diff: &[Update]) -> Option<f64> {
        match self.op {
            ReduceOp::Sum => {
                let mut acc = base;
                for update in diff {
                    match *update {
                        Update::Set { old, value, .. } => acc += value - old,
                        Update::Insert { value, .. } => acc += value,
                        Update::Remove { old, .. } => acc -= old,
                    }
                }
                Some(acc)
            }
            ReduceOp::Prod => {
                let mut acc = base;
                for update in diff {
                    match *update {
                        Update::Set { old, value, .. } => {
                            if old == 0.0 {
                                return None;
                            }
                            acc = acc / old * value;
                        }
                        Update::Insert { value, .. } => acc *= value,
                        Update::Remove { old, .. } => {
                            if old == 0.0 {
                                return None;
                            }
                            acc /= old;
                        }
                    }
                }
                Some(acc)
            }
            ReduceOp::Max => {
                let mut acc = base;
                for update in diff {
                    match *update {
                        Update::Set { old, value, .. } => {
                            if old == base && value < old {
                                return None;
                            }
                            acc = acc.max(value);
                        }
                        Update::Insert { value, .. } => acc = acc.max(value),
                        Update::Remove { old, .. } => {
                            if old == base {
                                return None;
                            }
                        }
                    }
                }
                Some(acc)
            }
            ReduceOp::Min => {
                let mut acc = base;
                for update in diff {
                    match *update {
                        Update::Set { old, value, .. } => {
                            if old == base && value > old {
                                return None;
                            }
                            acc = acc.min(value);
                        }
                        Update::Insert { value, .. } => acc = acc.min(value),
                        Update::Remove { old, .. } => {
                            if old == base {
                                return None;
                            }
                        }
                    }
                }
                Some(acc)
            }
            ReduceOp::All => {
                // Any pending zero decides the conjunction outright; any
                // vanished zero may have been the only one, so refold.
                if diff.iter().any(|u| u.value() == Some(0.0)) {
                    return Some(0.0);
                }
                let old_zero = diff.iter().any(|u| match *u {
                    Update::Set { old, .. } | Update::Remove { old, .. } => old == 0.0,
                    Update::Insert { .. } => false,
                });
                if old_zero {
                    None
                } else {
                    Some(base)
                }
            }
        }
    }
}

impl NodeOps for ReduceNode {
    fn kind(&self) -> &'static str {
        self.op.label()
    }

    fn shape(&self) -> &Shape {
        &self.shape
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn initialize(&self, state: &mut State) {
        let value = self.fold_all(state.cell(self.operand));
        state.install(self.id, Cell::new(vec![value]));
    }

    fn propagate(&self, state: &mut State) {
        let diff = state.diff(self.operand);
        if diff.is_empty() && !state.cell(self.id).is_touched() {
            return;
        }
        let mut cell = state.begin(self.id);
        let src = state.cell(self.operand);
        let base = cell.committed(0);
        let value = self
            .incremental(base, &diff)
            .unwrap_or_else(|| self.fold_all(src));
        cell.set(0, value);
        state.finish(self.id, cell);
    }
}

impl Graph {
    /// Fold an array node to a scalar.
    ///
    /// `init` seeds the fold. It may be omitted for operators with an
    /// identity, and for Max/Min over fixed-shape operands (the fold then
    /// seeds from the first element); Max/Min over a dynamic operand
    /// require it, since an empty set has no extremum.
    pub fn reduce(
        &mut self,
        op: ReduceOp,
        operand: NodeId,
        init: Option<f64>,
    ) -> Result<NodeId, ModelError> {
        let a = self.array_of(operand, "reduce operand")?;
        let possibly_empty = a.shape().is_dynamic() || a.shape().size() == 0;
        if init.is_none() && op.identity().is_none() && possibly_empty {
            return Err(ModelError::invalid(format!(
                "{} over a possibly-empty array requires an explicit init",
                op.label()
            )));
        }
        let shape = Shape::scalar();
        let bounds = op.derive(a.bounds(), a.shape(), init.or(op.identity()));
        let id = self.next_id();
        self.add_entry(
            Box::new(ReduceNode { id, op, operand, init, shape, bounds }),
            smallvec![operand],
        );
        Ok(id)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
