//! Elementwise operator nodes.
//!
//! Three families share one propagation discipline: recompute the value
//! function only at indices named by an operand diff (or stale from an
//! earlier round of the same trial), then synchronize the output length
//! with the operands'. Values are always read from the operands' current
//! buffers, which at propagation time already contain every update of the
//! round, so simultaneous changes to several operands at one index combine
//! correctly without any special casing.
//!
//! - [`UnaryOpNode`]: one operand, follows it one-for-one, including
//!   structural growth and shrink.
//! - [`BinaryOpNode`]: exactly two operands of identical shape.
//! - [`NaryOpNode`]: any number of identically shaped operands under an
//!   associative, commutative operator; operands may be appended after
//!   construction while the model is still being built.

use smallvec::{smallvec, SmallVec};

use crate::array::{Bounds, Shape, Update};
use crate::error::ModelError;
use crate::graph::{Graph, NodeId, NodeOps};
use crate::state::State;

use super::ops::{BinaryOp, UnaryOp};

/// Indices needing recomputation this round: every index named by an
/// operand's diff plus every index this node itself wrote in an earlier
/// round of the same trial (those must be re-derived in case the operand
/// walked back to its committed value).
fn stale_indices(own: &crate::array::Cell, diffs: &[&[Update]]) -> SmallVec<[usize; 8]> {
    let mut indices: SmallVec<[usize; 8]> = own.saved_indices().collect();
    for diff in diffs {
        for update in *diff {
            if let Update::Set { index, .. } = *update {
                indices.push(index);
            }
        }
    }
    indices
}

// ----------------------------------------------------------------------------
// Unary
// ----------------------------------------------------------------------------

/// Elementwise function of a single operand.
#[derive(Debug)]
pub struct UnaryOpNode {
    id: NodeId,
    op: UnaryOp,
    operand: NodeId,
    shape: Shape,
    bounds: Bounds,
}

impl NodeOps for UnaryOpNode {
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
        let buf = state.buff(self.operand).iter().map(|&x| self.op.apply(x)).collect();
        state.install(self.id, crate::array::Cell::new(buf));
    }

    fn propagate(&self, state: &mut State) {
        let diff = state.diff(self.operand);
        if diff.is_empty() && !state.cell(self.id).is_touched() {
            return;
        }
        let mut cell = state.begin(self.id);
        let src = state.cell(self.operand);
        let target = src.len();

        for index in stale_indices(&cell, &[diff.as_slice()]) {
            if index < cell.len().min(target) {
                cell.set(index, self.op.apply(src.get(index)));
            }
        }
        while cell.len() > target {
            cell.pop();
        }
        while cell.len() < target {
            let index = cell.len();
            cell.push(self.op.apply(src.get(index)));
        }
        state.finish(self.id, cell);
    }
}

// ----------------------------------------------------------------------------
// Binary
// ----------------------------------------------------------------------------

/// Elementwise combination of exactly two identically shaped operands.
#[derive(Debug)]
pub struct BinaryOpNode {
    id: NodeId,
    op: BinaryOp,
    lhs: NodeId,
    rhs: NodeId,
    shape: Shape,
    bounds: Bounds,
}

impl NodeOps for BinaryOpNode {
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
        let buf = state
            .buff(self.lhs)
            .iter()
            .zip(state.buff(self.rhs))
            .map(|(&a, &b)| self.op.apply(a, b))
            .collect();
        state.install(self.id, crate::array::Cell::new(buf));
    }

    fn propagate(&self, state: &mut State) {
        let ldiff = state.diff(self.lhs);
        let rdiff = state.diff(self.rhs);
        if ldiff.is_empty() && rdiff.is_empty() && !state.cell(self.id).is_touched() {
            return;
        }
        let mut cell = state.begin(self.id);
        let l = state.cell(self.lhs);
        let r = state.cell(self.rhs);
        debug_assert_eq!(l.len(), r.len(), "binary operand lengths diverged");
        let target = l.len();

        for index in stale_indices(&cell, &[ldiff.as_slice(), rdiff.as_slice()]) {
            if index < cell.len().min(target) {
                cell.set(index, self.op.apply(l.get(index), r.get(index)));
            }
        }
        while cell.len() > target {
            cell.pop();
        }
        while cell.len() < target {
            let index = cell.len();
            cell.push(self.op.apply(l.get(index), r.get(index)));
        }
        state.finish(self.id, cell);
    }
}

// ----------------------------------------------------------------------------
// N-ary
// ----------------------------------------------------------------------------

/// Associative fold across a runtime-extensible list of identically
/// shaped operands, applied independently at every index.
#[derive(Debug)]
pub struct NaryOpNode {
    id: NodeId,
    op: BinaryOp,
    pub(crate) operands: SmallVec<[NodeId; 4]>,
    shape: Shape,
    pub(crate) bounds: Bounds,
}

impl NaryOpNode {
    fn eval(&self, state: &State, index: usize) -> f64 {
        self.operands
            .iter()
            .map(|&o| state.cell(o).get(index))
            .reduce(|a, b| self.op.apply(a, b))
            .expect("n-ary node has at least one operand")
    }
}

impl NodeOps for NaryOpNode {
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
        let len = state.len(self.operands[0]);
        let buf = (0..len).map(|i| self.eval(state, i)).collect();
        state.install(self.id, crate::array::Cell::new(buf));
    }

    fn propagate(&self, state: &mut State) {
        let diffs: SmallVec<[crate::array::Diff; 4]> =
            self.operands.iter().map(|&o| state.diff(o)).collect();
        if diffs.iter().all(|d| d.is_empty()) && !state.cell(self.id).is_touched() {
            return;
        }
        let mut cell = state.begin(self.id);
        let target = state.len(self.operands[0]);
        debug_assert!(
            self.operands.iter().all(|&o| state.len(o) == target),
            "n-ary operand lengths diverged"
        );

        let diff_slices: SmallVec<[&[Update]; 4]> = diffs.iter().map(|d| d.as_slice()).collect();
        for index in stale_indices(&cell, &diff_slices) {
            if index < cell.len().min(target) {
                cell.set(index, self.eval(state, index));
            }
        }
        while cell.len() > target {
            cell.pop();
        }
        while cell.len() < target {
            let index = cell.len();
            cell.push(self.eval(state, index));
        }
        state.finish(self.id, cell);
    }

    fn as_nary(&self) -> Option<&NaryOpNode> {
        Some(self)
    }

    fn as_nary_mut(&mut self) -> Option<&mut NaryOpNode> {
        Some(self)
    }
}

// ----------------------------------------------------------------------------
// Constructors
// ----------------------------------------------------------------------------

impl Graph {
    /// Apply an elementwise unary operator to an array node.
    pub fn unary(&mut self, op: UnaryOp, operand: NodeId) -> Result<NodeId, ModelError> {
        let a = self.array_of(operand, "unary operand")?;
        let shape = a.shape().clone();
        let bounds = op.derive(a.bounds());
        let id = self.next_id();
        self.add_entry(
            Box::new(UnaryOpNode { id, op, operand, shape, bounds }),
            smallvec![operand],
        );
        Ok(id)
    }

    /// Combine two identically shaped array nodes elementwise.
    pub fn binary_op(
        &mut self,
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    ) -> Result<NodeId, ModelError> {
        let l = self.array_of(lhs, "left operand")?;
        let r = self.array_of(rhs, "right operand")?;
        if l.shape() != r.shape() {
            return Err(ModelError::invalid(format!(
                "operand shapes differ: {:?} vs {:?}",
                l.shape().extents(),
                r.shape().extents()
            )));
        }
        let shape = l.shape().clone();
        let bounds = op.derive(l.bounds(), r.bounds());
        let id = self.next_id();
        self.add_entry(
            Box::new(BinaryOpNode { id, op, lhs, rhs, shape, bounds }),
            smallvec![lhs, rhs],
        );
        Ok(id)
    }

    /// Fold an associative operator across one or more identically shaped
    /// array nodes, elementwise. Operands can be appended later with
    /// [`Graph::nary_push`].
    pub fn nary(&mut self, op: BinaryOp, operands: &[NodeId]) -> Result<NodeId, ModelError> {
        if !op.associative() {
            return Err(ModelError::invalid(format!(
                "{} cannot be used as an n-ary operator",
                op.label()
            )));
        }
        let first = match operands.first() {
            Some(&first) => first,
            None => return Err(ModelError::invalid("n-ary node needs at least one operand")),
        };
        let shape = self.array_of(first, "n-ary operand")?.shape().clone();
        let mut bounds = self.array_of(first, "n-ary operand")?.bounds();
        for &operand in &operands[1..] {
            let a = self.array_of(operand, "n-ary operand")?;
            if a.shape() != &shape {
                return Err(ModelError::invalid("n-ary operand shapes differ"));
            }
            bounds = op.derive(bounds, a.bounds());
        }
        let id = self.next_id();
        self.add_entry(
            Box::new(NaryOpNode {
                id,
                op,
                operands: SmallVec::from_slice(operands),
                shape,
                bounds,
            }),
            operands.iter().copied().collect(),
        );
        Ok(id)
    }

    /// Append an operand to an existing n-ary node.
    ///
    /// Part of the construction phase: states initialized before the push
    /// do not include the new operand's contribution and must be rebuilt.
    /// The new edge is checked for cycles, and ranks are recomputed if it
    /// points backwards in index order.
    pub fn nary_push(&mut self, nary: NodeId, operand: NodeId) -> Result<(), ModelError> {
        let (op_shape, op_bounds) = {
            let a = self.array_of(operand, "n-ary operand")?;
            (a.shape().clone(), a.bounds())
        };
        let (op, bounds, shape) = {
            let entry = self
                .entries
                .get(nary.0)
                .ok_or_else(|| ModelError::invalid("nary_push target is not in this graph"))?;
            let node = entry
                .node
                .as_nary()
                .ok_or_else(|| ModelError::invalid("nary_push target is not an n-ary node"))?;
            (node.op, node.bounds, node.shape.clone())
        };
        if op_shape != shape {
            return Err(ModelError::invalid("n-ary operand shapes differ"));
        }
        if self.reaches(nary, operand) {
            return Err(ModelError::invalid("appending this operand would create a cycle"));
        }

        let combined = op.derive(bounds, op_bounds);
        let node = self.entries[nary.0]
            .node
            .as_nary_mut()
            .expect("checked to be an n-ary node above");
        node.operands.push(operand);
        node.bounds = combined;
        self.entries[nary.0].preds.push(operand);
        self.entries[operand.0].succs.push(nary);
        if self.ranks[operand.0] >= self.ranks[nary.0] {
            self.recompute_ranks();
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
