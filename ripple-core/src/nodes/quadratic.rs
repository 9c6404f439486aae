//! Quadratic bias payloads.
//!
//! A [`QuadraticModel`] is a sparse store of linear and pairwise biases
//! over the indices of one binary array. It is built up front with
//! explicit bias-set calls and becomes immutable once handed to
//! [`Graph::quadratic`]; it takes no part in the diff protocol.
//!
//! The node's output is the scalar energy
//! `sum(linear[i] * x[i]) + sum(quadratic[(u, v)] * x[u] * x[v])`.
//! Propagation walks the operand's updates in order against a shadow of
//! the values each flip saw, so several flips in one round accumulate
//! exactly the same energy as applying them one at a time.

use indexmap::IndexMap;
use smallvec::{smallvec, SmallVec};

use crate::array::{Bounds, Cell, Shape, Update};
use crate::error::ModelError;
use crate::graph::{Graph, NodeId, NodeOps};
use crate::state::State;

/// Sparse linear + pairwise bias store over `num_variables` indices.
#[derive(Debug, Clone)]
pub struct QuadraticModel {
    num_variables: usize,
    linear: Vec<f64>,
    /// Keyed by (low, high) index pairs, insertion-ordered.
    quadratic: IndexMap<(usize, usize), f64>,
}

impl QuadraticModel {
    pub fn new(num_variables: usize) -> Self {
        Self {
            num_variables,
            linear: vec![0.0; num_variables],
            quadratic: IndexMap::new(),
        }
    }

    pub fn num_variables(&self) -> usize {
        self.num_variables
    }

    /// Set the linear bias of one variable, replacing any previous value.
    pub fn set_linear(&mut self, i: usize, bias: f64) -> Result<(), ModelError> {
        if i >= self.num_variables {
            return Err(ModelError::invalid(format!(
                "variable {i} out of range for {} variables",
                self.num_variables
            )));
        }
        self.linear[i] = bias;
        Ok(())
    }

    /// Set the pairwise bias of two distinct variables, replacing any
    /// previous value for the pair.
    pub fn set_quadratic(&mut self, u: usize, v: usize, bias: f64) -> Result<(), ModelError> {
        if u >= self.num_variables || v >= self.num_variables {
            return Err(ModelError::invalid(format!(
                "variable pair ({u}, {v}) out of range for {} variables",
                self.num_variables
            )));
        }
        if u == v {
            return Err(ModelError::invalid("pairwise bias needs two distinct variables"));
        }
        let key = (u.min(v), u.max(v));
        self.quadratic.insert(key, bias);
        Ok(())
    }

    pub fn linear(&self, i: usize) -> f64 {
        self.linear[i]
    }

    pub fn quadratic(&self, u: usize, v: usize) -> f64 {
        let key = (u.min(v), u.max(v));
        self.quadratic.get(&key).copied().unwrap_or(0.0)
    }

    /// Full energy of an assignment.
    pub fn energy(&self, values: &[f64]) -> f64 {
        debug_assert_eq!(values.len(), self.num_variables);
        let mut total = 0.0;
        for (i, &bias) in self.linear.iter().enumerate() {
            total += bias * values[i];
        }
        for (&(u, v), &bias) in &self.quadratic {
            total += bias * values[u] * values[v];
        }
        total
    }
}

/// Scalar energy of a binary array under a fixed bias store.
#[derive(Debug)]
pub struct QuadraticModelNode {
    id: NodeId,
    operand: NodeId,
    model: QuadraticModel,
    /// Neighbor lists: for each variable, the (other, bias) pairs it
    /// shares a quadratic term with.
    adjacency: Vec<Vec<(usize, f64)>>,
    shape: Shape,
    bounds: Bounds,
}

impl NodeOps for QuadraticModelNode {
    fn kind(&self) -> &'static str {
        "quadratic_model"
    }

    fn shape(&self) -> &Shape {
        &self.shape
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn initialize(&self, state: &mut State) {
        let value = self.model.energy(state.buff(self.operand));
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

        // Indices whose flips have not been applied yet, with the value
        // each pending flip will read.
        let mut pending: SmallVec<[(usize, f64); 8]> = diff
            .iter()
            .map(|u| match *u {
                Update::Set { index, old, .. } => (index, old),
                _ => unreachable!("binary operands never change shape"),
            })
            .collect();

        let mut value = base;
        for update in &diff {
            let Update::Set { index, old, value: new } = *update else {
                unreachable!("binary operands never change shape");
            };
            let mut coeff = self.model.linear(index);
            for &(j, bias) in &self.adjacency[index] {
                let vj = pending
                    .iter()
                    .find(|&&(p, _)| p == j)
                    .map(|&(_, o)| o)
                    .unwrap_or_else(|| src.get(j));
                coeff += bias * vj;
            }
            value += (new - old) * coeff;
            pending.retain(|&mut (p, _)| p != index);
        }

        cell.set(0, value);
        state.finish(self.id, cell);
    }
}

impl Graph {
    /// The scalar energy of a binary-valued, fixed-shape array node under
    /// `model`. The model is consumed and frozen into the node.
    pub fn quadratic(
        &mut self,
        operand: NodeId,
        model: QuadraticModel,
    ) -> Result<NodeId, ModelError> {
        let a = self.array_of(operand, "quadratic operand")?;
        let b = a.bounds();
        if a.shape().is_dynamic() {
            return Err(ModelError::invalid("quadratic operand cannot change shape"));
        }
        if !b.integral || b.min < 0.0 || b.max > 1.0 {
            return Err(ModelError::invalid("quadratic operand must be binary-valued"));
        }
        if a.shape().size() != model.num_variables() {
            return Err(ModelError::invalid(format!(
                "model covers {} variables but the operand has {} elements",
                model.num_variables(),
                a.shape().size()
            )));
        }

        let mut adjacency = vec![Vec::new(); model.num_variables()];
        for (&(u, v), &bias) in &model.quadratic {
            adjacency[u].push((v, bias));
            adjacency[v].push((u, bias));
        }

        let mut min = 0.0;
        let mut max = 0.0;
        let mut integral = true;
        for bias in model.linear.iter().chain(model.quadratic.values()) {
            min += bias.min(0.0);
            max += bias.max(0.0);
            integral &= bias.fract() == 0.0;
        }

        let id = self.next_id();
        self.add_entry(
            Box::new(QuadraticModelNode {
                id,
                operand,
                model,
                adjacency,
                shape: Shape::scalar(),
                bounds: Bounds::new(min, max, integral),
            }),
            smallvec![operand],
        );
        Ok(id)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
