//! Decision variables and constants: the graph's source nodes.
//!
//! Source nodes have no predecessors. Decision variables are the only
//! nodes a caller may mutate directly; every mutation goes through a
//! typed handle returned by the constructor, is validated against the
//! variable's domain before anything is written (a rejected mutation
//! leaves the state untouched), and queues the node for the next
//! propagation. Constants are sources too, just ones nobody can move.
//!
//! Handles are small copyable tokens: they carry the node id plus the
//! domain facts needed to validate mutations, while all values live in
//! the evaluation state.

use smallvec::{smallvec, SmallVec};

use crate::array::{Bounds, Cell, Shape};
use crate::error::ModelError;
use crate::graph::{Graph, NodeId, NodeOps};
use crate::state::State;

/// What a source node holds and how its state cell is seeded.
#[derive(Debug)]
pub(crate) enum SourceKind {
    /// Integer array variable over `[lower, upper]`.
    Integer { lower: f64, upper: f64 },
    /// 0/1 array variable.
    Binary,
    /// Permutation of `0..n`.
    Permutation,
    /// Subset of `0..n`, dynamic length, with membership flags.
    Subset,
    /// Partition bookkeeping: element -> sibling index. Not an array
    /// output; read only by its sibling nodes and the mutation handles.
    PartitionMap,
    /// 0/1 mask of one partition class, derived from the parent map.
    BitSetMember { parent: NodeId, index: usize },
    /// Ordered members of one partition class, derived from the parent map.
    ListMember { parent: NodeId, index: usize },
    /// Fixed values.
    Constant { values: Vec<f64> },
}

#[derive(Debug)]
pub(crate) struct SourceNode {
    pub(crate) id: NodeId,
    pub(crate) kind: SourceKind,
    shape: Shape,
    bounds: Bounds,
}

impl SourceNode {
    pub(crate) fn new(id: NodeId, kind: SourceKind, shape: Shape, bounds: Bounds) -> Self {
        Self { id, kind, shape, bounds }
    }
}

impl NodeOps for SourceNode {
    fn kind(&self) -> &'static str {
        match self.kind {
            SourceKind::Integer { .. } => "integer",
            SourceKind::Binary => "binary",
            SourceKind::Permutation => "list",
            SourceKind::Subset => "set",
            SourceKind::PartitionMap => "partition",
            SourceKind::BitSetMember { .. } => "disjoint_bit_set",
            SourceKind::ListMember { .. } => "disjoint_list",
            SourceKind::Constant { .. } => "constant",
        }
    }

    fn shape(&self) -> &Shape {
        &self.shape
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn is_array(&self) -> bool {
        !matches!(self.kind, SourceKind::PartitionMap)
    }

    fn initialize(&self, state: &mut State) {
        let n = self.shape.size();
        let cell = match &self.kind {
            SourceKind::Integer { lower, upper } => {
                Cell::new(vec![0f64.clamp(*lower, *upper); n])
            }
            SourceKind::Binary => Cell::new(vec![0.0; n]),
            SourceKind::Permutation => Cell::new((0..n).map(|v| v as f64).collect()),
            SourceKind::Subset => Cell::with_membership(Vec::new(), n),
            // Default partition: every element in sibling 0.
            SourceKind::PartitionMap => Cell::new(vec![0.0; n]),
            SourceKind::BitSetMember { parent, index } => {
                let mask = state
                    .buff(*parent)
                    .iter()
                    .map(|&s| (s as usize == *index) as u8 as f64)
                    .collect();
                Cell::new(mask)
            }
            SourceKind::ListMember { parent, index } => {
                let members = state
                    .buff(*parent)
                    .iter()
                    .enumerate()
                    .filter(|(_, &s)| s as usize == *index)
                    .map(|(e, _)| e as f64)
                    .collect();
                Cell::new(members)
            }
            SourceKind::Constant { values } => Cell::new(values.clone()),
        };
        state.install(self.id, cell);
    }

    /// Sources have nothing to derive: their buffers are written directly
    /// by the mutation that queued them (for partition siblings, by the
    /// parent handle's mutation in the same call).
    fn propagate(&self, _state: &mut State) {}
}

// ----------------------------------------------------------------------------
// Integer variables
// ----------------------------------------------------------------------------

/// Mutation handle for an integer array variable.
#[derive(Debug, Clone, Copy)]
pub struct IntegerVar {
    id: NodeId,
    len: usize,
    lower: f64,
    upper: f64,
}

impl IntegerVar {
    /// The underlying graph node, for wiring operators.
    pub fn node(&self) -> NodeId {
        self.id
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    fn check(&self, index: usize, value: f64) -> Result<(), ModelError> {
        if index >= self.len {
            return Err(ModelError::domain(format!(
                "index {index} out of range for length {}",
                self.len
            )));
        }
        if value.fract() != 0.0 || value < self.lower || value > self.upper {
            return Err(ModelError::domain(format!(
                "value {value} outside integer domain [{}, {}]",
                self.lower, self.upper
            )));
        }
        Ok(())
    }

    /// Set one element. Fails without touching the state if the value is
    /// fractional or outside the declared domain.
    pub fn set(&self, state: &mut State, index: usize, value: f64) -> Result<(), ModelError> {
        self.check(index, value)?;
        if state.buff(self.id)[index] == value {
            return Ok(());
        }
        state.cell_mut(self.id).set(index, value);
        state.queue_source(self.id);
        Ok(())
    }

    /// Replace the whole assignment. Validated before anything is written.
    pub fn assign(&self, state: &mut State, values: &[f64]) -> Result<(), ModelError> {
        if values.len() != self.len {
            return Err(ModelError::domain(format!(
                "expected {} values, got {}",
                self.len,
                values.len()
            )));
        }
        for (index, &value) in values.iter().enumerate() {
            self.check(index, value)?;
        }
        let mut changed = false;
        for (index, &value) in values.iter().enumerate() {
            if state.buff(self.id)[index] != value {
                state.cell_mut(self.id).set(index, value);
                changed = true;
            }
        }
        if changed {
            state.queue_source(self.id);
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Binary variables
// ----------------------------------------------------------------------------

/// Mutation handle for a 0/1 array variable.
#[derive(Debug, Clone, Copy)]
pub struct BinaryVar {
    id: NodeId,
    len: usize,
}

impl BinaryVar {
    pub fn node(&self) -> NodeId {
        self.id
    }

    pub fn set(&self, state: &mut State, index: usize, value: f64) -> Result<(), ModelError> {
        if index >= self.len {
            return Err(ModelError::domain(format!(
                "index {index} out of range for length {}",
                self.len
            )));
        }
        if value != 0.0 && value != 1.0 {
            return Err(ModelError::domain(format!("binary value must be 0 or 1, got {value}")));
        }
        if state.buff(self.id)[index] == value {
            return Ok(());
        }
        state.cell_mut(self.id).set(index, value);
        state.queue_source(self.id);
        Ok(())
    }

    /// Toggle one element.
    pub fn flip(&self, state: &mut State, index: usize) -> Result<(), ModelError> {
        if index >= self.len {
            return Err(ModelError::domain(format!(
                "index {index} out of range for length {}",
                self.len
            )));
        }
        let value = 1.0 - state.buff(self.id)[index];
        state.cell_mut(self.id).set(index, value);
        state.queue_source(self.id);
        Ok(())
    }

    pub fn assign(&self, state: &mut State, values: &[f64]) -> Result<(), ModelError> {
        if values.len() != self.len {
            return Err(ModelError::domain(format!(
                "expected {} values, got {}",
                self.len,
                values.len()
            )));
        }
        if let Some(&bad) = values.iter().find(|&&v| v != 0.0 && v != 1.0) {
            return Err(ModelError::domain(format!("binary value must be 0 or 1, got {bad}")));
        }
        let mut changed = false;
        for (index, &value) in values.iter().enumerate() {
            if state.buff(self.id)[index] != value {
                state.cell_mut(self.id).set(index, value);
                changed = true;
            }
        }
        if changed {
            state.queue_source(self.id);
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Constructors
// ----------------------------------------------------------------------------

impl Graph {
    /// An integer array variable over `[lower, upper]`, seeded with the
    /// in-domain value closest to zero.
    pub fn integer(
        &mut self,
        len: usize,
        lower: f64,
        upper: f64,
    ) -> Result<IntegerVar, ModelError> {
        if lower.fract() != 0.0 || upper.fract() != 0.0 {
            return Err(ModelError::invalid("integer bounds must be whole numbers"));
        }
        if lower > upper {
            return Err(ModelError::invalid(format!("empty integer domain [{lower}, {upper}]")));
        }
        let id = self.next_id();
        self.add_entry(
            Box::new(SourceNode::new(
                id,
                SourceKind::Integer { lower, upper },
                Shape::vector(len),
                Bounds::new(lower, upper, true),
            )),
            smallvec![],
        );
        Ok(IntegerVar { id, len, lower, upper })
    }

    /// A 0/1 array variable, seeded with zeros.
    pub fn binary(&mut self, len: usize) -> BinaryVar {
        let id = self.next_id();
        self.add_entry(
            Box::new(SourceNode::new(
                id,
                SourceKind::Binary,
                Shape::vector(len),
                Bounds::logical(),
            )),
            smallvec![],
        );
        BinaryVar { id, len }
    }

    /// A fixed vector of values.
    pub fn constant(&mut self, values: &[f64]) -> Result<NodeId, ModelError> {
        self.constant_with_shape(values, Shape::vector(values.len()))
    }

    /// A fixed array with an explicit (multi-axis) shape.
    pub fn constant_with_shape(
        &mut self,
        values: &[f64],
        shape: Shape,
    ) -> Result<NodeId, ModelError> {
        if values.is_empty() {
            return Err(ModelError::invalid("constant needs at least one value"));
        }
        if shape.is_dynamic() || shape.size() != values.len() {
            return Err(ModelError::invalid(format!(
                "constant shape {:?} does not hold {} values",
                shape.extents(),
                values.len()
            )));
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let integral = values.iter().all(|v| v.fract() == 0.0);
        let id = self.next_id();
        self.add_entry(
            Box::new(SourceNode::new(
                id,
                SourceKind::Constant { values: values.to_vec() },
                shape,
                Bounds::new(min, max, integral),
            )),
            smallvec![],
        );
        Ok(id)
    }

    pub(crate) fn add_source(
        &mut self,
        kind: SourceKind,
        shape: Shape,
        bounds: Bounds,
        preds: SmallVec<[NodeId; 2]>,
    ) -> NodeId {
        let id = self.next_id();
        self.add_entry(Box::new(SourceNode::new(id, kind, shape, bounds)), preds);
        id
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
