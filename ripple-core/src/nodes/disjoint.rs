//! Disjoint partition variables.
//!
//! Both families partition one shared domain `0..n` across `k` sibling
//! output arrays. The partition itself lives in a parent node (element to
//! sibling index); the siblings are array nodes wired as its successors
//! and are what the rest of the model reads:
//!
//! - [`DisjointBitSetsVar`]: each sibling is a fixed-length 0/1 mask over
//!   the domain.
//! - [`DisjointListsVar`]: each sibling is an ordered, dynamic-length
//!   list of its members.
//!
//! Every mutation lives on the parent handle and updates the parent map
//! and all affected sibling cells in one call, so their buffers and diffs
//! can never disagree within a round. The mutated siblings are queued as
//! propagation sources; the parent is only touched (nothing downstream
//! reads it directly).

use smallvec::{smallvec, SmallVec};

use crate::array::{Bounds, Shape};
use crate::error::ModelError;
use crate::graph::{Graph, NodeId};
use crate::state::State;

use super::decision::SourceKind;

// ----------------------------------------------------------------------------
// Bit-set partitions
// ----------------------------------------------------------------------------

/// Mutation handle for a partition of `0..n` into `k` bit-set siblings.
#[derive(Debug, Clone)]
pub struct DisjointBitSetsVar {
    parent: NodeId,
    sets: SmallVec<[NodeId; 4]>,
    n: usize,
}

impl DisjointBitSetsVar {
    /// The sibling mask nodes, one per partition class.
    pub fn sets(&self) -> &[NodeId] {
        &self.sets
    }

    pub fn set_node(&self, index: usize) -> NodeId {
        self.sets[index]
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// Which partition class currently holds `element`.
    pub fn class_of(&self, state: &State, element: usize) -> usize {
        state.buff(self.parent)[element] as usize
    }

    /// Move an element from one class to another, updating both sibling
    /// masks and their diffs in the same call.
    pub fn move_element(
        &self,
        state: &mut State,
        element: usize,
        from: usize,
        to: usize,
    ) -> Result<(), ModelError> {
        if element >= self.n {
            return Err(ModelError::domain(format!(
                "element {element} outside domain 0..{}",
                self.n
            )));
        }
        if from >= self.sets.len() || to >= self.sets.len() {
            return Err(ModelError::domain(format!(
                "partition class out of range ({from} -> {to}, {} classes)",
                self.sets.len()
            )));
        }
        if self.class_of(state, element) != from {
            return Err(ModelError::domain(format!(
                "element {element} is not in class {from}"
            )));
        }
        if from == to {
            return Ok(());
        }

        state.cell_mut(self.parent).set(element, to as f64);
        state.touch(self.parent);
        state.cell_mut(self.sets[from]).set(element, 0.0);
        state.queue_source(self.sets[from]);
        state.cell_mut(self.sets[to]).set(element, 1.0);
        state.queue_source(self.sets[to]);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// List partitions
// ----------------------------------------------------------------------------

/// Mutation handle for a partition of `0..n` into `k` ordered lists.
#[derive(Debug, Clone)]
pub struct DisjointListsVar {
    parent: NodeId,
    lists: SmallVec<[NodeId; 4]>,
    n: usize,
}

impl DisjointListsVar {
    /// The sibling list nodes, one per partition class.
    pub fn lists(&self) -> &[NodeId] {
        &self.lists
    }

    pub fn list_node(&self, index: usize) -> NodeId {
        self.lists[index]
    }

    pub fn n(&self) -> usize {
        self.n
    }

    fn check_position(
        &self,
        state: &State,
        list: usize,
        index: usize,
    ) -> Result<(), ModelError> {
        if list >= self.lists.len() {
            return Err(ModelError::domain(format!(
                "list {list} out of range ({} lists)",
                self.lists.len()
            )));
        }
        let len = state.len(self.lists[list]);
        if index >= len {
            return Err(ModelError::domain(format!(
                "position {index} out of range for list {list} of length {len}"
            )));
        }
        Ok(())
    }

    /// Exchange the elements at two positions, possibly across lists.
    /// O(1) diffs; the element order inside each list is otherwise kept.
    pub fn swap(
        &self,
        state: &mut State,
        a_list: usize,
        a_index: usize,
        b_list: usize,
        b_index: usize,
    ) -> Result<(), ModelError> {
        self.check_position(state, a_list, a_index)?;
        self.check_position(state, b_list, b_index)?;
        if a_list == b_list && a_index == b_index {
            return Ok(());
        }
        let ea = state.buff(self.lists[a_list])[a_index];
        let eb = state.buff(self.lists[b_list])[b_index];

        state.cell_mut(self.lists[a_list]).set(a_index, eb);
        state.cell_mut(self.lists[b_list]).set(b_index, ea);
        state.queue_source(self.lists[a_list]);
        state.queue_source(self.lists[b_list]);
        if a_list != b_list {
            let parent = state.cell_mut(self.parent);
            parent.set(ea as usize, b_list as f64);
            parent.set(eb as usize, a_list as f64);
            state.touch(self.parent);
        }
        Ok(())
    }

    /// Remove the element at one position and append it to the back of
    /// another list, preserving the source list's order (tail elements
    /// shift left, so the diff grows with the tail length).
    pub fn relocate(
        &self,
        state: &mut State,
        from_list: usize,
        from_index: usize,
        to_list: usize,
    ) -> Result<(), ModelError> {
        self.check_position(state, from_list, from_index)?;
        if to_list >= self.lists.len() {
            return Err(ModelError::domain(format!(
                "list {to_list} out of range ({} lists)",
                self.lists.len()
            )));
        }
        let element = state.buff(self.lists[from_list])[from_index];
        let len = state.len(self.lists[from_list]);

        let source = state.cell_mut(self.lists[from_list]);
        for i in from_index..len - 1 {
            let next = source.get(i + 1);
            source.set(i, next);
        }
        source.pop();
        state.queue_source(self.lists[from_list]);

        state.cell_mut(self.lists[to_list]).push(element);
        state.queue_source(self.lists[to_list]);
        if from_list != to_list {
            state.cell_mut(self.parent).set(element as usize, to_list as f64);
            state.touch(self.parent);
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Constructors
// ----------------------------------------------------------------------------

impl Graph {
    /// Partition `0..n` into `k` bit-set siblings. Every element starts
    /// in class 0.
    pub fn disjoint_bit_sets(
        &mut self,
        n: usize,
        k: usize,
    ) -> Result<DisjointBitSetsVar, ModelError> {
        let parent = self.partition_parent(n, k)?;
        let sets = (0..k)
            .map(|index| {
                self.add_source(
                    SourceKind::BitSetMember { parent, index },
                    Shape::vector(n),
                    Bounds::logical(),
                    smallvec![parent],
                )
            })
            .collect();
        Ok(DisjointBitSetsVar { parent, sets, n })
    }

    /// Partition `0..n` into `k` ordered list siblings. Every element
    /// starts in list 0, in ascending order.
    pub fn disjoint_lists(
        &mut self,
        n: usize,
        k: usize,
    ) -> Result<DisjointListsVar, ModelError> {
        let parent = self.partition_parent(n, k)?;
        let max = n.saturating_sub(1) as f64;
        let lists = (0..k)
            .map(|index| {
                self.add_source(
                    SourceKind::ListMember { parent, index },
                    Shape::dynamic_vector(n),
                    Bounds::new(0.0, max, true),
                    smallvec![parent],
                )
            })
            .collect();
        Ok(DisjointListsVar { parent, lists, n })
    }

    fn partition_parent(&mut self, n: usize, k: usize) -> Result<NodeId, ModelError> {
        if k == 0 {
            return Err(ModelError::invalid("a partition needs at least one class"));
        }
        let max = k.saturating_sub(1) as f64;
        Ok(self.add_source(
            SourceKind::PartitionMap,
            Shape::vector(n),
            Bounds::new(0.0, max, true),
            Default::default(),
        ))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
