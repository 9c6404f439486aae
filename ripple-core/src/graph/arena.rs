//! Node arena and graph structure.
//!
//! The graph owns every node in an append-only arena. A [`NodeId`] is a
//! stable index into that arena; edges are stored as indices, never as
//! owning references, so the arena alone owns node storage and tears it
//! down as a unit.
//!
//! # Topological ranks
//!
//! Because predecessors must exist before a node that reads them can be
//! constructed, the arena index itself is a valid topological rank at
//! construction time. The one exception is appending an operand to an
//! n-ary node after the fact, which can point a new edge "backwards" in
//! index order; when that happens the ranks are recomputed with Kahn's
//! algorithm over the whole arena. Either way the invariant holds: for
//! every edge (u, v), `rank(u) < rank(v)`.

use std::collections::VecDeque;

use smallvec::SmallVec;
use tracing::debug;

use crate::array::{Bounds, Shape};
use crate::nodes::NaryOpNode;
use crate::state::State;

/// Stable identifier of a node: an index into the graph's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// The raw arena index.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// The behavior every node contributes to the engine.
///
/// Nodes declare their static facts (shape, bounds) and their recompute
/// rules; all mutable evaluation state lives in the [`State`] passed in.
pub trait NodeOps: Send + Sync + std::fmt::Debug + 'static {
    /// Short label for logs and debugging.
    fn kind(&self) -> &'static str;

    /// Declared shape of the output buffer.
    fn shape(&self) -> &Shape;

    /// Declared numeric range and integrality of the output.
    fn bounds(&self) -> Bounds;

    /// Whether this node produces an array readable by other nodes.
    /// Partition parents hold bookkeeping only and return false.
    fn is_array(&self) -> bool {
        true
    }

    /// Compute the node's buffer from scratch and install it in `state`.
    /// Predecessor cells are already installed (rank order).
    fn initialize(&self, state: &mut State);

    /// Fold predecessor diffs into this node's buffer and diff.
    /// Predecessors have already been propagated this round.
    fn propagate(&self, state: &mut State);

    fn as_nary(&self) -> Option<&NaryOpNode> {
        None
    }

    fn as_nary_mut(&mut self) -> Option<&mut NaryOpNode> {
        None
    }
}

pub(crate) struct NodeEntry {
    pub(crate) node: Box<dyn NodeOps>,
    pub(crate) preds: SmallVec<[NodeId; 2]>,
    pub(crate) succs: Vec<NodeId>,
}

/// The model graph: an append-only arena of nodes plus their edges and
/// topological ranks. Immutable once construction is finished; any number
/// of [`State`]s can then evaluate it concurrently.
pub struct Graph {
    pub(crate) entries: Vec<NodeEntry>,
    pub(crate) ranks: Vec<u32>,
}

impl Graph {
    pub fn new() -> Self {
        Self { entries: Vec::new(), ranks: Vec::new() }
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Declared shape of a node's output.
    pub fn shape(&self, id: NodeId) -> &Shape {
        self.entries[id.0].node.shape()
    }

    /// Declared bounds of a node's output.
    pub fn bounds(&self, id: NodeId) -> Bounds {
        self.entries[id.0].node.bounds()
    }

    /// Topological rank; strictly increasing along every edge.
    pub fn rank(&self, id: NodeId) -> u32 {
        self.ranks[id.0]
    }

    /// All node ids in the arena, in construction order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.entries.len()).map(NodeId)
    }

    pub fn predecessors(&self, id: NodeId) -> &[NodeId] {
        &self.entries[id.0].preds
    }

    pub fn successors(&self, id: NodeId) -> &[NodeId] {
        &self.entries[id.0].succs
    }

    /// The id the next added node will receive.
    pub(crate) fn next_id(&self) -> NodeId {
        NodeId(self.entries.len())
    }

    /// Resolve a predecessor that must carry the array capability.
    /// `role` names the argument in the error message.
    pub(crate) fn array_of(
        &self,
        id: NodeId,
        role: &str,
    ) -> Result<&dyn NodeOps, crate::error::ModelError> {
        let entry = self.entries.get(id.0).ok_or_else(|| {
            crate::error::ModelError::invalid(format!("{role} is not a node in this graph"))
        })?;
        if !entry.node.is_array() {
            return Err(crate::error::ModelError::invalid(format!(
                "{role} must be an array-producing node"
            )));
        }
        Ok(entry.node.as_ref())
    }

    /// Install a node and wire its edges. Predecessors must already exist;
    /// constructors validate everything else before calling this.
    pub(crate) fn add_entry(
        &mut self,
        node: Box<dyn NodeOps>,
        preds: SmallVec<[NodeId; 2]>,
    ) -> NodeId {
        let id = self.next_id();
        debug_assert!(preds.iter().all(|p| p.0 < id.0), "predecessor added after successor");
        for &pred in &preds {
            self.entries[pred.0].succs.push(id);
        }
        debug!(id = id.0, kind = node.kind(), preds = preds.len(), "add node");
        self.entries.push(NodeEntry { node, preds, succs: Vec::new() });
        self.ranks.push(id.0 as u32);
        id
    }

    /// Whether `target` is reachable from `from` along successor edges.
    pub(crate) fn reaches(&self, from: NodeId, target: NodeId) -> bool {
        if from == target {
            return true;
        }
        let mut visited = vec![false; self.entries.len()];
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            for &succ in &self.entries[id.0].succs {
                if succ == target {
                    return true;
                }
                if !visited[succ.0] {
                    visited[succ.0] = true;
                    stack.push(succ);
                }
            }
        }
        false
    }

    /// Reassign all ranks with Kahn's algorithm. Called when a late edge
    /// (n-ary operand append) breaks the index-order invariant.
    pub(crate) fn recompute_ranks(&mut self) {
        let mut in_degree: Vec<usize> = self.entries.iter().map(|e| e.preds.len()).collect();
        let mut queue: VecDeque<usize> =
            (0..self.entries.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut next_rank = 0u32;

        while let Some(i) = queue.pop_front() {
            self.ranks[i] = next_rank;
            next_rank += 1;
            for &succ in &self.entries[i].succs {
                in_degree[succ.0] -= 1;
                if in_degree[succ.0] == 0 {
                    queue.push_back(succ.0);
                }
            }
        }

        debug_assert_eq!(
            next_rank as usize,
            self.entries.len(),
            "graph contains a cycle"
        );
    }

    /// Node ids sorted by rank, dependencies first.
    pub(crate) fn rank_order(&self) -> Vec<NodeId> {
        let mut order: Vec<NodeId> = (0..self.entries.len()).map(NodeId).collect();
        order.sort_by_key(|id| self.ranks[id.0]);
        order
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph").field("nodes", &self.entries.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::BinaryOp;

    #[test]
    fn ids_are_dense_and_stable() {
        let mut graph = Graph::new();
        let a = graph.binary(3);
        let b = graph.binary(3);
        assert_eq!(a.node().index(), 0);
        assert_eq!(b.node().index(), 1);
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn edges_are_wired_both_ways() {
        let mut graph = Graph::new();
        let a = graph.binary(2);
        let b = graph.binary(2);
        let sum = graph.binary_op(BinaryOp::Add, a.node(), b.node()).unwrap();

        assert_eq!(graph.predecessors(sum), &[a.node(), b.node()]);
        assert_eq!(graph.successors(a.node()), &[sum]);
        assert_eq!(graph.successors(b.node()), &[sum]);
    }

    #[test]
    fn ranks_increase_along_edges() {
        let mut graph = Graph::new();
        let a = graph.binary(2);
        let neg = graph.unary(crate::nodes::UnaryOp::Negative, a.node()).unwrap();
        let total = graph.reduce(crate::nodes::ReduceOp::Sum, neg, None).unwrap();

        assert!(graph.rank(a.node()) < graph.rank(neg));
        assert!(graph.rank(neg) < graph.rank(total));
    }

    #[test]
    fn reachability_follows_successor_edges() {
        let mut graph = Graph::new();
        let a = graph.binary(2);
        let neg = graph.unary(crate::nodes::UnaryOp::Negative, a.node()).unwrap();

        assert!(graph.reaches(a.node(), neg));
        assert!(!graph.reaches(neg, a.node()));
        assert!(graph.reaches(neg, neg));
    }
}
