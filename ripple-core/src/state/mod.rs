//! Evaluation State
//!
//! A [`State`] is one candidate solution's view of the graph: a cell per
//! node (current buffer plus pending diff), the queue of decision variables
//! mutated since the last propagation, and the set of nodes touched since
//! the last commit.
//!
//! States are cheap to hold in parallel: the graph itself is immutable and
//! shared, while each state owns its buffers exclusively, so a solver can
//! run many trajectories over one model without any locking.
//!
//! # Trial lifecycle
//!
//! 1. Mutate decision variables through their handles; each mutation
//!    queues its node as a changed source.
//! 2. `Graph::propagate` pushes the change downstream and records every
//!    visited node here.
//! 3. Inspect objective/constraint buffers, then either [`State::commit`]
//!    (pending diffs become the new baseline) or [`State::revert`]
//!    (buffers roll back to the last commit). Both walk only the touched
//!    nodes, so a rejected move costs O(diff), not O(graph).

use indexmap::IndexSet;
use tracing::trace;

use crate::array::{Cell, Diff};
use crate::graph::NodeId;

/// Per-trial buffers and diffs for every node in one graph.
pub struct State {
    cells: Vec<Cell>,
    /// Decision variables mutated since the last `propagate`.
    queued: IndexSet<NodeId>,
    /// Nodes whose cells have pending bookkeeping since the last commit.
    touched: IndexSet<NodeId>,
}

impl State {
    pub(crate) fn new(nodes: usize) -> Self {
        Self {
            cells: vec![Cell::default(); nodes],
            queued: IndexSet::new(),
            touched: IndexSet::new(),
        }
    }

    /// Current buffer of a node, row-major. The slice is valid until the
    /// next mutation or propagation over this state.
    pub fn buff(&self, id: NodeId) -> &[f64] {
        self.cells[id.0].buff()
    }

    /// Current number of elements in a node's buffer. Differs from the
    /// declared shape capacity only for dynamic arrays.
    pub fn len(&self, id: NodeId) -> usize {
        self.cells[id.0].len()
    }

    /// Convenience accessor for scalar-output nodes such as reductions.
    pub fn scalar(&self, id: NodeId) -> f64 {
        debug_assert_eq!(self.cells[id.0].len(), 1, "scalar() on a non-scalar node");
        self.cells[id.0].get(0)
    }

    /// The node's coalesced pending updates relative to the last commit.
    pub fn diff(&self, id: NodeId) -> Diff {
        self.cells[id.0].diff()
    }

    pub(crate) fn cell(&self, id: NodeId) -> &Cell {
        &self.cells[id.0]
    }

    pub(crate) fn cell_mut(&mut self, id: NodeId) -> &mut Cell {
        &mut self.cells[id.0]
    }

    /// Install a node's freshly computed cell during state initialization.
    pub(crate) fn install(&mut self, id: NodeId, cell: Cell) {
        self.cells[id.0] = cell;
    }

    /// Take a node's cell out for mutation while its predecessors stay
    /// readable. Must be paired with [`State::finish`].
    pub(crate) fn begin(&mut self, id: NodeId) -> Cell {
        std::mem::take(&mut self.cells[id.0])
    }

    pub(crate) fn finish(&mut self, id: NodeId, cell: Cell) {
        self.cells[id.0] = cell;
    }

    /// Record that a node's cell has pending bookkeeping.
    pub(crate) fn touch(&mut self, id: NodeId) {
        self.touched.insert(id);
    }

    /// Record a direct mutation of a decision variable: the node is both
    /// touched and queued as a propagation source.
    pub(crate) fn queue_source(&mut self, id: NodeId) {
        self.touched.insert(id);
        self.queued.insert(id);
    }

    pub(crate) fn drain_queued(&mut self) -> Vec<NodeId> {
        self.queued.drain(..).collect()
    }

    /// Whether any mutation is waiting for a `propagate` call.
    pub fn has_queued(&self) -> bool {
        !self.queued.is_empty()
    }

    /// Make every pending diff the new baseline.
    ///
    /// Calling this twice in a row is a no-op the second time: buffers are
    /// unchanged and all diffs are already empty.
    pub fn commit(&mut self) {
        debug_assert!(
            self.queued.is_empty(),
            "commit with mutations that were never propagated"
        );
        let touched: Vec<NodeId> = self.touched.drain(..).collect();
        trace!(nodes = touched.len(), "commit");
        for id in touched {
            self.cells[id.0].commit();
        }
    }

    /// Discard every pending diff, restoring the last committed buffers.
    /// Un-propagated mutations are discarded along with everything else.
    pub fn revert(&mut self) {
        self.queued.clear();
        let touched: Vec<NodeId> = self.touched.drain(..).collect();
        trace!(nodes = touched.len(), "revert");
        for id in touched {
            self.cells[id.0].revert();
        }
    }
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("nodes", &self.cells.len())
            .field("queued", &self.queued.len())
            .field("touched", &self.touched.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
