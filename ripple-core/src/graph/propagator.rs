//! Propagation Driver
//!
//! After a caller mutates one or more decision variables, the driver pushes
//! the change through the graph:
//!
//! 1. Drain the queued source nodes from the state.
//! 2. Collect every node reachable from them along successor edges (BFS,
//!    the affected downstream subgraph; untouched regions are never
//!    visited).
//! 3. Sort the affected nodes by topological rank and invoke `propagate`
//!    on each, so a node always runs after all of its predecessors.
//!
//! Every visited node is recorded in the state's touched set, which is
//! exactly the set `commit` and `revert` later walk. That keeps the whole
//! trial transactional at O(diff) cost.

use std::collections::VecDeque;

use tracing::{debug, trace};

use super::arena::{Graph, NodeId};
use crate::state::State;

impl Graph {
    /// Build a fresh evaluation state: seed every decision variable with
    /// its default value and compute every derived buffer from scratch in
    /// rank order. The returned state has no pending diffs.
    pub fn initialize_state(&self) -> State {
        let mut state = State::new(self.entries.len());
        for id in self.rank_order() {
            self.entries[id.0].node.initialize(&mut state);
        }
        debug!(nodes = self.entries.len(), "initialized state");
        state
    }

    /// Push pending source mutations through the affected subgraph.
    ///
    /// May be called several times between one commit/revert pair; diffs
    /// stay relative to the last commit throughout.
    pub fn propagate(&self, state: &mut State) {
        let sources = state.drain_queued();
        if sources.is_empty() {
            return;
        }
        let affected = self.affected(&sources);
        trace!(sources = sources.len(), affected = affected.len(), "propagate");
        for &id in &affected {
            state.touch(id);
            self.entries[id.0].node.propagate(state);
        }
    }

    /// Nodes downstream of `sources`, sorted by topological rank. The
    /// sources themselves are excluded; their buffers were written by the
    /// mutation that queued them.
    fn affected(&self, sources: &[NodeId]) -> Vec<NodeId> {
        let mut visited = vec![false; self.entries.len()];
        let mut queue = VecDeque::new();
        for &source in sources {
            visited[source.0] = true;
        }
        for &source in sources {
            for &succ in &self.entries[source.0].succs {
                if !visited[succ.0] {
                    visited[succ.0] = true;
                    queue.push_back(succ);
                }
            }
        }

        let mut affected = Vec::new();
        while let Some(id) = queue.pop_front() {
            affected.push(id);
            for &succ in &self.entries[id.0].succs {
                if !visited[succ.0] {
                    visited[succ.0] = true;
                    queue.push_back(succ);
                }
            }
        }

        affected.sort_by_key(|id| self.ranks[id.0]);
        affected
    }
}
