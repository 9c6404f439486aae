//! Per-node, per-state value storage with transactional diffs.
//!
//! A [`Cell`] holds one node's current buffer together with just enough
//! bookkeeping to reconstruct the last committed baseline: the committed
//! length, and the committed value of every index written since the last
//! commit. That bookkeeping is what makes the engine transactional at
//! O(diff) cost:
//!
//! - the diff is materialized on demand from the saved values, so it is
//!   coalesced by construction (one record per index, net-zero writes
//!   disappear);
//! - `commit` only clears the saved values;
//! - `revert` only rewrites the saved indices.
//!
//! Structural changes happen at the back of the buffer. `push` grows it by
//! one, `pop` shrinks it by one; interior removals are expressed by the
//! owner as a swap with the back element followed by a `pop`.
//!
//! Cells for set-valued decision variables additionally carry a membership
//! flag per domain value, kept in lockstep with the buffer so that
//! duplicate checks are O(1). The flags are rolled back from the diff on
//! revert rather than being separately journaled.

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::update::Update;

/// Materialized diffs are usually a handful of records.
pub type Diff = SmallVec<[Update; 4]>;

/// One node's buffer plus pending-change bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct Cell {
    buf: Vec<f64>,
    committed_len: usize,
    /// Committed value of every touched index below `committed_len`,
    /// keyed in first-touch order so diffs read deterministically.
    saved: IndexMap<usize, f64>,
    /// Membership flags for set-valued sources, indexed by domain value.
    membership: Option<Vec<bool>>,
}

impl Cell {
    /// A cell whose current contents are also its committed baseline.
    pub fn new(buf: Vec<f64>) -> Self {
        let committed_len = buf.len();
        Self { buf, committed_len, saved: IndexMap::new(), membership: None }
    }

    /// A cell with membership flags over the domain `0..domain`.
    pub fn with_membership(buf: Vec<f64>, domain: usize) -> Self {
        let mut flags = vec![false; domain];
        for &v in &buf {
            flags[v as usize] = true;
        }
        let mut cell = Self::new(buf);
        cell.membership = Some(flags);
        cell
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn buff(&self) -> &[f64] {
        &self.buf
    }

    pub fn get(&self, index: usize) -> f64 {
        self.buf[index]
    }

    /// The value this index held at the last commit.
    ///
    /// Valid for any index below the committed length, including indices
    /// removed during the current round.
    pub fn committed(&self, index: usize) -> f64 {
        debug_assert!(index < self.committed_len);
        match self.saved.get(&index) {
            Some(&old) => old,
            None => self.buf[index],
        }
    }

    /// Indices written since the last commit, in first-touch order.
    /// Includes indices whose current value is back at the committed one.
    pub(crate) fn saved_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.saved.keys().copied()
    }

    pub(crate) fn membership(&self) -> Option<&[bool]> {
        self.membership.as_deref()
    }

    pub(crate) fn membership_mut(&mut self) -> &mut [bool] {
        self.membership.as_deref_mut().expect("cell has no membership flags")
    }

    /// Write `value` at an existing index, remembering the committed value
    /// on first touch.
    pub fn set(&mut self, index: usize, value: f64) {
        debug_assert!(index < self.buf.len());
        if index < self.committed_len {
            self.saved.entry(index).or_insert(self.buf[index]);
        }
        self.buf[index] = value;
    }

    /// Grow the buffer at the back.
    pub fn push(&mut self, value: f64) {
        self.buf.push(value);
    }

    /// Shrink the buffer at the back, returning the removed value.
    pub fn pop(&mut self) -> f64 {
        debug_assert!(!self.buf.is_empty());
        let index = self.buf.len() - 1;
        if index < self.committed_len {
            self.saved.entry(index).or_insert(self.buf[index]);
        }
        self.buf.pop().expect("pop on empty cell")
    }

    /// The coalesced pending updates relative to the last commit.
    ///
    /// Value changes come first in first-touch order, then insertions in
    /// ascending index order, then removals in descending index order so a
    /// consumer can replay the sequence directly against its own buffer.
    pub fn diff(&self) -> Diff {
        let mut out = Diff::new();
        let live = self.buf.len().min(self.committed_len);
        for (&index, &old) in &self.saved {
            if index < live && self.buf[index] != old {
                out.push(Update::Set { index, old, value: self.buf[index] });
            }
        }
        for index in self.committed_len..self.buf.len() {
            out.push(Update::Insert { index, value: self.buf[index] });
        }
        for index in (self.buf.len()..self.committed_len).rev() {
            let old = self.committed(index);
            out.push(Update::Remove { index, old });
        }
        out
    }

    /// Whether any pending bookkeeping exists. A true result does not
    /// guarantee a non-empty diff (writes may have restored committed
    /// values), only that commit/revert have something to clear.
    pub fn is_touched(&self) -> bool {
        !self.saved.is_empty() || self.buf.len() != self.committed_len
    }

    /// Make the current buffer the new baseline and clear the diff.
    pub fn commit(&mut self) {
        self.committed_len = self.buf.len();
        self.saved.clear();
    }

    /// Restore the committed baseline and clear the diff.
    pub fn revert(&mut self) {
        if self.membership.is_some() {
            self.revert_membership();
        }
        self.buf.resize(self.committed_len, 0.0);
        for (&index, &old) in &self.saved {
            self.buf[index] = old;
        }
        self.saved.clear();
    }

    /// Roll the membership flags back to the committed state.
    ///
    /// Two passes over the diff: first drop every pending value, then
    /// restore every committed one. A single interleaved pass would get the
    /// order wrong when a value is evicted from one slot and re-added at
    /// another within the same round.
    fn revert_membership(&mut self) {
        let diff = self.diff();
        let flags = self.membership.as_deref_mut().expect("membership flags");
        for update in &diff {
            if let Some(value) = update.value() {
                flags[value as usize] = false;
            }
        }
        for update in &diff {
            match *update {
                Update::Set { old, .. } | Update::Remove { old, .. } => {
                    flags[old as usize] = true;
                }
                Update::Insert { .. } => {}
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_cell_has_empty_diff() {
        let cell = Cell::new(vec![1.0, 2.0, 3.0]);
        assert!(cell.diff().is_empty());
        assert!(!cell.is_touched());
    }

    #[test]
    fn repeated_writes_coalesce_to_one_update() {
        let mut cell = Cell::new(vec![1.0, 2.0, 3.0]);
        cell.set(1, 5.0);
        cell.set(1, 7.0);

        let diff = cell.diff();
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0], Update::Set { index: 1, old: 2.0, value: 7.0 });
    }

    #[test]
    fn write_back_to_committed_value_yields_no_update() {
        let mut cell = Cell::new(vec![1.0, 2.0]);
        cell.set(0, 9.0);
        cell.set(0, 1.0);
        assert!(cell.diff().is_empty());
    }

    #[test]
    fn growth_and_shrink_produce_structural_updates() {
        let mut cell = Cell::new(vec![1.0, 2.0]);
        cell.push(8.0);
        assert_eq!(cell.diff().as_slice(), &[Update::Insert { index: 2, value: 8.0 }]);

        cell.pop(); // undoes the push
        cell.pop(); // shrinks below the baseline
        assert_eq!(cell.diff().as_slice(), &[Update::Remove { index: 1, old: 2.0 }]);
    }

    #[test]
    fn removals_report_descending_indices() {
        let mut cell = Cell::new(vec![1.0, 2.0, 3.0]);
        cell.pop();
        cell.pop();
        let diff = cell.diff();
        assert_eq!(
            diff.as_slice(),
            &[
                Update::Remove { index: 2, old: 3.0 },
                Update::Remove { index: 1, old: 2.0 },
            ]
        );
    }

    #[test]
    fn commit_establishes_new_baseline() {
        let mut cell = Cell::new(vec![1.0]);
        cell.set(0, 4.0);
        cell.push(5.0);
        cell.commit();

        assert!(cell.diff().is_empty());
        assert_eq!(cell.buff(), &[4.0, 5.0]);
        assert_eq!(cell.committed(1), 5.0);
    }

    #[test]
    fn revert_restores_values_and_length() {
        let mut cell = Cell::new(vec![1.0, 2.0, 3.0]);
        cell.set(0, 9.0);
        cell.pop();
        cell.push(7.0);
        cell.push(6.0);
        cell.revert();

        assert_eq!(cell.buff(), &[1.0, 2.0, 3.0]);
        assert!(cell.diff().is_empty());
        assert!(!cell.is_touched());
    }

    #[test]
    fn committed_survives_pending_writes() {
        let mut cell = Cell::new(vec![1.0, 2.0]);
        cell.set(1, 8.0);
        assert_eq!(cell.committed(1), 2.0);
        cell.commit();
        assert_eq!(cell.committed(1), 8.0);
    }

    #[test]
    fn membership_tracks_buffer_and_reverts() {
        // Set {2, 4} over domain 0..6.
        let mut cell = Cell::with_membership(vec![2.0, 4.0], 6);
        assert!(cell.membership().unwrap()[2]);
        assert!(cell.membership().unwrap()[4]);

        // Discard 2 (swap with back, pop) and add 5.
        cell.set(0, 4.0);
        cell.pop();
        cell.membership_mut()[2] = false;
        cell.push(5.0);
        cell.membership_mut()[5] = true;

        cell.revert();
        let flags = cell.membership().unwrap();
        assert!(flags[2] && flags[4]);
        assert!(!flags[5]);
        assert_eq!(cell.buff(), &[2.0, 4.0]);
    }

    #[test]
    fn membership_revert_handles_readded_value() {
        // Committed {2}: discard 2, then add 2 back at a new slot alongside 6.
        let mut cell = Cell::with_membership(vec![2.0, 4.0, 6.0], 8);
        cell.set(0, 6.0);
        cell.pop();
        cell.membership_mut()[2] = false;
        cell.push(2.0);
        cell.membership_mut()[2] = true;

        cell.revert();
        let flags = cell.membership().unwrap();
        assert!(flags[2] && flags[4] && flags[6]);
        assert_eq!(cell.buff(), &[2.0, 4.0, 6.0]);
    }
}
