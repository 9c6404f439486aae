//! Update records: the diff protocol's unit of change.
//!
//! A node's diff for one trial is an ordered sequence of [`Update`]s
//! describing how its buffer differs from the last committed baseline.
//! Value changes carry both the committed and the pending value so that
//! consumers (and `revert`) never have to re-read history. Structural
//! changes on dynamic arrays are separate variants so that consumers can
//! pattern-match and decide between an incremental adjustment and a full
//! recomputation.
//!
//! Diffs are coalesced: at most one record per index per round, and a write
//! that lands back on the committed value produces no record at all.

/// One atomic change to a node's buffer relative to the last commit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Update {
    /// The value at an existing index changed.
    Set { index: usize, old: f64, value: f64 },

    /// The buffer grew at the back; `index` is the new element's position.
    Insert { index: usize, value: f64 },

    /// The buffer shrank at the back; `old` is the removed element's
    /// committed value.
    Remove { index: usize, old: f64 },
}

impl Update {
    /// The linear index this update targets.
    pub fn index(&self) -> usize {
        match *self {
            Update::Set { index, .. } => index,
            Update::Insert { index, .. } => index,
            Update::Remove { index, .. } => index,
        }
    }

    /// The pending value, if the index still holds one.
    pub fn value(&self) -> Option<f64> {
        match *self {
            Update::Set { value, .. } => Some(value),
            Update::Insert { value, .. } => Some(value),
            Update::Remove { .. } => None,
        }
    }

    /// True for `Insert` and `Remove` records.
    pub fn is_structural(&self) -> bool {
        !matches!(self, Update::Set { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_match_variants() {
        let set = Update::Set { index: 3, old: 1.0, value: 2.0 };
        assert_eq!(set.index(), 3);
        assert_eq!(set.value(), Some(2.0));
        assert!(!set.is_structural());

        let ins = Update::Insert { index: 5, value: 9.0 };
        assert!(ins.is_structural());
        assert_eq!(ins.value(), Some(9.0));

        let rem = Update::Remove { index: 4, old: 7.0 };
        assert!(rem.is_structural());
        assert_eq!(rem.value(), None);
        assert_eq!(rem.index(), 4);
    }
}
