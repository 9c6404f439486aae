//! Permutation and subset variables.
//!
//! A [`ListVar`] is a permutation of `0..n`: fixed length, every value
//! present exactly once. Local search moves are position swaps, so diffs
//! stay at two updates per move.
//!
//! A [`SetVar`] is a subset of `0..n` with a dynamic length. Elements are
//! stored in insertion order; `discard` swaps the victim with the back
//! element and pops, which keeps every structural change at the back of
//! the buffer (the form downstream nodes and the revert path rely on).
//! Membership flags on the cell make duplicate checks O(1).

use crate::array::{Bounds, Shape};
use crate::error::ModelError;
use crate::graph::{Graph, NodeId};
use crate::state::State;

use super::decision::SourceKind;

// ----------------------------------------------------------------------------
// Permutations
// ----------------------------------------------------------------------------

/// Mutation handle for a permutation variable.
#[derive(Debug, Clone, Copy)]
pub struct ListVar {
    id: NodeId,
    n: usize,
}

impl ListVar {
    pub fn node(&self) -> NodeId {
        self.id
    }

    /// Domain size; also the fixed buffer length.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Exchange the values at two positions.
    pub fn swap(&self, state: &mut State, i: usize, j: usize) -> Result<(), ModelError> {
        if i >= self.n || j >= self.n {
            return Err(ModelError::domain(format!(
                "swap positions ({i}, {j}) out of range for length {}",
                self.n
            )));
        }
        if i == j {
            return Ok(());
        }
        let a = state.buff(self.id)[i];
        let b = state.buff(self.id)[j];
        let cell = state.cell_mut(self.id);
        cell.set(i, b);
        cell.set(j, a);
        state.queue_source(self.id);
        Ok(())
    }

    /// Replace the whole ordering. Fails unless `order` is a permutation
    /// of `0..n`; nothing is written on failure.
    pub fn assign(&self, state: &mut State, order: &[usize]) -> Result<(), ModelError> {
        if order.len() != self.n {
            return Err(ModelError::domain(format!(
                "expected {} positions, got {}",
                self.n,
                order.len()
            )));
        }
        let mut seen = vec![false; self.n];
        for &v in order {
            if v >= self.n {
                return Err(ModelError::domain(format!(
                    "value {v} outside permutation domain 0..{}",
                    self.n
                )));
            }
            if seen[v] {
                return Err(ModelError::domain(format!("value {v} appears twice")));
            }
            seen[v] = true;
        }
        let mut changed = false;
        for (index, &v) in order.iter().enumerate() {
            if state.buff(self.id)[index] != v as f64 {
                state.cell_mut(self.id).set(index, v as f64);
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
// Subsets
// ----------------------------------------------------------------------------

/// Mutation handle for a subset variable.
#[derive(Debug, Clone, Copy)]
pub struct SetVar {
    id: NodeId,
    n: usize,
}

impl SetVar {
    pub fn node(&self) -> NodeId {
        self.id
    }

    /// Domain size (the maximum number of elements).
    pub fn n(&self) -> usize {
        self.n
    }

    /// Whether `value` is currently in the set.
    pub fn contains(&self, state: &State, value: usize) -> bool {
        value < self.n && state.cell(self.id).membership().expect("set cell has flags")[value]
    }

    /// Current number of elements.
    pub fn len(&self, state: &State) -> usize {
        state.len(self.id)
    }

    /// Add an element at the back. Duplicates and out-of-domain values
    /// are domain violations.
    pub fn add(&self, state: &mut State, value: usize) -> Result<(), ModelError> {
        if value >= self.n {
            return Err(ModelError::domain(format!(
                "value {value} outside set domain 0..{}",
                self.n
            )));
        }
        if self.contains(state, value) {
            return Err(ModelError::domain(format!("value {value} is already in the set")));
        }
        let cell = state.cell_mut(self.id);
        cell.push(value as f64);
        cell.membership_mut()[value] = true;
        state.queue_source(self.id);
        Ok(())
    }

    /// Remove an element by value: swap it with the back element, pop.
    pub fn discard(&self, state: &mut State, value: usize) -> Result<(), ModelError> {
        if !self.contains(state, value) {
            return Err(ModelError::domain(format!("value {value} is not in the set")));
        }
        let buf = state.buff(self.id);
        let index = buf
            .iter()
            .position(|&x| x == value as f64)
            .expect("membership flag says the value is present");
        let last = buf.len() - 1;
        let back = buf[last];

        let cell = state.cell_mut(self.id);
        if index != last {
            cell.set(index, back);
        }
        cell.pop();
        cell.membership_mut()[value] = false;
        state.queue_source(self.id);
        Ok(())
    }

    /// Replace the whole subset. Fails unless every value is unique and
    /// in-domain; nothing is written on failure.
    pub fn assign(&self, state: &mut State, values: &[usize]) -> Result<(), ModelError> {
        let mut incoming = vec![false; self.n];
        for &v in values {
            if v >= self.n {
                return Err(ModelError::domain(format!(
                    "value {v} outside set domain 0..{}",
                    self.n
                )));
            }
            if incoming[v] {
                return Err(ModelError::domain(format!("value {v} appears twice")));
            }
            incoming[v] = true;
        }

        let current: Vec<f64> = state.buff(self.id).to_vec();
        let cell = state.cell_mut(self.id);
        for &v in &current {
            cell.membership_mut()[v as usize] = false;
        }
        let shared = current.len().min(values.len());
        for (index, &v) in values.iter().enumerate().take(shared) {
            if cell.get(index) != v as f64 {
                cell.set(index, v as f64);
            }
        }
        while cell.len() > values.len() {
            cell.pop();
        }
        for &v in &values[shared..] {
            cell.push(v as f64);
        }
        for &v in values {
            cell.membership_mut()[v] = true;
        }
        if cell.is_touched() {
            state.queue_source(self.id);
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Constructors
// ----------------------------------------------------------------------------

impl Graph {
    /// A permutation variable over `0..n`, seeded with the identity order.
    pub fn list(&mut self, n: usize) -> ListVar {
        let max = n.saturating_sub(1) as f64;
        let id = self.add_source(
            SourceKind::Permutation,
            Shape::vector(n),
            Bounds::new(0.0, max, true),
            Default::default(),
        );
        ListVar { id, n }
    }

    /// A subset variable over `0..n`, seeded empty.
    pub fn set(&mut self, n: usize) -> SetVar {
        let max = n.saturating_sub(1) as f64;
        let id = self.add_source(
            SourceKind::Subset,
            Shape::dynamic_vector(n),
            Bounds::new(0.0, max, true),
            Default::default(),
        );
        SetVar { id, n }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
