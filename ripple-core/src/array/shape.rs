//! Shapes and declared numeric bounds.
//!
//! Every array-producing node declares a [`Shape`] and a [`Bounds`] at
//! construction time. The shape fixes the row-major layout of the value
//! buffer; a shape may mark its leading axis as dynamic, in which case the
//! buffer's extent along that axis can change between evaluation rounds
//! (sets and partition lists grow and shrink, everything else is fixed).
//! Bounds are derived analytically from the node's operator and its
//! predecessors' bounds and never change after construction.

use smallvec::{smallvec, SmallVec};

/// The extents of an array, one per axis, row-major.
///
/// For a dynamic shape, `size()` is the maximum number of elements the
/// buffer can hold; the current extent lives in the evaluation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    extents: SmallVec<[usize; 2]>,
    dynamic: bool,
}

impl Shape {
    /// A zero-dimensional shape holding exactly one value.
    pub fn scalar() -> Self {
        Self { extents: smallvec![], dynamic: false }
    }

    /// A fixed-length vector.
    pub fn vector(len: usize) -> Self {
        Self { extents: smallvec![len], dynamic: false }
    }

    /// A vector whose length varies at runtime, up to `max_len` elements.
    pub fn dynamic_vector(max_len: usize) -> Self {
        Self { extents: smallvec![max_len], dynamic: true }
    }

    /// An arbitrary fixed multi-axis shape.
    pub fn fixed(extents: &[usize]) -> Self {
        Self { extents: SmallVec::from_slice(extents), dynamic: false }
    }

    /// Per-axis extents. For dynamic shapes the leading extent is the cap.
    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.extents.len()
    }

    /// Product of the extents: the buffer capacity in elements.
    pub fn size(&self) -> usize {
        self.extents.iter().product()
    }

    /// Whether the leading axis can change extent between rounds.
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }
}

/// Declared numeric range and integrality of an array's values.
///
/// The contract is soundness, not tightness: every value a node ever writes
/// to its buffer lies within `[min, max]`, and if `integral` is set every
/// value is a whole number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
    pub integral: bool,
}

impl Bounds {
    pub fn new(min: f64, max: f64, integral: bool) -> Self {
        debug_assert!(min <= max, "bounds inverted: [{min}, {max}]");
        Self { min, max, integral }
    }

    /// Bounds of a boolean-valued output.
    pub fn logical() -> Self {
        Self { min: 0.0, max: 1.0, integral: true }
    }

    /// Whether `value` lies within the declared range.
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}
