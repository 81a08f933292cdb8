use smallvec::SmallVec;

use crate::gdd::{GddError, Result};

/// One array axis: origin index and element count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Bounds {
	/// First valid index.
	pub first: u32,
	/// Number of elements along the axis.
	pub size: u32,
}

impl Bounds {
	/// Axis starting at `first` with `size` elements.
	pub const fn new(first: u32, size: u32) -> Self {
		Self { first, size }
	}

	/// Axis starting at zero.
	pub const fn sized(size: u32) -> Self {
		Self { first: 0, size }
	}

	/// One past the last valid index.
	pub fn end(&self) -> u64 {
		u64::from(self.first) + u64::from(self.size)
	}
}

/// Per-value bounds storage; ranks 1 through 3 stay inline.
pub type BoundsVec = SmallVec<[Bounds; 3]>;

/// Product of axis sizes, `1` for no axes.
pub(crate) fn element_product(bounds: &[Bounds]) -> Result<usize> {
	bounds
		.iter()
		.try_fold(1_usize, |count, axis| count.checked_mul(axis.size as usize))
		.ok_or(GddError::ShapeTooLarge { what: "element count" })
}

/// `count` elements of `width` bytes each.
pub(crate) fn byte_len(count: usize, width: usize) -> Result<usize> {
	count.checked_mul(width).ok_or(GddError::ShapeTooLarge { what: "byte length" })
}
