use serde::{Deserialize, Serialize};

/// The reported extent of one absolute axis, inclusive on both ends.
///
/// This is passed through from the device unchanged.
/// Nothing in the engine clamps or rescales coordinates against it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct AxisRange {
	pub min: i32,
	pub max: i32,
}

impl AxisRange {
	#[inline]
	#[must_use]
	pub const fn new(min: i32, max: i32) -> Self {
		Self { min, max }
	}

	#[inline]
	#[must_use]
	pub fn contains(self, value: i32) -> bool {
		(self.min..=self.max).contains(&value)
	}

	#[inline]
	#[must_use]
	pub fn span(self) -> i32 {
		self.max.saturating_sub(self.min)
	}
}

#[test]
fn test_contains() {
	let range = AxisRange::new(0, 4095);
	assert!(range.contains(0));
	assert!(range.contains(4095));
	assert!(!range.contains(4096));
	assert!(!range.contains(-1));
	assert_eq!(range.span(), 4095);
	assert_eq!(AxisRange::new(i32::MIN, i32::MAX).span(), i32::MAX);
}
