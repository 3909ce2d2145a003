use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// A point in raw device coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct Pos2 {
	pub x: i32,
	pub y: i32,
}

#[inline]
#[must_use]
pub const fn pos2(x: i32, y: i32) -> Pos2 {
	Pos2 { x, y }
}

impl Display for Pos2 {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "({}, {})", self.x, self.y)
	}
}

#[test]
fn test_display() {
	assert_eq!(pos2(3, -4).to_string(), "(3, -4)");
	assert_eq!(Pos2::default().to_string(), "(0, 0)");
}
