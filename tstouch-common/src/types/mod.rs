mod pos2;
mod range;

pub use self::pos2::{pos2, Pos2};
pub use self::range::AxisRange;
