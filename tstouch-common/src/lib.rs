//! Value types shared between the touch engine, the wire protocol, and its consumers.

pub mod types;

pub use self::types::{pos2, AxisRange, Pos2};
