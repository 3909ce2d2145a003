use std::fmt::{self, Display, Formatter};
use std::io;

use enumset::{EnumSet, EnumSetType};
use serde::{Deserialize, Serialize};
use tstouch_common::types::AxisRange;

use crate::sample::MAX_SLOTS;

/// The absolute axes that matter for touch sampling.
#[derive(Debug, EnumSetType)]
#[enumset(no_ops)]
#[repr(u8)]
pub enum Axis {
	X,
	Y,
	Pressure,
	MtSlot,
	MtPositionX,
	MtPositionY,
	MtPressure,
	MtTrackingId,
}

/// What a touchscreen reports, probed once when it is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
	pub name: Option<String>,
	pub axes: EnumSet<Axis>,
	/// Range of the X position axis, passed through as reported.
	pub x: AxisRange,
	/// Range of the Y position axis, passed through as reported.
	pub y: AxisRange,
	pub max_touches: u8,
}

#[derive(Debug)]
pub enum ProbeError {
	Io(io::Error),
	/// Neither the multi-touch nor the single-touch position axes are present.
	NotATouchscreen,
	/// The axis is advertised but has no range information.
	MissingRange(Axis),
}

impl Display for ProbeError {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Self::Io(error) => write!(f, "probing device: {error}"),
			Self::NotATouchscreen => f.write_str("no touchscreen position axes"),
			Self::MissingRange(axis) => write!(f, "no range reported for axis {axis:?}"),
		}
	}
}

impl std::error::Error for ProbeError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Self::Io(error) => Some(error),
			Self::NotATouchscreen | Self::MissingRange(_) => None,
		}
	}
}

impl From<io::Error> for ProbeError {
	fn from(error: io::Error) -> Self {
		Self::Io(error)
	}
}

impl Capabilities {
	/// Build capabilities from the advertised axes, looking up ranges with `range`.
	///
	/// Position ranges come from the multi-touch axes when both are present, otherwise from `X` and `Y`.
	///
	/// # Errors
	///
	/// If there are no usable position axes, or `range` has nothing for the chosen ones.
	pub fn from_axes(
		name: Option<String>,
		axes: EnumSet<Axis>,
		mut range: impl FnMut(Axis) -> Option<AxisRange>,
	) -> Result<Self, ProbeError> {
		let has = |axis| axes.contains(axis);
		let (x_axis, y_axis) = if has(Axis::MtPositionX) && has(Axis::MtPositionY) {
			(Axis::MtPositionX, Axis::MtPositionY)
		} else if has(Axis::X) && has(Axis::Y) {
			(Axis::X, Axis::Y)
		} else {
			return Err(ProbeError::NotATouchscreen);
		};

		let x = range(x_axis).ok_or(ProbeError::MissingRange(x_axis))?;
		let y = range(y_axis).ok_or(ProbeError::MissingRange(y_axis))?;

		Ok(Self {
			name,
			axes,
			x,
			y,
			max_touches: MAX_SLOTS.try_into().unwrap_or(u8::MAX),
		})
	}

	#[inline]
	#[must_use]
	pub fn multitouch(&self) -> bool {
		self.axes.contains(Axis::MtPositionX) && self.axes.contains(Axis::MtPositionY)
	}
}
