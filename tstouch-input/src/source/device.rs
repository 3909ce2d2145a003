use std::fs::OpenOptions;
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt as _;
use std::path::Path;

use enumset::EnumSet;
use evdev::{AbsInfo, AbsoluteAxisCode, Device, EventSummary, KeyCode, SynchronizationCode};
use tstouch_common::types::AxisRange;

use crate::caps::{Axis, Capabilities, ProbeError};
use crate::driver::ReadError;
use crate::sample::{Sample, SampleBatch};
use crate::source::frame::{DecodedSource, EventReader, FrameDecoder, RawEvent};
use crate::source::SampleSource;

impl Axis {
	fn code(self) -> AbsoluteAxisCode {
		match self {
			Axis::X => AbsoluteAxisCode::ABS_X,
			Axis::Y => AbsoluteAxisCode::ABS_Y,
			Axis::Pressure => AbsoluteAxisCode::ABS_PRESSURE,
			Axis::MtSlot => AbsoluteAxisCode::ABS_MT_SLOT,
			Axis::MtPositionX => AbsoluteAxisCode::ABS_MT_POSITION_X,
			Axis::MtPositionY => AbsoluteAxisCode::ABS_MT_POSITION_Y,
			Axis::MtPressure => AbsoluteAxisCode::ABS_MT_PRESSURE,
			Axis::MtTrackingId => AbsoluteAxisCode::ABS_MT_TRACKING_ID,
		}
	}
}

impl Capabilities {
	/// Query the axes and axis ranges of an open device.
	///
	/// # Errors
	///
	/// See [`Capabilities::from_axes`], plus any error from the absinfo ioctls.
	pub fn probe(device: &Device) -> Result<Self, ProbeError> {
		let supported = device.supported_absolute_axes();
		let axes: EnumSet<Axis> = EnumSet::<Axis>::all()
			.iter()
			.filter(|axis| supported.is_some_and(|supported| supported.contains(axis.code())))
			.collect();

		let info: Vec<(AbsoluteAxisCode, AbsInfo)> = device.get_absinfo()?.collect();
		let range = |axis: Axis| {
			info.iter()
				.find(|(code, _)| *code == axis.code())
				.map(|(_, info)| AxisRange::new(info.minimum(), info.maximum()))
		};

		Self::from_axes(device.name().map(str::to_owned), axes, range)
	}
}

fn decode(event: evdev::InputEvent) -> Option<RawEvent> {
	use AbsoluteAxisCode as A;
	use RawEvent as E;

	let event = match event.destructure() {
		EventSummary::AbsoluteAxis(_, axis, value) => match axis {
			A::ABS_X => E::X(value),
			A::ABS_Y => E::Y(value),
			A::ABS_PRESSURE => E::Pressure(value),
			A::ABS_MT_SLOT => E::MtSlot(value),
			A::ABS_MT_POSITION_X => E::MtX(value),
			A::ABS_MT_POSITION_Y => E::MtY(value),
			A::ABS_MT_PRESSURE => E::MtPressure(value),
			A::ABS_MT_TRACKING_ID => E::MtTrackingId(value),
			_ => return None,
		},
		EventSummary::Key(_, KeyCode::BTN_TOUCH, value) => E::Touch(value != 0),
		EventSummary::Synchronization(_, SynchronizationCode::SYN_REPORT, _) => E::Report,
		EventSummary::Synchronization(_, SynchronizationCode::SYN_DROPPED, _) => E::Dropped,
		_ => return None,
	};
	Some(event)
}

impl EventReader for Device {
	fn read_into(&mut self, decoder: &mut FrameDecoder) -> io::Result<bool> {
		match self.fetch_events() {
			Ok(events) => {
				let mut any = false;
				for event in events {
					any = true;
					if let Some(event) = decode(event) {
						decoder.push(event);
					}
				}
				Ok(any)
			}
			Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(false),
			Err(error) => Err(error),
		}
	}
}

/// A touchscreen evdev node, read without blocking.
///
/// Reads drain the node until the kernel reports it would block,
/// so an empty read means edge-triggered readiness can be cleared.
pub struct EvdevSource {
	capabilities: Capabilities,
	source: DecodedSource<Device>,
}

impl EvdevSource {
	/// # Errors
	///
	/// Opening the node or probing its capabilities.
	pub fn open(path: &Path) -> Result<Self, ProbeError> {
		let file = OpenOptions::new()
			.read(true)
			.custom_flags(libc::O_NONBLOCK)
			.open(path)?;
		let device = Device::from_fd(file.into())?;
		let capabilities = Capabilities::probe(&device)?;

		tracing::debug!(?path, name = ?capabilities.name, axes = ?capabilities.axes, "opened touchscreen");

		Ok(Self {
			source: DecodedSource::new(device, capabilities.axes),
			capabilities,
		})
	}

	#[inline]
	#[must_use]
	pub fn capabilities(&self) -> &Capabilities {
		&self.capabilities
	}
}

impl SampleSource for EvdevSource {
	#[inline]
	fn read_one(&mut self) -> io::Result<Option<Sample>> {
		self.source.read_one()
	}

	#[inline]
	fn read_batch(&mut self, batch: &mut SampleBatch) -> Result<usize, ReadError> {
		self.source.read_batch(batch)
	}
}

impl AsRawFd for EvdevSource {
	#[inline]
	fn as_raw_fd(&self) -> RawFd {
		self.source.reader().as_raw_fd()
	}
}
