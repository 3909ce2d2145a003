//! Assembles samples from a raw evdev-style event stream, one frame per `SYN_REPORT`.
//!
//! This knows nothing about how events are read, so any backend that speaks the kernel's
//! absolute axis protocol can feed it.

use std::collections::VecDeque;
use std::io;

use enumset::EnumSet;
use tstouch_common::types::Pos2;

use crate::caps::Axis;
use crate::driver::ReadError;
use crate::sample::{MtSample, Sample, SampleBatch, MAX_BATCH, MAX_SLOTS};
use crate::source::SampleSource;

/// The contact value reported for devices that only say "touching" without a pressure axis.
pub const BINARY_CONTACT: u32 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEvent {
	X(i32),
	Y(i32),
	Pressure(i32),
	/// `BTN_TOUCH`.
	Touch(bool),
	MtSlot(i32),
	MtX(i32),
	MtY(i32),
	MtPressure(i32),
	MtTrackingId(i32),
	/// `SYN_REPORT`, which closes a frame.
	Report,
	/// `SYN_DROPPED`. Everything up to the next report is discarded.
	Dropped,
}

#[derive(Debug, Clone, Copy, Default)]
struct Contact {
	pos: Pos2,
	pressure: u32,
	tracking: bool,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
	single: Option<Sample>,
	multi: Option<[MtSample; MAX_SLOTS]>,
}

#[derive(Debug)]
pub struct FrameDecoder {
	axes: EnumSet<Axis>,

	legacy: Contact,
	legacy_dirty: bool,

	/// `None` while the device has selected a slot we don't track.
	slot: Option<usize>,
	contacts: [Contact; MAX_SLOTS],
	dirty: [bool; MAX_SLOTS],

	dropping: bool,
	frames: VecDeque<Frame>,
}

fn non_negative(value: i32) -> u32 {
	u32::try_from(value).unwrap_or(0)
}

impl FrameDecoder {
	#[must_use]
	pub fn new(axes: EnumSet<Axis>) -> Self {
		Self {
			axes,
			legacy: Contact::default(),
			legacy_dirty: false,
			slot: Some(0),
			contacts: [Contact::default(); MAX_SLOTS],
			dirty: [false; MAX_SLOTS],
			dropping: false,
			frames: VecDeque::new(),
		}
	}

	#[inline]
	#[must_use]
	pub fn multitouch(&self) -> bool {
		self.axes.contains(Axis::MtPositionX) && self.axes.contains(Axis::MtPositionY)
	}

	#[inline]
	#[must_use]
	fn legacy_axes(&self) -> bool {
		self.axes.contains(Axis::X) && self.axes.contains(Axis::Y)
	}

	/// Non-zero exactly when `contact` is tracking.
	fn contact_value(&self, contact: &Contact, pressure_axis: Axis) -> u32 {
		if !contact.tracking {
			0
		} else if self.axes.contains(pressure_axis) {
			contact.pressure.max(1)
		} else {
			BINARY_CONTACT
		}
	}

	fn mt_contact(&mut self) -> Option<&mut Contact> {
		let slot = self.slot?;
		self.dirty[slot] = true;
		Some(&mut self.contacts[slot])
	}

	pub fn push(&mut self, event: RawEvent) {
		use RawEvent as E;

		if self.dropping {
			if event == E::Report {
				tracing::debug!("resuming after dropped events");
				self.dropping = false;
				self.legacy_dirty = false;
				self.dirty = [false; MAX_SLOTS];
			}
			return;
		}

		match event {
			E::X(v) => {
				self.legacy.pos.x = v;
				self.legacy_dirty = true;
			}
			E::Y(v) => {
				self.legacy.pos.y = v;
				self.legacy_dirty = true;
			}
			E::Pressure(v) => {
				self.legacy.pressure = non_negative(v);
				self.legacy_dirty = true;
			}
			E::Touch(touching) => {
				self.legacy.tracking = touching;
				self.legacy_dirty = true;
			}
			E::MtSlot(v) => {
				self.slot = usize::try_from(v).ok().filter(|&slot| slot < MAX_SLOTS);
				if self.slot.is_none() {
					tracing::trace!(slot = v, "ignoring untracked slot");
				}
			}
			E::MtX(v) => {
				if let Some(contact) = self.mt_contact() {
					contact.pos.x = v;
				}
			}
			E::MtY(v) => {
				if let Some(contact) = self.mt_contact() {
					contact.pos.y = v;
				}
			}
			E::MtPressure(v) => {
				if let Some(contact) = self.mt_contact() {
					contact.pressure = non_negative(v);
				}
			}
			E::MtTrackingId(v) => {
				// The kernel only resends axes that changed, so the cached pressure has to outlive the contact.
				if let Some(contact) = self.mt_contact() {
					contact.tracking = v >= 0;
				}
			}
			E::Report => self.finish_frame(),
			E::Dropped => {
				tracing::debug!("kernel dropped input events, discarding the current frame");
				self.dropping = true;
			}
		}
	}

	fn finish_frame(&mut self) {
		let single = if self.legacy_axes() {
			// With a pressure axis, pressure alone decides contact. Otherwise `BTN_TOUCH` does.
			let mut legacy = self.legacy;
			if self.axes.contains(Axis::Pressure) {
				legacy.tracking = legacy.pressure > 0;
			}
			self.legacy_dirty
				.then(|| Sample::new(legacy.pos, self.contact_value(&legacy, Axis::Pressure)))
		} else {
			self.dirty[0].then(|| {
				Sample::new(
					self.contacts[0].pos,
					self.contact_value(&self.contacts[0], Axis::MtPressure),
				)
			})
		};

		let multi = (self.multitouch() && self.dirty.contains(&true)).then(|| {
			std::array::from_fn(|slot| MtSample {
				sample: Sample::new(
					self.contacts[slot].pos,
					self.contact_value(&self.contacts[slot], Axis::MtPressure),
				),
				valid: self.dirty[slot],
			})
		});

		self.legacy_dirty = false;
		self.dirty = [false; MAX_SLOTS];

		if single.is_some() || multi.is_some() {
			self.frames.push_back(Frame { single, multi });
		}
	}

	/// The next single-touch sample. Frames without one are consumed and skipped.
	pub fn next_single(&mut self) -> Option<Sample> {
		while let Some(frame) = self.frames.pop_front() {
			if frame.single.is_some() {
				return frame.single;
			}
		}
		None
	}

	/// Move up to [`MAX_BATCH`] multi-touch frames into `batch`. Frames without one are consumed and skipped.
	pub fn fill_batch(&mut self, batch: &mut SampleBatch) -> usize {
		let mut rows = 0;
		while rows < MAX_BATCH {
			let Some(frame) = self.frames.pop_front() else {
				break;
			};
			if let Some(row) = frame.multi {
				*batch.row_mut(rows) = row;
				rows += 1;
			}
		}
		rows
	}
}

/// Something that delivers raw events in chunks, the way a non-blocking read does.
pub trait EventReader {
	/// Push the next chunk of pending events into `decoder`.
	///
	/// Returns `false` once nothing more is pending, for example when the read would block.
	///
	/// # Errors
	///
	/// Any I/O error other than the read would block.
	fn read_into(&mut self, decoder: &mut FrameDecoder) -> io::Result<bool>;
}

/// A [`SampleSource`] that decodes the events of an [`EventReader`].
///
/// Reads keep pulling chunks until a sample comes out or the reader runs dry,
/// so an empty read always means the reader had nothing left.
#[derive(Debug)]
pub struct DecodedSource<R> {
	reader: R,
	decoder: FrameDecoder,
}

impl<R> DecodedSource<R> {
	#[must_use]
	pub fn new(reader: R, axes: EnumSet<Axis>) -> Self {
		Self {
			reader,
			decoder: FrameDecoder::new(axes),
		}
	}

	#[inline]
	#[must_use]
	pub fn reader(&self) -> &R {
		&self.reader
	}
}

impl<R: EventReader> SampleSource for DecodedSource<R> {
	fn read_one(&mut self) -> io::Result<Option<Sample>> {
		loop {
			if let Some(sample) = self.decoder.next_single() {
				return Ok(Some(sample));
			}
			if !self.reader.read_into(&mut self.decoder)? {
				return Ok(None);
			}
		}
	}

	fn read_batch(&mut self, batch: &mut SampleBatch) -> Result<usize, ReadError> {
		if !self.decoder.multitouch() {
			return Err(ReadError::NotSupported);
		}
		loop {
			let rows = self.decoder.fill_batch(batch);
			if rows > 0 {
				return Ok(rows);
			}
			if !self.reader.read_into(&mut self.decoder)? {
				return Ok(0);
			}
		}
	}
}
