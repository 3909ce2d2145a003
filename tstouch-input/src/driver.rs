use std::collections::VecDeque;
use std::fmt::{self, Display, Formatter};
use std::io;

use crate::sample::{Sample, SampleBatch, MAX_SLOTS};
use crate::source::SampleSource;
use crate::touch::{IdAllocator, SlotTable, TouchEvent};

#[derive(Debug)]
pub enum ReadError {
	/// The source failed. This ends the current dispatch but leaves committed slot state alone.
	Io(io::Error),
	/// The source cannot produce multi-touch batches.
	NotSupported,
}

impl Display for ReadError {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Self::Io(error) => write!(f, "reading samples: {error}"),
			Self::NotSupported => f.write_str("multi-touch reads are not supported by this source"),
		}
	}
}

impl std::error::Error for ReadError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Self::Io(error) => Some(error),
			Self::NotSupported => None,
		}
	}
}

impl From<io::Error> for ReadError {
	fn from(error: io::Error) -> Self {
		Self::Io(error)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
	/// Read one sample at a time for a single implicit slot.
	SingleTouch,
	/// Read batches of per-slot samples. Falls back to [`Mode::SingleTouch`] if the source can't.
	MultiTouch,
}

/// Receives touch events in the order their samples were processed.
pub trait EventSink {
	fn emit(&mut self, event: TouchEvent);
}

impl EventSink for Vec<TouchEvent> {
	#[inline]
	fn emit(&mut self, event: TouchEvent) {
		self.push(event);
	}
}

impl EventSink for VecDeque<TouchEvent> {
	#[inline]
	fn emit(&mut self, event: TouchEvent) {
		self.push_back(event);
	}
}

impl<T: EventSink + ?Sized> EventSink for &mut T {
	#[inline]
	fn emit(&mut self, event: TouchEvent) {
		(**self).emit(event);
	}
}

pub struct FromFn<F>(F);

impl<F: FnMut(TouchEvent)> EventSink for FromFn<F> {
	#[inline]
	fn emit(&mut self, event: TouchEvent) {
		(self.0)(event);
	}
}

/// Use a closure as an [`EventSink`].
#[inline]
pub fn from_fn<F: FnMut(TouchEvent)>(f: F) -> FromFn<F> {
	FromFn(f)
}

/// The state of one touchscreen: the last sample of every slot, the identifier counter, and the read mode.
///
/// Nothing here is shared between instances.
#[derive(Debug)]
pub struct TouchDriver {
	mode: Mode,
	ids: IdAllocator,
	single: SlotTable<1>,
	multi: SlotTable<MAX_SLOTS>,
	batch: SampleBatch,
}

impl TouchDriver {
	#[must_use]
	pub fn new(mode: Mode) -> Self {
		Self {
			mode,
			ids: IdAllocator::new(),
			single: SlotTable::default(),
			multi: SlotTable::default(),
			batch: SampleBatch::default(),
		}
	}

	/// The current read mode. This only ever changes from multi-touch to single-touch.
	#[inline]
	#[must_use]
	pub fn mode(&self) -> Mode {
		self.mode
	}

	#[inline]
	#[must_use]
	pub fn single_touch_slots(&self) -> &SlotTable<1> {
		&self.single
	}

	#[inline]
	#[must_use]
	pub fn multi_touch_slots(&self) -> &SlotTable<MAX_SLOTS> {
		&self.multi
	}

	/// Drain every sample `source` currently has, emitting events into `sink`.
	///
	/// Returns the number of events emitted.
	///
	/// # Errors
	///
	/// [`ReadError::Io`] if the source fails.
	/// Events for samples read before the failure have already been emitted and committed.
	pub fn dispatch<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<usize, ReadError>
	where
		S: SampleSource + ?Sized,
		K: EventSink + ?Sized,
	{
		match self.mode {
			Mode::SingleTouch => self.dispatch_single(source, sink),
			Mode::MultiTouch => self.dispatch_multi(source, sink),
		}
	}

	fn dispatch_single<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<usize, ReadError>
	where
		S: SampleSource + ?Sized,
		K: EventSink + ?Sized,
	{
		let mut emitted = 0;
		while let Some(sample) = source.read_one()? {
			if let Some(event) = self.feed_single(sample) {
				tracing::trace!(id = %event.id, phase = ?event.phase, "touch event");
				sink.emit(event);
				emitted += 1;
			}
		}
		Ok(emitted)
	}

	fn dispatch_multi<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<usize, ReadError>
	where
		S: SampleSource + ?Sized,
		K: EventSink + ?Sized,
	{
		let mut emitted = 0;
		loop {
			self.batch.clear();
			let rows = match source.read_batch(&mut self.batch) {
				Ok(0) => return Ok(emitted),
				Ok(rows) => rows,
				Err(ReadError::NotSupported) => {
					tracing::warn!("source has no multi-touch support, switching to single-touch reads");
					self.mode = Mode::SingleTouch;
					return Ok(emitted + self.dispatch_single(source, sink)?);
				}
				Err(error) => return Err(error),
			};

			let Self {
				ids,
				single,
				multi,
				batch,
				..
			} = self;
			for row in batch.rows(rows) {
				for (slot, entry) in row.iter().enumerate() {
					if !entry.valid {
						continue;
					}

					let event = multi.apply(slot, entry.sample, |table| {
						ids.allocate(|id| table.holds(id) || single.holds(id))
					});
					if let Some(event) = event {
						tracing::trace!(slot, id = %event.id, phase = ?event.phase, "touch event");
						sink.emit(event);
						emitted += 1;
					}
				}
			}
		}
	}

	fn feed_single(&mut self, sample: Sample) -> Option<TouchEvent> {
		let Self {
			ids, single, multi, ..
		} = self;
		single.apply(0, sample, |table| {
			ids.allocate(|id| table.holds(id) || multi.holds(id))
		})
	}
}

#[cfg(test)]
mod tests {
	use tstouch_common::types::pos2;

	use super::*;
	use crate::sample::MtSample;
	use crate::touch::{TouchId, TouchPhase};

	/// Replays canned reads. An empty queue means nothing is available.
	#[derive(Default)]
	struct Script {
		singles: VecDeque<io::Result<Sample>>,
		batches: VecDeque<Result<Vec<Vec<(usize, MtSample)>>, ReadError>>,
		multi_touch: bool,
		batch_reads: usize,
	}

	impl Script {
		fn multi_touch() -> Self {
			Self {
				multi_touch: true,
				..Self::default()
			}
		}

		fn push_samples(&mut self, samples: impl IntoIterator<Item = Sample>) {
			self.singles.extend(samples.into_iter().map(Ok));
		}

		fn push_batch(&mut self, rows: Vec<Vec<(usize, MtSample)>>) {
			self.batches.push_back(Ok(rows));
		}
	}

	impl SampleSource for Script {
		fn read_one(&mut self) -> io::Result<Option<Sample>> {
			self.singles.pop_front().transpose()
		}

		fn read_batch(&mut self, batch: &mut SampleBatch) -> Result<usize, ReadError> {
			self.batch_reads += 1;
			if !self.multi_touch {
				return Err(ReadError::NotSupported);
			}
			let Some(rows) = self.batches.pop_front() else {
				return Ok(0);
			};
			let rows = rows?;
			for (index, row) in rows.iter().enumerate() {
				for &(slot, entry) in row {
					batch.row_mut(index)[slot] = entry;
				}
			}
			Ok(rows.len())
		}
	}

	fn sample(x: i32, y: i32, pressure: u32) -> Sample {
		Sample::new(pos2(x, y), pressure)
	}

	fn valid(x: i32, y: i32, pressure: u32) -> MtSample {
		MtSample::valid(sample(x, y, pressure))
	}

	fn invalid(x: i32, y: i32, pressure: u32) -> MtSample {
		MtSample {
			sample: sample(x, y, pressure),
			valid: false,
		}
	}

	fn begin(id: u32, x: i32, y: i32) -> TouchEvent {
		TouchEvent {
			id: TouchId(id),
			phase: TouchPhase::Begin(pos2(x, y)),
		}
	}

	fn update(id: u32, x: i32, y: i32) -> TouchEvent {
		TouchEvent {
			id: TouchId(id),
			phase: TouchPhase::Update(pos2(x, y)),
		}
	}

	fn end(id: u32) -> TouchEvent {
		TouchEvent {
			id: TouchId(id),
			phase: TouchPhase::End,
		}
	}

	fn single_touch_press() -> [Sample; 4] {
		[
			sample(0, 0, 0),
			sample(5, 5, 10),
			sample(6, 5, 12),
			sample(0, 0, 0),
		]
	}

	#[test]
	fn single_touch_press_and_release() {
		let mut driver = TouchDriver::new(Mode::SingleTouch);
		let mut source = Script::default();
		source.push_samples(single_touch_press());

		let mut events = Vec::new();
		let emitted = driver.dispatch(&mut source, &mut events).unwrap();

		assert_eq!(emitted, 3);
		assert_eq!(events, [begin(0, 5, 5), update(0, 6, 5), end(0)]);
		assert_eq!(source.batch_reads, 0);
	}

	#[test]
	fn invalid_slot_is_skipped() {
		let mut driver = TouchDriver::new(Mode::MultiTouch);
		let mut source = Script::multi_touch();
		source.push_batch(vec![vec![(0, valid(1, 1, 20)), (1, invalid(9, 9, 50))]]);

		let mut events = Vec::new();
		driver.dispatch(&mut source, &mut events).unwrap();

		assert_eq!(events, [begin(0, 1, 1)]);
		assert_eq!(
			driver.multi_touch_slots().get(1),
			SlotTable::<MAX_SLOTS>::default().get(1)
		);
	}

	#[test]
	fn invalid_entries_never_change_state() {
		let mut driver = TouchDriver::new(Mode::MultiTouch);
		let mut source = Script::multi_touch();
		source.push_batch(vec![vec![(3, valid(4, 4, 9))]]);
		let mut events = Vec::new();
		driver.dispatch(&mut source, &mut events).unwrap();
		let before = driver.multi_touch_slots().get(3);

		for pressure in [0, 1, 200] {
			source.push_batch(vec![vec![(3, invalid(70, 80, pressure))]]);
		}
		events.clear();
		driver.dispatch(&mut source, &mut events).unwrap();

		assert!(events.is_empty());
		assert_eq!(driver.multi_touch_slots().get(3), before);
	}

	#[test]
	fn batch_order_is_row_then_slot() {
		let mut driver = TouchDriver::new(Mode::MultiTouch);
		let mut source = Script::multi_touch();
		source.push_batch(vec![
			vec![(4, valid(40, 40, 1)), (2, valid(20, 20, 1))],
			vec![(2, valid(21, 20, 1)), (4, valid(0, 0, 0))],
		]);
		source.push_batch(vec![vec![(2, valid(0, 0, 0)), (4, valid(41, 41, 3))]]);

		let mut events = Vec::new();
		driver.dispatch(&mut source, &mut events).unwrap();

		assert_eq!(
			events,
			[
				begin(0, 20, 20),
				begin(1, 40, 40),
				update(0, 21, 20),
				end(1),
				end(0),
				begin(2, 41, 41),
			]
		);
		assert_eq!(source.batch_reads, 3);
	}

	#[test]
	fn ids_are_stable_and_unique() {
		let mut driver = TouchDriver::new(Mode::MultiTouch);
		let mut source = Script::multi_touch();
		let mut rows = Vec::new();
		// Staggered presses and releases over three slots.
		for step in 0..12u32 {
			let row = (0..3usize)
				.map(|slot| {
					let slot_u32 = u32::try_from(slot).unwrap();
					let pressure = u32::from((step + slot_u32) % 4 != 0);
					(slot, valid(i32::try_from(step).unwrap(), 0, pressure))
				})
				.collect();
			rows.push(row);
		}
		for chunk in rows.chunks(crate::sample::MAX_BATCH) {
			source.push_batch(chunk.to_vec());
		}

		let mut events = Vec::new();
		driver.dispatch(&mut source, &mut events).unwrap();

		let mut held: Vec<TouchId> = Vec::new();
		for event in &events {
			match event.phase {
				TouchPhase::Begin(_) => {
					assert!(!held.contains(&event.id), "{event:?} reuses a live id");
					held.push(event.id);
				}
				TouchPhase::Update(_) => assert!(held.contains(&event.id)),
				TouchPhase::End => {
					let index = held.iter().position(|&id| id == event.id).unwrap();
					held.remove(index);
				}
			}
		}
		let active: Vec<_> = driver.multi_touch_slots().active().map(|(_, id)| id).collect();
		assert_eq!(held.len(), active.len());
		assert!(active.iter().all(|id| held.contains(id)));
	}

	#[test]
	fn fresh_id_after_release() {
		let mut driver = TouchDriver::new(Mode::SingleTouch);
		let mut source = Script::default();
		source.push_samples(single_touch_press());
		source.push_samples(single_touch_press());

		let mut events = Vec::new();
		driver.dispatch(&mut source, &mut events).unwrap();

		let ids: Vec<u32> = events.iter().map(|event| event.id.get()).collect();
		assert_eq!(ids, [0, 0, 0, 1, 1, 1]);
	}

	#[test]
	fn falls_back_to_single_touch_once() {
		let mut driver = TouchDriver::new(Mode::MultiTouch);
		let mut source = Script::default();
		source.push_samples(single_touch_press());

		let mut events = Vec::new();
		driver.dispatch(&mut source, &mut events).unwrap();
		assert_eq!(driver.mode(), Mode::SingleTouch);
		assert_eq!(events, [begin(0, 5, 5), update(0, 6, 5), end(0)]);

		source.push_samples(single_touch_press());
		events.clear();
		driver.dispatch(&mut source, &mut events).unwrap();
		assert_eq!(events, [begin(1, 5, 5), update(1, 6, 5), end(1)]);
		assert_eq!(source.batch_reads, 1);
	}

	#[test]
	fn nothing_available_is_a_no_op() {
		for mode in [Mode::SingleTouch, Mode::MultiTouch] {
			let mut driver = TouchDriver::new(mode);
			let mut source = Script::multi_touch();
			source.push_batch(vec![vec![(0, valid(1, 2, 3))]]);
			source.push_samples([sample(1, 2, 3)]);
			driver.dispatch(&mut source, &mut Vec::new()).unwrap();

			let single = *driver.single_touch_slots();
			let multi = *driver.multi_touch_slots();
			let mut events = Vec::new();
			for _ in 0..3 {
				assert_eq!(driver.dispatch(&mut source, &mut events).unwrap(), 0);
			}
			assert!(events.is_empty());
			assert_eq!(*driver.single_touch_slots(), single);
			assert_eq!(*driver.multi_touch_slots(), multi);
			assert_eq!(driver.mode(), mode);
		}
	}

	#[test]
	fn read_failure_keeps_committed_state() {
		let mut driver = TouchDriver::new(Mode::MultiTouch);
		let mut source = Script::multi_touch();
		source.push_batch(vec![vec![(6, valid(3, 3, 8))]]);
		source
			.batches
			.push_back(Err(io::Error::from(io::ErrorKind::BrokenPipe).into()));
		source.push_batch(vec![vec![(6, valid(3, 4, 8))]]);

		let mut events = Vec::new();
		let error = driver.dispatch(&mut source, &mut events).unwrap_err();
		assert!(matches!(error, ReadError::Io(ref error) if error.kind() == io::ErrorKind::BrokenPipe));
		assert_eq!(events, [begin(0, 3, 3)]);
		assert_eq!(driver.multi_touch_slots().get(6).unwrap().id(), Some(TouchId(0)));
		assert_eq!(driver.mode(), Mode::MultiTouch);

		events.clear();
		driver.dispatch(&mut source, &mut events).unwrap();
		assert_eq!(events, [update(0, 3, 4)]);
	}

	#[test]
	fn single_touch_failure_is_reported() {
		let mut driver = TouchDriver::new(Mode::SingleTouch);
		let mut source = Script::default();
		source.push_samples([sample(1, 1, 1)]);
		source
			.singles
			.push_back(Err(io::Error::from(io::ErrorKind::Other)));

		let mut seen = 0;
		let result = driver.dispatch(&mut source, &mut from_fn(|_| seen += 1));
		assert!(matches!(result, Err(ReadError::Io(_))));
		assert_eq!(seen, 1);
		assert!(driver.single_touch_slots().get(0).unwrap().is_active());
	}

	#[test]
	fn ids_are_per_driver() {
		let mut first = TouchDriver::new(Mode::SingleTouch);
		let mut second = TouchDriver::new(Mode::SingleTouch);
		let mut source = Script::default();

		source.push_samples(single_touch_press());
		let mut events = Vec::new();
		first.dispatch(&mut source, &mut events).unwrap();

		source.push_samples(single_touch_press());
		let mut other = VecDeque::new();
		second.dispatch(&mut source, &mut other).unwrap();

		assert_eq!(events[0].id, TouchId(0));
		assert_eq!(other[0].id, TouchId(0));
	}

	#[test]
	fn wrapped_ids_skip_live_slots() {
		let mut driver = TouchDriver::new(Mode::MultiTouch);
		let mut source = Script::multi_touch();
		source.push_batch(vec![vec![(0, valid(1, 1, 5))]]);
		driver.dispatch(&mut source, &mut Vec::new()).unwrap();

		driver.ids = IdAllocator::starting_at(u32::MAX);
		source.push_batch(vec![vec![(1, valid(2, 2, 5)), (2, valid(3, 3, 5))]]);
		let mut events = Vec::new();
		driver.dispatch(&mut source, &mut events).unwrap();

		assert_eq!(events, [begin(u32::MAX, 2, 2), begin(1, 3, 3)]);
	}

	#[test]
	fn wrapped_ids_skip_contacts_held_before_fallback() {
		let mut driver = TouchDriver::new(Mode::MultiTouch);
		let mut source = Script::multi_touch();
		source.push_batch(vec![vec![(0, valid(1, 1, 5))]]);
		driver.dispatch(&mut source, &mut Vec::new()).unwrap();
		assert!(driver.multi_touch_slots().holds(TouchId(0)));

		driver.ids = IdAllocator::starting_at(u32::MAX);
		source.multi_touch = false;
		source.push_samples(single_touch_press());
		source.push_samples(single_touch_press());
		let mut events = Vec::new();
		driver.dispatch(&mut source, &mut events).unwrap();

		assert_eq!(driver.mode(), Mode::SingleTouch);
		let ids: Vec<u32> = events.iter().map(|event| event.id.get()).collect();
		assert_eq!(ids, [u32::MAX, u32::MAX, u32::MAX, 1, 1, 1]);
	}
}
