use tstouch_common::types::Pos2;

/// The number of concurrent contacts tracked in multi-touch mode.
pub const MAX_SLOTS: usize = 15;
/// The number of multi-touch frames requested from the source per batch read.
pub const MAX_BATCH: usize = 5;

/// One reading for one contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sample {
	pub pos: Pos2,
	/// Pressure, or any equivalent contact value. Zero means no contact.
	pub pressure: u32,
}

impl Sample {
	#[inline]
	#[must_use]
	pub const fn new(pos: Pos2, pressure: u32) -> Self {
		Self { pos, pressure }
	}

	#[inline]
	#[must_use]
	pub const fn is_contact(&self) -> bool {
		self.pressure > 0
	}
}

/// One slot's entry in a multi-touch batch. The slot index is the column the entry sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MtSample {
	pub sample: Sample,
	/// Whether this entry carries new data. Invalid entries are skipped entirely.
	pub valid: bool,
}

impl MtSample {
	#[inline]
	#[must_use]
	pub const fn valid(sample: Sample) -> Self {
		Self {
			sample,
			valid: true,
		}
	}
}

/// Storage for one batch read, allocated once and reused.
#[derive(Debug, Clone)]
pub struct SampleBatch {
	rows: Box<[[MtSample; MAX_SLOTS]; MAX_BATCH]>,
}

impl Default for SampleBatch {
	fn default() -> Self {
		Self {
			rows: Box::new([[MtSample::default(); MAX_SLOTS]; MAX_BATCH]),
		}
	}
}

impl SampleBatch {
	/// Mark every entry invalid.
	pub fn clear(&mut self) {
		for row in self.rows.iter_mut() {
			row.fill(MtSample::default());
		}
	}

	/// # Panics
	///
	/// If `index >= MAX_BATCH`.
	#[inline]
	#[must_use]
	pub fn row(&self, index: usize) -> &[MtSample; MAX_SLOTS] {
		&self.rows[index]
	}

	/// # Panics
	///
	/// If `index >= MAX_BATCH`.
	#[inline]
	pub fn row_mut(&mut self, index: usize) -> &mut [MtSample; MAX_SLOTS] {
		&mut self.rows[index]
	}

	/// The first `len` rows, clamped to the batch capacity.
	#[inline]
	#[must_use]
	pub fn rows(&self, len: usize) -> &[[MtSample; MAX_SLOTS]] {
		&self.rows[..len.min(MAX_BATCH)]
	}
}

#[test]
fn test_batch_clear() {
	use tstouch_common::types::pos2;

	let mut batch = SampleBatch::default();
	batch.row_mut(2)[7] = MtSample::valid(Sample::new(pos2(1, 2), 3));
	assert!(batch.row(2)[7].valid);
	assert_eq!(batch.rows(99).len(), MAX_BATCH);

	batch.clear();
	assert!(batch.rows(MAX_BATCH).iter().flatten().all(|entry| !entry.valid));
}
