use std::io;

#[cfg(feature = "input-impl")]
pub use self::device::EvdevSource;
pub use self::frame::{DecodedSource, EventReader, FrameDecoder, RawEvent};
use crate::driver::ReadError;
use crate::sample::{Sample, SampleBatch};

#[cfg(feature = "input-impl")]
mod device;
pub mod frame;

/// Where samples come from.
///
/// Both reads must return promptly when nothing is pending rather than wait for the device.
pub trait SampleSource {
	/// Read one single-touch sample, or `None` if none is available right now.
	/// Like an empty batch, `None` means the source is drained.
	///
	/// # Errors
	///
	/// Any I/O error from the underlying device.
	fn read_one(&mut self) -> io::Result<Option<Sample>>;

	/// Fill up to [`MAX_BATCH`](crate::MAX_BATCH) rows of `batch`, returning how many were filled.
	/// Zero means nothing is available right now, and callers may wait for new input after seeing it.
	/// Entries the source has no new data for must be left invalid.
	///
	/// # Errors
	///
	/// [`ReadError::NotSupported`] if this source can never produce multi-touch data,
	/// otherwise [`ReadError::Io`].
	fn read_batch(&mut self, batch: &mut SampleBatch) -> Result<usize, ReadError>;
}

impl<T: SampleSource + ?Sized> SampleSource for &mut T {
	#[inline]
	fn read_one(&mut self) -> io::Result<Option<Sample>> {
		(**self).read_one()
	}

	#[inline]
	fn read_batch(&mut self, batch: &mut SampleBatch) -> Result<usize, ReadError> {
		(**self).read_batch(batch)
	}
}
