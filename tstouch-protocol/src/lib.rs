//! Implements a simple message protocol where messages are a little-endian u32 of the payload length followed by a CBOR payload.

use std::io;

use futures_util::FutureExt as _;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt as _, AsyncWrite, AsyncWriteExt as _};
use tokio_stream::Stream;

pub type ReadError = ciborium::de::Error<io::Error>;

/// Longest payload either side will accept. A device description, the largest message, is far below this.
pub const MAX_MESSAGE_LEN: u32 = 64 * 1024;

fn too_large(kind: io::ErrorKind, len: impl std::fmt::Display) -> io::Error {
	io::Error::new(kind, format!("message of {len} bytes exceeds the {MAX_MESSAGE_LEN} byte limit"))
}

async fn read_payload<T: AsyncRead + Unpin>(reader: &mut T) -> io::Result<Vec<u8>> {
	let len = reader.read_u32_le().await?;
	if len > MAX_MESSAGE_LEN {
		return Err(too_large(io::ErrorKind::InvalidData, len));
	}
	let len = usize::try_from(len).map_err(|_| too_large(io::ErrorKind::InvalidData, len))?;

	let mut payload = vec![0u8; len];
	reader.read_exact(&mut payload).await?;
	Ok(payload)
}

/// Reads one message and hands the reader back, so reads can be chained into a stream.
async fn read_owned<T: AsyncRead + Unpin, Item: DeserializeOwned>(
	mut reader: T,
) -> (Result<Item, ReadError>, T) {
	let result = match read_payload(&mut reader).await {
		Ok(payload) => ciborium::from_reader(payload.as_slice()),
		Err(error) => Err(error.into()),
	};
	(result, reader)
}

/// # Errors
///
/// I/O errors (including `UnexpectedEof` when the peer hangs up), oversized frames, or a payload that doesn't decode as `Item`.
pub async fn read<T: AsyncRead + Unpin, Item: DeserializeOwned>(
	reader: T,
) -> Result<Item, ReadError> {
	read_owned(reader).await.0
}

/// This is useful because [`read`] is not cancel-safe while this `Stream` implementation necessarily is.
/// So if you want to use [`read`] in a `select!` arm, use this function instead.
#[inline]
pub fn read_stream<'a, T: AsyncRead + Unpin + 'a, Item: DeserializeOwned + 'a>(
	reader: T,
) -> impl Stream<Item = Result<Item, ReadError>> + 'a {
	futures_util::stream::unfold(reader, move |reader| read_owned(reader).map(Some))
}

fn encode<Item: Serialize + ?Sized>(message: &Item) -> io::Result<Vec<u8>> {
	// Length placeholder, patched once the payload size is known.
	let mut frame = vec![0u8; 4];
	ciborium::into_writer(message, &mut frame).map_err(|error| match error {
		ciborium::ser::Error::Io(error) => error,
		ciborium::ser::Error::Value(message) => io::Error::new(io::ErrorKind::InvalidInput, message),
	})?;

	let payload_len = frame.len() - 4;
	let len = u32::try_from(payload_len)
		.ok()
		.filter(|&len| len <= MAX_MESSAGE_LEN)
		.ok_or_else(|| too_large(io::ErrorKind::InvalidInput, payload_len))?;
	frame[..4].copy_from_slice(&len.to_le_bytes());
	Ok(frame)
}

/// Write one message as a single frame.
///
/// # Errors
///
/// I/O errors from `writer`, or a message that can't be encoded within [`MAX_MESSAGE_LEN`].
pub async fn write<T: AsyncWrite + Unpin, Item: Serialize + ?Sized>(
	mut writer: T,
	message: &Item,
) -> io::Result<()> {
	writer.write_all(&encode(message)?).await
}

mod internal {
	pub mod server_to_client {
		use serde::{Deserialize, Serialize};
		use tstouch_input::{Capabilities, TouchEvent};

		#[derive(Debug, Clone, Serialize, Deserialize)]
		pub enum Event {
			/// Sent once, first, to every client.
			Device(Capabilities),
			Touch(TouchEvent),
			/// The daemon is shutting down.
			Quit,
		}
	}
}

pub mod server {
	pub use crate::internal::server_to_client as send;
}

pub mod client {
	pub use crate::internal::server_to_client as recv;
}
