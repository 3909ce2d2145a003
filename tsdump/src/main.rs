use std::io;

use tokio::pin;
use tokio_stream::StreamExt as _;
use tstouch_protocol::client::recv::Event;

#[tokio::main(flavor = "current_thread")]
async fn main() {
	tracing_subscriber::fmt::init();

	let socket_path = std::env::var_os("TSTOUCH_SOCKET").expect("missing TSTOUCH_SOCKET env var");
	let socket = tokio::net::UnixStream::connect(&socket_path)
		.await
		.unwrap_or_else(|error| panic!("connecting to {socket_path:?} (TSTOUCH_SOCKET): {error}"));
	let events = tstouch_protocol::read_stream::<_, Event>(socket);
	pin!(events);

	let mut bounds = None;

	while let Some(res) = events.next().await {
		let event = match res {
			Ok(event) => event,
			Err(ciborium::de::Error::Io(error)) if error.kind() == io::ErrorKind::UnexpectedEof => {
				tracing::info!("daemon closed the connection");
				break;
			}
			Err(error) => {
				tracing::error!(?error, "reading from daemon");
				break;
			}
		};

		match event {
			Event::Device(caps) => {
				tracing::info!(
					name = ?caps.name,
					multitouch = caps.multitouch(),
					max_touches = caps.max_touches,
					x = ?caps.x,
					y = ?caps.y,
					width = caps.x.span(),
					height = caps.y.span(),
					"device"
				);
				bounds = Some((caps.x, caps.y));
			}
			Event::Touch(touch) => {
				if let (Some(pos), Some((x, y))) = (touch.position(), bounds) {
					if !x.contains(pos.x) || !y.contains(pos.y) {
						tracing::warn!(id = %touch.id, %pos, "position outside the reported axis range");
					}
				}
				tracing::info!(id = %touch.id, phase = ?touch.phase, "touch");
			}
			Event::Quit => {
				tracing::info!("daemon is shutting down");
				break;
			}
		}
	}
}
