use std::path::PathBuf;
use std::time::Duration;

use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tokio::net::{UnixListener, UnixStream};
use tokio::select;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tracing_subscriber::filter::LevelFilter;
use tstouch_input::driver::from_fn;
use tstouch_input::{Capabilities, EvdevSource, Mode, ReadError, TouchDriver};
use tstouch_protocol::server::send::Event;

/// How many events a client may fall behind before it starts missing them.
const EVENT_BACKLOG: usize = 256;
/// How long clients get to receive the final `Quit`.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Serve touch events from a touchscreen to local clients.
#[derive(argh::FromArgs, Debug)]
struct Args {
	/// the touchscreen device node
	#[argh(option)]
	path: Option<PathBuf>,
	/// the touchscreen device node, used if --path is not given
	#[argh(option)]
	device: Option<PathBuf>,
	/// the path of the socket, which will be bound to and exposed for clients
	#[argh(option)]
	control_socket: PathBuf,
	/// never attempt multi-touch reads
	#[argh(switch)]
	single_touch: bool,
	/// log at debug level
	#[argh(switch, short = 'v')]
	verbose: bool,
}

async fn serve_client(
	mut client: UnixStream,
	capabilities: Capabilities,
	events: broadcast::Receiver<Event>,
) {
	if let Err(error) = tstouch_protocol::write(&mut client, &Event::Device(capabilities)).await {
		tracing::debug!(?error, "client left before the device description");
		return;
	}

	let mut events = BroadcastStream::new(events);
	while let Some(res) = events.next().await {
		let event = match res {
			Ok(event) => event,
			Err(BroadcastStreamRecvError::Lagged(skipped)) => {
				tracing::warn!(skipped, "client fell behind, events were dropped");
				continue;
			}
		};

		let quit = matches!(event, Event::Quit);
		if let Err(error) = tstouch_protocol::write(&mut client, &event).await {
			tracing::debug!(?error, "dropping client");
			return;
		}
		if quit {
			return;
		}
	}
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
	let args: Args = argh::from_env();

	tracing_subscriber::fmt::fmt()
		.with_max_level(if args.verbose {
			LevelFilter::DEBUG
		} else {
			LevelFilter::INFO
		})
		.init();

	let Some(path) = args.path.or(args.device) else {
		tracing::error!("no touchscreen given, pass --path or --device");
		std::process::exit(2);
	};

	let source = EvdevSource::open(&path)
		.unwrap_or_else(|error| panic!("opening touchscreen at {path:?}: {error}"));
	let capabilities = source.capabilities().clone();
	tracing::info!(
		?path,
		name = ?capabilities.name,
		multitouch = capabilities.multitouch(),
		x = ?capabilities.x,
		y = ?capabilities.y,
		"touchscreen ready"
	);

	let mode = if args.single_touch {
		Mode::SingleTouch
	} else {
		Mode::MultiTouch
	};
	let mut driver = TouchDriver::new(mode);

	_ = std::fs::remove_file(&args.control_socket);
	let listener = UnixListener::bind(&args.control_socket)
		.unwrap_or_else(|error| panic!("opening socket at {:?}: {error}", args.control_socket));
	tracing::info!(socket = ?args.control_socket, ?mode, "listening");

	let mut source = AsyncFd::with_interest(source, Interest::READABLE)
		.unwrap_or_else(|error| panic!("registering touchscreen with the runtime: {error}"));
	let mut terminate =
		signal(SignalKind::terminate()).unwrap_or_else(|error| panic!("installing SIGTERM handler: {error}"));

	let (events, _) = broadcast::channel(EVENT_BACKLOG);
	let mut clients = JoinSet::new();

	loop {
		select! {
			res = listener.accept() => match res {
				Ok((client, _)) => {
					tracing::debug!(clients = clients.len() + 1, "client connected");
					clients.spawn(serve_client(client, capabilities.clone(), events.subscribe()));
				}
				Err(error) => tracing::warn!(?error, "accepting client"),
			},
			Some(_) = clients.join_next(), if !clients.is_empty() => {}
			res = source.readable_mut() => {
				let mut guard = match res {
					Ok(guard) => guard,
					Err(error) => {
						tracing::error!(?error, "waiting for the touchscreen");
						break;
					}
				};

				let mut sink = from_fn(|event| {
					tracing::debug!(?event, "touch");
					// No receivers is fine.
					_ = events.send(Event::Touch(event));
				});
				match driver.dispatch(guard.get_inner_mut(), &mut sink) {
					// The source only returns once the device would block.
					Ok(_) => guard.clear_ready(),
					Err(ReadError::Io(error)) if error.raw_os_error() == Some(libc::ENODEV) => {
						tracing::error!("touchscreen disconnected");
						break;
					}
					Err(error) => tracing::error!(%error, "reading touchscreen"),
				}
			}
			_ = tokio::signal::ctrl_c() => {
				tracing::info!("interrupted");
				break;
			}
			_ = terminate.recv() => {
				tracing::info!("terminated");
				break;
			}
		}
	}

	_ = events.send(Event::Quit);
	drop(listener);
	_ = std::fs::remove_file(&args.control_socket);

	let drain = async { while clients.join_next().await.is_some() {} };
	if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
		tracing::debug!(remaining = clients.len(), "abandoning slow clients");
	}
}
