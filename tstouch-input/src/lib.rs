#![deny(
	absolute_paths_not_starting_with_crate,
	keyword_idents,
	macro_use_extern_crate,
	meta_variable_misuse,
	missing_abi,
	missing_copy_implementations,
	non_ascii_idents,
	nonstandard_style,
	noop_method_call,
	rust_2018_idioms,
	unused_qualifications
)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

//! Translation of raw touchscreen samples into touch lifecycle events.
//!
//! A [`SampleSource`] yields either single samples or batches of per-slot samples.
//! A [`TouchDriver`] keeps the last known state of every contact slot and turns each new sample into a
//! [`TouchEvent`] (begin, update, or end) which is handed to an [`EventSink`].

pub mod caps;
pub mod driver;
pub mod sample;
pub mod source;
pub mod touch;

pub use self::caps::{Axis, Capabilities, ProbeError};
pub use self::driver::{EventSink, Mode, ReadError, TouchDriver};
pub use self::sample::{MtSample, Sample, SampleBatch, MAX_BATCH, MAX_SLOTS};
#[cfg(feature = "input-impl")]
pub use self::source::EvdevSource;
pub use self::source::SampleSource;
pub use self::touch::{TouchEvent, TouchId, TouchPhase};
