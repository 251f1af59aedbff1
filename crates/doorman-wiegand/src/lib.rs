//! Wiegand credential decoding.
//!
//! Card readers report a presentation as a burst of falling edges on two
//! data lines, D0 for a `0` bit and D1 for a `1` bit. This crate turns that
//! burst into a [`Credential`](doorman_core::Credential):
//!
//! - [`EdgeQueue`] moves edges from the capture context to the poll loop
//!   without blocking either side.
//! - [`WiegandDecoder`] accumulates bits and closes a frame after 25 ms of
//!   silence.
//! - [`BitFrame`] validates parity and extracts the code; it also builds
//!   edge sequences for simulated readers.
//!
//! # Examples
//!
//! ```
//! use doorman_core::WiegandMode;
//! use doorman_wiegand::{BitFrame, DecodeEvent, DecoderConfig, WiegandDecoder};
//! use std::time::{Duration, Instant};
//!
//! let config = DecoderConfig::default().with_mode(WiegandMode::Fixed(34));
//! let (mut decoder, _edges) = WiegandDecoder::new(config);
//!
//! let start = Instant::now();
//! for edge in BitFrame::encode(42, 26).unwrap().edges(start, Duration::from_millis(2)) {
//!     decoder.on_edge(edge.line, edge.at);
//! }
//!
//! let event = decoder.poll(start + Duration::from_millis(200));
//! assert!(matches!(event, Some(DecodeEvent::Ignored { bits: 26, .. })));
//! ```

pub mod decoder;
pub mod edge_queue;
pub mod error;
pub mod frame;

pub use decoder::{DecodeEvent, DecoderConfig, WiegandDecoder};
pub use edge_queue::{EdgeQueue, EdgeReceiver, EdgeSender};
pub use error::{DecodeError, Result, WiegandError};
pub use frame::{BitFrame, Edge};
