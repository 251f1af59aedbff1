//! Core constants for the door controller.
//!
//! This module collects the timing thresholds, capacities and defaults shared
//! by the decoder, the input classifiers, the relay and the settings layer.
//! Keeping them in one place ensures the persisted defaults, the controller
//! tuning and the tests agree on the same numbers.
//!
//! # Usage
//!
//! ```
//! use doorman_core::constants::*;
//! use std::time::Duration;
//!
//! let pulse = Duration::from_millis(DEFAULT_RELAY_MS);
//! assert_eq!(pulse.as_millis(), 500);
//!
//! assert!(SUPPORTED_FRAME_LENGTHS.contains(&26));
//! ```

// ============================================================================
// Wiegand Framing
// ============================================================================

/// Frame lengths (in bits) the decoder accepts.
///
/// | Bits | Layout |
/// |------|--------|
/// | 26 | `P` + 24 data bits + `P` |
/// | 34 | `P` + 32 data bits + `P` |
/// | 36 | `P` + 34 data bits + `P` |
///
/// The leading bit is even parity over the first half of the data bits and
/// the trailing bit is odd parity over the second half.
pub const SUPPORTED_FRAME_LENGTHS: [usize; 3] = [26, 34, 36];

/// Silence on both data lines that completes a frame (milliseconds).
///
/// Readers clock bits roughly every 1-2 ms; 25 ms of silence reliably marks
/// the end of a presentation.
///
/// # Value: 25ms
pub const FRAME_GAP_MS: u64 = 25;

/// Maximum number of bits buffered for a single frame.
///
/// Edges beyond this count mark the frame as overflowed; it is discarded
/// when the gap elapses.
///
/// # Value: 64 bits
pub const MAX_FRAME_BITS: usize = 64;

/// Capacity of the interrupt-to-decoder edge queue.
///
/// Two full 36-bit frames fit without the poll loop running.
pub const EDGE_QUEUE_CAPACITY: usize = 128;

// ============================================================================
// Relay
// ============================================================================

/// Default relay pulse length (milliseconds).
///
/// # Value: 500ms
///
/// # Examples
///
/// ```
/// use doorman_core::constants::DEFAULT_RELAY_MS;
/// use std::time::Duration;
///
/// let pulse = Duration::from_millis(DEFAULT_RELAY_MS);
/// assert_eq!(pulse.as_millis(), 500);
/// ```
pub const DEFAULT_RELAY_MS: u64 = 500;

/// Longest pulse a rule or command may request (milliseconds).
///
/// Requests above this are clamped so a typo in a rule cannot hold the
/// door open indefinitely.
///
/// # Value: 30000ms (30 seconds)
pub const MAX_RELAY_MS: u64 = 30_000;

// ============================================================================
// Digital Inputs
// ============================================================================

/// Default debounce window for the door, aux and reset inputs (milliseconds).
///
/// # Value: 20ms
pub const DEFAULT_DEBOUNCE_MS: u64 = 20;

/// Reset button hold that requests a reboot (milliseconds).
///
/// # Value: 5000ms
pub const RESET_SHORT_HOLD_MS: u64 = 5_000;

/// Reset button hold that requests a factory reset (milliseconds).
///
/// # Value: 29500ms
pub const RESET_LONG_HOLD_MS: u64 = 29_500;

/// Rule param for an exit switch press.
pub const GPIO_AUX: &str = "aux";

/// Rule param for the door contact closing.
pub const GPIO_DOOR_CLOSED: &str = "door_closed";

/// Rule param for the door contact opening.
pub const GPIO_DOOR_OPEN: &str = "door_open";

// ============================================================================
// Scheduling
// ============================================================================

/// Default controller tick interval (milliseconds).
///
/// # Value: 10ms
pub const DEFAULT_TICK_MS: u64 = 10;

/// Longest accepted `schedule` rule interval (seconds).
///
/// # Value: 604800s (one week)
pub const MAX_SCHEDULE_SECS: u64 = 7 * 24 * 60 * 60;

// ============================================================================
// Event Log
// ============================================================================

/// Number of entries kept in the ring log.
///
/// # Value: 50 entries
pub const LOG_CAPACITY: usize = 50;

// ============================================================================
// Settings Defaults
// ============================================================================

/// Admin code used until one is configured.
pub const DEFAULT_ADMIN_CODE: &str = "9792";

/// Device identity used until one is configured.
///
/// The identity scopes the MQTT topic namespace (`doors/<device_id>/...`).
pub const DEFAULT_DEVICE_ID: &str = "door";

/// Default MQTT broker port.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Root segment of every MQTT topic.
pub const TOPIC_ROOT: &str = "doors";
