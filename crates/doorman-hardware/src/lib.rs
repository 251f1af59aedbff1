//! Physical I/O abstraction for the door controller.
//!
//! This crate provides the boolean pin traits the controller talks to and
//! the three pieces of time-based I/O logic that sit directly on top of them:
//!
//! - [`DebouncedInput`], [`EdgeDetector`] and [`HoldClassifier`] turn raw
//!   input levels into classified events (door contact, exit switch, reset
//!   button).
//! - [`RelayActuator`] drives the door relay for a bounded pulse, checked
//!   against a deadline on every tick instead of sleeping.
//!
//! # Design Philosophy
//!
//! - **Tick-driven**: nothing blocks; every component is advanced by the
//!   caller passing `now`, which also makes timing fully testable.
//! - **Object-safe**: [`DigitalInput`] and [`DigitalOutput`] are synchronous
//!   and can be used as `Box<dyn DigitalInput>`.
//! - **Error-aware**: pin operations return [`Result<T>`][error::Result];
//!   the relay retries a failed release on the next tick.
//!
//! # Example
//!
//! ```
//! use doorman_hardware::{EdgeDetector, InputEdge, Polarity, mock::MockInput, DigitalInput};
//! use std::time::{Duration, Instant};
//!
//! let (mut pin, handle) = MockInput::new("aux", true);
//! let mut aux = EdgeDetector::new(Duration::ZERO, false);
//! let now = Instant::now();
//!
//! handle.set_level(false);
//! let active = Polarity::ActiveLow.is_active(pin.read().unwrap());
//! assert_eq!(aux.poll(active, now), Some(InputEdge::Pressed));
//! ```

pub mod error;
pub mod input;
pub mod mock;
pub mod relay;
pub mod traits;

// Re-export commonly used types for convenience
pub use error::{HardwareError, Result};
pub use input::{
    DebouncedInput, EdgeDetector, HoldClassifier, HoldEvent, HoldState, HoldThresholds,
    InputEdge, InputState,
};
pub use relay::{BusyPolicy, PulseOutcome, RelayActuator, RelayConfig, RelayTransition};
pub use traits::{ActiveInput, DigitalInput, DigitalOutput, Polarity};
