//! Mock pin implementations for testing and development.
//!
//! Each mock is created together with a handle that shares its state, so a
//! test (or the console simulator) can drive input levels and observe output
//! levels while the controller owns the pin.

pub mod input;
pub mod output;

// Re-export commonly used types
pub use input::{MockInput, MockInputHandle};
pub use output::{MockOutput, MockOutputHandle};
