//! Digital I/O trait definitions.
//!
//! The door controller only needs boolean level reads and writes: the door
//! contact, the auxiliary exit switch and the reset button are inputs, the
//! relay and the status LED are outputs. These traits are the seam between
//! the controller and a board support layer; [`crate::mock`] provides
//! in-memory pins for development and testing.
//!
//! The traits are synchronous and object-safe. They are called from the
//! controller tick, which must never await on a pin.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Electrical level that counts as "active".
///
/// The door, aux and reset inputs are wired to ground with internal
/// pull-ups, so they read low when active.
///
/// # Examples
///
/// ```
/// use doorman_hardware::Polarity;
///
/// assert!(Polarity::ActiveLow.is_active(false));
/// assert!(Polarity::ActiveHigh.is_active(true));
/// assert_eq!(Polarity::ActiveLow.level_for(true), false);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    ActiveHigh,
    #[default]
    ActiveLow,
}

impl Polarity {
    /// Map a raw electrical level to the logical active state.
    #[inline]
    #[must_use]
    pub fn is_active(self, level: bool) -> bool {
        match self {
            Polarity::ActiveHigh => level,
            Polarity::ActiveLow => !level,
        }
    }

    /// Raw electrical level that represents `active`.
    #[inline]
    #[must_use]
    pub fn level_for(self, active: bool) -> bool {
        self.is_active(active)
    }
}

/// A digital input pin.
///
/// # Examples
///
/// ```
/// use doorman_hardware::{DigitalInput, mock::MockInput};
///
/// let (mut pin, handle) = MockInput::new("door", true);
/// handle.set_level(false);
/// assert_eq!(pin.read().unwrap(), false);
/// ```
pub trait DigitalInput: Send {
    /// Read the raw electrical level.
    ///
    /// # Errors
    ///
    /// Returns an error if the pin cannot be read.
    fn read(&mut self) -> Result<bool>;

    /// Human-readable pin name for logs.
    fn name(&self) -> &str;
}

/// A digital output pin.
pub trait DigitalOutput: Send {
    /// Drive the raw electrical level.
    ///
    /// # Errors
    ///
    /// Returns an error if the level could not be applied. The caller must
    /// assume the previous level is still present.
    fn write(&mut self, level: bool) -> Result<()>;

    /// Human-readable pin name for logs.
    fn name(&self) -> &str;
}

impl<T: DigitalInput + ?Sized> DigitalInput for Box<T> {
    fn read(&mut self) -> Result<bool> {
        (**self).read()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: DigitalOutput + ?Sized> DigitalOutput for Box<T> {
    fn write(&mut self, level: bool) -> Result<()> {
        (**self).write(level)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// An input read through its polarity.
#[derive(Debug)]
pub struct ActiveInput<I> {
    pin: I,
    polarity: Polarity,
}

impl<I: DigitalInput> ActiveInput<I> {
    pub fn new(pin: I, polarity: Polarity) -> Self {
        Self { pin, polarity }
    }

    /// Read the logical active state.
    ///
    /// # Errors
    ///
    /// Propagates the pin's read error.
    pub fn is_active(&mut self) -> Result<bool> {
        Ok(self.polarity.is_active(self.pin.read()?))
    }

    pub fn name(&self) -> &str {
        self.pin.name()
    }
}
