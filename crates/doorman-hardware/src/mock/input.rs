//! Mock digital input.

use crate::{HardwareError, Result, traits::DigitalInput};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

#[derive(Debug)]
struct PinState {
    level: AtomicBool,
    fail_reads: AtomicBool,
}

/// Mock input pin whose level is set through a [`MockInputHandle`].
///
/// # Examples
///
/// ```
/// use doorman_hardware::{DigitalInput, mock::MockInput};
///
/// let (mut pin, handle) = MockInput::new("reset", true);
/// assert!(pin.read().unwrap());
///
/// handle.set_level(false);
/// assert!(!pin.read().unwrap());
/// ```
#[derive(Debug)]
pub struct MockInput {
    name: String,
    state: Arc<PinState>,
}

impl MockInput {
    /// Create a mock input with the given initial raw level.
    pub fn new(name: impl Into<String>, level: bool) -> (Self, MockInputHandle) {
        let state = Arc::new(PinState {
            level: AtomicBool::new(level),
            fail_reads: AtomicBool::new(false),
        });
        let name = name.into();

        let handle = MockInputHandle {
            name: name.clone(),
            state: Arc::clone(&state),
        };
        (Self { name, state }, handle)
    }
}

impl DigitalInput for MockInput {
    fn read(&mut self) -> Result<bool> {
        if self.state.fail_reads.load(Ordering::Acquire) {
            return Err(HardwareError::read_failed(&self.name, "simulated fault"));
        }
        Ok(self.state.level.load(Ordering::Acquire))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Handle for driving a [`MockInput`].
#[derive(Debug, Clone)]
pub struct MockInputHandle {
    name: String,
    state: Arc<PinState>,
}

impl MockInputHandle {
    /// Set the raw electrical level.
    pub fn set_level(&self, level: bool) {
        self.state.level.store(level, Ordering::Release);
    }

    /// Current raw electrical level.
    pub fn level(&self) -> bool {
        self.state.level.load(Ordering::Acquire)
    }

    /// Make subsequent reads fail until cleared.
    pub fn set_failing(&self, failing: bool) {
        self.state.fail_reads.store(failing, Ordering::Release);
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
