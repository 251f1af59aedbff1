//! Mock digital output.

use crate::{HardwareError, Result, traits::DigitalOutput};
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

#[derive(Debug, Default)]
struct PinState {
    level: AtomicBool,
    writes: AtomicUsize,
    rising_edges: AtomicUsize,
    fail_next: AtomicUsize,
}

/// Mock output pin observed through a [`MockOutputHandle`].
///
/// # Examples
///
/// ```
/// use doorman_hardware::{DigitalOutput, mock::MockOutput};
///
/// let (mut relay, handle) = MockOutput::new("relay");
/// relay.write(true).unwrap();
/// assert!(handle.level());
/// assert_eq!(handle.activation_count(), 1);
/// ```
#[derive(Debug)]
pub struct MockOutput {
    name: String,
    state: Arc<PinState>,
}

impl MockOutput {
    /// Create a mock output, initially low.
    pub fn new(name: impl Into<String>) -> (Self, MockOutputHandle) {
        let state = Arc::new(PinState::default());
        let name = name.into();

        let handle = MockOutputHandle {
            name: name.clone(),
            state: Arc::clone(&state),
        };
        (Self { name, state }, handle)
    }
}

impl DigitalOutput for MockOutput {
    fn write(&mut self, level: bool) -> Result<()> {
        let pending = self.state.fail_next.load(Ordering::Acquire);
        if pending > 0 {
            self.state.fail_next.store(pending - 1, Ordering::Release);
            return Err(HardwareError::write_failed(&self.name, "simulated fault"));
        }

        let previous = self.state.level.swap(level, Ordering::AcqRel);
        if level && !previous {
            self.state.rising_edges.fetch_add(1, Ordering::AcqRel);
        }
        self.state.writes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Handle for observing a [`MockOutput`].
#[derive(Debug, Clone)]
pub struct MockOutputHandle {
    name: String,
    state: Arc<PinState>,
}

impl MockOutputHandle {
    /// Current raw electrical level.
    pub fn level(&self) -> bool {
        self.state.level.load(Ordering::Acquire)
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> usize {
        self.state.writes.load(Ordering::Acquire)
    }

    /// Number of low-to-high transitions.
    pub fn activation_count(&self) -> usize {
        self.state.rising_edges.load(Ordering::Acquire)
    }

    /// Make the next `count` writes fail.
    pub fn fail_next_writes(&self, count: usize) {
        self.state.fail_next.store(count, Ordering::Release);
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracks_level_and_edges() {
        let (mut pin, handle) = MockOutput::new("led");
        pin.write(true).unwrap();
        pin.write(true).unwrap();
        pin.write(false).unwrap();
        pin.write(true).unwrap();

        assert!(handle.level());
        assert_eq!(handle.write_count(), 4);
        assert_eq!(handle.activation_count(), 2);
    }

    #[test]
    fn test_failing_writes_keep_level() {
        let (mut pin, handle) = MockOutput::new("relay");
        pin.write(true).unwrap();

        handle.fail_next_writes(2);
        assert!(pin.write(false).is_err());
        assert!(pin.write(false).is_err());
        assert!(handle.level());

        pin.write(false).unwrap();
        assert!(!handle.level());
    }
}
