//! Deadline-driven door relay.
//!
//! A pulse drives the output active and arms a deadline; the controller tick
//! calls [`RelayActuator::tick`] which releases the output once the deadline
//! has passed. Nothing here sleeps, so input processing continues while the
//! door is unlocked.
//!
//! At most one pulse is active at any time. What happens to a pulse request
//! while one is active is decided by the [`BusyPolicy`].

use crate::{
    Result,
    traits::{DigitalOutput, Polarity},
};
use doorman_core::constants::{DEFAULT_RELAY_MS, MAX_RELAY_MS};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Behavior of a pulse request while a pulse is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    /// Refuse the request; the active pulse is unaffected.
    #[default]
    Reject,

    /// Keep one pending pulse and start it right after the active one.
    /// Further requests are refused while one is pending.
    Queue,
}

/// Result of a pulse request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseOutcome {
    /// Output driven active until `until`.
    Started { duration: Duration, until: Instant },

    /// Pending until the active pulse ends.
    Queued { duration: Duration },

    /// Refused because a pulse is active (and, under `Queue`, one is pending).
    Rejected,
}

/// Output change performed by the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayTransition {
    /// Output went active for `duration`.
    Activated { duration: Duration },

    /// Output went inactive at the end of a pulse.
    Deactivated,

    /// Output forced inactive by an explicit lock.
    Locked,
}

/// Relay tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    pub default_pulse: Duration,
    pub max_pulse: Duration,
    pub policy: BusyPolicy,
    pub polarity: Polarity,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            default_pulse: Duration::from_millis(DEFAULT_RELAY_MS),
            max_pulse: Duration::from_millis(MAX_RELAY_MS),
            policy: BusyPolicy::Reject,
            polarity: Polarity::ActiveHigh,
        }
    }
}

/// Exclusive, time-bounded door relay.
///
/// # Examples
///
/// ```
/// use doorman_hardware::{PulseOutcome, RelayActuator, RelayConfig, RelayTransition, mock::MockOutput};
/// use std::time::{Duration, Instant};
///
/// let (pin, handle) = MockOutput::new("relay");
/// let mut relay = RelayActuator::new(pin, RelayConfig::default());
/// let t0 = Instant::now();
///
/// assert!(matches!(relay.pulse(None, t0).unwrap(), PulseOutcome::Started { .. }));
/// assert!(handle.level());
///
/// assert_eq!(relay.tick(t0 + Duration::from_millis(499)).unwrap(), None);
/// assert_eq!(
///     relay.tick(t0 + Duration::from_millis(500)).unwrap(),
///     Some(RelayTransition::Deactivated)
/// );
/// assert!(!handle.level());
/// ```
#[derive(Debug)]
pub struct RelayActuator<O> {
    output: O,
    config: RelayConfig,
    /// Deadline of the active pulse.
    deadline: Option<Instant>,
    queued: Option<Duration>,
}

impl<O: DigitalOutput> RelayActuator<O> {
    /// Create an actuator. The output is not touched until the first pulse
    /// or lock; call [`force_off`](Self::force_off) to establish a known level.
    pub fn new(output: O, config: RelayConfig) -> Self {
        Self {
            output,
            config,
            deadline: None,
            queued: None,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Change the default pulse length used when a request has none.
    pub fn set_default_pulse(&mut self, pulse: Duration) {
        self.config.default_pulse = pulse.min(self.config.max_pulse);
    }

    /// Returns `true` while a pulse is active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.deadline.is_some()
    }

    /// Deadline of the active pulse.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` if a pulse is pending under [`BusyPolicy::Queue`].
    pub fn has_queued(&self) -> bool {
        self.queued.is_some()
    }

    /// Drive the output inactive without reporting a transition.
    ///
    /// # Errors
    ///
    /// Returns the output's write error.
    pub fn force_off(&mut self) -> Result<()> {
        self.output.write(self.config.polarity.level_for(false))?;
        self.deadline = None;
        self.queued = None;
        Ok(())
    }

    /// Request a pulse of `duration` (or the default pulse).
    ///
    /// Requests longer than the configured maximum are clamped.
    ///
    /// # Errors
    ///
    /// Returns the output's write error if activation failed; no pulse is
    /// armed in that case.
    pub fn pulse(&mut self, duration: Option<Duration>, now: Instant) -> Result<PulseOutcome> {
        let duration = duration
            .unwrap_or(self.config.default_pulse)
            .min(self.config.max_pulse);

        if self.is_active() {
            return Ok(match (self.config.policy, self.queued) {
                (BusyPolicy::Queue, None) => {
                    self.queued = Some(duration);
                    debug!(?duration, "Relay pulse queued");
                    PulseOutcome::Queued { duration }
                }
                _ => {
                    debug!(?duration, "Relay pulse rejected, relay busy");
                    PulseOutcome::Rejected
                }
            });
        }

        let until = self.activate(duration, now)?;
        Ok(PulseOutcome::Started { duration, until })
    }

    /// Service the deadline.
    ///
    /// Releases the output once the deadline is reached, or starts the
    /// queued pulse once the relay is idle. At most one transition happens
    /// per call.
    ///
    /// # Errors
    ///
    /// Returns the output's write error. A failed release keeps the pulse
    /// armed, and a queued pulse that fails to start stays queued, so the
    /// next call retries either.
    pub fn tick(&mut self, now: Instant) -> Result<Option<RelayTransition>> {
        if let Some(deadline) = self.deadline {
            if now < deadline {
                return Ok(None);
            }
            if let Err(e) = self.output.write(self.config.polarity.level_for(false)) {
                warn!(pin = self.output.name(), error = %e, "Relay release failed, retrying");
                return Err(e);
            }
            self.deadline = None;
            debug!(pin = self.output.name(), "Relay released");
            return Ok(Some(RelayTransition::Deactivated));
        }

        // The queued pulse stays pending until its activation succeeds.
        if let Some(duration) = self.queued {
            if let Err(e) = self.activate(duration, now) {
                warn!(pin = self.output.name(), error = %e, "Queued relay pulse failed to start, retrying");
                return Err(e);
            }
            self.queued = None;
            return Ok(Some(RelayTransition::Activated { duration }));
        }

        Ok(None)
    }

    /// Force the output inactive immediately and drop any queued pulse.
    ///
    /// # Errors
    ///
    /// Returns the output's write error. The pulse then stays armed with an
    /// expired deadline, so the next [`tick`](Self::tick) retries the release.
    pub fn lock(&mut self, now: Instant) -> Result<RelayTransition> {
        self.queued = None;
        if let Err(e) = self.output.write(self.config.polarity.level_for(false)) {
            if self.deadline.is_some() {
                self.deadline = Some(now);
            }
            warn!(pin = self.output.name(), error = %e, "Relay lock failed");
            return Err(e);
        }
        self.deadline = None;
        debug!(pin = self.output.name(), "Relay locked");
        Ok(RelayTransition::Locked)
    }

    fn activate(&mut self, duration: Duration, now: Instant) -> Result<Instant> {
        self.output.write(self.config.polarity.level_for(true))?;
        let until = now + duration;
        self.deadline = Some(until);
        debug!(pin = self.output.name(), ?duration, "Relay activated");
        Ok(until)
    }
}
