//! Debounced digital input classification.
//!
//! Raw levels from the door contact, the exit switch and the reset button
//! bounce for a few milliseconds on every transition. [`DebouncedInput`]
//! filters those into stable transitions; [`EdgeDetector`] and
//! [`HoldClassifier`] turn the stable level into events.
//!
//! All three are plain state machines driven by `poll(level, now)` from the
//! controller tick. They never read pins themselves; the caller passes the
//! logical active level (see [`Polarity`](crate::Polarity)).
//!
//! # Hold classification
//!
//! ```text
//! Released ──press──▶ Pressed ──≥ short──▶ ShortHeld ──≥ long──▶ LongHeld
//!    ▲                   │                     │                    │
//!    └───────────────────┴──────release────────┴────────────────────┘
//! ```
//!
//! Each threshold fires once per press cycle. Releasing cancels any threshold
//! not yet reached; the next press re-arms both.

use doorman_core::constants::{DEFAULT_DEBOUNCE_MS, RESET_LONG_HOLD_MS, RESET_SHORT_HOLD_MS};
use std::time::{Duration, Instant};

/// Per-input state owned by its classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputState {
    /// Debounced logical level (`true` = active).
    pub current_level: bool,

    /// When the current level started, if it has ever changed.
    pub last_transition: Option<Instant>,

    /// When the current press started, while the input is active.
    pub press_start: Option<Instant>,
}

impl InputState {
    fn new(level: bool) -> Self {
        Self {
            current_level: level,
            last_transition: None,
            press_start: None,
        }
    }
}

/// Level filter that accepts a change only after it has been stable for the
/// debounce window.
///
/// A window of zero accepts every change immediately.
///
/// # Examples
///
/// ```
/// use doorman_hardware::DebouncedInput;
/// use std::time::{Duration, Instant};
///
/// let start = Instant::now();
/// let mut input = DebouncedInput::new(Duration::from_millis(20), false);
///
/// assert_eq!(input.update(true, start), None);
/// assert_eq!(input.update(true, start + Duration::from_millis(20)), Some(true));
/// assert!(input.level());
/// ```
#[derive(Debug, Clone)]
pub struct DebouncedInput {
    debounce: Duration,
    state: InputState,
    /// Pending level and when it was first seen.
    candidate: Option<(bool, Instant)>,
}

impl DebouncedInput {
    pub fn new(debounce: Duration, initial_level: bool) -> Self {
        Self {
            debounce,
            state: InputState::new(initial_level),
            candidate: None,
        }
    }

    /// Feed the current raw logical level.
    ///
    /// Returns the new stable level when a transition is accepted. The
    /// transition is timestamped with the moment the level first changed,
    /// not the moment the debounce window elapsed.
    pub fn update(&mut self, level: bool, now: Instant) -> Option<bool> {
        if level == self.state.current_level {
            self.candidate = None;
            return None;
        }

        let since = match self.candidate {
            Some((pending, since)) if pending == level => since,
            _ => {
                self.candidate = Some((level, now));
                now
            }
        };

        if now.saturating_duration_since(since) < self.debounce {
            return None;
        }

        self.candidate = None;
        self.state.current_level = level;
        self.state.last_transition = Some(since);
        self.state.press_start = level.then_some(since);
        Some(level)
    }

    /// Debounced logical level.
    #[inline]
    pub fn level(&self) -> bool {
        self.state.current_level
    }

    pub fn state(&self) -> &InputState {
        &self.state
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }
}

impl Default for DebouncedInput {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_DEBOUNCE_MS), false)
    }
}

/// Edge reported by an [`EdgeDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputEdge {
    /// Input became active.
    Pressed,

    /// Input became inactive.
    Released,
}

/// Edge detection for binary sensors without hold semantics.
#[derive(Debug, Clone)]
pub struct EdgeDetector {
    input: DebouncedInput,
}

impl EdgeDetector {
    pub fn new(debounce: Duration, initial_level: bool) -> Self {
        Self {
            input: DebouncedInput::new(debounce, initial_level),
        }
    }

    /// Report each debounced transition exactly once.
    pub fn poll(&mut self, level: bool, now: Instant) -> Option<InputEdge> {
        self.input.update(level, now).map(|active| {
            if active {
                InputEdge::Pressed
            } else {
                InputEdge::Released
            }
        })
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.input.level()
    }

    pub fn state(&self) -> &InputState {
        self.input.state()
    }
}

/// Hold stage of a [`HoldClassifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HoldState {
    Released,
    Pressed,
    ShortHeld,
    LongHeld,
}

/// Event reported by a [`HoldClassifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HoldEvent {
    /// Press started.
    Pressed,

    /// Short threshold crossed during this press.
    ShortHeld,

    /// Long threshold crossed during this press.
    LongHeld,

    /// Press ended; `reached` is the furthest stage of the cycle.
    Released { reached: HoldState },
}

/// Hold thresholds measured from the start of a press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldThresholds {
    pub short: Duration,
    pub long: Duration,
}

impl Default for HoldThresholds {
    fn default() -> Self {
        Self {
            short: Duration::from_millis(RESET_SHORT_HOLD_MS),
            long: Duration::from_millis(RESET_LONG_HOLD_MS),
        }
    }
}

/// Two-threshold press-duration classifier.
///
/// Advances at most one stage per poll, so a slow tick never skips reporting
/// the short threshold on the way to the long one.
///
/// # Examples
///
/// ```
/// use doorman_hardware::{HoldClassifier, HoldEvent, HoldThresholds};
/// use std::time::{Duration, Instant};
///
/// let thresholds = HoldThresholds {
///     short: Duration::from_secs(5),
///     long: Duration::from_millis(29_500),
/// };
/// let mut button = HoldClassifier::new(Duration::ZERO, thresholds);
/// let t0 = Instant::now();
///
/// assert_eq!(button.poll(true, t0), Some(HoldEvent::Pressed));
/// assert_eq!(button.poll(true, t0 + Duration::from_secs(4)), None);
/// assert_eq!(button.poll(true, t0 + Duration::from_secs(5)), Some(HoldEvent::ShortHeld));
/// assert_eq!(button.poll(true, t0 + Duration::from_secs(6)), None);
/// ```
#[derive(Debug, Clone)]
pub struct HoldClassifier {
    input: DebouncedInput,
    thresholds: HoldThresholds,
    stage: HoldState,
}

impl HoldClassifier {
    pub fn new(debounce: Duration, thresholds: HoldThresholds) -> Self {
        Self {
            input: DebouncedInput::new(debounce, false),
            thresholds,
            stage: HoldState::Released,
        }
    }

    /// Current stage.
    pub fn stage(&self) -> HoldState {
        self.stage
    }

    pub fn thresholds(&self) -> HoldThresholds {
        self.thresholds
    }

    /// How long the current press has lasted.
    pub fn held_for(&self, now: Instant) -> Option<Duration> {
        self.input
            .state()
            .press_start
            .map(|start| now.saturating_duration_since(start))
    }

    /// Evaluate the input for this tick.
    pub fn poll(&mut self, level: bool, now: Instant) -> Option<HoldEvent> {
        match self.input.update(level, now) {
            Some(true) => {
                self.stage = HoldState::Pressed;
                return Some(HoldEvent::Pressed);
            }
            Some(false) => {
                let reached = self.stage;
                self.stage = HoldState::Released;
                return Some(HoldEvent::Released { reached });
            }
            None => {}
        }

        let held = self.held_for(now)?;
        match self.stage {
            HoldState::Pressed if held >= self.thresholds.short => {
                self.stage = HoldState::ShortHeld;
                Some(HoldEvent::ShortHeld)
            }
            HoldState::ShortHeld if held >= self.thresholds.long => {
                self.stage = HoldState::LongHeld;
                Some(HoldEvent::LongHeld)
            }
            _ => None,
        }
    }
}

impl Default for HoldClassifier {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            HoldThresholds::default(),
        )
    }
}
