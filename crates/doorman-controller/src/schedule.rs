//! Periodic triggers for `schedule` rules.
//!
//! A schedule rule's param is an interval in whole seconds. The scheduler
//! fires `Event { Schedule, param }` at every multiple of the interval,
//! counted from controller start. Missed periods (a stalled tick) fire once,
//! not once per missed period. Intervals are capped at one week.

use doorman_core::{Event, Rule, Trigger, constants::MAX_SCHEDULE_SECS};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    param: String,
    interval: Duration,
    next_due: Instant,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    start: Instant,
    entries: Vec<Entry>,
    reported: HashSet<String>,
}

impl Scheduler {
    pub fn new(start: Instant) -> Self {
        Self {
            start,
            entries: Vec::new(),
            reported: HashSet::new(),
        }
    }

    /// Parse a schedule param into an interval.
    pub fn parse_interval(param: &str) -> Option<Duration> {
        match param.trim().parse::<u64>() {
            Ok(secs) if (1..=MAX_SCHEDULE_SECS).contains(&secs) => Some(Duration::from_secs(secs)),
            _ => None,
        }
    }

    /// Rebuild the timer set from the rule table.
    ///
    /// Timers whose param is unchanged keep their phase. Returns the params
    /// of schedule rules that are invalid and were not reported before. A
    /// param whose rules are all gone is forgotten, so re-adding it reports
    /// it again.
    pub fn sync(&mut self, rules: &[Rule], now: Instant) -> Vec<String> {
        let mut entries: Vec<Entry> = Vec::new();
        let mut rejected: HashSet<String> = HashSet::new();
        let mut invalid = Vec::new();

        for rule in rules.iter().filter(|r| r.trigger == Trigger::Schedule) {
            let param = &rule.trigger_param;
            if entries.iter().any(|e| &e.param == param) || rejected.contains(param) {
                continue;
            }

            let kept = self
                .entries
                .iter()
                .find(|e| &e.param == param)
                .map(|e| e.next_due);
            let timer = Self::parse_interval(param).and_then(|interval| {
                kept.or_else(|| next_multiple(self.start, interval, now))
                    .map(|next_due| (interval, next_due))
            });
            let Some((interval, next_due)) = timer else {
                rejected.insert(param.clone());
                if self.reported.insert(param.clone()) {
                    invalid.push(param.clone());
                }
                continue;
            };

            entries.push(Entry {
                param: param.clone(),
                interval,
                next_due,
            });
        }

        self.reported.retain(|param| rejected.contains(param));
        debug!(timers = entries.len(), "Schedule synced");
        self.entries = entries;
        invalid
    }

    /// Events due at `now`.
    ///
    /// A timer whose next period cannot be represented is dropped after
    /// firing.
    pub fn due(&mut self, now: Instant) -> Vec<Event> {
        let start = self.start;
        let mut events = Vec::new();
        self.entries.retain_mut(|entry| {
            if now < entry.next_due {
                return true;
            }
            events.push(Event::schedule(entry.param.clone()));
            match next_multiple(start, entry.interval, now) {
                Some(next_due) => {
                    entry.next_due = next_due;
                    true
                }
                None => {
                    warn!(param = %entry.param, "Schedule timer out of range, stopped");
                    false
                }
            }
        });
        events
    }

    /// Number of active timers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// First `start + k * interval` strictly after `now`, with `k >= 1`, or
/// `None` if that instant is not representable.
fn next_multiple(start: Instant, interval: Duration, now: Instant) -> Option<Instant> {
    let elapsed = now.saturating_duration_since(start).as_nanos();
    let step = interval.as_nanos().max(1);
    let periods = u32::try_from(elapsed / step + 1).ok()?;
    start.checked_add(interval.checked_mul(periods)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use doorman_core::RuleAction;

    fn schedule_rule(param: &str) -> Rule {
        Rule::new("tick", Trigger::Schedule, param, RuleAction::Log, "")
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_fires_on_interval_from_start() {
        let t0 = Instant::now();
        let mut scheduler = Scheduler::new(t0);
        assert!(scheduler.sync(&[schedule_rule("10")], t0).is_empty());

        assert!(scheduler.due(t0 + secs(9)).is_empty());
        assert_eq!(scheduler.due(t0 + secs(10)), vec![Event::schedule("10")]);
        assert!(scheduler.due(t0 + secs(15)).is_empty());
        assert_eq!(scheduler.due(t0 + secs(20)), vec![Event::schedule("10")]);
    }

    #[test]
    fn test_missed_periods_fire_once() {
        let t0 = Instant::now();
        let mut scheduler = Scheduler::new(t0);
        scheduler.sync(&[schedule_rule("1")], t0);

        assert_eq!(scheduler.due(t0 + secs(5)).len(), 1);
        assert!(scheduler.due(t0 + Duration::from_millis(5500)).is_empty());
        assert_eq!(scheduler.due(t0 + secs(6)).len(), 1);
    }

    #[test]
    fn test_invalid_interval_reported_once() {
        let t0 = Instant::now();
        let mut scheduler = Scheduler::new(t0);
        let rules = [schedule_rule("hourly"), schedule_rule("0")];

        assert_eq!(scheduler.sync(&rules, t0), vec!["hourly", "0"]);
        assert!(scheduler.sync(&rules, t0).is_empty());
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_resync_keeps_phase() {
        let t0 = Instant::now();
        let mut scheduler = Scheduler::new(t0);
        scheduler.sync(&[schedule_rule("10")], t0);

        let rules = [schedule_rule("10"), schedule_rule("10"), schedule_rule("3")];
        scheduler.sync(&rules, t0 + secs(4));
        assert_eq!(scheduler.len(), 2);
        assert_eq!(scheduler.due(t0 + secs(6)), vec![Event::schedule("3")]);
        assert_eq!(
            scheduler.due(t0 + secs(10)),
            vec![Event::schedule("10"), Event::schedule("3")]
        );
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(Scheduler::parse_interval(" 30 "), Some(secs(30)));
        assert_eq!(Scheduler::parse_interval("0"), None);
        assert_eq!(Scheduler::parse_interval("-1"), None);
        assert_eq!(Scheduler::parse_interval("604800"), Some(secs(604_800)));
        assert_eq!(Scheduler::parse_interval("604801"), None);
        assert_eq!(Scheduler::parse_interval("18446744073709551615"), None);
    }

    #[test]
    fn test_huge_interval_is_invalid_not_fatal() {
        let t0 = Instant::now();
        let mut scheduler = Scheduler::new(t0);
        let rules = [schedule_rule("18446744073709551615"), schedule_rule("5")];

        assert_eq!(scheduler.sync(&rules, t0), vec!["18446744073709551615"]);
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.due(t0 + secs(5)), vec![Event::schedule("5")]);
    }

    #[test]
    fn test_next_multiple_overflow_is_none() {
        let t0 = Instant::now();
        assert_eq!(next_multiple(t0, Duration::MAX, t0), None);
        assert_eq!(next_multiple(t0, secs(10), t0 + secs(25)), Some(t0 + secs(30)));
    }

    #[test]
    fn test_removed_invalid_param_is_reported_again() {
        let t0 = Instant::now();
        let mut scheduler = Scheduler::new(t0);
        let bad = [schedule_rule("often")];

        assert_eq!(scheduler.sync(&bad, t0), vec!["often"]);
        assert!(scheduler.sync(&bad, t0).is_empty());
        assert!(scheduler.sync(&[], t0).is_empty());
        assert_eq!(scheduler.sync(&bad, t0), vec!["often"]);
    }
}
