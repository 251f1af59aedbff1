//! First-match-wins rule dispatch.
//!
//! [`dispatch`] walks the rule table in order and resolves the action of the
//! first rule whose trigger kind and param equal the event. It does not
//! perform the action; the controller executes the returned [`RuleOutcome`].
//! Configuration problems in the matching rule are reported as a
//! [`RuleError`] and logged by the controller.

use doorman_core::{Event, Rule, RuleAction};
use serde::Serialize;
use std::time::Duration;

/// Message queued for an outbound transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// Publish `payload` on `topic`.
    Mqtt { topic: String, payload: String },

    /// Call `url`.
    Http { url: String },
}

/// Action resolved from a matching rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    /// Pulse the relay, optionally for a custom duration.
    Pulse(Option<Duration>),

    /// Append a line to the event log.
    Log(String),

    /// Queue an outbound notification.
    Notify(Notification),
}

/// Rule configuration errors, found when the rule fires.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("unknown action '{action}'")]
    UnknownAction { action: String },

    #[error("invalid pulse length '{value}'")]
    InvalidPulse { value: String },

    #[error("{action} action needs a parameter")]
    MissingParam { action: String },
}

/// Result of dispatching one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    /// Position of the matching rule.
    pub index: usize,

    /// Name of the matching rule.
    pub rule: String,

    pub outcome: Result<RuleOutcome, RuleError>,
}

/// Find the first rule matching `event` and resolve its action.
///
/// # Examples
///
/// ```
/// use doorman_controller::dispatcher::{RuleOutcome, dispatch};
/// use doorman_core::{Event, Rule, RuleAction, Trigger};
///
/// let rules = vec![
///     Rule::new("first", Trigger::GpioEvent, "aux", RuleAction::Log, "exit"),
///     Rule::new("second", Trigger::GpioEvent, "aux", RuleAction::RelayPulse, ""),
/// ];
///
/// let hit = dispatch(&Event::gpio("aux"), &rules).unwrap();
/// assert_eq!(hit.rule, "first");
/// assert_eq!(hit.outcome, Ok(RuleOutcome::Log("exit".to_string())));
/// ```
pub fn dispatch(event: &Event, rules: &[Rule]) -> Option<Dispatch> {
    let (index, rule) = rules.iter().enumerate().find(|(_, rule)| rule.matches(event))?;

    Some(Dispatch {
        index,
        rule: rule.name.clone(),
        outcome: resolve(rule, event),
    })
}

fn resolve(rule: &Rule, event: &Event) -> Result<RuleOutcome, RuleError> {
    let param = rule.action_param.trim();

    match &rule.action {
        RuleAction::RelayPulse => {
            if param.is_empty() {
                return Ok(RuleOutcome::Pulse(None));
            }
            param
                .parse::<u64>()
                .map(|ms| RuleOutcome::Pulse(Some(Duration::from_millis(ms))))
                .map_err(|_| RuleError::InvalidPulse {
                    value: param.to_string(),
                })
        }
        RuleAction::Log => {
            let message = if param.is_empty() {
                format!("Rule {} fired", rule.name)
            } else {
                param.to_string()
            };
            Ok(RuleOutcome::Log(message))
        }
        RuleAction::MqttPublish => {
            let (topic, payload) = match param.split_once('|') {
                Some((topic, payload)) => (topic.trim(), payload.to_string()),
                None => (param, event.param.clone()),
            };
            if topic.is_empty() {
                return Err(RuleError::MissingParam {
                    action: rule.action.to_string(),
                });
            }
            Ok(RuleOutcome::Notify(Notification::Mqtt {
                topic: topic.to_string(),
                payload,
            }))
        }
        RuleAction::HttpCall => {
            if param.is_empty() {
                return Err(RuleError::MissingParam {
                    action: rule.action.to_string(),
                });
            }
            Ok(RuleOutcome::Notify(Notification::Http {
                url: param.to_string(),
            }))
        }
        RuleAction::Unknown(action) => Err(RuleError::UnknownAction {
            action: action.clone(),
        }),
    }
}
