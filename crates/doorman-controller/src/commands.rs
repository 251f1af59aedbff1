//! Normalized commands and the MQTT topic mapping.
//!
//! Both transports end up issuing the same [`Command`]s, so user and rule
//! mutations behave identically whichever way they arrive.

use doorman_core::{AuthorizedUser, DeviceId, Rule};
use doorman_hardware::PulseOutcome;
use doorman_storage::SettingsPatch;

/// A state-changing request from a collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Pulse the relay, optionally for a custom length.
    Open { pulse_ms: Option<u64> },

    /// Force the relay off.
    Lock,

    AddUser(AuthorizedUser),

    /// Remove every user with this name.
    DeleteUser { name: String },

    AddRule(Rule),

    UpdateRule { index: usize, rule: Rule },

    DeleteRule { index: usize },

    /// Apply a settings patch; the device restarts afterwards.
    UpdateSettings(SettingsPatch),

    /// Named HTTP event for rule dispatch.
    Event { name: String },
}

/// Successful command result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandReply {
    Done,

    /// Relay pulse started or queued.
    Pulse(PulseOutcome),

    /// Number of users removed.
    Removed(usize),

    /// Index of a newly added rule.
    RuleIndex(usize),

    /// Settings saved; a restart is pending.
    Restarting,
}

/// Maps topics under `doors/<device_id>/` to commands.
///
/// | Topic suffix | Command |
/// |--------------|---------|
/// | `open` | [`Command::Open`] (numeric payload overrides the pulse) |
/// | `lock` | [`Command::Lock`] |
/// | `addaccess/<user>/<tag>` | [`Command::AddUser`] |
/// | `deleteaccess/<user>` | [`Command::DeleteUser`] |
///
/// # Examples
///
/// ```
/// use doorman_controller::{Command, TopicRouter};
/// use doorman_core::{AuthorizedUser, DeviceId};
///
/// let router = TopicRouter::new(&DeviceId::new("front").unwrap());
/// assert_eq!(
///     router.route("doors/front/addaccess/alice/12345", ""),
///     Some(Command::AddUser(AuthorizedUser::new("alice", "12345")))
/// );
/// assert_eq!(router.route("doors/back/open", ""), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRouter {
    base: String,
}

impl TopicRouter {
    pub fn new(device_id: &DeviceId) -> Self {
        Self {
            base: device_id.topic_base(),
        }
    }

    /// Topic prefix including the trailing separator.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Topic filters to subscribe to.
    pub fn subscriptions(&self) -> Vec<String> {
        ["open", "lock", "addaccess/+/#", "deleteaccess/+"]
            .iter()
            .map(|suffix| format!("{}{suffix}", self.base))
            .collect()
    }

    /// Map an inbound message to a command. Foreign or malformed topics
    /// yield `None`.
    pub fn route(&self, topic: &str, payload: &str) -> Option<Command> {
        let suffix = topic.strip_prefix(&self.base)?;

        match suffix {
            "open" => Some(Command::Open {
                pulse_ms: payload.trim().parse().ok(),
            }),
            "lock" => Some(Command::Lock),
            _ => {
                if let Some(rest) = suffix.strip_prefix("addaccess/") {
                    let (user, tag) = rest.split_once('/')?;
                    if user.is_empty() || tag.is_empty() {
                        return None;
                    }
                    return Some(Command::AddUser(AuthorizedUser::new(user, tag)));
                }
                if let Some(user) = suffix.strip_prefix("deleteaccess/") {
                    if user.is_empty() || user.contains('/') {
                        return None;
                    }
                    return Some(Command::DeleteUser {
                        name: user.to_string(),
                    });
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn router() -> TopicRouter {
        TopicRouter::new(&DeviceId::new("door1").unwrap())
    }

    #[rstest]
    #[case("doors/door1/open", "", Some(Command::Open { pulse_ms: None }))]
    #[case("doors/door1/open", "2000", Some(Command::Open { pulse_ms: Some(2000) }))]
    #[case("doors/door1/lock", "", Some(Command::Lock))]
    #[case(
        "doors/door1/deleteaccess/bob",
        "",
        Some(Command::DeleteUser { name: "bob".to_string() })
    )]
    #[case("doors/door1/addaccess/bob", "", None)]
    #[case("doors/door1/addaccess//123", "", None)]
    #[case("doors/door1/deleteaccess/", "", None)]
    #[case("doors/door1/reboot", "", None)]
    #[case("doors/door2/open", "", None)]
    fn test_route(#[case] topic: &str, #[case] payload: &str, #[case] expected: Option<Command>) {
        assert_eq!(router().route(topic, payload), expected);
    }

    #[test]
    fn test_tag_keeps_remaining_segments() {
        assert_eq!(
            router().route("doors/door1/addaccess/eve/12/34", ""),
            Some(Command::AddUser(AuthorizedUser::new("eve", "12/34")))
        );
    }

    #[test]
    fn test_subscriptions() {
        assert_eq!(
            router().subscriptions(),
            vec![
                "doors/door1/open",
                "doors/door1/lock",
                "doors/door1/addaccess/+/#",
                "doors/door1/deleteaccess/+",
            ]
        );
    }
}
