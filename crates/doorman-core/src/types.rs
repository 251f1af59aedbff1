use crate::{
    Result,
    constants::{SUPPORTED_FRAME_LENGTHS, TOPIC_ROOT},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;

/// One of the two Wiegand data lines.
///
/// A falling edge on D0 encodes a `0` bit, a falling edge on D1 a `1` bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataLine {
    D0,
    D1,
}

impl DataLine {
    /// The bit value an edge on this line contributes to the frame.
    #[inline]
    #[must_use]
    pub fn bit(self) -> bool {
        matches!(self, DataLine::D1)
    }

    /// The line that carries the given bit value.
    #[inline]
    #[must_use]
    pub fn for_bit(bit: bool) -> Self {
        if bit { DataLine::D1 } else { DataLine::D0 }
    }
}

/// A decoded credential presentation.
///
/// Produced transiently by the decoder and never persisted itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Credential {
    /// Numeric code with parity bits stripped.
    pub code: u64,

    /// Number of bits in the frame the code was extracted from.
    pub frame_length: usize,
}

impl Credential {
    pub fn new(code: u64, frame_length: usize) -> Self {
        Self { code, frame_length }
    }

    /// Decimal representation used for Access Table matching.
    #[must_use]
    pub fn code_string(&self) -> String {
        self.code.to_string()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "W{}:{}", self.frame_length, self.code)
    }
}

/// Which completed frame lengths the decoder accepts.
///
/// Persisted as `"AUTO"`, `"26"`, `"34"` or `"36"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WiegandMode {
    /// Accept every supported frame length.
    #[default]
    Auto,

    /// Accept exactly one frame length.
    Fixed(usize),
}

impl WiegandMode {
    /// Create a fixed-length mode.
    ///
    /// # Errors
    /// Returns `Error::UnsupportedFrameLength` if `bits` is not 26, 34 or 36.
    pub fn fixed(bits: usize) -> Result<Self> {
        if !SUPPORTED_FRAME_LENGTHS.contains(&bits) {
            return Err(Error::UnsupportedFrameLength { bits });
        }
        Ok(WiegandMode::Fixed(bits))
    }

    /// Returns `true` if a completed frame of `bits` length should be decoded.
    #[must_use]
    pub fn accepts(self, bits: usize) -> bool {
        match self {
            WiegandMode::Auto => SUPPORTED_FRAME_LENGTHS.contains(&bits),
            WiegandMode::Fixed(expected) => bits == expected,
        }
    }
}

impl fmt::Display for WiegandMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WiegandMode::Auto => write!(f, "AUTO"),
            WiegandMode::Fixed(bits) => write!(f, "{bits}"),
        }
    }
}

impl std::str::FromStr for WiegandMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("AUTO") {
            return Ok(WiegandMode::Auto);
        }
        let bits: usize = s.parse().map_err(|_| Error::InvalidWiegandMode {
            value: s.to_string(),
        })?;
        WiegandMode::fixed(bits)
    }
}

impl TryFrom<String> for WiegandMode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<WiegandMode> for String {
    fn from(mode: WiegandMode) -> Self {
        mode.to_string()
    }
}

/// An entry of the Access Table.
///
/// Persisted with the field names `username` and `tag`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedUser {
    /// Display name; unique by convention, not enforced.
    #[serde(rename = "username")]
    pub name: String,

    /// String-encoded credential code.
    #[serde(rename = "tag")]
    pub credential_code: String,
}

impl AuthorizedUser {
    pub fn new(name: impl Into<String>, credential_code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            credential_code: credential_code.into(),
        }
    }

    /// Check whether this user's tag equals `code`.
    ///
    /// Comparison is textual (so `"0123"` and `"123"` differ) and runs in
    /// constant time with respect to the tag contents.
    #[must_use]
    pub fn matches(&self, code: &str) -> bool {
        self.credential_code.as_bytes().ct_eq(code.as_bytes()).into()
    }
}

/// Kind of event a rule listens for.
///
/// Textual identifiers are mapped at the serde boundary. Identifiers that
/// are not recognized are kept in [`Trigger::Unknown`] so the configuration
/// round-trips; such rules never match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Trigger {
    /// A decoded credential; param is the decimal code.
    Credential,

    /// A named event posted through the HTTP interface.
    HttpEvent,

    /// A digital input edge (`aux`, `door_open`, `door_closed`).
    GpioEvent,

    /// A periodic timer; param is the interval in seconds.
    Schedule,

    /// An identifier this build does not know.
    Unknown(String),
}

impl Trigger {
    /// Canonical identifier written to the settings document.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Trigger::Credential => "wiegand",
            Trigger::HttpEvent => "http",
            Trigger::GpioEvent => "gpio",
            Trigger::Schedule => "schedule",
            Trigger::Unknown(raw) => raw,
        }
    }

    /// Returns `true` if this trigger was not recognized.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Trigger::Unknown(_))
    }
}

impl From<&str> for Trigger {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "wiegand" | "credential" | "tag" => Trigger::Credential,
            "http" | "http-event" | "http_event" => Trigger::HttpEvent,
            "gpio" | "gpio-event" | "gpio_event" => Trigger::GpioEvent,
            "schedule" | "timer" => Trigger::Schedule,
            _ => Trigger::Unknown(value.to_string()),
        }
    }
}

impl From<String> for Trigger {
    fn from(value: String) -> Self {
        Trigger::from(value.as_str())
    }
}

impl From<Trigger> for String {
    fn from(trigger: Trigger) -> Self {
        trigger.as_str().to_string()
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a matching rule does.
///
/// Unknown identifiers are preserved and reported as configuration errors
/// when the rule fires.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuleAction {
    /// Pulse the door relay; param optionally overrides the pulse length (ms).
    RelayPulse,

    /// Append param to the event log.
    Log,

    /// Publish on the message bus; param is `topic` or `topic|payload`.
    MqttPublish,

    /// Call a URL; param is the URL.
    HttpCall,

    /// An identifier this build does not know.
    Unknown(String),
}

impl RuleAction {
    /// Canonical identifier written to the settings document.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            RuleAction::RelayPulse => "relay",
            RuleAction::Log => "log",
            RuleAction::MqttPublish => "mqtt",
            RuleAction::HttpCall => "http",
            RuleAction::Unknown(raw) => raw,
        }
    }
}

impl From<&str> for RuleAction {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "relay" | "relay-pulse" | "relay_pulse" | "open" => RuleAction::RelayPulse,
            "log" => RuleAction::Log,
            "mqtt" | "mqtt-publish" | "mqtt_publish" => RuleAction::MqttPublish,
            "http" | "http-call" | "http_call" => RuleAction::HttpCall,
            _ => RuleAction::Unknown(value.to_string()),
        }
    }
}

impl From<String> for RuleAction {
    fn from(value: String) -> Self {
        RuleAction::from(value.as_str())
    }
}

impl From<RuleAction> for String {
    fn from(action: RuleAction) -> Self {
        action.as_str().to_string()
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trigger-to-action mapping.
///
/// Persisted with the field names `name`, `trigger`, `param`, `action` and
/// `actparam`. `trigger` and `action` are required; the others default to
/// empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub name: String,

    pub trigger: Trigger,

    #[serde(rename = "param", default)]
    pub trigger_param: String,

    pub action: RuleAction,

    #[serde(rename = "actparam", default)]
    pub action_param: String,
}

impl Rule {
    pub fn new(
        name: impl Into<String>,
        trigger: Trigger,
        trigger_param: impl Into<String>,
        action: RuleAction,
        action_param: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            trigger,
            trigger_param: trigger_param.into(),
            action,
            action_param: action_param.into(),
        }
    }

    /// Returns `true` if this rule listens for `event`.
    ///
    /// The trigger kind must be equal and the param must match exactly.
    /// Rules with an unknown trigger never match.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        !self.trigger.is_unknown()
            && self.trigger == event.kind
            && self.trigger_param == event.param
    }
}

/// A normalized event evaluated against the rule table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: Trigger,
    pub param: String,
}

impl Event {
    pub fn new(kind: Trigger, param: impl Into<String>) -> Self {
        Self {
            kind,
            param: param.into(),
        }
    }

    pub fn credential(credential: &Credential) -> Self {
        Self::new(Trigger::Credential, credential.code_string())
    }

    pub fn gpio(name: impl Into<String>) -> Self {
        Self::new(Trigger::GpioEvent, name)
    }

    pub fn http(name: impl Into<String>) -> Self {
        Self::new(Trigger::HttpEvent, name)
    }

    pub fn schedule(param: impl Into<String>) -> Self {
        Self::new(Trigger::Schedule, param)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.param)
    }
}

/// Which collaborator issued a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    /// HTTP request handler.
    Web,

    /// Message-bus handler.
    Mqtt,

    /// Physical input or local console.
    Local,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Origin::Web => write!(f, "Web"),
            Origin::Mqtt => write!(f, "MQTT"),
            Origin::Local => write!(f, "Local"),
        }
    }
}

/// Device identity scoping the message-bus namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a device identity.
    ///
    /// # Errors
    /// Returns `Error::InvalidValue` if the identity is empty or contains
    /// MQTT topic separators or wildcards.
    pub fn new(id: &str) -> Result<Self> {
        let id = id.trim();
        if id.is_empty() || id.contains(['/', '+', '#']) {
            return Err(Error::InvalidValue {
                field: "device_id".to_string(),
                value: id.to_string(),
            });
        }
        Ok(DeviceId(id.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Topic prefix for this device, including the trailing separator.
    #[must_use]
    pub fn topic_base(&self) -> String {
        format!("{TOPIC_ROOT}/{}/", self.0)
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        DeviceId(crate::constants::DEFAULT_DEVICE_ID.to_string())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for DeviceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DeviceId::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("AUTO", WiegandMode::Auto)]
    #[case("auto", WiegandMode::Auto)]
    #[case("26", WiegandMode::Fixed(26))]
    #[case("34", WiegandMode::Fixed(34))]
    #[case(" 36 ", WiegandMode::Fixed(36))]
    fn test_wiegand_mode_valid(#[case] input: &str, #[case] expected: WiegandMode) {
        let mode: WiegandMode = input.parse().unwrap();
        assert_eq!(mode, expected);
    }

    #[rstest]
    #[case("")]
    #[case("32")]
    #[case("abc")]
    fn test_wiegand_mode_invalid(#[case] input: &str) {
        assert!(input.parse::<WiegandMode>().is_err());
    }

    #[test]
    fn test_wiegand_mode_accepts() {
        assert!(WiegandMode::Auto.accepts(26));
        assert!(WiegandMode::Auto.accepts(34));
        assert!(WiegandMode::Auto.accepts(36));
        assert!(!WiegandMode::Auto.accepts(32));

        let fixed = WiegandMode::fixed(34).unwrap();
        assert!(fixed.accepts(34));
        assert!(!fixed.accepts(26));
    }

    #[test]
    fn test_wiegand_mode_serde_as_string() {
        let json = serde_json::to_string(&WiegandMode::Fixed(26)).unwrap();
        assert_eq!(json, "\"26\"");

        let mode: WiegandMode = serde_json::from_str("\"AUTO\"").unwrap();
        assert_eq!(mode, WiegandMode::Auto);

        assert!(serde_json::from_str::<WiegandMode>("\"99\"").is_err());
    }

    #[test]
    fn test_data_line_bits() {
        assert!(!DataLine::D0.bit());
        assert!(DataLine::D1.bit());
        assert_eq!(DataLine::for_bit(true), DataLine::D1);
        assert_eq!(DataLine::for_bit(false), DataLine::D0);
    }

    #[test]
    fn test_user_matches_textually() {
        let user = AuthorizedUser::new("alice", "12345");
        assert!(user.matches("12345"));
        assert!(!user.matches("012345"));
        assert!(!user.matches("1234"));
    }

    #[test]
    fn test_user_serde_field_names() {
        let user = AuthorizedUser::new("alice", "12345");
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["username"], "alice");
        assert_eq!(json["tag"], "12345");
    }

    #[rstest]
    #[case("wiegand", Trigger::Credential)]
    #[case("credential", Trigger::Credential)]
    #[case("HTTP", Trigger::HttpEvent)]
    #[case("gpio", Trigger::GpioEvent)]
    #[case("schedule", Trigger::Schedule)]
    fn test_trigger_identifiers(#[case] input: &str, #[case] expected: Trigger) {
        assert_eq!(Trigger::from(input), expected);
    }

    #[test]
    fn test_unknown_identifiers_preserved() {
        assert_eq!(
            Trigger::from("lunar"),
            Trigger::Unknown("lunar".to_string())
        );
        assert_eq!(RuleAction::from("buzzer").as_str(), "buzzer");
    }

    #[test]
    fn test_rule_serde_field_names() {
        let rule = Rule::new(
            "night",
            Trigger::Credential,
            "12345",
            RuleAction::MqttPublish,
            "alarm|on",
        );
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["trigger"], "wiegand");
        assert_eq!(json["param"], "12345");
        assert_eq!(json["action"], "mqtt");
        assert_eq!(json["actparam"], "alarm|on");

        let back: Rule = serde_json::from_value(json).unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn test_rule_requires_trigger_and_action() {
        let missing = serde_json::json!({ "name": "x", "param": "1" });
        assert!(serde_json::from_value::<Rule>(missing).is_err());

        let minimal = serde_json::json!({ "trigger": "gpio", "action": "log" });
        let rule: Rule = serde_json::from_value(minimal).unwrap();
        assert!(rule.name.is_empty());
        assert!(rule.trigger_param.is_empty());
    }

    #[test]
    fn test_rule_matching() {
        let rule = Rule::new("exit", Trigger::GpioEvent, "aux", RuleAction::Log, "");
        assert!(rule.matches(&Event::gpio("aux")));
        assert!(!rule.matches(&Event::gpio("door_open")));
        assert!(!rule.matches(&Event::http("aux")));

        let unknown = Rule::new(
            "odd",
            Trigger::Unknown("aux".to_string()),
            "aux",
            RuleAction::Log,
            "",
        );
        assert!(!unknown.matches(&Event::new(Trigger::Unknown("aux".to_string()), "aux")));
    }

    #[rstest]
    #[case("door1")]
    #[case("front-door")]
    fn test_device_id_valid(#[case] input: &str) {
        let id: DeviceId = input.parse().unwrap();
        assert_eq!(id.topic_base(), format!("doors/{input}/"));
    }

    #[rstest]
    #[case("")]
    #[case("a/b")]
    #[case("door#")]
    #[case("+")]
    fn test_device_id_invalid(#[case] input: &str) {
        assert!(DeviceId::new(input).is_err());
    }

    #[test]
    fn test_origin_display() {
        assert_eq!(Origin::Web.to_string(), "Web");
        assert_eq!(Origin::Mqtt.to_string(), "MQTT");
    }
}
