//! The persisted settings document.
//!
//! The whole device configuration (scalar settings, the access list and the
//! rule list) is stored as one JSON document and always written as a unit.
//! Every field has a default, so a document missing fields still loads; a
//! field holding an unusable value is replaced by its default with a warning,
//! and unreadable user or rule entries are dropped without losing the rest.

use crate::error::{StorageError, StorageResult};
use doorman_core::{
    AuthorizedUser, DeviceId, Rule, VERSION, WiegandMode,
    constants::{
        DEFAULT_ADMIN_CODE, DEFAULT_DEVICE_ID, DEFAULT_MQTT_PORT, DEFAULT_RELAY_MS, MAX_RELAY_MS,
    },
};
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

/// Scalar device settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Firmware version that wrote the document. Written, never checked.
    #[serde(deserialize_with = "lenient_string")]
    pub fw_version: String,
    #[serde(deserialize_with = "lenient_device_id")]
    pub device_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub ssid: String,
    #[serde(deserialize_with = "lenient_string")]
    pub password: String,
    /// Default relay pulse (milliseconds).
    #[serde(deserialize_with = "lenient_relay_ms")]
    pub relay_ms: u64,
    #[serde(deserialize_with = "lenient_mode")]
    pub wiegand_mode: WiegandMode,
    #[serde(deserialize_with = "lenient_string")]
    pub mqtt_host: String,
    #[serde(deserialize_with = "lenient_port")]
    pub mqtt_port: u16,
    #[serde(deserialize_with = "lenient_string")]
    pub mqtt_user: String,
    #[serde(deserialize_with = "lenient_string")]
    pub mqtt_pass: String,
    #[serde(deserialize_with = "lenient_admin_code")]
    pub admin_code: String,
    #[serde(deserialize_with = "lenient_string")]
    pub ota_url: String,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            fw_version: VERSION.to_string(),
            device_id: DEFAULT_DEVICE_ID.to_string(),
            ssid: String::new(),
            password: String::new(),
            relay_ms: DEFAULT_RELAY_MS,
            wiegand_mode: WiegandMode::Auto,
            mqtt_host: String::new(),
            mqtt_port: DEFAULT_MQTT_PORT,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
            admin_code: DEFAULT_ADMIN_CODE.to_string(),
            ota_url: String::new(),
        }
    }
}

impl DeviceSettings {
    /// Default relay pulse as a duration.
    pub fn relay_pulse(&self) -> Duration {
        Duration::from_millis(self.relay_ms)
    }

    /// Device identity, falling back to the default if the stored one is
    /// not usable as a topic segment.
    pub fn device_id(&self) -> DeviceId {
        DeviceId::new(&self.device_id).unwrap_or_default()
    }

    /// Copy safe to hand out to readers: secrets are blanked.
    pub fn redacted(&self) -> Self {
        Self {
            password: String::new(),
            mqtt_pass: String::new(),
            admin_code: String::new(),
            ..self.clone()
        }
    }
}

/// Decode a stored value as `T`, or warn and use `fallback`.
fn value_or<T: DeserializeOwned>(raw: &Value, fallback: T) -> T {
    T::deserialize(raw).unwrap_or_else(|e| {
        warn!(value = %raw, error = %e, "Ignoring stored setting");
        fallback
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(value_or(&Value::deserialize(deserializer)?, String::new()))
}

fn lenient_device_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(value_or(
        &Value::deserialize(deserializer)?,
        DEFAULT_DEVICE_ID.to_string(),
    ))
}

fn lenient_admin_code<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(value_or(
        &Value::deserialize(deserializer)?,
        DEFAULT_ADMIN_CODE.to_string(),
    ))
}

fn lenient_port<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    Ok(value_or(&Value::deserialize(deserializer)?, DEFAULT_MQTT_PORT))
}

fn lenient_relay_ms<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let ms = value_or(&Value::deserialize(deserializer)?, DEFAULT_RELAY_MS);
    if (1..=MAX_RELAY_MS).contains(&ms) {
        Ok(ms)
    } else {
        warn!(relay_ms = ms, "Stored relay_ms out of range, using default");
        Ok(DEFAULT_RELAY_MS)
    }
}

fn lenient_mode<'de, D: Deserializer<'de>>(deserializer: D) -> Result<WiegandMode, D::Error> {
    let raw = match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Number(bits) => bits.to_string(),
        other => other.to_string(),
    };
    Ok(raw.parse().unwrap_or_else(|e| {
        warn!(value = %raw, error = %e, "Ignoring stored wiegand_mode");
        WiegandMode::Auto
    }))
}

/// Keep the entries of a stored list that decode, dropping the rest.
fn lenient_entries<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        warn!("Stored list is not an array, ignoring it");
        return Ok(Vec::new());
    };
    Ok(items
        .iter()
        .filter_map(|item| match T::deserialize(item) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(entry = %item, error = %e, "Dropping unreadable stored entry");
                None
            }
        })
        .collect())
}

/// Complete persisted configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsDocument {
    #[serde(flatten)]
    pub device: DeviceSettings,

    #[serde(default, deserialize_with = "lenient_entries")]
    pub access: Vec<AuthorizedUser>,

    #[serde(default, deserialize_with = "lenient_entries")]
    pub rules: Vec<Rule>,
}

impl SettingsDocument {
    /// Parse a document from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if the text is not a valid
    /// document.
    pub fn from_json(text: &str) -> StorageResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Render the document as pretty JSON, stamped with this build's version.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> StorageResult<String> {
        let mut stamped = self.clone();
        stamped.device.fw_version = VERSION.to_string();
        Ok(serde_json::to_string_pretty(&stamped)?)
    }
}

/// Partial update accepted by the settings endpoint.
///
/// Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsPatch {
    pub device_id: Option<String>,
    pub ssid: Option<String>,
    pub password: Option<String>,
    pub relay_ms: Option<u64>,
    pub wiegand_mode: Option<WiegandMode>,
    pub mqtt_host: Option<String>,
    pub mqtt_port: Option<u16>,
    pub mqtt_user: Option<String>,
    pub mqtt_pass: Option<String>,
    pub admin_code: Option<String>,
    pub ota_url: Option<String>,
}

impl SettingsPatch {
    /// Returns `true` if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Validate the patch and apply it.
    ///
    /// Nothing is changed if any field is invalid.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Validation`] for an unusable device id, a relay
    /// pulse above the maximum or an empty admin code.
    pub fn apply(&self, settings: &mut DeviceSettings) -> StorageResult<()> {
        if let Some(id) = &self.device_id {
            DeviceId::new(id)?;
        }
        if let Some(ms) = self.relay_ms
            && !(1..=MAX_RELAY_MS).contains(&ms)
        {
            return Err(StorageError::Validation(format!(
                "relay_ms must be 1-{MAX_RELAY_MS}, got {ms}"
            )));
        }
        if let Some(code) = &self.admin_code
            && code.is_empty()
        {
            return Err(StorageError::Validation("admin_code must not be empty".to_string()));
        }

        let patch = self.clone();
        if let Some(value) = patch.device_id {
            settings.device_id = value;
        }
        if let Some(value) = patch.ssid {
            settings.ssid = value;
        }
        if let Some(value) = patch.password {
            settings.password = value;
        }
        if let Some(value) = patch.relay_ms {
            settings.relay_ms = value;
        }
        if let Some(value) = patch.wiegand_mode {
            settings.wiegand_mode = value;
        }
        if let Some(value) = patch.mqtt_host {
            settings.mqtt_host = value;
        }
        if let Some(value) = patch.mqtt_port {
            settings.mqtt_port = value;
        }
        if let Some(value) = patch.mqtt_user {
            settings.mqtt_user = value;
        }
        if let Some(value) = patch.mqtt_pass {
            settings.mqtt_pass = value;
        }
        if let Some(value) = patch.admin_code {
            settings.admin_code = value;
        }
        if let Some(value) = patch.ota_url {
            settings.ota_url = value;
        }
        Ok(())
    }
}
