use std::fmt::{Display, Formatter, Result};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Runtime configuration keys the daemon reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingKey {
    EnabledFilters,
    FilterSettings,
    EmitDbusSignals,
    Expiration,
    Other(String),
}

impl SettingKey {
    pub fn parse(key: &str) -> Self {
        match key {
            "enabled-filters" => SettingKey::EnabledFilters,
            "filter-settings" => SettingKey::FilterSettings,
            "emit-dbus-signals" => SettingKey::EmitDbusSignals,
            "expiration" => SettingKey::Expiration,
            other => SettingKey::Other(other.to_string()),
        }
    }

    /// Keys read once at startup; changing them at runtime has no effect.
    pub fn applies_on_restart(&self) -> bool {
        matches!(
            self.as_str(),
            "enabled" | "max-notifications" | "topic" | "fmn-url" | "use-server-prefs" | "fmn-openid"
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            SettingKey::EnabledFilters => "enabled-filters",
            SettingKey::FilterSettings => "filter-settings",
            SettingKey::EmitDbusSignals => "emit-dbus-signals",
            SettingKey::Expiration => "expiration",
            SettingKey::Other(key) => key,
        }
    }
}

impl Display for SettingKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.as_str())
    }
}

/// One `(key, value)` event on the settings stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingChange {
    pub key: String,
    pub value: JsonValue,
}

impl SettingChange {
    pub fn new(key: impl Into<String>, value: JsonValue) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    pub fn setting_key(&self) -> SettingKey {
        SettingKey::parse(&self.key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Disable,
}
