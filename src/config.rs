use std::{path::PathBuf, time::Duration};

use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

use crate::models::retry::RetryConfig;

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub emit_dbus_signals: bool,
    #[serde(default = "default_max_notifications")]
    pub max_notifications: usize,
    /// Seconds before a notification is closed automatically, 0 disables.
    #[serde(default)]
    pub expiration: u64,
    #[serde(default = "default_topic")]
    pub topic: String,

    #[serde(default = "default_fmn_url")]
    pub fmn_url: String,
    #[serde(default)]
    pub use_server_prefs: bool,
    #[serde(default)]
    pub fmn_openid: Option<String>,

    #[serde(default)]
    pub enabled_filters: Vec<String>,
    /// JSON object mapping filter names to their free-form settings.
    #[serde(default = "default_filter_settings")]
    pub filter_settings: String,

    /// Text processors as `name=topic.prefix` pairs.
    #[serde(default = "default_processors")]
    pub processors: Vec<String>,

    #[serde(default = "default_amqp_url")]
    pub amqp_url: String,
    #[serde(default = "default_exchange")]
    pub exchange: String,
    #[serde(default = "default_signal_exchange")]
    pub signal_exchange: String,
    #[serde(default)]
    pub queue_name: String,

    #[serde(default = "default_server_port")]
    pub server_port: u16,
    #[serde(default)]
    pub pidfile: Option<PathBuf>,
    #[serde(default = "default_icon_timeout")]
    pub icon_timeout_seconds: u64,

    #[serde(default = "default_fmn_retry_attempts")]
    pub fmn_retry_attempts: u32,
    #[serde(default = "default_fmn_initial_retry_delay")]
    pub fmn_initial_retry_delay_ms: u64,
    #[serde(default = "default_fmn_max_retry_delay")]
    pub fmn_max_retry_delay_ms: u64,

    #[serde(default)]
    pub log_json: bool,
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|e| anyhow!("Invalid environmental variable: {}", e))?;
        Ok(config)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.fmn_retry_attempts.max(1),
            initial_delay_ms: self.fmn_initial_retry_delay_ms,
            max_delay_ms: self.fmn_max_retry_delay_ms,
            backoff_multiplier: 2,
        }
    }

    pub fn expiration(&self) -> Duration {
        Duration::from_secs(self.expiration)
    }

    pub fn icon_timeout(&self) -> Duration {
        Duration::from_secs(self.icon_timeout_seconds)
    }

    /// Parses the `processors` list, skipping malformed entries.
    pub fn processor_prefixes(&self) -> Vec<(String, String)> {
        self.processors
            .iter()
            .filter_map(|entry| {
                let (name, prefix) = entry.split_once('=')?;
                let (name, prefix) = (name.trim(), prefix.trim());
                (!name.is_empty() && !prefix.is_empty())
                    .then(|| (name.to_string(), prefix.to_string()))
            })
            .collect()
    }

    pub fn pidfile(&self) -> PathBuf {
        self.pidfile.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .or_else(dirs::runtime_dir)
                .unwrap_or_else(std::env::temp_dir)
                .join(".fedmsg-notify.pid")
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            emit_dbus_signals: false,
            max_notifications: default_max_notifications(),
            expiration: 0,
            topic: default_topic(),
            fmn_url: default_fmn_url(),
            use_server_prefs: false,
            fmn_openid: None,
            enabled_filters: Vec::new(),
            filter_settings: default_filter_settings(),
            processors: default_processors(),
            amqp_url: default_amqp_url(),
            exchange: default_exchange(),
            signal_exchange: default_signal_exchange(),
            queue_name: String::new(),
            server_port: default_server_port(),
            pidfile: None,
            icon_timeout_seconds: default_icon_timeout(),
            fmn_retry_attempts: default_fmn_retry_attempts(),
            fmn_initial_retry_delay_ms: default_fmn_initial_retry_delay(),
            fmn_max_retry_delay_ms: default_fmn_max_retry_delay(),
            log_json: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_notifications() -> usize {
    5
}

fn default_topic() -> String {
    "#".to_string()
}

fn default_fmn_url() -> String {
    "https://apps.fedoraproject.org/notifications/".to_string()
}

fn default_filter_settings() -> String {
    "{}".to_string()
}

fn default_processors() -> Vec<String> {
    [
        "bodhi=org.fedoraproject.prod.bodhi.",
        "buildsys=org.fedoraproject.prod.buildsys.",
        "git=org.fedoraproject.prod.git.",
        "pkgdb=org.fedoraproject.prod.pkgdb.",
        "fas=org.fedoraproject.prod.fas.",
        "wiki=org.fedoraproject.prod.wiki.",
        "compose=org.fedoraproject.prod.compose.",
        "meetbot=org.fedoraproject.prod.meetbot.",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_amqp_url() -> String {
    "amqp://localhost:5672/%2f".to_string()
}

fn default_exchange() -> String {
    "amq.topic".to_string()
}

fn default_signal_exchange() -> String {
    "fedmsg.notify".to_string()
}

fn default_server_port() -> u16 {
    8765
}

fn default_icon_timeout() -> u64 {
    10
}

fn default_fmn_retry_attempts() -> u32 {
    2
}

fn default_fmn_initial_retry_delay() -> u64 {
    250
}

fn default_fmn_max_retry_delay() -> u64 {
    2000
}
