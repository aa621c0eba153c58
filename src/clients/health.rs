use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::warn;

use crate::models::{
    health::{HealthCheckResponse, HealthStatus, ServiceHealth},
    settings::{ControlCommand, SettingChange},
};

/// Reports whether the daemon task is still accepting commands.
pub struct HealthChecker {
    started_at: DateTime<Utc>,
    control: mpsc::UnboundedSender<ControlCommand>,
    settings: mpsc::UnboundedSender<SettingChange>,
}

impl HealthChecker {
    pub fn new(
        control: mpsc::UnboundedSender<ControlCommand>,
        settings: mpsc::UnboundedSender<SettingChange>,
    ) -> Self {
        Self {
            started_at: Utc::now(),
            control,
            settings,
        }
    }

    pub fn check_all(&self) -> HealthCheckResponse {
        let mut checks = HashMap::new();

        checks.insert("daemon".to_string(), Self::check_channel(self.control.is_closed(), "daemon"));
        checks.insert(
            "settings".to_string(),
            Self::check_channel(self.settings.is_closed(), "settings"),
        );

        let status = if checks.values().all(|check| check.status == HealthStatus::Healthy) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };

        let now = Utc::now();
        HealthCheckResponse {
            status,
            timestamp: now,
            uptime_seconds: (now - self.started_at).num_seconds(),
            checks,
        }
    }

    fn check_channel(closed: bool, name: &str) -> ServiceHealth {
        if closed {
            warn!(channel = name, "Health check failed, daemon channel closed");
            ServiceHealth::unhealthy(format!("{} channel closed", name))
        } else {
            ServiceHealth::healthy()
        }
    }
}
