use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::{Result, anyhow};
use fedmsg_notify::{
    clients::{desktop::NotificationRenderer, fmn::PreferenceResolver},
    config::Config,
    daemon::Daemon,
    filters::FilterRegistry,
    models::{
        message::{BusSignal, Message},
        notification::Notification,
        retry::RetryConfig,
    },
    processors::ProcessorCatalog,
    router::{MessageRouter, RoutingMode},
};
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;

pub const IDENTITY: &str = "ralph.id.fedoraproject.org";
pub const BODHI_PREFIX: &str = "org.fedoraproject.prod.bodhi.";
pub const FAS_PREFIX: &str = "org.fedoraproject.prod.fas.";

#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    Shown {
        id: u32,
        title: String,
        subtitle: String,
        icon: Option<PathBuf>,
        hint: Option<PathBuf>,
    },
    Closed(u32),
}

/// Renderer double that records every call.
#[derive(Clone, Default)]
pub struct RecordingRenderer {
    events: Arc<Mutex<Vec<RenderEvent>>>,
    next_id: Arc<Mutex<u32>>,
    pub fail_show: bool,
    pub fail_close: bool,
}

impl RecordingRenderer {
    pub fn failing_close() -> Self {
        Self {
            fail_close: true,
            ..Default::default()
        }
    }

    pub fn failing_show() -> Self {
        Self {
            fail_show: true,
            ..Default::default()
        }
    }

    pub fn events(&self) -> Vec<RenderEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn shown_titles(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                RenderEvent::Shown { title, .. } => Some(title),
                RenderEvent::Closed(_) => None,
            })
            .collect()
    }

    pub fn closed_ids(&self) -> Vec<u32> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                RenderEvent::Closed(id) => Some(id),
                RenderEvent::Shown { .. } => None,
            })
            .collect()
    }

    pub fn id_of(&self, wanted: &str) -> Option<u32> {
        self.events().into_iter().find_map(|event| match event {
            RenderEvent::Shown { id, title, .. } if title == wanted => Some(id),
            _ => None,
        })
    }
}

impl NotificationRenderer for RecordingRenderer {
    fn show(&mut self, notification: &Notification) -> Result<u32> {
        if self.fail_show {
            return Err(anyhow!("notification service unavailable"));
        }

        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let id = *next_id;

        self.events.lock().unwrap().push(RenderEvent::Shown {
            id,
            title: notification.title.clone(),
            subtitle: notification.subtitle.clone(),
            icon: notification.icon.clone(),
            hint: notification.secondary_icon.clone(),
        });
        Ok(id)
    }

    fn close(&mut self, id: u32) -> Result<()> {
        self.events.lock().unwrap().push(RenderEvent::Closed(id));
        if self.fail_close {
            return Err(anyhow!("notification {} already gone", id));
        }
        Ok(())
    }
}

pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 1,
        initial_delay_ms: 10,
        max_delay_ms: 10,
        backoff_multiplier: 2,
    }
}

pub fn catalog() -> ProcessorCatalog {
    ProcessorCatalog::from_prefixes(vec![
        ("bodhi".to_string(), BODHI_PREFIX.to_string()),
        ("fas".to_string(), FAS_PREFIX.to_string()),
    ])
}

pub fn registry(enabled: &[&str], settings: &[(&str, &str)]) -> FilterRegistry {
    let settings: HashMap<String, String> = settings
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    let mut registry = FilterRegistry::new(catalog(), settings);
    registry.set_enabled(enabled);
    registry
}

pub fn local_router(enabled: &[&str], settings: &[(&str, &str)]) -> Result<MessageRouter> {
    let resolver = PreferenceResolver::with_identity("http://127.0.0.1:9/", None, fast_retry())?;
    Ok(MessageRouter::new(
        RoutingMode::LocalFilters,
        registry(enabled, settings),
        resolver,
    ))
}

pub fn server_router(base_url: &str) -> Result<MessageRouter> {
    let resolver =
        PreferenceResolver::with_identity(base_url, Some(IDENTITY.to_string()), fast_retry())?;
    Ok(MessageRouter::new(
        RoutingMode::ServerPreferences,
        registry(&[], &[]),
        resolver,
    ))
}

pub fn test_config() -> Config {
    Config {
        processors: vec![
            format!("bodhi={}", BODHI_PREFIX),
            format!("fas={}", FAS_PREFIX),
        ],
        fmn_openid: Some(IDENTITY.to_string()),
        fmn_retry_attempts: 1,
        icon_timeout_seconds: 2,
        ..Config::default()
    }
}

pub fn build_daemon(
    config: &Config,
) -> Result<(Daemon, RecordingRenderer, mpsc::UnboundedReceiver<BusSignal>)> {
    let renderer = RecordingRenderer::default();
    let (signal_tx, signal_rx) = mpsc::unbounded_channel();
    let daemon = Daemon::from_config(config, Box::new(renderer.clone()), signal_tx)?;
    Ok((daemon, renderer, signal_rx))
}

pub fn message(topic: &str, body: JsonValue) -> Message {
    Message::new(topic, body)
}

pub fn preference_document(code_path: &str, arguments: JsonValue) -> JsonValue {
    serde_json::json!({
        "openid": IDENTITY,
        "detail_values": ["ralph"],
        "filters": [{
            "name": "my things",
            "rules": [{ "code_path": code_path, "arguments": arguments }]
        }]
    })
}
