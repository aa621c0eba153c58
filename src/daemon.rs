use std::{path::PathBuf, time::Duration};

use anyhow::{Error, Result};
use futures_util::{
    FutureExt, StreamExt,
    future::{self, BoxFuture},
    stream::FuturesUnordered,
};
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    clients::{desktop::NotificationRenderer, fmn::PreferenceResolver},
    config::Config,
    filters::{FilterRegistry, parse_filter_settings},
    icon_cache::{IconCache, IconResolution},
    models::{
        message::{BusSignal, Message},
        notification::Notification,
        settings::{ControlCommand, SettingChange, SettingKey},
    },
    processors::ProcessorCatalog,
    queue::NotificationQueue,
    router::{MessageRouter, RoutingMode},
};

const ACTIVATION_NOTICE_DURATION: Duration = Duration::from_secs(3);

/// Text of a matched message waiting for its icons.
struct Enrichment {
    title: String,
    subtitle: String,
    primary: IconResolution,
    secondary: IconResolution,
}

/// Owns the whole pipeline and drives it from a single task.
pub struct Daemon {
    router: MessageRouter,
    icons: IconCache,
    queue: NotificationQueue,
    emit_dbus_signals: bool,
    signals: mpsc::UnboundedSender<BusSignal>,
    pending: FuturesUnordered<BoxFuture<'static, Enrichment>>,
}

impl Daemon {
    pub fn new(
        router: MessageRouter,
        icons: IconCache,
        queue: NotificationQueue,
        emit_dbus_signals: bool,
        signals: mpsc::UnboundedSender<BusSignal>,
    ) -> Self {
        Self {
            router,
            icons,
            queue,
            emit_dbus_signals,
            signals,
            pending: FuturesUnordered::new(),
        }
    }

    pub fn from_config(
        config: &Config,
        renderer: Box<dyn NotificationRenderer>,
        signals: mpsc::UnboundedSender<BusSignal>,
    ) -> Result<Self, Error> {
        let catalog = ProcessorCatalog::from_prefixes(config.processor_prefixes());
        let filter_settings = parse_filter_settings(&JsonValue::String(config.filter_settings.clone()));

        let mut filters = FilterRegistry::new(catalog, filter_settings);
        filters.set_enabled(&config.enabled_filters);

        let router = MessageRouter::new(
            RoutingMode::from_flag(config.use_server_prefs),
            filters,
            PreferenceResolver::new(config)?,
        );
        let icons = IconCache::create(config.icon_timeout())?;
        let queue = NotificationQueue::new(renderer, config.max_notifications, config.expiration());

        info!(
            mode = ?router.mode(),
            max_notifications = config.max_notifications,
            expiration = config.expiration,
            "Daemon initialized"
        );

        Ok(Self::new(router, icons, queue, config.emit_dbus_signals, signals))
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    pub fn icons(&self) -> &IconCache {
        &self.icons
    }

    pub fn queue(&self) -> &NotificationQueue {
        &self.queue
    }

    pub fn emits_signals(&self) -> bool {
        self.emit_dbus_signals
    }

    /// Number of matched messages still waiting for icons.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Routes one message. On a match the bus signal is emitted and the
    /// notification is scheduled once its icons resolve.
    pub async fn handle_message(&mut self, message: Message) -> bool {
        if !self.router.route(&message).await {
            return false;
        }

        if self.emit_dbus_signals {
            self.emit_signal(&message);
        }

        self.notify(&message);
        true
    }

    fn emit_signal(&self, message: &Message) {
        match BusSignal::from_message(message) {
            Ok(signal) => {
                if self.signals.send(signal).is_err() {
                    warn!(topic = %message.topic, "Signal publisher is gone");
                }
            }
            Err(e) => warn!(topic = %message.topic, error = %e, "Failed to serialize message body"),
        }
    }

    fn notify(&mut self, message: &Message) {
        let processor = self.router.filters().catalog().for_message(message);
        let (title, subtitle) = processor.format_text(message);
        let primary_ref = processor.icon(message);
        let secondary_ref = processor.secondary_icon(message);

        debug!(topic = %message.topic, processor = %processor.name, title = %title, "Preparing notification");

        let primary = self.lookup_icon(primary_ref);
        let secondary = self.lookup_icon(secondary_ref);

        self.pending.push(
            future::join(primary, secondary)
                .map(move |(primary, secondary)| Enrichment {
                    title,
                    subtitle,
                    primary,
                    secondary,
                })
                .boxed(),
        );
    }

    fn lookup_icon(&mut self, icon_ref: Option<String>) -> BoxFuture<'static, IconResolution> {
        match icon_ref.filter(|icon| !icon.is_empty()) {
            Some(icon) => self.icons.lookup(&icon).into_resolution(),
            None => future::ready(IconResolution::Missing).boxed(),
        }
    }

    fn display(&mut self, enrichment: Enrichment) {
        let primary = self.icons.settle(enrichment.primary);
        let secondary = self.icons.settle(enrichment.secondary);

        let notification = Notification::new(enrichment.title, enrichment.subtitle).with_icons(primary, secondary);
        self.queue.push(notification);
    }

    /// Waits until every scheduled notification has been displayed.
    pub async fn settle(&mut self) {
        while let Some(enrichment) = self.pending.next().await {
            self.display(enrichment);
        }
    }

    pub fn apply_setting(&mut self, change: SettingChange) {
        let key = change.setting_key();

        if self.router.filters_mut().on_config_changed(&key, &change.value) {
            return;
        }

        match key {
            SettingKey::EmitDbusSignals => match change.value.as_bool() {
                Some(enabled) => self.emit_dbus_signals = enabled,
                None => warn!(key = %key, value = %change.value, "Expected a boolean setting"),
            },
            SettingKey::Expiration => match change.value.as_u64() {
                Some(seconds) => self.queue.set_expiration(Duration::from_secs(seconds)),
                None => warn!(key = %key, value = %change.value, "Expected a number of seconds"),
            },
            _ if key.applies_on_restart() => {
                debug!(key = %key, value = %change.value, "Setting applies on restart")
            }
            _ => warn!(key = %key, "Unknown setting changed"),
        }
    }

    /// Shows the short-lived notice that the daemon is running.
    pub fn announce(&mut self) {
        let mut notice = Notification::new("fedmsg", "activated");
        notice.icon = Some(PathBuf::from("fedmsg-notify"));
        self.queue.push_with_expiration(notice, ACTIVATION_NOTICE_DURATION);
    }

    /// Runs until the message stream ends or `Disable` arrives, then tears
    /// the pipeline down.
    pub async fn run(
        mut self,
        mut inbound: mpsc::Receiver<Message>,
        mut settings: mpsc::UnboundedReceiver<SettingChange>,
        mut control: mpsc::UnboundedReceiver<ControlCommand>,
    ) {
        info!("Daemon running");

        loop {
            tokio::select! {
                message = inbound.recv() => match message {
                    Some(message) => {
                        self.handle_message(message).await;
                    }
                    None => {
                        info!("Message stream closed");
                        break;
                    }
                },
                Some(change) = settings.recv() => self.apply_setting(change),
                Some(ControlCommand::Disable) = control.recv() => {
                    info!("Disable requested");
                    break;
                }
                Some(enrichment) = self.pending.next(), if !self.pending.is_empty() => {
                    self.display(enrichment);
                }
                Some(key) = self.queue.expire_next() => {
                    debug!(key = %key, "Notification expired");
                }
            }
        }

        self.shutdown();
    }

    /// Closes every notification, drops in-flight downloads and removes the
    /// icon cache.
    pub fn shutdown(mut self) {
        info!(active = self.queue.len(), pending = self.pending.len(), "Shutting down");

        self.pending = FuturesUnordered::new();
        self.queue.close_all();
        self.icons.close();
    }
}
