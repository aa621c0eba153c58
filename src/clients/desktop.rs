use std::collections::HashMap;

use anyhow::{Error, Result, anyhow};
use notify_rust::{Hint, NotificationHandle, Timeout};
use tokio::task;
use tracing::debug;

use crate::models::notification::Notification;

/// Shows and closes notifications on the desktop.
pub trait NotificationRenderer {
    /// Displays a notification and returns an id that `close` accepts.
    fn show(&mut self, notification: &Notification) -> Result<u32, Error>;

    fn close(&mut self, id: u32) -> Result<(), Error>;
}

/// Renders through the freedesktop notification service. Requires the
/// multi-threaded runtime.
pub struct DesktopRenderer {
    app_name: String,
    handles: HashMap<u32, NotificationHandle>,
}

impl DesktopRenderer {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            handles: HashMap::new(),
        }
    }
}

impl NotificationRenderer for DesktopRenderer {
    fn show(&mut self, notification: &Notification) -> Result<u32, Error> {
        let mut note = notify_rust::Notification::new();
        note.appname(&self.app_name)
            .summary(&notification.title)
            .body(&notification.subtitle)
            .timeout(Timeout::Never);

        if let Some(icon) = &notification.icon {
            note.icon(&icon.to_string_lossy());
        }
        if let Some(hint) = &notification.secondary_icon {
            note.hint(Hint::ImagePath(hint.to_string_lossy().into_owned()));
        }

        // D-Bus round trip; keep other tasks on this worker moving.
        let handle = task::block_in_place(|| note.show())
            .map_err(|e| anyhow!("Notification service rejected notification: {}", e))?;
        let id = handle.id();
        self.handles.insert(id, handle);

        debug!(id, title = %notification.title, "Notification shown");

        Ok(id)
    }

    fn close(&mut self, id: u32) -> Result<(), Error> {
        let handle = self
            .handles
            .remove(&id)
            .ok_or_else(|| anyhow!("Unknown notification id {}", id))?;
        task::block_in_place(|| handle.close());
        Ok(())
    }
}
