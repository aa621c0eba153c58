use std::{collections::VecDeque, time::Duration};

use futures_util::{FutureExt, StreamExt, future::BoxFuture, stream::FuturesUnordered};
use tokio::time::sleep;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::{clients::desktop::NotificationRenderer, models::notification::Notification};

#[derive(Debug, Clone)]
pub struct ActiveNotification {
    pub key: Uuid,
    pub render_id: u32,
    pub notification: Notification,
}

/// Notifications currently on screen, newest first, bounded by
/// `max_notifications` and optionally expired after a fixed duration.
pub struct NotificationQueue {
    renderer: Box<dyn NotificationRenderer>,
    active: VecDeque<ActiveNotification>,
    max_notifications: usize,
    expiration: Duration,
    timers: FuturesUnordered<BoxFuture<'static, Uuid>>,
}

impl NotificationQueue {
    pub fn new(
        renderer: Box<dyn NotificationRenderer>,
        max_notifications: usize,
        expiration: Duration,
    ) -> Self {
        Self {
            renderer,
            active: VecDeque::new(),
            max_notifications: max_notifications.max(1),
            expiration,
            timers: FuturesUnordered::new(),
        }
    }

    pub fn set_expiration(&mut self, expiration: Duration) {
        self.expiration = expiration;
    }

    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveNotification> {
        self.active.iter()
    }

    pub fn push(&mut self, notification: Notification) -> Option<Uuid> {
        self.push_with_expiration(notification, self.expiration)
    }

    /// Shows a notification and tracks it. Returns `None` if the renderer
    /// refused it.
    pub fn push_with_expiration(
        &mut self,
        notification: Notification,
        expiration: Duration,
    ) -> Option<Uuid> {
        let render_id = match self.renderer.show(&notification) {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, title = %notification.title, "Unable to display notification");
                return None;
            }
        };

        let key = Uuid::new_v4();
        self.active.push_front(ActiveNotification {
            key,
            render_id,
            notification,
        });

        while self.active.len() > self.max_notifications {
            if let Some(oldest) = self.active.pop_back() {
                debug!(key = %oldest.key, "Evicting oldest notification");
                self.close_notification(oldest);
            }
        }

        if !expiration.is_zero() {
            self.timers.push(
                async move {
                    sleep(expiration).await;
                    key
                }
                .boxed(),
            );
        }

        Some(key)
    }

    /// Closes and forgets a notification. Unknown keys are ignored.
    pub fn remove(&mut self, key: Uuid) -> bool {
        match self.active.iter().position(|active| active.key == key) {
            Some(index) => {
                if let Some(active) = self.active.remove(index) {
                    self.close_notification(active);
                }
                true
            }
            None => false,
        }
    }

    /// Waits for the next expiration timer and removes its notification.
    /// Yields `None` when that notification was already gone. Never
    /// resolves while no timers are pending.
    pub async fn expire_next(&mut self) -> Option<Uuid> {
        if self.timers.is_empty() {
            return std::future::pending().await;
        }

        let key = self.timers.next().await?;
        self.remove(key).then_some(key)
    }

    /// Closes every active notification and cancels pending timers.
    pub fn close_all(&mut self) {
        self.timers = FuturesUnordered::new();
        while let Some(active) = self.active.pop_front() {
            self.close_notification(active);
        }
    }

    fn close_notification(&mut self, active: ActiveNotification) {
        if let Err(e) = self.renderer.close(active.render_id) {
            warn!(key = %active.key, error = %e, "Failed to close notification");
        }
    }
}
