use serde_json::Value as JsonValue;
use tracing::{debug, error, info};

use crate::{clients::fmn::PreferenceResolver, filters::FilterRegistry, models::message::Message, rules};

/// Topic segment marking preference-change messages.
const PREFERENCE_TOPIC_SEGMENT: &str = ".fmn.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingMode {
    /// Match against the user's server-side preferences.
    ServerPreferences,
    /// Match against locally enabled filters.
    LocalFilters,
}

impl RoutingMode {
    pub fn from_flag(use_server_prefs: bool) -> Self {
        if use_server_prefs {
            RoutingMode::ServerPreferences
        } else {
            RoutingMode::LocalFilters
        }
    }
}

/// Decides whether a message is relevant to the local user.
pub struct MessageRouter {
    mode: RoutingMode,
    filters: FilterRegistry,
    preferences: PreferenceResolver,
}

impl MessageRouter {
    pub fn new(mode: RoutingMode, filters: FilterRegistry, preferences: PreferenceResolver) -> Self {
        Self {
            mode,
            filters,
            preferences,
        }
    }

    pub fn mode(&self) -> RoutingMode {
        self.mode
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    pub fn filters_mut(&mut self) -> &mut FilterRegistry {
        &mut self.filters
    }

    pub fn preferences(&self) -> &PreferenceResolver {
        &self.preferences
    }

    pub async fn route(&mut self, message: &Message) -> bool {
        match self.mode {
            RoutingMode::ServerPreferences => self.route_by_preferences(message).await,
            RoutingMode::LocalFilters => self.route_by_filters(message),
        }
    }

    async fn route_by_preferences(&mut self, message: &Message) -> bool {
        if message.topic.contains(PREFERENCE_TOPIC_SEGMENT) {
            let openid = message.lookup("msg.openid").and_then(JsonValue::as_str);
            if openid.is_some() && openid == self.preferences.identity() {
                info!(openid = ?openid, "Noticed a pref change");
                self.preferences.invalidate();
            }
        }

        let processor = self.filters.catalog().for_message(message);
        let preferences = match self.preferences.resolve().await {
            Ok(preferences) => preferences,
            Err(e) => {
                error!(error = %e, "Preferences contain an unusable rule");
                return false;
            }
        };

        let recipients = rules::recipients(preferences, message, processor);
        if recipients.is_empty() {
            debug!(topic = %message.topic, "Message didn't match filters");
            return false;
        }

        debug!(
            topic = %message.topic,
            filter = %recipients[0].filter,
            "Matched preferences"
        );
        true
    }

    fn route_by_filters(&self, message: &Message) -> bool {
        let processor = self.filters.catalog().for_message(message);

        if let Some(filter) = self
            .filters
            .active_filters()
            .iter()
            .find(|filter| filter.matches(message, processor))
        {
            debug!(topic = %message.topic, filter = filter.kind().name(), "Matched topic");
            return true;
        }

        if let Some(filter) = self
            .filters
            .service_filters()
            .iter()
            .find(|filter| filter.matches(&message.topic))
        {
            debug!(topic = %message.topic, prefix = %filter.prefix, "Matched topic");
            return true;
        }

        debug!(topic = %message.topic, "Message didn't match filters");
        false
    }
}
