use std::collections::HashMap;

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::{
    models::{message::Message, settings::SettingKey},
    processors::{Processor, ProcessorCatalog},
};

/// The custom filters a user can enable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Usernames,
    Packages,
    Urgent,
}

impl FilterKind {
    pub const ALL: [FilterKind; 3] = [FilterKind::Usernames, FilterKind::Packages, FilterKind::Urgent];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            FilterKind::Usernames => "usernames",
            FilterKind::Packages => "packages",
            FilterKind::Urgent => "urgent",
        }
    }

    pub fn build(self, settings: &str) -> CustomFilter {
        let rule = match self {
            FilterKind::Usernames => CustomRule::Usernames(split_list(settings)),
            FilterKind::Packages => CustomRule::Packages(split_list(settings)),
            FilterKind::Urgent => {
                let clauses = parse_clauses(settings);
                if clauses.is_empty() {
                    CustomRule::FieldEquals(vec![("priority".to_string(), "high".to_string())])
                } else {
                    CustomRule::FieldEquals(clauses)
                }
            }
        };
        CustomFilter { kind: self, rule }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum CustomRule {
    Usernames(Vec<String>),
    Packages(Vec<String>),
    FieldEquals(Vec<(String, String)>),
}

/// A user-configured filter, built from its kind and settings string.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomFilter {
    kind: FilterKind,
    rule: CustomRule,
}

impl CustomFilter {
    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn matches(&self, message: &Message, processor: &Processor) -> bool {
        match &self.rule {
            CustomRule::Usernames(names) => {
                let found = processor.usernames(message);
                names.iter().any(|name| found.contains(name))
            }
            CustomRule::Packages(packages) => {
                let found = processor.packages(message);
                packages.iter().any(|package| found.contains(package))
            }
            CustomRule::FieldEquals(clauses) => clauses.iter().any(|(path, expected)| {
                match message.lookup(path) {
                    Some(JsonValue::String(value)) => value == expected,
                    Some(JsonValue::Number(value)) => value.to_string() == *expected,
                    Some(JsonValue::Bool(value)) => value.to_string() == *expected,
                    _ => false,
                }
            }),
        }
    }
}

/// Topic prefix of an enabled processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePrefixFilter {
    pub name: String,
    pub prefix: String,
}

impl ServicePrefixFilter {
    pub fn matches(&self, topic: &str) -> bool {
        topic.starts_with(&self.prefix)
    }
}

/// Active custom filters and processor prefix filters, kept in sync with
/// the `enabled-filters` and `filter-settings` keys.
pub struct FilterRegistry {
    catalog: ProcessorCatalog,
    filter_settings: HashMap<String, String>,
    enabled: Vec<String>,
    filters: Vec<CustomFilter>,
    service_filters: Vec<ServicePrefixFilter>,
}

impl FilterRegistry {
    pub fn new(catalog: ProcessorCatalog, filter_settings: HashMap<String, String>) -> Self {
        Self {
            catalog,
            filter_settings,
            enabled: Vec::new(),
            filters: Vec::new(),
            service_filters: Vec::new(),
        }
    }

    /// Reconciles the active filters with a new set of enabled names.
    pub fn set_enabled<S: AsRef<str>>(&mut self, names: &[S]) {
        self.enabled = names.iter().map(|name| name.as_ref().to_string()).collect();
        let is_enabled = |name: &str| self.enabled.iter().any(|enabled| enabled == name);

        self.service_filters = self
            .catalog
            .iter()
            .filter(|processor| is_enabled(&processor.name))
            .map(|processor| ServicePrefixFilter {
                name: processor.name.clone(),
                prefix: processor.prefix.clone(),
            })
            .collect();

        for kind in FilterKind::ALL {
            let active = self.filters.iter().any(|filter| filter.kind == kind);
            let wanted = is_enabled(kind.name());

            if active && !wanted {
                debug!(filter = kind.name(), "Removing filter");
                self.filters.retain(|filter| filter.kind != kind);
            } else if !active && wanted {
                debug!(filter = kind.name(), "Initializing filter");
                let settings = self
                    .filter_settings
                    .get(kind.name())
                    .map(String::as_str)
                    .unwrap_or_default();
                self.filters.push(kind.build(settings));
            }
        }

        for name in &self.enabled {
            if FilterKind::from_name(name).is_none() && self.catalog.get(name).is_none() {
                warn!(filter = %name, "Enabled filter has no implementation");
            }
        }
    }

    /// Applies a settings change. Returns false for keys it does not own.
    pub fn on_config_changed(&mut self, key: &SettingKey, value: &JsonValue) -> bool {
        match key {
            SettingKey::EnabledFilters => {
                debug!("Reloading filter settings");
                let names = string_list(value);
                self.set_enabled(&names);
                true
            }
            SettingKey::FilterSettings => {
                // Stored only; filters pick this up on the next
                // enabled-filters change since the text may change per keystroke.
                self.filter_settings = parse_filter_settings(value);
                true
            }
            _ => false,
        }
    }

    pub fn active_filters(&self) -> &[CustomFilter] {
        &self.filters
    }

    pub fn service_filters(&self) -> &[ServicePrefixFilter] {
        &self.service_filters
    }

    pub fn catalog(&self) -> &ProcessorCatalog {
        &self.catalog
    }
}

fn split_list(settings: &str) -> Vec<String> {
    settings
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_clauses(settings: &str) -> Vec<(String, String)> {
    split_list(settings)
        .into_iter()
        .filter_map(|clause| {
            let (path, value) = clause.split_once('=')?;
            Some((path.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Accepts a JSON array of names or a comma-separated string.
fn string_list(value: &JsonValue) -> Vec<String> {
    match value {
        JsonValue::Array(items) => items
            .iter()
            .filter_map(JsonValue::as_str)
            .map(str::to_string)
            .collect(),
        JsonValue::String(text) => split_list(text),
        _ => {
            warn!(value = %value, "Ignoring malformed enabled-filters value");
            Vec::new()
        }
    }
}

/// Accepts a JSON object or a string containing one.
pub fn parse_filter_settings(value: &JsonValue) -> HashMap<String, String> {
    let parsed = match value {
        JsonValue::String(text) => serde_json::from_str::<JsonValue>(text).ok(),
        other => Some(other.clone()),
    };

    match parsed {
        Some(JsonValue::Object(map)) => map
            .into_iter()
            .filter_map(|(name, settings)| match settings {
                JsonValue::String(text) => Some((name, text)),
                _ => None,
            })
            .collect(),
        _ => {
            warn!("Ignoring malformed filter-settings value");
            HashMap::new()
        }
    }
}
