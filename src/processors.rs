use std::collections::BTreeSet;

use serde_json::Value as JsonValue;

use crate::models::message::Message;

/// Renders messages of one category (everything under `prefix`) into
/// notification text and extracts the users and packages they concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processor {
    pub name: String,
    pub prefix: String,
}

impl Processor {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
        }
    }

    pub fn generic() -> Self {
        Self::new("generic", "")
    }

    pub fn handles(&self, topic: &str) -> bool {
        !self.prefix.is_empty() && topic.starts_with(&self.prefix)
    }

    pub fn title(&self, message: &Message) -> String {
        if let Some(title) = string_at(message, "title") {
            return title;
        }
        message
            .topic
            .strip_prefix(&self.prefix)
            .filter(|rest| !rest.is_empty())
            .unwrap_or(&message.topic)
            .to_string()
    }

    pub fn subtitle(&self, message: &Message) -> String {
        string_at(message, "subtitle")
            .or_else(|| string_at(message, "msg.summary"))
            .unwrap_or_default()
    }

    pub fn link(&self, message: &Message) -> Option<String> {
        string_at(message, "link")
    }

    pub fn icon(&self, message: &Message) -> Option<String> {
        string_at(message, "icon")
    }

    pub fn secondary_icon(&self, message: &Message) -> Option<String> {
        string_at(message, "secondary_icon")
    }

    /// Title and subtitle, with the link appended to the subtitle.
    pub fn format_text(&self, message: &Message) -> (String, String) {
        let title = self.title(message);
        let subtitle = self.subtitle(message);
        match self.link(message) {
            Some(link) if !link.is_empty() => (title, format!("{} {}", subtitle, link)),
            _ => (title, subtitle),
        }
    }

    pub fn usernames(&self, message: &Message) -> BTreeSet<String> {
        let mut names = strings_at(message, "usernames");
        names.extend(string_at(message, "username"));
        names.extend(string_at(message, "msg.agent"));
        names
    }

    pub fn packages(&self, message: &Message) -> BTreeSet<String> {
        strings_at(message, "packages")
    }
}

/// The set of known processors, looked up by topic.
#[derive(Debug, Clone)]
pub struct ProcessorCatalog {
    processors: Vec<Processor>,
    fallback: Processor,
}

impl ProcessorCatalog {
    pub fn new(processors: Vec<Processor>) -> Self {
        Self {
            processors,
            fallback: Processor::generic(),
        }
    }

    pub fn from_prefixes(prefixes: Vec<(String, String)>) -> Self {
        Self::new(
            prefixes
                .into_iter()
                .map(|(name, prefix)| Processor::new(name, prefix))
                .collect(),
        )
    }

    /// The processor for a message's topic, or the generic one.
    pub fn for_message(&self, message: &Message) -> &Processor {
        self.processors
            .iter()
            .find(|processor| processor.handles(&message.topic))
            .unwrap_or(&self.fallback)
    }

    pub fn get(&self, name: &str) -> Option<&Processor> {
        self.processors.iter().find(|processor| processor.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Processor> {
        self.processors.iter()
    }
}

fn string_at(message: &Message, path: &str) -> Option<String> {
    message
        .lookup(path)
        .and_then(JsonValue::as_str)
        .map(str::to_string)
}

fn strings_at(message: &Message, path: &str) -> BTreeSet<String> {
    message
        .lookup(path)
        .and_then(JsonValue::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(JsonValue::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

