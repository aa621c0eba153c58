use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A decoded bus message. The body is only interpreted by processors, custom
/// filters and preference rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub topic: String,
    pub body: JsonValue,
}

impl Message {
    pub fn new(topic: impl Into<String>, body: JsonValue) -> Self {
        Self {
            topic: topic.into(),
            body,
        }
    }

    /// Looks up a dotted path such as `msg.openid` inside the body.
    pub fn lookup(&self, path: &str) -> Option<&JsonValue> {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(&self.body, |value, segment| value.get(segment))
    }
}

/// Side-channel copy of a matched message, published when
/// `emit_dbus_signals` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusSignal {
    pub topic: String,
    pub body: String,
}

impl BusSignal {
    pub fn from_message(message: &Message) -> Result<Self, serde_json::Error> {
        Ok(Self {
            topic: message.topic.clone(),
            body: serde_json::to_string(&message.body)?,
        })
    }
}
