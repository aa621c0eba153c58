use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub title: String,
    pub subtitle: String,
    pub icon: Option<PathBuf>,
    /// Rendered through the `image-path` hint.
    pub secondary_icon: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(title: impl Into<String>, subtitle: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: subtitle.into(),
            icon: None,
            secondary_icon: None,
            created_at: Utc::now(),
        }
    }

    /// Picks the displayed icon and hint from the resolved primary and
    /// secondary icons. A secondary icon takes the main slot and pushes the
    /// primary one into the hint.
    pub fn with_icons(mut self, primary: Option<PathBuf>, secondary: Option<PathBuf>) -> Self {
        let (icon, hint) = match (primary, secondary) {
            (primary, Some(secondary)) => {
                let hint = primary.unwrap_or_else(|| secondary.clone());
                (Some(secondary), Some(hint))
            }
            (Some(primary), None) => (Some(primary.clone()), Some(primary)),
            (None, None) => (None, None),
        };
        self.icon = icon;
        self.secondary_icon = hint;
        self
    }
}
