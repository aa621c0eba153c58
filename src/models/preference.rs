use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use crate::{models::message::Message, processors::Processor, rules::RulePredicate};

/// A user's server-side notification preferences for the desktop context.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Preference {
    #[serde(default)]
    pub openid: Option<String>,
    #[serde(default)]
    pub detail_values: Vec<String>,
    #[serde(default)]
    pub filters: Vec<PreferenceFilter>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreferenceFilter {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    pub code_path: String,
    #[serde(default)]
    pub arguments: Map<String, JsonValue>,
    #[serde(default)]
    pub negated: bool,
    #[serde(skip)]
    pub predicate: Option<RulePredicate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recipient {
    pub openid: Option<String>,
    pub detail_values: Vec<String>,
    pub filter: String,
}

impl Preference {
    /// Resolves every rule's `code_path` into a predicate. Fails on the
    /// first rule that does not name a known rule.
    pub fn load_rules(mut self) -> anyhow::Result<Self> {
        for filter in &mut self.filters {
            for rule in &mut filter.rules {
                rule.predicate = Some(RulePredicate::load(&rule.code_path, &rule.arguments)?);
            }
        }
        Ok(self)
    }

    /// The first filter whose rules all pass, if any.
    pub fn matching_filter(&self, message: &Message, processor: &Processor) -> Option<&PreferenceFilter> {
        self.filters
            .iter()
            .find(|filter| filter.rules.iter().all(|rule| rule.matches(message, processor)))
    }
}

impl Rule {
    pub fn matches(&self, message: &Message, processor: &Processor) -> bool {
        match &self.predicate {
            Some(predicate) => predicate.evaluate(message, processor) != self.negated,
            None => false,
        }
    }
}
