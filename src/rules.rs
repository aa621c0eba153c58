use std::collections::BTreeSet;

use anyhow::{Error, Result, anyhow};
use serde_json::{Map, Value as JsonValue};

use crate::{
    models::{
        message::Message,
        preference::{Preference, Recipient},
    },
    processors::Processor,
};

const RULE_ROOT: &str = "fmn.rules";

/// An executable rule resolved from a preference's `code_path`.
#[derive(Debug, Clone, PartialEq)]
pub enum RulePredicate {
    User(BTreeSet<String>),
    NotUser(BTreeSet<String>),
    Package(BTreeSet<String>),
    TopicSuffix(String),
}

impl RulePredicate {
    /// Resolves `module:function` against the built-in rule library.
    pub fn load(code_path: &str, arguments: &Map<String, JsonValue>) -> Result<Self, Error> {
        let (module, function) = code_path
            .split_once(':')
            .ok_or_else(|| anyhow!("Malformed rule code path '{}'", code_path))?;

        if module != RULE_ROOT && !module.starts_with("fmn.rules.") {
            return Err(anyhow!("Rule '{}' is outside {}", code_path, RULE_ROOT));
        }

        match function {
            "user_filter" => Ok(RulePredicate::User(list_argument(arguments, "fasnick")?)),
            "not_user_filter" => Ok(RulePredicate::NotUser(list_argument(arguments, "fasnick")?)),
            "package_filter" => Ok(RulePredicate::Package(list_argument(arguments, "package")?)),
            "topic_filter" => Ok(RulePredicate::TopicSuffix(
                string_argument(arguments, "topic")?.to_string(),
            )),
            _ => Err(anyhow!("Unknown rule '{}'", code_path)),
        }
    }

    pub fn evaluate(&self, message: &Message, processor: &Processor) -> bool {
        match self {
            RulePredicate::User(names) => !names.is_disjoint(&processor.usernames(message)),
            RulePredicate::NotUser(names) => names.is_disjoint(&processor.usernames(message)),
            RulePredicate::Package(packages) => {
                !packages.is_disjoint(&processor.packages(message))
            }
            RulePredicate::TopicSuffix(suffix) => message.topic.ends_with(suffix.as_str()),
        }
    }
}

/// Evaluates every preference against a message; each preference with a
/// matching filter contributes one recipient.
pub fn recipients(preferences: &[Preference], message: &Message, processor: &Processor) -> Vec<Recipient> {
    preferences
        .iter()
        .filter_map(|preference| {
            let filter = preference.matching_filter(message, processor)?;
            Some(Recipient {
                openid: preference.openid.clone(),
                detail_values: preference.detail_values.clone(),
                filter: filter.name.clone(),
            })
        })
        .collect()
}

fn string_argument<'a>(arguments: &'a Map<String, JsonValue>, name: &str) -> Result<&'a str, Error> {
    arguments
        .get(name)
        .and_then(JsonValue::as_str)
        .ok_or_else(|| anyhow!("Missing rule argument '{}'", name))
}

fn list_argument(arguments: &Map<String, JsonValue>, name: &str) -> Result<BTreeSet<String>, Error> {
    Ok(string_argument(arguments, name)?
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect())
}
