//! Per-target exclusion rules for example keys.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A single rule marking example keys as incompatible with a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", content = "value", rename_all = "snake_case")]
pub enum ExclusionRule {
    /// Key is one of the listed keys.
    Exact(BTreeSet<String>),
    /// Key starts with the given string.
    Prefix(String),
    /// Key contains the given string anywhere.
    Contains(String),
}

impl ExclusionRule {
    pub fn exact<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ExclusionRule::Exact(keys.into_iter().map(Into::into).collect())
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            ExclusionRule::Exact(keys) => keys.contains(key),
            ExclusionRule::Prefix(prefix) => key.starts_with(prefix.as_str()),
            ExclusionRule::Contains(needle) => key.contains(needle.as_str()),
        }
    }
}

impl fmt::Display for ExclusionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionRule::Exact(keys) => write!(f, "denylist ({} keys)", keys.len()),
            ExclusionRule::Prefix(prefix) => write!(f, "prefix {:?}", prefix),
            ExclusionRule::Contains(needle) => write!(f, "contains {:?}", needle),
        }
    }
}

/// Ordered rules for one target. An example is included unless a rule matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionSet {
    rules: Vec<ExclusionRule>,
}

impl ExclusionSet {
    pub fn new(rules: Vec<ExclusionRule>) -> Self {
        Self { rules }
    }

    /// The first rule, in declaration order, that excludes `key`.
    pub fn first_match(&self, key: &str) -> Option<&ExclusionRule> {
        self.rules.iter().find(|rule| rule.matches(key))
    }

    pub fn excludes(&self, key: &str) -> bool {
        self.first_match(key).is_some()
    }

    pub fn rules(&self) -> &[ExclusionRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl From<Vec<ExclusionRule>> for ExclusionSet {
    fn from(rules: Vec<ExclusionRule>) -> Self {
        Self::new(rules)
    }
}
