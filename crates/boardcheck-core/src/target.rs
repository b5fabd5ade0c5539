//! Target profiles: resolved hardware/board variants.

use crate::ids::TargetId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Coordinates used to look a board variant up in a target registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetQuery {
    /// Key the resolved profile is known by within a run.
    pub id: TargetId,
    /// Package index the platform was published in, e.g. `package_index.json`.
    pub index_source: String,
    pub vendor: String,
    /// Platform/package display name, e.g. `Arduino AVR Boards`.
    pub package_name: String,
    /// Board variant, e.g. `uno`.
    pub variant: String,
    /// Board option overrides (menu selections).
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl fmt::Display for TargetQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.index_source, self.vendor, self.package_name, self.variant
        )
    }
}

/// A resolved board variant. Immutable once resolved and shared by every
/// case that targets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetProfile {
    pub id: TargetId,
    pub index_source: String,
    pub vendor: String,
    pub package_name: String,
    /// Board identifier embedded in workspace names.
    pub board_id: String,
    pub options: BTreeMap<String, String>,
    /// Toolchain-specific handle for the board (an FQBN for arduino-cli).
    pub descriptor: String,
}

impl TargetProfile {
    /// Build a profile from the query that resolved it.
    pub fn from_query(query: &TargetQuery, descriptor: impl Into<String>) -> Self {
        Self {
            id: query.id.clone(),
            index_source: query.index_source.clone(),
            vendor: query.vendor.clone(),
            package_name: query.package_name.clone(),
            board_id: query.variant.clone(),
            options: query.options.clone(),
            descriptor: descriptor.into(),
        }
    }
}

/// Parse board option overrides from `key=value` lines.
///
/// Lines without a `=` are ignored; only the first `=` splits.
pub fn parse_option_lines(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
