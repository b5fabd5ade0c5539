//! Board resolution and platform installation through arduino-cli.

use crate::cli::ArduinoCli;
use async_trait::async_trait;
use boardcheck_core::ports::{NullProgress, TargetRegistry};
use boardcheck_core::target::{TargetProfile, TargetQuery};
use boardcheck_core::Result;
use boardcheck_harness::JobTracker;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// A board as listed by `board listall`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardEntry {
    pub fqbn: String,
    /// Platform display name, e.g. `Arduino AVR Boards`, when reported.
    pub platform_name: Option<String>,
}

/// [`TargetRegistry`] backed by the boards manager of arduino-cli.
pub struct ArduinoRegistry {
    cli: Arc<ArduinoCli>,
    jobs: JobTracker,
}

impl ArduinoRegistry {
    pub fn new(cli: Arc<ArduinoCli>, jobs: JobTracker) -> Self {
        Self { cli, jobs }
    }

    async fn list_boards(&self) -> Result<Vec<BoardEntry>> {
        let listing: Value = self
            .cli
            .run_json(["board", "listall"], &NullProgress)
            .await?;
        Ok(parse_board_listing(&listing))
    }

    async fn list_platform_ids(&self) -> Result<Vec<String>> {
        let listing: Value = self
            .cli
            .run_json(["core", "search", "--all"], &NullProgress)
            .await?;
        Ok(parse_platform_ids(&listing))
    }
}

#[async_trait]
impl TargetRegistry for ArduinoRegistry {
    async fn resolve(&self, query: &TargetQuery) -> Result<Option<TargetProfile>> {
        let boards = self.list_boards().await?;
        let found = find_board(&boards, query).map(|board| {
            TargetProfile::from_query(query, with_options(&board.fqbn, &query.options))
        });
        debug!(query = %query, found = found.is_some(), "Resolved board");
        Ok(found)
    }

    async fn register_additional_sources(&self, urls: &[Url], refresh: bool) -> Result<()> {
        for url in urls {
            info!(%url, "Adding package index");
            self.cli
                .run_checked(
                    ["config", "add", "board_manager.additional_urls", url.as_str()],
                    &NullProgress,
                )
                .await?;
        }
        if refresh {
            self.cli
                .run_checked(["core", "update-index"], &NullProgress)
                .await?;
        }
        Ok(())
    }

    async fn install_latest_of_all(&self) -> Result<()> {
        let platforms = self.list_platform_ids().await?;
        info!(platforms = platforms.len(), "Queueing platform installs");
        for id in platforms {
            let cli = self.cli.clone();
            self.jobs.spawn(format!("install {}", id), async move {
                cli.run_checked(["core", "install", id.as_str()], &NullProgress)
                    .await
                    .map(|_| ())
            });
        }
        Ok(())
    }
}

/// Pick the board whose FQBN matches `vendor:*:variant` and, when the
/// listing reports it, whose platform name matches the package name.
pub fn find_board<'a>(boards: &'a [BoardEntry], query: &TargetQuery) -> Option<&'a BoardEntry> {
    boards.iter().find(|board| {
        let mut parts = board.fqbn.split(':');
        let (Some(vendor), Some(_arch), Some(variant)) = (parts.next(), parts.next(), parts.next())
        else {
            return false;
        };
        vendor == query.vendor
            && variant == query.variant
            && board
                .platform_name
                .as_deref()
                .is_none_or(|name| name == query.package_name)
    })
}

/// Append board options to an FQBN: `vendor:arch:board:k=v,k2=v2`.
pub fn with_options(fqbn: &str, options: &BTreeMap<String, String>) -> String {
    if options.is_empty() {
        return fqbn.to_string();
    }
    let opts: Vec<String> = options.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{}:{}", fqbn, opts.join(","))
}

/// Accepts both the 0.x layout (`platform.name`) and the 1.x layout
/// (`platform.release.name`).
pub fn parse_board_listing(listing: &Value) -> Vec<BoardEntry> {
    let Some(boards) = listing.get("boards").and_then(Value::as_array) else {
        return vec![];
    };
    boards
        .iter()
        .filter_map(|board| {
            let fqbn = board.get("fqbn")?.as_str()?.to_string();
            let platform = board.get("platform");
            let platform_name = platform
                .and_then(|p| p.pointer("/release/name").or_else(|| p.get("name")))
                .and_then(Value::as_str)
                .map(str::to_string);
            Some(BoardEntry {
                fqbn,
                platform_name,
            })
        })
        .collect()
}

/// Accepts a bare array of platforms (0.x) or `{"platforms": [...]}` with
/// ids under `metadata.id` (1.x).
pub fn parse_platform_ids(listing: &Value) -> Vec<String> {
    let platforms = listing
        .as_array()
        .or_else(|| listing.get("platforms").and_then(Value::as_array));
    platforms
        .into_iter()
        .flatten()
        .filter_map(|p| {
            p.pointer("/metadata/id")
                .or_else(|| p.get("id"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardcheck_core::ids::TargetId;
    use serde_json::json;

    fn query(vendor: &str, package: &str, variant: &str) -> TargetQuery {
        TargetQuery {
            id: TargetId::new(variant),
            index_source: "package_index.json".into(),
            vendor: vendor.into(),
            package_name: package.into(),
            variant: variant.into(),
            options: BTreeMap::new(),
        }
    }

    #[test]
    fn test_parse_both_listing_layouts() {
        let old = json!({"boards": [
            {"name": "Arduino Uno", "fqbn": "arduino:avr:uno",
             "platform": {"id": "arduino:avr", "name": "Arduino AVR Boards"}}
        ]});
        let new = json!({"boards": [
            {"name": "Arduino Uno", "fqbn": "arduino:avr:uno",
             "platform": {"metadata": {"id": "arduino:avr"},
                          "release": {"name": "Arduino AVR Boards"}}}
        ]});
        assert_eq!(parse_board_listing(&old), parse_board_listing(&new));
        assert_eq!(
            parse_board_listing(&old)[0].platform_name.as_deref(),
            Some("Arduino AVR Boards")
        );
    }

    #[test]
    fn test_find_board_matches_vendor_variant_and_package() {
        let boards = vec![
            BoardEntry {
                fqbn: "arduino:megaavr:uno2018".into(),
                platform_name: Some("Arduino megaAVR Boards".into()),
            },
            BoardEntry {
                fqbn: "arduino:avr:leonardo".into(),
                platform_name: Some("Arduino AVR Boards".into()),
            },
        ];
        let hit = find_board(&boards, &query("arduino", "Arduino AVR Boards", "leonardo"));
        assert_eq!(hit.map(|b| b.fqbn.as_str()), Some("arduino:avr:leonardo"));

        assert!(find_board(&boards, &query("arduino", "Other Boards", "leonardo")).is_none());
        assert!(find_board(&boards, &query("esp8266", "Arduino AVR Boards", "leonardo")).is_none());
        assert!(find_board(&boards, &query("arduino", "Arduino AVR Boards", "uno")).is_none());
    }

    #[test]
    fn test_with_options() {
        let mut options = BTreeMap::new();
        assert_eq!(with_options("arduino:avr:nano", &options), "arduino:avr:nano");
        options.insert("cpu".to_string(), "atmega328old".to_string());
        assert_eq!(
            with_options("arduino:avr:nano", &options),
            "arduino:avr:nano:cpu=atmega328old"
        );
    }

    #[test]
    fn test_parse_platform_ids() {
        let old = json!([{"id": "arduino:avr"}, {"id": "esp8266:esp8266"}]);
        let new = json!({"platforms": [{"metadata": {"id": "arduino:avr"}}]});
        assert_eq!(parse_platform_ids(&old), vec!["arduino:avr", "esp8266:esp8266"]);
        assert_eq!(parse_platform_ids(&new), vec!["arduino:avr"]);
        assert!(parse_platform_ids(&json!({})).is_empty());
    }
}
