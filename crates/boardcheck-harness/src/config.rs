//! Harness configuration.

use crate::exclusion::{ExclusionRule, ExclusionSet};
use boardcheck_core::ids::TargetId;
use boardcheck_core::target::{TargetQuery, parse_option_lines};
use boardcheck_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Package index for the ESP8266 core, registered by the reference config.
pub const ESP8266_INDEX: &str = "http://arduino.esp8266.com/stable/package_esp8266com_index.json";

/// A named target plus the examples known not to build for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub id: TargetId,
    #[serde(default = "default_index_source")]
    pub index_source: String,
    pub vendor: String,
    pub package_name: String,
    pub variant: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    /// File of `key=value` board options, relative to the config file.
    /// Entries in `options` take precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options_file: Option<PathBuf>,
    #[serde(default)]
    pub exclude: ExclusionSet,
}

impl TargetSpec {
    /// Merge options from `options_file` under the explicit ones.
    pub fn load_options_file(&mut self, base: &Path) -> Result<()> {
        let Some(file) = &self.options_file else {
            return Ok(());
        };
        let path = base.join(file);
        let text = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("options file {}: {}", path.display(), e))
        })?;
        for (key, value) in parse_option_lines(&text) {
            self.options.entry(key).or_insert(value);
        }
        Ok(())
    }

    pub fn query(&self) -> TargetQuery {
        TargetQuery {
            id: self.id.clone(),
            index_source: self.index_source.clone(),
            vendor: self.vendor.clone(),
            package_name: self.package_name.clone(),
            variant: self.variant.clone(),
            options: self.options.clone(),
        }
    }
}

/// Harness configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Targets to build every example for, in matrix order.
    pub targets: Vec<TargetSpec>,
    /// Additional package index URLs registered before the run.
    #[serde(default)]
    pub package_urls: Vec<Url>,
    /// Refresh every package index when registering URLs.
    #[serde(default = "default_true")]
    pub refresh_index: bool,
    /// Install the latest version of every available platform during setup.
    #[serde(default = "default_true")]
    pub install_latest: bool,
    /// Skip the setup stage entirely.
    #[serde(default)]
    pub skip_setup: bool,
    /// Limit for the setup barrier. `null` or 0 waits forever.
    #[serde(default = "default_timeout")]
    pub setup_timeout_secs: Option<u64>,
    /// Limit for each per-case barrier. `null` or 0 waits forever.
    #[serde(default = "default_timeout")]
    pub barrier_timeout_secs: Option<u64>,
    /// Only examples whose key contains this string.
    #[serde(default)]
    pub example_filter: Option<String>,
    /// Parent directory for generated build projects.
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,
}

fn default_index_source() -> String {
    "package_index.json".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> Option<u64> {
    Some(1800)
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            targets: vec![],
            package_urls: vec![],
            refresh_index: true,
            install_latest: true,
            skip_setup: false,
            setup_timeout_secs: default_timeout(),
            barrier_timeout_secs: default_timeout(),
            example_filter: None,
            workspace_root: None,
        }
    }
}

impl HarnessConfig {
    /// The reference matrix: Leonardo and Uno from the AVR core, with the
    /// examples each board is known not to support, plus the ESP8266 index.
    pub fn reference() -> Self {
        let avr = |id: &str, variant: &str, exclude: Vec<ExclusionRule>| TargetSpec {
            id: TargetId::new(id),
            index_source: default_index_source(),
            vendor: "arduino".to_string(),
            package_name: "Arduino AVR Boards".to_string(),
            variant: variant.to_string(),
            options: BTreeMap::new(),
            options_file: None,
            exclude: ExclusionSet::new(exclude),
        };

        let leonardo = avr(
            "leonardo",
            "leonardo",
            vec![
                ExclusionRule::Contains("Firmata".into()),
                ExclusionRule::Prefix("TFTexamples-Esplora-EsploraTFTTemp".into()),
                ExclusionRule::exact([
                    "Esploraexamples-Beginners-EsploraJoystickMouse",
                    "Esploraexamples-Experts-EsploraKart",
                    "Esploraexamples-Experts-EsploraTable",
                    "Firmataexamples-StandardFirmataWiFi",
                ]),
            ],
        );

        // No native USB on the 328P: the keyboard/mouse examples cannot link.
        let uno = avr(
            "uno",
            "uno",
            vec![
                ExclusionRule::Prefix("Esploraexamples".into()),
                ExclusionRule::Prefix("TFTexamples-Esplora-EsploraTFTTemp".into()),
                ExclusionRule::Contains("Firmata".into()),
                ExclusionRule::exact([
                    "Firmataexamples-StandardFirmataWiFi",
                    "examples-04.Communication-MultiSerial",
                    "examples-09.USB-Keyboard-KeyboardLogout",
                    "examples-09.USB-Keyboard-KeyboardMessage",
                    "examples-09.USB-Keyboard-KeyboardReprogram",
                    "examples-09.USB-Keyboard-KeyboardSerial",
                    "examples-09.USB-KeyboardAndMouseControl",
                    "examples-09.USB-Mouse-ButtonMouseControl",
                    "examples-09.USB-Mouse-JoystickMouseControl",
                ]),
            ],
        );

        // A constant absolute URL; parsing only fails if the constant is edited.
        let package_urls = Url::parse(ESP8266_INDEX).into_iter().collect();

        Self {
            targets: vec![leonardo, uno],
            package_urls,
            ..Self::default()
        }
    }

    /// Merge every target's `options_file`, resolved against `base`.
    pub fn load_options_files(&mut self, base: &Path) -> Result<()> {
        for target in &mut self.targets {
            target.load_options_file(base)?;
        }
        Ok(())
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(contents).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Reject configurations that cannot produce a well-formed matrix.
    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(Error::Config("at least one target is required".into()));
        }
        let mut seen = HashSet::new();
        for target in &self.targets {
            if !seen.insert(&target.id) {
                return Err(Error::Config(format!("duplicate target id: {}", target.id)));
            }
            if target.variant.is_empty() {
                return Err(Error::Config(format!("target {} has no variant", target.id)));
            }
        }
        Ok(())
    }

    pub fn setup_timeout(&self) -> Option<Duration> {
        as_timeout(self.setup_timeout_secs)
    }

    pub fn barrier_timeout(&self) -> Option<Duration> {
        as_timeout(self.barrier_timeout_secs)
    }
}

fn as_timeout(secs: Option<u64>) -> Option<Duration> {
    secs.filter(|s| *s > 0).map(Duration::from_secs)
}
