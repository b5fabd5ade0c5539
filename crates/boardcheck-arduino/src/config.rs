//! Adapter configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// A directory tree of examples and the key prefix its examples get.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleRoot {
    /// Prefix of every key from this root, e.g. `examples` or `Firmataexamples`.
    pub prefix: String,
    pub path: PathBuf,
}

/// Settings for talking to arduino-cli.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArduinoConfig {
    /// Path or name of the arduino-cli binary.
    #[serde(default = "default_cli_path")]
    pub cli_path: PathBuf,
    /// Optional `--config-file` passed to every invocation.
    #[serde(default)]
    pub config_file: Option<PathBuf>,
    /// Where examples are enumerated from.
    #[serde(default)]
    pub example_roots: Vec<ExampleRoot>,
    /// Default parent directory for generated sketch projects.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,
    /// Per-invocation limit in seconds. Unset means no limit.
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,
}

fn default_cli_path() -> PathBuf {
    PathBuf::from("arduino-cli")
}

fn default_workspace_root() -> PathBuf {
    std::env::temp_dir().join("boardcheck")
}

impl Default for ArduinoConfig {
    fn default() -> Self {
        Self {
            cli_path: default_cli_path(),
            config_file: None,
            example_roots: vec![],
            workspace_root: default_workspace_root(),
            command_timeout_secs: None,
        }
    }
}

impl ArduinoConfig {
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }
}
