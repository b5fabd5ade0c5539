//! CLI configuration management.

use boardcheck_arduino::ArduinoConfig;
use boardcheck_harness::HarnessConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::commands::RunOptions;

/// Configuration file contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    pub harness: HarnessConfig,
    #[serde(default)]
    pub arduino: ArduinoConfig,
}

impl CliConfig {
    /// Reference configuration with the bundled examples of a default
    /// arduino-cli data directory.
    pub fn reference() -> Self {
        Self {
            harness: HarnessConfig::reference(),
            arduino: ArduinoConfig::default(),
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.harness.load_options_files(base)?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.harness.validate()?;
        Ok(config)
    }

    /// Resolve the config file: explicit path, then `./boardcheck.yaml`,
    /// then the per-user config directory.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        let local = PathBuf::from("boardcheck.yaml");
        if local.exists() {
            return Some(local);
        }
        directories::ProjectDirs::from("dev", "boardcheck", "boardcheck")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
            .filter(|path| path.exists())
    }

    /// Load the located config, or the reference one when none exists.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match Self::locate(explicit) {
            Some(path) => Self::from_file(&path)
                .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e)),
            None => Ok(Self::reference()),
        }
    }

    /// Apply command-line overrides.
    pub fn apply(&mut self, opts: &RunOptions) {
        if let Some(filter) = &opts.filter {
            self.harness.example_filter = Some(filter.clone());
        }
        if let Some(root) = &opts.workspace_root {
            self.harness.workspace_root = Some(root.clone());
        }
        if let Some(secs) = opts.setup_timeout {
            self.harness.setup_timeout_secs = Some(secs);
        }
        if opts.no_setup {
            self.harness.skip_setup = true;
        }
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> RunOptions {
        RunOptions {
            config: None,
            filter: None,
            workspace_root: None,
            setup_timeout: None,
            no_setup: false,
        }
    }

    #[test]
    fn test_reference_round_trips() {
        let yaml = CliConfig::reference().to_yaml().unwrap();
        let parsed = CliConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.harness.targets.len(), 2);
        assert_eq!(parsed.arduino.cli_path, PathBuf::from("arduino-cli"));
    }

    #[test]
    fn test_arduino_section_is_optional() {
        let yaml = r#"
harness:
  targets:
    - id: uno
      vendor: arduino
      package_name: Arduino AVR Boards
      variant: uno
"#;
        let config = CliConfig::from_yaml(yaml).unwrap();
        assert!(config.arduino.example_roots.is_empty());
    }

    #[test]
    fn test_overrides() {
        let mut config = CliConfig::reference();
        config.apply(&RunOptions {
            filter: Some("Blink".into()),
            setup_timeout: Some(0),
            no_setup: true,
            ..opts()
        });
        assert_eq!(config.harness.example_filter.as_deref(), Some("Blink"));
        assert_eq!(config.harness.setup_timeout(), None);
        assert!(config.harness.skip_setup);
    }

    #[test]
    fn test_options_file_resolves_next_to_config() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("uno.txt"), "cpu=atmega328\n").unwrap();
        let path = tmp.path().join("boardcheck.yaml");
        std::fs::write(
            &path,
            r#"
harness:
  targets:
    - id: uno
      vendor: arduino
      package_name: Arduino AVR Boards
      variant: uno
      options_file: uno.txt
"#,
        )
        .unwrap();

        let config = CliConfig::from_file(&path).unwrap();
        assert_eq!(config.harness.targets[0].options["cpu"], "atmega328");
    }

    #[test]
    fn test_invalid_file_is_reported_with_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.yaml");
        std::fs::write(&path, "harness:\n  targets: []\n").unwrap();
        let err = CliConfig::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("bad.yaml"));
    }
}
