//! Example bundles: the source payload compiled for a test case.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A self-contained example made of one or more paths. The first path is the
/// primary source location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleBundle {
    /// Path-derived key, typically `<category>-<name>`.
    pub key: String,
    pub paths: Vec<PathBuf>,
}

impl ExampleBundle {
    pub fn new(key: impl Into<String>, primary: impl Into<PathBuf>) -> Self {
        Self {
            key: key.into(),
            paths: vec![primary.into()],
        }
    }

    pub fn primary(&self) -> Option<&Path> {
        self.paths.first().map(PathBuf::as_path)
    }

    /// Last path segment of the primary location, used in workspace names.
    /// Falls back to the key when the bundle has no usable path.
    pub fn last_segment(&self) -> String {
        self.primary()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_segment() {
        let bundle = ExampleBundle::new(
            "examples-01.Basics-Blink",
            "/opt/arduino/examples/01.Basics/Blink",
        );
        assert_eq!(bundle.last_segment(), "Blink");
    }

    #[test]
    fn test_last_segment_falls_back_to_key() {
        let bundle = ExampleBundle {
            key: "orphan".into(),
            paths: vec![],
        };
        assert_eq!(bundle.last_segment(), "orphan");
    }
}
