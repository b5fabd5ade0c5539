//! Example enumeration from sketch directories on disk.

use crate::config::ExampleRoot;
use async_trait::async_trait;
use boardcheck_core::ports::ExampleSource;
use boardcheck_core::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Finds sketches (a directory `Foo` holding `Foo.ino`) under each root.
///
/// Keys are the root prefix followed by the path components below the root,
/// joined with `-`: `examples/01.Basics/Blink` under prefix `examples`
/// becomes `examples-01.Basics-Blink`.
pub struct DirectoryExampleSource {
    roots: Vec<ExampleRoot>,
}

impl DirectoryExampleSource {
    pub fn new(roots: Vec<ExampleRoot>) -> Self {
        Self { roots }
    }

    fn scan(roots: &[ExampleRoot], filter: Option<&str>) -> Result<BTreeMap<String, PathBuf>> {
        let mut examples = BTreeMap::new();
        for root in roots {
            if !root.path.is_dir() {
                warn!(path = %root.path.display(), "Example root does not exist");
                continue;
            }
            for entry in WalkDir::new(&root.path).min_depth(1).sort_by_file_name() {
                let entry = entry.map_err(|e| Error::ExampleSource(e.to_string()))?;
                if !entry.file_type().is_dir() || !is_sketch_dir(entry.path()) {
                    continue;
                }
                let Some(key) = example_key(&root.prefix, &root.path, entry.path()) else {
                    continue;
                };
                if filter.is_some_and(|f| !key.contains(f)) {
                    continue;
                }
                if let Some(previous) = examples.insert(key.clone(), entry.path().to_path_buf()) {
                    warn!(%key, previous = %previous.display(), "Duplicate example key, keeping the last");
                }
            }
        }
        debug!(count = examples.len(), "Enumerated examples");
        Ok(examples)
    }
}

#[async_trait]
impl ExampleSource for DirectoryExampleSource {
    async fn list_all(&self, filter: Option<&str>) -> Result<BTreeMap<String, PathBuf>> {
        let roots = self.roots.clone();
        let filter = filter.map(str::to_string);
        tokio::task::spawn_blocking(move || Self::scan(&roots, filter.as_deref()))
            .await
            .map_err(|e| Error::Internal(e.to_string()))?
    }
}

fn is_sketch_dir(dir: &Path) -> bool {
    dir.file_name()
        .map(|name| {
            let mut ino = name.to_os_string();
            ino.push(".ino");
            dir.join(ino).is_file()
        })
        .unwrap_or(false)
}

fn example_key(prefix: &str, root: &Path, dir: &Path) -> Option<String> {
    let relative = dir.strip_prefix(root).ok()?;
    let mut parts = vec![prefix.to_string()];
    parts.extend(
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    Some(parts.join("-"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sketch(root: &Path, rel: &str) {
        let dir = root.join(rel);
        fs::create_dir_all(&dir).unwrap();
        let name = dir.file_name().unwrap().to_string_lossy().into_owned();
        fs::write(dir.join(format!("{}.ino", name)), "void setup() {}\nvoid loop() {}\n").unwrap();
    }

    #[tokio::test]
    async fn test_enumerates_sketches_with_prefixed_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let builtin = tmp.path().join("builtin");
        let firmata = tmp.path().join("Firmata");
        sketch(&builtin, "01.Basics/Blink");
        sketch(&builtin, "09.USB/Keyboard/KeyboardMessage");
        sketch(&firmata, "StandardFirmataWiFi");
        fs::create_dir_all(builtin.join("01.Basics/NotASketch")).unwrap();

        let source = DirectoryExampleSource::new(vec![
            ExampleRoot {
                prefix: "examples".into(),
                path: builtin.clone(),
            },
            ExampleRoot {
                prefix: "Firmataexamples".into(),
                path: firmata,
            },
        ]);

        let examples = source.list_all(None).await.unwrap();
        let keys: Vec<_> = examples.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "Firmataexamples-StandardFirmataWiFi",
                "examples-01.Basics-Blink",
                "examples-09.USB-Keyboard-KeyboardMessage",
            ]
        );
        assert_eq!(
            examples["examples-01.Basics-Blink"],
            builtin.join("01.Basics/Blink")
        );
    }

    #[tokio::test]
    async fn test_filter_and_missing_root() {
        let tmp = tempfile::tempdir().unwrap();
        sketch(tmp.path(), "01.Basics/Blink");
        sketch(tmp.path(), "01.Basics/Fade");

        let source = DirectoryExampleSource::new(vec![
            ExampleRoot {
                prefix: "examples".into(),
                path: tmp.path().to_path_buf(),
            },
            ExampleRoot {
                prefix: "gone".into(),
                path: tmp.path().join("does-not-exist"),
            },
        ]);
        let examples = source.list_all(Some("Fade")).await.unwrap();
        assert_eq!(examples.len(), 1);
        assert!(examples.contains_key("examples-01.Basics-Fade"));
    }
}
