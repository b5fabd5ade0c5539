//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the harness and the external
//! toolchain: board registry, example repository, project creation/build,
//! build diagnostics, and the background job scheduler.

use crate::Result;
use crate::example::ExampleBundle;
use crate::ids::{RunId, WorkspaceName};
use crate::target::{TargetProfile, TargetQuery};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// Registry of installable platforms and their board variants.
#[async_trait]
pub trait TargetRegistry: Send + Sync {
    /// Resolve a board variant. `Ok(None)` means the registry has no such board.
    async fn resolve(&self, query: &TargetQuery) -> Result<Option<TargetProfile>>;

    /// Register additional package index URLs, optionally refreshing the
    /// local copy of every index.
    async fn register_additional_sources(&self, urls: &[Url], refresh: bool) -> Result<()>;

    /// Request installation of the latest version of every available
    /// platform. May return before the installation has finished.
    async fn install_latest_of_all(&self) -> Result<()>;
}

/// Repository of compilable examples.
#[async_trait]
pub trait ExampleSource: Send + Sync {
    /// All examples as `key -> primary location`, ordered by key.
    /// With a filter, only keys containing it are returned.
    async fn list_all(&self, filter: Option<&str>) -> Result<BTreeMap<String, PathBuf>>;
}

/// Kind of build to request from a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildKind {
    Full,
    Incremental,
}

/// A named build configuration (e.g. `Release`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfiguration {
    pub name: String,
}

impl BuildConfiguration {
    pub fn defaults() -> Vec<BuildConfiguration> {
        vec![BuildConfiguration {
            name: "Release".to_string(),
        }]
    }
}

/// Compile option overrides. Empty means toolchain defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOptions {
    #[serde(default)]
    pub extra_flags: Vec<String>,
    #[serde(default)]
    pub defines: HashMap<String, String>,
}

impl CompileOptions {
    pub fn is_empty(&self) -> bool {
        self.extra_flags.is_empty() && self.defines.is_empty()
    }
}

/// Everything a project factory needs to materialize a build project.
#[derive(Debug, Clone)]
pub struct ProjectRequest {
    /// Run the project belongs to. Names are only unique within a run, so
    /// factories sharing a parent directory across runs must separate by it.
    pub run: RunId,
    pub name: WorkspaceName,
    /// Parent directory of the project. `None` lets the factory choose.
    pub location: Option<PathBuf>,
    pub configurations: Vec<BuildConfiguration>,
    pub target: Arc<TargetProfile>,
    pub example: Arc<ExampleBundle>,
    pub compile_options: CompileOptions,
}

/// Receives progress messages from long-running operations.
pub trait ProgressSink: Send + Sync {
    fn report(&self, message: &str);
}

/// Discards all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _message: &str) {}
}

/// Creates build projects.
#[async_trait]
pub trait ProjectFactory: Send + Sync {
    async fn create(
        &self,
        request: &ProjectRequest,
        progress: &dyn ProgressSink,
    ) -> Result<Box<dyn Project>>;
}

/// A materialized build project.
#[async_trait]
pub trait Project: Send + Sync {
    fn name(&self) -> &WorkspaceName;

    /// Run a build. `Err` means the build could not be carried out at all;
    /// compile errors are reported through [`BuildDiagnostics`].
    async fn build(&self, kind: BuildKind, progress: &dyn ProgressSink) -> Result<()>;
}

/// Inspects the result of the most recent build of a project.
#[async_trait]
pub trait BuildDiagnostics: Send + Sync {
    async fn has_errors(&self, project: &dyn Project) -> Result<bool>;
}

/// Scheduler of the background work the toolchain enqueues.
#[async_trait]
pub trait JobScheduler: Send + Sync {
    /// Number of jobs queued or running.
    fn pending(&self) -> usize;

    /// Block until no background jobs remain.
    async fn wait_until_idle(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_compile_options_are_empty() {
        assert!(CompileOptions::default().is_empty());
    }

    #[test]
    fn test_default_configurations() {
        let configs = BuildConfiguration::defaults();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].name, "Release");
    }
}
