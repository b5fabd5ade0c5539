//! In-memory implementations of the ports.

use async_trait::async_trait;
use boardcheck_core::ids::WorkspaceName;
use boardcheck_core::ports::{
    BuildDiagnostics, BuildKind, ExampleSource, JobScheduler, Project, ProjectFactory,
    ProjectRequest, ProgressSink, TargetRegistry,
};
use boardcheck_core::target::{TargetProfile, TargetQuery};
use boardcheck_core::{Error, Result};
use boardcheck_harness::JobTracker;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// How `install_latest_of_all` behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallBehavior {
    /// Queue one background job that finishes after the delay.
    Finishes(Duration),
    /// Queue one background job that never finishes.
    Stalls,
    /// Return an error without queueing anything.
    Fails,
}

/// Registry that knows a fixed set of `(vendor, package, variant)` boards.
pub struct FakeRegistry {
    boards: HashSet<(String, String, String)>,
    jobs: JobTracker,
    install: InstallBehavior,
    registered: Mutex<Vec<(Url, bool)>>,
    installs: AtomicUsize,
    installed: Arc<AtomicUsize>,
    resolves: AtomicUsize,
}

impl FakeRegistry {
    pub fn new(boards: &[(&str, &str, &str)], jobs: JobTracker) -> Self {
        Self {
            boards: boards
                .iter()
                .map(|(v, p, b)| (v.to_string(), p.to_string(), b.to_string()))
                .collect(),
            jobs,
            install: InstallBehavior::Finishes(Duration::from_millis(20)),
            registered: Mutex::new(vec![]),
            installs: AtomicUsize::new(0),
            installed: Arc::new(AtomicUsize::new(0)),
            resolves: AtomicUsize::new(0),
        }
    }

    /// Leonardo and Uno from the AVR core.
    pub fn avr(jobs: JobTracker) -> Self {
        Self::new(
            &[
                ("arduino", "Arduino AVR Boards", "leonardo"),
                ("arduino", "Arduino AVR Boards", "uno"),
            ],
            jobs,
        )
    }

    pub fn with_install(mut self, install: InstallBehavior) -> Self {
        self.install = install;
        self
    }

    pub fn registered(&self) -> Vec<(Url, bool)> {
        self.registered.lock().unwrap().clone()
    }

    /// Number of install requests.
    pub fn install_requests(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }

    /// Number of background installs that ran to completion.
    pub fn installs_completed(&self) -> usize {
        self.installed.load(Ordering::SeqCst)
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TargetRegistry for FakeRegistry {
    async fn resolve(&self, query: &TargetQuery) -> Result<Option<TargetProfile>> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        let key = (
            query.vendor.clone(),
            query.package_name.clone(),
            query.variant.clone(),
        );
        Ok(self.boards.contains(&key).then(|| {
            TargetProfile::from_query(query, format!("{}:fake:{}", query.vendor, query.variant))
        }))
    }

    async fn register_additional_sources(&self, urls: &[Url], refresh: bool) -> Result<()> {
        let mut registered = self.registered.lock().unwrap();
        registered.extend(urls.iter().map(|u| (u.clone(), refresh)));
        Ok(())
    }

    async fn install_latest_of_all(&self) -> Result<()> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        match self.install {
            InstallBehavior::Finishes(delay) => {
                let installed = self.installed.clone();
                self.jobs.spawn("install platforms", async move {
                    tokio::time::sleep(delay).await;
                    installed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                });
                Ok(())
            }
            InstallBehavior::Stalls => {
                self.jobs.spawn("install platforms", std::future::pending());
                Ok(())
            }
            InstallBehavior::Fails => Err(Error::Toolchain("index download failed".into())),
        }
    }
}

/// Example source over a fixed key list. Each key maps to a path whose last
/// segment is the last `-`-separated part of the key.
pub struct FakeExampleSource {
    examples: BTreeMap<String, PathBuf>,
    fail: bool,
}

impl FakeExampleSource {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let examples = keys
            .into_iter()
            .map(|key| {
                let key = key.as_ref().to_string();
                let path = PathBuf::from("/examples").join(key.replace('-', "/"));
                (key, path)
            })
            .collect();
        Self {
            examples,
            fail: false,
        }
    }

    /// A source whose enumeration always fails.
    pub fn failing() -> Self {
        Self {
            examples: BTreeMap::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl ExampleSource for FakeExampleSource {
    async fn list_all(&self, filter: Option<&str>) -> Result<BTreeMap<String, PathBuf>> {
        if self.fail {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "examples folder missing",
            )));
        }
        Ok(self
            .examples
            .iter()
            .filter(|(key, _)| filter.is_none_or(|f| key.contains(f)))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// Result of one scripted build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    Clean,
    Errors,
    /// `build` itself returns an error.
    Fault,
    /// The build runs but diagnostics cannot be read.
    DiagnosticsFault,
    /// Errors, and the build leaves a background job that never finishes.
    /// Needs [`ScriptedToolchain::with_background_jobs`].
    ErrorsAndStall,
}

/// Scripted behavior for one example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub create_fails: bool,
    /// Steps for successive builds; the last one repeats.
    pub builds: Vec<BuildStep>,
}

impl Script {
    pub fn passing() -> Self {
        Self::builds([BuildStep::Clean])
    }

    pub fn failing_creation() -> Self {
        Self {
            create_fails: true,
            builds: vec![],
        }
    }

    pub fn builds(steps: impl IntoIterator<Item = BuildStep>) -> Self {
        Self {
            create_fails: false,
            builds: steps.into_iter().collect(),
        }
    }
}

impl Default for Script {
    fn default() -> Self {
        Self::passing()
    }
}

#[derive(Default)]
struct ToolchainState {
    scripts: HashMap<String, Script>,
    default: Script,
    created: Vec<WorkspaceName>,
    builds: HashMap<WorkspaceName, Vec<BuildKind>>,
    last: HashMap<WorkspaceName, BuildStep>,
    indexed: HashSet<WorkspaceName>,
    built_before_indexed: usize,
}

/// Project factory and build diagnostics driven by per-example scripts.
#[derive(Clone, Default)]
pub struct ScriptedToolchain {
    state: Arc<Mutex<ToolchainState>>,
    indexing: Option<(JobTracker, Duration)>,
    background: Option<JobTracker>,
}

impl ScriptedToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script used for examples without their own script.
    pub fn with_default(self, script: Script) -> Self {
        self.state.lock().unwrap().default = script;
        self
    }

    pub fn with_script(self, example_key: &str, script: Script) -> Self {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(example_key.to_string(), script);
        self
    }

    /// Queue an indexing job of the given length on every project creation.
    pub fn with_indexing(mut self, jobs: JobTracker, delay: Duration) -> Self {
        self.indexing = Some((jobs, delay));
        self
    }

    /// Tracker that [`BuildStep::ErrorsAndStall`] leaves its job on.
    pub fn with_background_jobs(mut self, jobs: JobTracker) -> Self {
        self.background = Some(jobs);
        self
    }

    /// Names of all created projects, in creation order.
    pub fn created(&self) -> Vec<WorkspaceName> {
        self.state.lock().unwrap().created.clone()
    }

    /// Build kinds requested for a project.
    pub fn builds_of(&self, name: &WorkspaceName) -> Vec<BuildKind> {
        self.state
            .lock()
            .unwrap()
            .builds
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn total_builds(&self) -> usize {
        self.state.lock().unwrap().builds.values().map(Vec::len).sum()
    }

    /// Builds that started before their project's indexing job finished.
    pub fn built_before_indexed(&self) -> usize {
        self.state.lock().unwrap().built_before_indexed
    }
}

#[async_trait]
impl ProjectFactory for ScriptedToolchain {
    async fn create(
        &self,
        request: &ProjectRequest,
        progress: &dyn ProgressSink,
    ) -> Result<Box<dyn Project>> {
        let script = {
            let mut state = self.state.lock().unwrap();
            let script = state
                .scripts
                .get(&request.example.key)
                .cloned()
                .unwrap_or_else(|| state.default.clone());
            if script.create_fails {
                return Err(Error::Toolchain("example folder is not a sketch".into()));
            }
            if state.created.contains(&request.name) {
                return Err(Error::ProjectCreation {
                    workspace: request.name.to_string(),
                    reason: "project already exists".into(),
                });
            }
            state.created.push(request.name.clone());
            script
        };

        if let Some((jobs, delay)) = &self.indexing {
            let state = self.state.clone();
            let name = request.name.clone();
            let delay = *delay;
            jobs.spawn(format!("index {}", name), async move {
                tokio::time::sleep(delay).await;
                state.lock().unwrap().indexed.insert(name);
                Ok(())
            });
        }

        progress.report("created");
        debug!(project = %request.name, example = %request.example.key, "Scripted project created");
        Ok(Box::new(ScriptedProject {
            name: request.name.clone(),
            steps: script.builds,
            state: self.state.clone(),
            tracks_indexing: self.indexing.is_some(),
            background: self.background.clone(),
        }))
    }
}

#[async_trait]
impl BuildDiagnostics for ScriptedToolchain {
    async fn has_errors(&self, project: &dyn Project) -> Result<bool> {
        let state = self.state.lock().unwrap();
        match state.last.get(project.name()) {
            Some(BuildStep::Clean) => Ok(false),
            Some(BuildStep::Errors) | Some(BuildStep::ErrorsAndStall) => Ok(true),
            Some(BuildStep::DiagnosticsFault) | Some(BuildStep::Fault) | None => {
                Err(Error::Diagnostics {
                    workspace: project.name().to_string(),
                    reason: "no markers".into(),
                })
            }
        }
    }
}

struct ScriptedProject {
    name: WorkspaceName,
    steps: Vec<BuildStep>,
    state: Arc<Mutex<ToolchainState>>,
    tracks_indexing: bool,
    background: Option<JobTracker>,
}

#[async_trait]
impl Project for ScriptedProject {
    fn name(&self) -> &WorkspaceName {
        &self.name
    }

    async fn build(&self, kind: BuildKind, _progress: &dyn ProgressSink) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if self.tracks_indexing && !state.indexed.contains(&self.name) {
            state.built_before_indexed += 1;
        }
        let builds = state.builds.entry(self.name.clone()).or_default();
        builds.push(kind);
        let n = builds.len();

        let step = self
            .steps
            .get(n - 1)
            .or(self.steps.last())
            .copied()
            .unwrap_or(BuildStep::Clean);
        state.last.insert(self.name.clone(), step);

        debug!(project = %self.name, attempt = n, ?step, "Scripted build");
        if step == BuildStep::ErrorsAndStall {
            if let Some(jobs) = &self.background {
                jobs.spawn(format!("stalled after {}", self.name), std::future::pending());
            }
        }
        if step == BuildStep::Fault {
            return Err(Error::Build {
                workspace: self.name.to_string(),
                reason: "builder crashed".into(),
            });
        }
        Ok(())
    }
}

/// Wraps a [`JobTracker`] and counts barrier waits.
#[derive(Clone, Default)]
pub struct CountingScheduler {
    inner: JobTracker,
    waits: Arc<AtomicUsize>,
}

impl CountingScheduler {
    pub fn new(inner: JobTracker) -> Self {
        Self {
            inner,
            waits: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn waits(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobScheduler for CountingScheduler {
    fn pending(&self) -> usize {
        self.inner.pending()
    }

    async fn wait_until_idle(&self) {
        self.waits.fetch_add(1, Ordering::SeqCst);
        self.inner.wait_until_idle().await;
    }
}
