//! Build verification for a single test case, with one retry.

use crate::barrier::QuiescenceBarrier;
use boardcheck_core::case::TestCase;
use boardcheck_core::ids::{RunId, WorkspaceName};
use boardcheck_core::outcome::{BuildOutcome, CaseReport};
use boardcheck_core::ports::{
    BuildConfiguration, BuildDiagnostics, BuildKind, CompileOptions, Project, ProjectFactory,
    ProjectRequest, ProgressSink,
};
use boardcheck_core::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};

/// The first build may race with library attachment; one more attempt after
/// the barrier absorbs that without hiding real regressions.
const BUILD_ATTEMPTS: u32 = 2;

/// Run-scoped state shared by every case of one run.
#[derive(Debug, Default)]
pub struct RunContext {
    run_id: RunId,
    next_sequence: AtomicU32,
}

impl RunContext {
    /// A context for a fresh run.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_run(run_id: RunId) -> Self {
        Self {
            run_id,
            next_sequence: AtomicU32::new(0),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Claim the next sequence number. Never returns the same value twice.
    pub fn next_sequence(&self) -> u32 {
        self.next_sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Claim a fresh workspace name for `case`.
    pub fn workspace_name(&self, case: &TestCase) -> WorkspaceName {
        workspace_name(self.next_sequence(), case)
    }
}

/// `<seq:03>_<board><example segment>`, e.g. `004_unoBlink`.
pub fn workspace_name(sequence: u32, case: &TestCase) -> WorkspaceName {
    WorkspaceName::new(format!(
        "{:03}_{}{}",
        sequence,
        case.target.board_id,
        case.example.last_segment()
    ))
}

/// Result of one compile attempt.
#[derive(Debug)]
pub enum CompileAttempt {
    /// The build ran and reported no errors.
    Clean,
    /// The build ran and reported errors.
    Errors,
    /// The build or its diagnostics could not be carried out.
    Fault(Error),
}

/// Forwards toolchain progress to the log.
struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, message: &str) {
        debug!(progress = %message);
    }
}

/// Creates and builds one isolated project per case.
pub struct BuildVerifier {
    factory: Arc<dyn ProjectFactory>,
    diagnostics: Arc<dyn BuildDiagnostics>,
    barrier: QuiescenceBarrier,
    location: Option<PathBuf>,
    configurations: Vec<BuildConfiguration>,
    compile_options: CompileOptions,
}

impl BuildVerifier {
    pub fn new(
        factory: Arc<dyn ProjectFactory>,
        diagnostics: Arc<dyn BuildDiagnostics>,
        barrier: QuiescenceBarrier,
    ) -> Self {
        Self {
            factory,
            diagnostics,
            barrier,
            location: None,
            configurations: BuildConfiguration::defaults(),
            compile_options: CompileOptions::default(),
        }
    }

    /// Parent directory for created projects.
    pub fn with_location(mut self, location: Option<PathBuf>) -> Self {
        self.location = location;
        self
    }

    /// Verify one case. Never fails: every problem becomes an outcome.
    pub async fn verify(&self, ctx: &RunContext, case: &TestCase) -> CaseReport {
        let workspace = ctx.workspace_name(case);
        let span = info_span!("verify", case = %case.display_name, workspace = %workspace);
        self.verify_as(ctx.run_id(), workspace, case)
            .instrument(span)
            .await
    }

    async fn verify_as(&self, run: RunId, workspace: WorkspaceName, case: &TestCase) -> CaseReport {
        let start = Instant::now();
        let report = |outcome: BuildOutcome, attempts: u32| CaseReport {
            case_name: case.display_name.clone(),
            workspace: workspace.clone(),
            outcome,
            attempts,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        let project = match self.create(run, &workspace, case).await {
            Ok(project) => project,
            Err(e) => {
                warn!(error = %e, "Failed to create the project");
                return report(
                    BuildOutcome::FailCreation {
                        reason: e.to_string(),
                    },
                    0,
                );
            }
        };

        for attempt in 1..=BUILD_ATTEMPTS {
            if attempt > 1 {
                info!(attempt, "Build reported errors, retrying after background work drains");
                if let Err(e) = self.barrier.drain().await {
                    return report(
                        BuildOutcome::FailCompile {
                            reason: e.to_string(),
                        },
                        attempt - 1,
                    );
                }
            }

            match self.compile(project.as_ref()).await {
                CompileAttempt::Clean => {
                    info!(attempt, "Build passed");
                    return report(BuildOutcome::Pass, attempt);
                }
                CompileAttempt::Errors => continue,
                CompileAttempt::Fault(e) => {
                    warn!(attempt, error = %e, "Build could not be carried out");
                    return report(
                        BuildOutcome::FailCompile {
                            reason: e.to_string(),
                        },
                        attempt,
                    );
                }
            }
        }

        warn!("Build errors persisted after retry");
        report(
            BuildOutcome::FailCompile {
                reason: format!("Failed to compile the project {}: build errors", workspace),
            },
            BUILD_ATTEMPTS,
        )
    }

    /// Create the project and wait for the work its creation triggered.
    async fn create(
        &self,
        run: RunId,
        workspace: &WorkspaceName,
        case: &TestCase,
    ) -> Result<Box<dyn Project>> {
        let request = ProjectRequest {
            run,
            name: workspace.clone(),
            location: self.location.clone(),
            configurations: self.configurations.clone(),
            target: case.target.clone(),
            example: case.example.clone(),
            compile_options: self.compile_options.clone(),
        };

        let project = self
            .factory
            .create(&request, &TracingProgress)
            .await
            .map_err(|e| match e {
                Error::ProjectCreation { .. } => e,
                other => Error::ProjectCreation {
                    workspace: workspace.to_string(),
                    reason: other.to_string(),
                },
            })?;

        self.barrier.drain().await?;
        debug!("Project created");
        Ok(project)
    }

    /// One full build followed by a diagnostics check.
    pub async fn compile(&self, project: &dyn Project) -> CompileAttempt {
        if let Err(e) = project.build(BuildKind::Full, &TracingProgress).await {
            return CompileAttempt::Fault(e);
        }
        match self.diagnostics.has_errors(project).await {
            Ok(false) => CompileAttempt::Clean,
            Ok(true) => CompileAttempt::Errors,
            Err(e) => CompileAttempt::Fault(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardcheck_core::example::ExampleBundle;
    use boardcheck_core::ids::TargetId;
    use boardcheck_core::target::TargetProfile;
    use std::collections::{BTreeMap, HashSet};

    fn case(board: &str, path: &str) -> TestCase {
        let target = TargetProfile {
            id: TargetId::new(board),
            index_source: "package_index.json".into(),
            vendor: "arduino".into(),
            package_name: "Arduino AVR Boards".into(),
            board_id: board.into(),
            options: BTreeMap::new(),
            descriptor: format!("arduino:avr:{}", board),
        };
        TestCase::new(
            Arc::new(target),
            Arc::new(ExampleBundle::new("examples-01.Basics-Blink", path)),
        )
    }

    #[test]
    fn test_workspace_name_format() {
        let name = workspace_name(4, &case("uno", "/ex/01.Basics/Blink"));
        assert_eq!(name.as_str(), "004_unoBlink");

        let name = workspace_name(1234, &case("leonardo", "/ex/01.Basics/Blink"));
        assert_eq!(name.as_str(), "1234_leonardoBlink");
    }

    #[test]
    fn test_same_example_different_targets_never_collide() {
        let ctx = RunContext::new();
        let a = ctx.workspace_name(&case("leonardo", "/ex/Blink"));
        let b = ctx.workspace_name(&case("uno", "/ex/Blink"));
        assert_ne!(a, b);
        assert!(a.as_str().contains("leonardo"));
        assert!(b.as_str().contains("uno"));
        assert_ne!(&a.as_str()[..3], &b.as_str()[..3]);
    }

    #[test]
    fn test_workspace_names_unique_for_repeated_case() {
        let ctx = RunContext::new();
        let c = case("uno", "/ex/Blink");
        let names: HashSet<_> = (0..2000).map(|_| ctx.workspace_name(&c)).collect();
        assert_eq!(names.len(), 2000);
    }

    #[test]
    fn test_fresh_contexts_belong_to_different_runs() {
        let a = RunContext::new();
        let b = RunContext::new();
        assert_ne!(a.run_id(), b.run_id());
        // Sequences restart per run, so names repeat across runs.
        assert_eq!(
            a.workspace_name(&case("uno", "/ex/Blink")),
            b.workspace_name(&case("uno", "/ex/Blink"))
        );

        let id = RunId::new();
        assert_eq!(RunContext::for_run(id).run_id(), id);
    }

    #[test]
    fn test_sequence_is_monotonic() {
        let ctx = RunContext::new();
        assert_eq!(ctx.next_sequence(), 0);
        assert_eq!(ctx.next_sequence(), 1);
        assert_eq!(ctx.next_sequence(), 2);
    }
}
