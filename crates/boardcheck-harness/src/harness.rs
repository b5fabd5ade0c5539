//! Sequential driver: setup, then matrix, then one verification per case.

use crate::barrier::QuiescenceBarrier;
use crate::config::HarnessConfig;
use crate::matrix::{MatrixBuilder, MatrixExpansion};
use crate::setup::{InstallRequest, SetupCoordinator};
use crate::verifier::{BuildVerifier, RunContext};
use boardcheck_core::Result;
use boardcheck_core::ids::RunId;
use boardcheck_core::outcome::CaseReport;
use boardcheck_core::ports::{
    BuildDiagnostics, ExampleSource, JobScheduler, ProjectFactory, TargetRegistry,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// The external collaborators a run talks to.
#[derive(Clone)]
pub struct HarnessPorts {
    pub registry: Arc<dyn TargetRegistry>,
    pub examples: Arc<dyn ExampleSource>,
    pub factory: Arc<dyn ProjectFactory>,
    pub diagnostics: Arc<dyn BuildDiagnostics>,
    pub scheduler: Arc<dyn JobScheduler>,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub cases: Vec<CaseReport>,
    /// Pairs left out by exclusion rules.
    pub skipped: usize,
}

impl RunSummary {
    pub fn passed(&self) -> usize {
        self.cases.iter().filter(|c| c.outcome.is_pass()).count()
    }

    pub fn failed(&self) -> usize {
        self.cases.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseReport> {
        self.cases.iter().filter(|c| !c.outcome.is_pass())
    }
}

/// Build-verification harness.
pub struct Harness {
    ports: HarnessPorts,
    config: HarnessConfig,
}

impl Harness {
    pub fn new(ports: HarnessPorts, config: HarnessConfig) -> Self {
        Self { ports, config }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Expand the matrix without building anything.
    pub async fn plan(&self) -> Result<MatrixExpansion> {
        self.config.validate()?;
        MatrixBuilder::new(self.ports.registry.clone(), self.ports.examples.clone())
            .build(&self.config.targets, self.config.example_filter.as_deref())
            .await
    }

    /// Run setup, expand the matrix, and verify every case.
    ///
    /// Only setup-stage failures are returned as errors; per-case failures
    /// are recorded in the summary.
    pub async fn run(&self) -> Result<RunSummary> {
        self.run_observed(|_| {}).await
    }

    /// Like [`Harness::run`], calling `on_report` after each case.
    pub async fn run_observed<F>(&self, mut on_report: F) -> Result<RunSummary>
    where
        F: FnMut(&CaseReport) + Send,
    {
        // Display names are only unique across distinct target ids.
        self.config.validate()?;

        let run_id = RunId::new();
        let started_at = Utc::now();
        info!(%run_id, targets = self.config.targets.len(), "Starting run");

        if self.config.skip_setup {
            info!("Skipping setup");
        } else {
            let barrier = QuiescenceBarrier::new(
                self.ports.scheduler.clone(),
                self.config.setup_timeout(),
            );
            SetupCoordinator::new(self.ports.registry.clone(), barrier)
                .ensure_ready(&InstallRequest {
                    package_urls: self.config.package_urls.clone(),
                    refresh: self.config.refresh_index,
                    install_latest: self.config.install_latest,
                })
                .await?;
        }

        let expansion = self.plan().await?;
        info!(cases = expansion.len(), skipped = expansion.skipped.len(), "Matrix ready");

        let barrier = QuiescenceBarrier::new(
            self.ports.scheduler.clone(),
            self.config.barrier_timeout(),
        );
        let verifier = BuildVerifier::new(
            self.ports.factory.clone(),
            self.ports.diagnostics.clone(),
            barrier,
        )
        .with_location(self.config.workspace_root.clone());

        let ctx = RunContext::for_run(run_id);
        let mut cases = Vec::with_capacity(expansion.len());
        for case in &expansion.cases {
            let report = verifier.verify(&ctx, case).await;
            if !report.outcome.is_pass() {
                warn!(case = %report.case_name, outcome = %report.outcome, "Case failed");
            }
            on_report(&report);
            cases.push(report);
        }

        let summary = RunSummary {
            run_id,
            started_at,
            completed_at: Utc::now(),
            cases,
            skipped: expansion.skipped.len(),
        };
        info!(
            %run_id,
            passed = summary.passed(),
            failed = summary.failed(),
            skipped = summary.skipped,
            "Run complete"
        );
        Ok(summary)
    }
}
