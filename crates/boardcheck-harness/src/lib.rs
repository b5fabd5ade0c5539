//! Build-verification harness for boardcheck.
//!
//! Stages run strictly in sequence: [`setup`] drains installation work,
//! [`matrix`] expands targets × examples, and [`verifier`] builds each case.

pub mod barrier;
pub mod config;
pub mod exclusion;
pub mod harness;
pub mod jobs;
pub mod matrix;
pub mod setup;
pub mod verifier;

pub use barrier::QuiescenceBarrier;
pub use config::{HarnessConfig, TargetSpec};
pub use exclusion::{ExclusionRule, ExclusionSet};
pub use harness::{Harness, HarnessPorts, RunSummary};
pub use jobs::JobTracker;
pub use matrix::{MatrixBuilder, MatrixExpansion, MatrixTarget, SkippedCase};
pub use setup::{InstallRequest, SetupCoordinator};
pub use verifier::{BuildVerifier, CompileAttempt, RunContext};
