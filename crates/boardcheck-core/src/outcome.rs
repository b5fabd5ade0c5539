//! Per-case build outcomes.

use crate::ids::WorkspaceName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final verdict for a single test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BuildOutcome {
    Pass,
    FailCreation { reason: String },
    FailCompile { reason: String },
}

impl BuildOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, BuildOutcome::Pass)
    }
}

impl fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildOutcome::Pass => write!(f, "pass"),
            BuildOutcome::FailCreation { reason } => write!(f, "fail-creation ({})", reason),
            BuildOutcome::FailCompile { reason } => write!(f, "fail-compile ({})", reason),
        }
    }
}

/// What happened to one case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseReport {
    pub case_name: String,
    pub workspace: WorkspaceName,
    pub outcome: BuildOutcome,
    /// Number of build attempts made (0 when creation failed).
    pub attempts: u32,
    pub duration_ms: u64,
}
