//! Test cases produced by matrix expansion.

use crate::example::ExampleBundle;
use crate::target::TargetProfile;
use std::sync::Arc;

/// One (target, example) pair to build.
#[derive(Debug, Clone)]
pub struct TestCase {
    /// Unique, stable name used for reporting.
    pub display_name: String,
    pub target: Arc<TargetProfile>,
    pub example: Arc<ExampleBundle>,
}

impl TestCase {
    pub fn new(target: Arc<TargetProfile>, example: Arc<ExampleBundle>) -> Self {
        let display_name = format!("{}: {}", target.id, example.key);
        Self {
            display_name,
            target,
            example,
        }
    }
}
