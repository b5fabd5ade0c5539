//! Test infrastructure for boardcheck.
//!
//! In-memory fakes for every port so the harness can be exercised without a
//! toolchain.
//!
//! # Usage
//!
//! ```ignore
//! use boardcheck_harness::Harness;
//! use boardcheck_tests::{Script, ScriptedToolchain, TestRig, test_config};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let rig = TestRig::reference();
//!     let harness = Harness::new(rig.ports.clone(), test_config());
//!     let summary = harness.run().await.unwrap();
//!     assert!(summary.all_passed());
//! }
//! ```

pub mod fakes;
pub mod fixtures;

pub use fakes::*;
pub use fixtures::*;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,boardcheck_harness=debug")),
        )
        .with_test_writer()
        .try_init();
}
