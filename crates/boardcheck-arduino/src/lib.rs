//! arduino-cli adapters for the boardcheck ports.
//!
//! Every port is backed by invocations of the `arduino-cli` binary; platform
//! installs run as background jobs on a shared [`JobTracker`].
//!
//! [`JobTracker`]: boardcheck_harness::JobTracker

pub mod cli;
pub mod config;
pub mod examples;
pub mod project;
pub mod registry;

pub use cli::{ArduinoCli, CommandOutput};
pub use config::{ArduinoConfig, ExampleRoot};
pub use examples::DirectoryExampleSource;
pub use project::{ArduinoDiagnostics, BuildLog, SketchProject, SketchProjectFactory};
pub use registry::ArduinoRegistry;
