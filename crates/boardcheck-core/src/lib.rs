//! boardcheck core
//!
//! Domain types, port traits, and error handling shared by the harness,
//! the toolchain adapters, and the CLI.

pub mod case;
pub mod error;
pub mod example;
pub mod ids;
pub mod outcome;
pub mod ports;
pub mod target;

pub use error::{Error, Result};
pub use ids::*;
