//! CLI command definitions.

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Write the reference configuration
    Init {
        /// Where to write it
        #[arg(default_value = "boardcheck.yaml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file
        #[arg(default_value = "boardcheck.yaml")]
        path: PathBuf,
    },

    /// Print the expanded test matrix without building
    Matrix {
        #[command(flatten)]
        opts: RunOptions,
    },

    /// Build every case of the matrix
    Run {
        #[command(flatten)]
        opts: RunOptions,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Options shared by commands that talk to the toolchain.
#[derive(Args, Debug, Clone)]
pub struct RunOptions {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Only examples whose key contains this string
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Parent directory for generated projects
    #[arg(long)]
    pub workspace_root: Option<PathBuf>,

    /// Seconds to wait for setup to drain (0 waits forever)
    #[arg(long)]
    pub setup_timeout: Option<u64>,

    /// Skip registering indexes and installing platforms
    #[arg(long)]
    pub no_setup: bool,
}
