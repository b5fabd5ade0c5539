//! Thin async wrapper around the arduino-cli binary.

use crate::config::ArduinoConfig;
use boardcheck_core::ports::ProgressSink;
use boardcheck_core::{Error, Result};
use serde::de::DeserializeOwned;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Captured result of one invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs arduino-cli subcommands.
#[derive(Debug, Clone)]
pub struct ArduinoCli {
    binary: PathBuf,
    config_file: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ArduinoCli {
    pub fn new(config: &ArduinoConfig) -> Self {
        Self {
            binary: config.cli_path.clone(),
            config_file: config.config_file.clone(),
            timeout: config.command_timeout(),
        }
    }

    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.binary);
        if let Some(config_file) = &self.config_file {
            cmd.arg("--config-file").arg(config_file);
        }
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Run a subcommand to completion. A non-zero exit is not an error here;
    /// failing to spawn or wait for the process is.
    pub async fn run<I, S>(&self, args: I, progress: &dyn ProgressSink) -> Result<CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = self.command(args);
        debug!(command = ?cmd.as_std(), "Running arduino-cli");

        let mut child = cmd.spawn().map_err(|e| {
            Error::Toolchain(format!("Failed to spawn {}: {}", self.binary.display(), e))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Internal("stdout not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Internal("stderr not captured".into()))?;

        let collect = async {
            tokio::join!(
                read_lines(stdout, progress),
                read_lines(stderr, progress),
                child.wait()
            )
        };

        let (stdout, stderr, status) = match self.timeout {
            Some(limit) => match timeout(limit, collect).await {
                Ok(result) => result,
                Err(_) => {
                    // Dropping the child kills it.
                    warn!(timeout_secs = limit.as_secs(), "arduino-cli timed out, killing process");
                    return Err(Error::Toolchain("arduino-cli timed out".to_string()));
                }
            },
            None => collect.await,
        };

        let status = status
            .map_err(|e| Error::Toolchain(format!("Failed to wait for arduino-cli: {}", e)))?;
        let exit_code = status.code().unwrap_or(-1);
        debug!(exit_code, "arduino-cli finished");

        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
        })
    }

    /// Run a subcommand that must succeed.
    pub async fn run_checked<I, S>(&self, args: I, progress: &dyn ProgressSink) -> Result<CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = self.run(args, progress).await?;
        if !output.success() {
            return Err(Error::Toolchain(format!(
                "arduino-cli exited with {}: {}",
                output.exit_code,
                output.stderr.trim()
            )));
        }
        Ok(output)
    }

    /// Run a subcommand with `--format json` and decode its output.
    pub async fn run_json<T, I, S>(&self, args: I, progress: &dyn ProgressSink) -> Result<T>
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut all: Vec<std::ffi::OsString> =
            args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        all.push("--format".into());
        all.push("json".into());
        let output = self.run_checked(all, progress).await?;
        Ok(serde_json::from_str(&output.stdout)?)
    }

    /// Print the version, failing if the binary is unusable.
    pub async fn version(&self) -> Result<String> {
        let output = self.run_checked(["version"], &boardcheck_core::ports::NullProgress).await?;
        let version = output.stdout.trim().to_string();
        info!(%version, "Found arduino-cli");
        Ok(version)
    }
}

/// Drain `reader` to EOF. Invalid UTF-8 is replaced rather than ending the
/// read, so the child never blocks on a full pipe.
async fn read_lines<R>(reader: R, progress: &dyn ProgressSink) -> String
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut collected = String::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                progress.report(line);
                collected.push_str(line);
                collected.push('\n');
            }
            Err(e) => {
                warn!(error = %e, "Failed to read arduino-cli output");
                break;
            }
        }
    }
    collected
}
