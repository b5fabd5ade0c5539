//! Command handlers.

use crate::config::CliConfig;
use crate::commands::RunOptions;
use boardcheck_arduino::{
    ArduinoCli, ArduinoDiagnostics, BuildLog, DirectoryExampleSource, ArduinoRegistry,
    SketchProjectFactory,
};
use boardcheck_core::outcome::{BuildOutcome, CaseReport};
use boardcheck_harness::{Harness, HarnessPorts, JobTracker};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, warn};

/// Write the reference configuration.
pub fn init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        println!("{} {} already exists", style("!").yellow(), path.display());
        return Ok(());
    }

    std::fs::write(path, CliConfig::reference().to_yaml()?)?;
    println!("{} Created {}", style("✓").green(), path.display());
    println!("  Add your example directories under arduino.example_roots");
    Ok(())
}

/// Validate a configuration file.
pub fn validate(path: &Path) -> anyhow::Result<()> {
    let config = CliConfig::from_file(path)?;

    println!("{} {} is valid", style("✓").green(), path.display());
    println!("  Targets: {}", config.harness.targets.len());
    for target in &config.harness.targets {
        println!(
            "    - {} ({}:{} / {}, {} exclusion rules)",
            target.id,
            target.vendor,
            target.variant,
            target.package_name,
            target.exclude.rules().len()
        );
    }
    println!("  Example roots: {}", config.arduino.example_roots.len());
    Ok(())
}

async fn harness(opts: &RunOptions) -> anyhow::Result<Harness> {
    let mut config = CliConfig::load(opts.config.as_deref())?;
    config.apply(opts);
    debug!(
        targets = config.harness.targets.len(),
        example_roots = config.arduino.example_roots.len(),
        "Configuration loaded"
    );
    if config.arduino.example_roots.is_empty() {
        warn!("No example roots configured, the matrix will be empty");
    }

    let cli = Arc::new(ArduinoCli::new(&config.arduino));
    cli.version().await?;
    let jobs = JobTracker::new();
    let log = BuildLog::new();
    let workspace_root = config
        .harness
        .workspace_root
        .clone()
        .unwrap_or_else(|| config.arduino.workspace_root.clone());

    let ports = HarnessPorts {
        registry: Arc::new(ArduinoRegistry::new(cli.clone(), jobs.clone())),
        examples: Arc::new(DirectoryExampleSource::new(config.arduino.example_roots.clone())),
        factory: Arc::new(SketchProjectFactory::new(cli, workspace_root, log.clone())),
        diagnostics: Arc::new(ArduinoDiagnostics::new(log)),
        scheduler: Arc::new(jobs),
    };
    Ok(Harness::new(ports, config.harness))
}

/// Print the expanded matrix.
pub async fn matrix(opts: &RunOptions) -> anyhow::Result<()> {
    let harness = harness(opts).await?;
    let expansion = harness.plan().await?;

    for case in &expansion.cases {
        println!("  {}", case.display_name);
    }
    println!();
    println!(
        "{} {} cases, {} excluded",
        style("i").blue(),
        style(expansion.len()).bold(),
        expansion.skipped.len()
    );
    Ok(())
}

/// Build every case and report.
pub async fn run(opts: &RunOptions, json: bool) -> anyhow::Result<ExitCode> {
    let harness = harness(opts).await?;

    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner} [{pos}] {msg}")?);
    if json {
        bar.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    let summary = harness
        .run_observed(|report| {
            bar.inc(1);
            if !json {
                bar.println(format_report(report));
            }
            bar.set_message(report.case_name.clone());
        })
        .await?;
    bar.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!();
        println!(
            "{} passed, {} failed, {} excluded ({})",
            style(summary.passed()).green(),
            style(summary.failed()).red(),
            summary.skipped,
            summary.run_id
        );
        for failure in summary.failures() {
            println!("  {} {}", style("✗").red(), failure.case_name);
        }
    }

    Ok(if summary.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn format_report(report: &CaseReport) -> String {
    let mark = match &report.outcome {
        BuildOutcome::Pass => style("✓").green(),
        BuildOutcome::FailCreation { .. } => style("✗").red(),
        BuildOutcome::FailCompile { .. } => style("✗").red(),
    };
    let mut line = format!(
        "{} {} {}",
        mark,
        report.case_name,
        style(format!("({}, {} ms)", report.workspace, report.duration_ms)).dim()
    );
    if let BuildOutcome::FailCreation { reason } | BuildOutcome::FailCompile { reason } =
        &report.outcome
    {
        line.push_str(&format!("\n    {}", style(reason).dim()));
    }
    line
}
