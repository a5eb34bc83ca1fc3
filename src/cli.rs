use crate::config::{load_config, HarnessConfig};
use crate::registry::Registry;
use crate::report::{Reporter, TerminalReporter};
use crate::{rewrite, runner};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directives.
pub const LOG_ENV_VAR: &str = "EXPECT_DEF_LOG";

#[derive(Parser, Debug)]
#[command(name = "expect-def")]
#[command(about = "Run output expectations and regenerate their recorded blocks", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run every registered expectation and write corrections for failing artifacts (default)
    Test {
        /// Do not invoke the diff tool on failing artifacts
        #[arg(long)]
        no_diff: bool,
    },
    /// Replace every artifact that has a corrected sibling with that sibling
    Accept,
}

impl Cli {
    /// The requested command, `test` when none was given.
    pub fn action(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or(Commands::Test { no_diff: false })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Passed,
    Failed,
}

impl RunStatus {
    /// Process exit status for this outcome. A failed run exits 1 unless
    /// `fail_exit_code` is turned off.
    pub fn exit_code(self, config: &HarnessConfig) -> u8 {
        match self {
            RunStatus::Failed if config.fail_exit_code => 1,
            _ => 0,
        }
    }
}

/// Install the stderr tracing subscriber. Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Entry point for a suite binary: parse the command line, load
/// configuration and run `registry`.
pub fn run(mut registry: Registry) -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config().with_env_overrides();
    let mut reporter = TerminalReporter::stdout(config.diff.clone());

    let status = run_with(&cli, &mut registry, &config, &mut reporter)?;
    Ok(ExitCode::from(status.exit_code(&config)))
}

pub fn run_with(
    cli: &Cli,
    registry: &mut Registry,
    config: &HarnessConfig,
    reporter: &mut dyn Reporter,
) -> Result<RunStatus> {
    match cli.action() {
        Commands::Test { no_diff } => {
            let show_diff = config.diff.enabled && !no_diff;
            run_tests(registry, config, reporter, show_diff)
        }
        Commands::Accept => {
            accept_all(registry, config)?;
            Ok(RunStatus::Passed)
        }
    }
}

fn run_tests(
    registry: &mut Registry,
    config: &HarnessConfig,
    reporter: &mut dyn Reporter,
    show_diff: bool,
) -> Result<RunStatus> {
    let suffix = config.corrected_suffix.as_str();
    // A stale sibling that cannot be removed fails its artifact and leaves
    // it uncorrected; the rest of the suite still runs.
    let mut unprepared = BTreeSet::new();
    for artifact in registry.artifacts() {
        if let Err(e) = runner::prepare(artifact, suffix) {
            tracing::error!(artifact = %artifact.display(), "could not clear corrected artifact: {e}");
            unprepared.insert(artifact.to_path_buf());
        }
    }

    let summary = runner::run_all(registry);

    for (artifact, passed) in summary.iter() {
        let blocked = unprepared.contains(artifact);
        reporter.report(artifact, passed && !blocked)?;
        if passed || blocked {
            continue;
        }
        // A broken artifact must not keep the others from being corrected.
        match rewrite::rewrite(artifact, registry.expectations(artifact), suffix) {
            Ok(corrected) => {
                reporter.announce_diff(artifact, &corrected)?;
                if show_diff {
                    reporter.display_diff(artifact, &corrected);
                }
            }
            Err(e) => {
                tracing::error!(artifact = %artifact.display(), "could not write corrected artifact: {e}");
            }
        }
    }

    Ok(if summary.all_passed() && unprepared.is_empty() {
        RunStatus::Passed
    } else {
        RunStatus::Failed
    })
}

fn accept_all(registry: &Registry, config: &HarnessConfig) -> Result<()> {
    for artifact in registry.artifacts() {
        rewrite::accept(artifact, &config.corrected_suffix)
            .with_context(|| format!("Failed to accept {}", artifact.display()))?;
    }
    Ok(())
}
