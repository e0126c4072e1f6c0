//! CLI module for the iovis test runner
//!
//! ## Commands
//!
//! - `test [path]` - Collect and run artifact tests (pytest-style)
//! - `templates` - List the built-in test templates and the global contributor chain
//!
//! ## Modules
//!
//! - `test_interfaces` - Execution engine boundary
//! - `test_runner` - Collection, reporting and execution
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod test_interfaces;
pub mod test_runner;

use std::fmt;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use crate::config::{ProjectSettings, SCOPE_FILE_NAME, ScopeDeclaration};
use crate::discovery::{self, DiscoveryOptions};
use crate::templates::{self, TemplateRegistry};

use self::test_interfaces::{ArtifactExecutor, PapermillExecutor, RunOptions};
use self::test_runner::{ConsoleReporter, RunConfig};

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
    /// Usage or configuration problem that prevented the run.
    pub const USAGE: ExitCode = ExitCode(4);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Render a diagnostic with its code and help, exiting with [`ExitCode::USAGE`].
    pub fn diagnostic(err: impl miette::Diagnostic + Send + Sync + 'static) -> Self {
        Self::new(format!("{:?}", miette::Report::new(err)), ExitCode::USAGE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Auto-generated tests for notebooks and other data artifacts
#[derive(Parser, Debug)]
#[command(name = "iovis")]
#[command(version = VERSION)]
#[command(about = "Auto-generated tests for notebooks and other data artifacts", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Collect and run tests (pytest-style)
    Test {
        /// Project directory or single file
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,
        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
        /// Stop on first failure
        #[arg(short = 'x', long = "exitfirst")]
        stop_on_fail: bool,
        /// Only run tests whose node id contains EXPR
        #[arg(short = 'k', value_name = "EXPR")]
        filter: Option<String>,
        /// Print the collected tree and exit
        #[arg(long)]
        collect_only: bool,
        /// Global default templates, overriding the project's
        #[arg(short = 't', long = "template", value_name = "TEMPLATE")]
        templates: Vec<String>,
        /// Notebook parameter, forwarded to the execution engine
        #[arg(short = 'p', long = "parameter", value_name = "KEY=VALUE", value_parser = parse_parameter)]
        parameters: Vec<(String, String)>,
        /// Keep executed notebooks in DIR
        #[arg(long, value_name = "DIR")]
        keep_outputs: Option<PathBuf>,
        /// Leave a global contributor out of the chain
        #[arg(long, value_name = "CONTRIBUTOR")]
        without: Vec<String>,
    },

    /// List the built-in templates and the global contributor chain
    Templates {
        /// Project directory whose `[project]` settings are shown
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,
    },
}

fn parse_parameter(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    let registry = TemplateRegistry::builtin();

    match cli.command {
        Command::Test {
            path,
            verbose,
            stop_on_fail,
            filter,
            collect_only,
            templates,
            parameters,
            keep_outputs,
            without,
        } => {
            let executor = PapermillExecutor::probe();
            let config = RunConfig {
                discovery: DiscoveryOptions {
                    templates,
                    without,
                    engine_available: executor.is_available(),
                },
                run: RunOptions {
                    parameters,
                    keep_outputs,
                },
                filter,
                stop_on_fail,
                collect_only,
            };
            let mut reporter = ConsoleReporter::new(verbose);
            test_runner::run_tests(&path, &config, &registry, &executor, &mut reporter)
        }
        Command::Templates { path } => list_templates(&path, &registry),
    }
}

/// Handle the `templates` subcommand.
fn list_templates(path: &Path, registry: &TemplateRegistry) -> CliResult<ExitCode> {
    println!("Built-in templates:");
    for entry in registry.iter() {
        let template = entry.template();
        println!("  {:<20} {}", template.name(), entry.summary());
        for member in templates::members(template) {
            println!("    ::{member}");
        }
    }

    let path = std::fs::canonicalize(path)
        .map_err(|e| CliError::new(format!("cannot read '{}': {e}", path.display()), ExitCode::USAGE))?;
    let root = discovery::project_root(&path);
    let decl = ScopeDeclaration::load(&root).map_err(CliError::diagnostic)?;
    let settings = ProjectSettings::from_table(decl.as_ref().and_then(|d| d.file.project.as_ref()));
    let options = DiscoveryOptions {
        engine_available: PapermillExecutor::probe().is_available(),
        ..DiscoveryOptions::default()
    };
    let chain = discovery::global_chain(&options, &settings, registry, &root.join(SCOPE_FILE_NAME))
        .map_err(CliError::diagnostic)?;

    println!();
    println!("Global contributors (first answer wins):");
    for contributor in chain.iter() {
        println!("  {}", contributor.name());
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// Tests
// ============================================================================
