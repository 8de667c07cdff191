//! CLI harness for the trellis engine
//!
//! A harness binary registers its test classes in a [`Catalog`] and hands it to [`run`], which parses the
//! command line, discovers or executes the selected tests and exits with the outcome.
//!
//! ## Commands
//!
//! - `discover` - Print the discovered test plan as a tree
//! - `execute` - Run the selected tests and print results (pytest-style)
//!
//! Both take the same selectors and filters. Without any selector every registered class is selected.
//!
//! ## Modules
//!
//! - `commands` - Command implementations
//! - `reporter` - Console reporting
//!
//! Commands report problems as [`CliError`] values carrying their own exit code; [`run`] is the one
//! function that prints them and leaves the process.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;
pub mod reporter;

pub use reporter::ConsoleReporter;

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process;
use std::rc::Rc;

use clap::{Args, Parser, Subcommand};

use crate::config::{Details, RunConfig};
use crate::model::Catalog;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Process exit status: 0 all passed, 1 a test or container failed, 2 the run itself could not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// A message for stderr plus the status to exit with.
#[derive(Debug)]
pub struct CliError {
    pub message: String,
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Bad selector text and other usage mistakes.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }

    /// Render a diagnostic the way miette reports it, exit code 2.
    pub fn diagnostic(error: impl miette::Diagnostic + Send + Sync + 'static) -> Self {
        Self::new(format!("{:?}", miette::Report::new(error)), ExitCode(2))
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub type CliResult<T> = Result<T, CliError>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Discover and run trellis tests
#[derive(Parser, Debug)]
#[command(name = "trellis")]
#[command(version = VERSION)]
#[command(about = "Discover and run trellis tests", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Selectors and filters shared by every command.
#[derive(Args, Debug, Default, Clone)]
pub struct Selection {
    /// Select a class by qualified name
    #[arg(long = "select-class", value_name = "CLASS")]
    pub classes: Vec<String>,

    /// Select a method: `Class#method` or `Class#method(T1, T2)`
    #[arg(long = "select-method", value_name = "CLASS#METHOD")]
    pub methods: Vec<String>,

    /// Select every class in a package and its sub-packages
    #[arg(long = "select-package", value_name = "PACKAGE")]
    pub packages: Vec<String>,

    /// Select a node by unique id
    #[arg(long = "select-id", value_name = "UNIQUE_ID")]
    pub unique_ids: Vec<String>,

    /// Select every class loaded from a classpath root
    #[arg(long = "scan-root", value_name = "PATH")]
    pub roots: Vec<PathBuf>,

    /// Keep only tests whose name or unique id contains KEYWORD
    #[arg(short = 'k', value_name = "KEYWORD")]
    pub keyword: Option<String>,

    /// Keep only tests carrying this tag
    #[arg(long = "include-tag", value_name = "TAG")]
    pub include_tags: Vec<String>,

    /// Drop tests carrying this tag
    #[arg(long = "exclude-tag", value_name = "TAG")]
    pub exclude_tags: Vec<String>,

    /// Restrict the run to an engine
    #[arg(long = "engine", value_name = "ID")]
    pub engines: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the discovered test plan
    Discover {
        #[command(flatten)]
        selection: Selection,
    },

    /// Execute the selected tests and report each outcome
    Execute {
        #[command(flatten)]
        selection: Selection,
        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
        /// Output layout
        #[arg(long, value_enum, default_value_t = Details::Flat)]
        details: Details,
        /// Disable ANSI colors
        #[arg(long = "no-color")]
        no_color: bool,
        /// Leave the elapsed time out of the summary line
        #[arg(long = "no-durations")]
        no_durations: bool,
    },
}

impl Command {
    /// The run configuration implied by the parsed flags.
    pub fn config(&self) -> RunConfig {
        let (selection, mut config) = match self {
            Command::Discover { selection } => (selection, RunConfig::new().with_details(Details::Tree)),
            Command::Execute {
                selection,
                verbose,
                details,
                no_color,
                no_durations,
            } => (
                selection,
                RunConfig::new()
                    .with_verbose(*verbose)
                    .with_details(*details)
                    .with_color(!no_color)
                    .with_durations(!no_durations),
            ),
        };
        config.include_tags = selection.include_tags.clone();
        config.exclude_tags = selection.exclude_tags.clone();
        config.keyword = selection.keyword.clone();
        config.engine_ids = selection.engines.clone();
        config
    }

    pub fn selection(&self) -> &Selection {
        match self {
            Command::Discover { selection } | Command::Execute { selection, .. } => selection,
        }
    }
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Parse the command line, run the command against `catalog` and exit with its status.
pub fn run(catalog: Catalog) {
    let cli = Cli::parse();

    match execute(cli, Rc::new(catalog)) {
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

/// Run an already parsed command; `Discover` prints to stdout, `Execute` reports to stderr.
pub fn execute(cli: Cli, catalog: Rc<Catalog>) -> CliResult<ExitCode> {
    let config = cli.command.config();
    let specification = commands::specification(cli.command.selection(), &config)?;
    match cli.command {
        Command::Discover { .. } => commands::discover(catalog, &specification, &mut io::stdout()),
        Command::Execute { .. } => {
            let mut reporter = ConsoleReporter::stderr(&config);
            commands::execute(catalog, &specification, &mut reporter)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_discover() {
        let cli = Cli::try_parse_from(["trellis", "discover", "--select-class", "a.Calc"]).unwrap();
        assert!(matches!(cli.command, Command::Discover { .. }));
        assert_eq!(cli.command.selection().classes, vec!["a.Calc"]);
    }

    #[test]
    fn test_cli_parse_execute() {
        let cli = Cli::try_parse_from([
            "trellis",
            "execute",
            "-v",
            "-k",
            "adds",
            "--select-method",
            "a.Calc#adds(i32, i32)",
            "--exclude-tag",
            "slow",
            "--details",
            "tree",
        ])
        .unwrap();
        if let Command::Execute {
            verbose,
            details,
            selection,
            ..
        } = &cli.command
        {
            assert!(verbose);
            assert_eq!(*details, Details::Tree);
            assert_eq!(selection.keyword.as_deref(), Some("adds"));
            assert_eq!(selection.methods, vec!["a.Calc#adds(i32, i32)"]);
        } else {
            panic!("Expected Execute command");
        }
    }

    #[test]
    fn test_config_from_flags() {
        let cli = Cli::try_parse_from([
            "trellis",
            "execute",
            "--no-color",
            "--include-tag",
            "fast",
            "--engine",
            "trellis",
        ])
        .unwrap();
        let config = cli.command.config();
        assert!(!config.color);
        assert!(config.durations);
        assert_eq!(config.include_tags, vec!["fast"]);
        assert_eq!(config.engine_ids, vec!["trellis"]);
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["trellis"]).is_err());
    }
}
