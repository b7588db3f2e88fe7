use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

/// Log level options for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    Off,
    /// Error messages only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
    /// Trace-level messages (most verbose)
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "fmgen")]
#[command(about = "fmgen - keep markdown frontmatter in sync with a template")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set log level (off, error, warn, info, debug, trace)
    #[arg(short = 'l', long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Enable verbose logging (shortcut for --log-level=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file (defaults to .fmgen.toml in the vault)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Vault root directory
    #[arg(long, global = true, env = "FMGEN_VAULT", default_value = ".")]
    pub vault: PathBuf,
}

impl Cli {
    /// `--log-level` wins over `--verbose`; the default only shows warnings.
    pub fn level_filter(&self) -> LevelFilter {
        match (self.log_level, self.verbose) {
            (Some(level), _) => level.into(),
            (None, true) => LevelFilter::DEBUG,
            (None, false) => LevelFilter::WARN,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate frontmatter for every document in the vault, or in one folder
    Run {
        /// Folder relative to the vault root (recursive)
        folder: Option<String>,

        /// Show what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate frontmatter for a single document
    File {
        /// Path of the document
        path: PathBuf,

        /// Show what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Print what the template generates for a document
    Preview {
        /// Document to evaluate against (defaults to a sample from the vault)
        path: Option<PathBuf>,

        /// Template to try instead of the configured one
        #[arg(short, long)]
        template: Option<String>,
    },

    /// Watch the vault and sync documents when they change
    Watch,

    /// Write a default settings file
    Init {
        /// Overwrite an existing settings file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_means_debug() {
        let cli = Cli::parse_from(["fmgen", "-v", "run"]);
        assert_eq!(cli.level_filter(), LevelFilter::DEBUG);
    }

    #[test]
    fn test_explicit_level_wins() {
        let cli = Cli::parse_from(["fmgen", "-v", "--log-level", "error", "watch"]);
        assert_eq!(cli.level_filter(), LevelFilter::ERROR);
    }

    #[test]
    fn test_run_arguments() {
        let cli = Cli::parse_from(["fmgen", "--vault", "/notes", "run", "Daily", "--dry-run"]);
        assert_eq!(cli.vault, PathBuf::from("/notes"));
        match cli.command {
            Commands::Run { folder, dry_run } => {
                assert_eq!(folder.as_deref(), Some("Daily"));
                assert!(dry_run);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
