//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use survey_core::TimeWindow;

/// Survey - Household income/expenditure survey analysis
#[derive(Parser)]
#[command(name = "survey")]
#[command(about = "Household bookkeeping survey analysis", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "survey.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set SURVEY_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Analysis config file (defaults to the user override, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Optional analysis window; a bound applies only when both year and month are set
#[derive(Args, Debug, Clone, Default)]
pub struct WindowArgs {
    #[arg(long)]
    pub start_year: Option<String>,

    #[arg(long)]
    pub start_month: Option<String>,

    #[arg(long)]
    pub end_year: Option<String>,

    #[arg(long)]
    pub end_month: Option<String>,
}

impl WindowArgs {
    pub fn to_window(&self) -> survey_core::Result<TimeWindow> {
        TimeWindow::from_parts(
            self.start_year.as_deref(),
            self.start_month.as_deref(),
            self.end_year.as_deref(),
            self.end_month.as_deref(),
        )
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Import a CSV file
    Import {
        /// What the file contains
        #[arg(value_enum)]
        kind: ImportKind,

        /// CSV file to import
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Show a household's consumption profile
    Profile {
        /// Household code
        household: String,

        #[command(flatten)]
        window: WindowArgs,
    },

    /// List a household's anomalies
    Anomalies {
        /// Household code
        household: String,

        #[command(flatten)]
        window: WindowArgs,
    },

    /// Score a household's recording quality
    Quality {
        /// Household code
        household: String,

        #[command(flatten)]
        window: WindowArgs,
    },

    /// Population quality statistics
    QualityReport {
        /// Households to include (default: every household with data in the window)
        #[arg(long = "household", value_delimiter = ',')]
        households: Vec<String>,

        #[command(flatten)]
        window: WindowArgs,
    },

    /// Generate a JSON analysis report
    Report {
        #[command(subcommand)]
        report_type: ReportType,
    },

    /// Auto-coding from previously coded entries
    Coding {
        #[command(subcommand)]
        action: CodingAction,
    },

    /// List towns and their villages
    Areas,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImportKind {
    /// Ledger entries
    Ledger,
    /// Household roster
    Households,
    /// Town/village mapping
    Villages,
    /// Classification code table
    Codes,
}

#[derive(Subcommand)]
pub enum ReportType {
    /// Full report for one household
    Household {
        /// Household code
        household: String,

        #[command(flatten)]
        window: WindowArgs,

        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Report over a list of households
    Batch {
        /// Comma-separated household codes
        #[arg(long = "households", value_delimiter = ',', required = true)]
        households: Vec<String>,

        #[command(flatten)]
        window: WindowArgs,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Report over every household in a town and/or village
    Area {
        #[arg(long)]
        town: Option<String>,

        #[arg(long)]
        village: Option<String>,

        #[command(flatten)]
        window: WindowArgs,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum CodingAction {
    /// Show coding cache statistics
    Stats,

    /// Preview the most frequent item mappings
    Preview {
        /// Number of mappings to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Code uncoded entries by direct match
    Apply {
        /// Maximum entries to process
        #[arg(long, default_value = "1000")]
        limit: usize,
    },
}
