//! Survey CLI - Household income/expenditure survey analysis
//!
//! Usage:
//!   survey init                               Initialize database
//!   survey import ledger --file entries.csv   Import ledger entries
//!   survey report household 110101001001001   Full JSON report
//!   survey coding apply                       Auto-code uncoded entries

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Import { kind, file } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_import(&db, kind, &file).map(|_| ())
        }
        Commands::Profile { household, window } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_profile(&db, &config, &household, &window.to_window()?)
        }
        Commands::Anomalies { household, window } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_anomalies(&db, &config, &household, &window.to_window()?)
        }
        Commands::Quality { household, window } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_quality(&db, &household, &window.to_window()?)
        }
        Commands::QualityReport { households, window } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_quality_report(&db, &households, &window.to_window()?)
        }
        Commands::Report { report_type } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let config = commands::load_config(cli.config.as_deref())?;
            match report_type {
                ReportType::Household {
                    household,
                    window,
                    output,
                } => commands::cmd_report_household(
                    &db,
                    &config,
                    &household,
                    &window.to_window()?,
                    output.as_deref(),
                ),
                ReportType::Batch {
                    households,
                    window,
                    output,
                } => commands::cmd_report_batch(
                    &db,
                    &config,
                    &households,
                    &window.to_window()?,
                    output.as_deref(),
                ),
                ReportType::Area {
                    town,
                    village,
                    window,
                    output,
                } => commands::cmd_report_area(
                    &db,
                    &config,
                    town.as_deref(),
                    village.as_deref(),
                    &window.to_window()?,
                    output.as_deref(),
                ),
            }
        }
        Commands::Coding { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                CodingAction::Stats => commands::cmd_coding_stats(&db),
                CodingAction::Preview { limit } => commands::cmd_coding_preview(&db, limit),
                CodingAction::Apply { limit } => {
                    commands::cmd_coding_apply(&db, limit).map(|_| ())
                }
            }
        }
        Commands::Areas => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_areas(&db)
        }
    }
}
