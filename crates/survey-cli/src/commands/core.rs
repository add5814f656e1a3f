//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_config` - Resolve the analysis configuration
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use survey_core::{AnalysisConfig, Database};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .with_context(|| format!("Database path is not valid UTF-8: {}", db_path.display()))?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Explicit --config path, else the user override, else built-in defaults
pub fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    let config = AnalysisConfig::load(path).context("Failed to load analysis config")?;
    match &config.source {
        Some(p) => tracing::debug!(path = %p.display(), "Using analysis config"),
        None => tracing::debug!("Using built-in analysis config"),
    }
    Ok(config)
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    open_db(db_path, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Import villages and roster: survey import villages --file villages.csv");
    println!("  2. Import code table: survey import codes --file codes.csv");
    println!("  3. Import ledger entries: survey import ledger --file ledger.csv");

    Ok(())
}
