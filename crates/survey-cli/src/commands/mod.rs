//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Database/config opening and `init`
//! - `import` - CSV import of ledger entries, roster, villages and codes
//! - `analysis` - Single-engine views (profile, anomalies, quality)
//! - `reports` - JSON report generation (household, batch, area)
//! - `coding` - Auto-coding cache commands and the area directory

pub mod analysis;
pub mod coding;
pub mod core;
pub mod import;
pub mod reports;

// Re-export command functions for main.rs
pub use analysis::*;
pub use coding::*;
pub use core::*;
pub use import::*;
pub use reports::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
