//! Survey Core Library
//!
//! Household income/expenditure survey analysis:
//! - SQLite storage for rosters, villages, code tables and ledger entries
//! - CSV loaders and JSON export
//! - Consumption profiling, anomaly detection and recording-quality scoring
//! - Household, batch and area reports combining the three engines
//! - Direct-match auto-coding cache and town/village directory

pub mod analysis;
pub mod coding;
pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod export;
pub mod import;
pub mod models;
pub mod source;
pub mod stats;

pub use analysis::{
    AnalysisReportGenerator, AnomalyEngine, AnomalyReport, BatchAnalysisReport,
    HouseholdAnalysisReport, HouseholdProfile, ProfileEngine, QualityEngine, QualityReport,
    ReportResponse,
};
pub use coding::{CodingCache, CodingStatistics};
pub use config::AnalysisConfig;
pub use db::{CodingOutcome, Database};
pub use directory::VillageDirectory;
pub use error::{Error, Result};
pub use export::{export_report_to_json, ExportTarget};
pub use models::{BenchmarkScope, EntryKind, TimeWindow, YearMonth};
pub use source::SurveySource;
