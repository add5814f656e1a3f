//! Report generation commands
//!
//! Reports are written as JSON in the `{success, ...report}` / `{success, error}`
//! envelope. A failed report is still written, then surfaced as an error.

use std::path::Path;

use anyhow::{bail, Result};
use serde::Serialize;
use survey_core::analysis::{AnalysisReportGenerator, ReportResponse};
use survey_core::{export_report_to_json, AnalysisConfig, Database, ExportTarget, TimeWindow};

fn emit<T: Serialize>(response: &ReportResponse<T>, output: Option<&Path>) -> Result<()> {
    match export_report_to_json(response, output)? {
        ExportTarget::Text(json) => println!("{}", json),
        ExportTarget::File(path) => println!("✅ Report written to {}", path.display()),
    }

    if !response.success {
        bail!(
            "{}",
            response.error.as_deref().unwrap_or("Report generation failed")
        );
    }
    Ok(())
}

pub fn cmd_report_household(
    db: &Database,
    config: &AnalysisConfig,
    household: &str,
    window: &TimeWindow,
    output: Option<&Path>,
) -> Result<()> {
    let generator = AnalysisReportGenerator::with_config(db, config);
    let response = generator.generate_household_analysis_report(household, window);
    emit(&response, output)
}

pub fn cmd_report_batch(
    db: &Database,
    config: &AnalysisConfig,
    households: &[String],
    window: &TimeWindow,
    output: Option<&Path>,
) -> Result<()> {
    let generator = AnalysisReportGenerator::with_config(db, config);
    let response = generator.generate_batch_analysis_report(households, window);
    emit(&response, output)
}

pub fn cmd_report_area(
    db: &Database,
    config: &AnalysisConfig,
    town: Option<&str>,
    village: Option<&str>,
    window: &TimeWindow,
    output: Option<&Path>,
) -> Result<()> {
    if town.is_none() && village.is_none() {
        bail!("Specify --town and/or --village");
    }
    let generator = AnalysisReportGenerator::with_config(db, config);
    let response = generator.generate_area_analysis_report(town, village, window);
    emit(&response, output)
}
