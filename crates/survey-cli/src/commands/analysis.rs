//! Single-engine views of one household or a population

use anyhow::{Context, Result};
use survey_core::analysis::{
    AnomalyEngine, HouseholdProfile, ProfileEngine, QualityEngine, TagDimension,
};
use survey_core::{AnalysisConfig, Database, TimeWindow};

use super::truncate;

fn print_window(window: &TimeWindow) {
    let range = window.range();
    println!(
        "   Window: {} to {}",
        range.start.as_deref().unwrap_or("start"),
        range.end.as_deref().unwrap_or("end")
    );
}

pub fn cmd_profile(
    db: &Database,
    config: &AnalysisConfig,
    household: &str,
    window: &TimeWindow,
) -> Result<()> {
    let engine = ProfileEngine::with_config(db, config);
    let profile = engine
        .generate_household_profile(household, window)
        .with_context(|| format!("Failed to profile household {}", household))?;

    println!();
    println!("🧾 Consumption Profile: {}", household);
    print_window(window);
    println!("   ─────────────────────────────────────────────────────────────");

    let profile = match profile {
        HouseholdProfile::Complete(profile) => profile,
        HouseholdProfile::InsufficientData { .. } => {
            println!("   No ledger entries in this window (数据不足).");
            return Ok(());
        }
    };

    println!("   Head: {}", profile.head_name);
    for dimension in TagDimension::ALL {
        let tags: Vec<&str> = profile.tags(dimension).iter().map(|t| t.label()).collect();
        println!("   {}: {}", dimension.label(), tags.join("、"));
    }

    if !profile.structure.categories.is_empty() {
        println!();
        println!("   {:16} │ {:>12} │ {:>6}", "Category", "Amount", "%");
        println!("   ─────────────────┼──────────────┼────────");
        for category in &profile.structure.categories {
            println!(
                "   {:16} │ {:>12.2} │ {:>5.1}%",
                truncate(&category.name, 16),
                category.amount,
                category.percentage
            );
        }
        println!("   Total expenditure: {:.2}", profile.structure.total_expenditure);
    }

    Ok(())
}

pub fn cmd_anomalies(
    db: &Database,
    config: &AnalysisConfig,
    household: &str,
    window: &TimeWindow,
) -> Result<()> {
    let engine = AnomalyEngine::with_config(db, config);
    let report = engine
        .detect_household_anomalies(household, window)
        .with_context(|| format!("Failed to check household {}", household))?;
    let stats = &report.statistics;

    println!();
    println!("🔍 Anomalies: {}", household);
    print_window(window);
    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   Records: {}  Anomalies: {}  Score: {:.2}",
        stats.total_records, stats.total_anomalies, stats.score
    );

    if report.details.is_empty() {
        println!();
        println!("✅ No anomalies found.");
        return Ok(());
    }

    println!(
        "   Severity: 高 {}  中 {}  低 {}",
        stats.by_severity.high, stats.by_severity.medium, stats.by_severity.low
    );
    println!();
    for row in &report.details {
        println!(
            "   [{}] {:10} {:>10.2}  {}",
            row.severity,
            row.date.as_deref().unwrap_or("-"),
            row.amount,
            truncate(&row.reason, 60)
        );
    }

    Ok(())
}

pub fn cmd_quality(db: &Database, household: &str, window: &TimeWindow) -> Result<()> {
    let engine = QualityEngine::new(db);
    let report = engine
        .evaluate_household_quality(household, window)
        .with_context(|| format!("Failed to score household {}", household))?;

    println!();
    println!("📋 Recording Quality: {}", household);
    print_window(window);
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Level: {}  Total: {:.2}", report.level, report.total_score);

    if let Some(scores) = &report.scores {
        println!("   Frequency:         {:>6.2}", scores.frequency);
        println!("   Continuity:        {:>6.2}", scores.continuity);
        println!("   Time distribution: {:>6.2}", scores.time_distribution);
        println!("   Completeness:      {:>6.2}", scores.completeness);
        println!("   Consistency:       {:>6.2}", scores.consistency);
    }

    if !report.suggestions.is_empty() {
        println!();
        println!("💡 Suggestions:");
        for suggestion in &report.suggestions {
            println!("   - {}", suggestion);
        }
    }

    Ok(())
}

/// Quality statistics over the given households, or all with data in the window
pub fn cmd_quality_report(db: &Database, households: &[String], window: &TimeWindow) -> Result<()> {
    let codes = if households.is_empty() {
        db.get_all_households_with_data(window)?
    } else {
        households.to_vec()
    };

    let engine = QualityEngine::new(db);
    let report = engine
        .generate_quality_report(&codes, window)
        .context("Failed to build quality report")?;

    println!();
    println!("📊 Quality Report");
    print_window(window);
    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   Households: {}  Scored: {}",
        report.household_count, report.scored_count
    );
    println!(
        "   Average: {:.2}  Max: {:.2}  Min: {:.2}  Std dev: {:.2}",
        report.average_score, report.max_score, report.min_score, report.std_dev
    );
    println!();
    for (level, count) in &report.level_distribution {
        println!("   {:6} {:>5}", level.label(), count);
    }

    Ok(())
}
