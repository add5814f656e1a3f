//! Analysis report generator
//!
//! Runs the profile, anomaly and quality engines for one household, a list
//! of households, or an area, and merges their output with a comprehensive
//! assessment. The `generate_*` functions wrap each report in a
//! [`ReportResponse`] envelope so callers get `{success: false, error}`
//! instead of an `Err` for recoverable failures.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::anomaly::{AnomalyEngine, AnomalyReport};
use super::profile::{ConsumptionProfile, HouseholdProfile, ProfileEngine, ProfileTag, TagDimension};
use super::quality::{scored_share, QualityEngine, QualityLevel, QualityReport};
use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::models::{AnalysisRange, EntryKind, HouseholdBasicInfo, HouseholdOverview, TimeWindow};
use crate::source::SurveySource;
use crate::stats::{mean, round2, safe_ratio};

/// Anomaly score above which the report asks for corrections
const ANOMALY_SUGGESTION_THRESHOLD: f64 = 20.0;
/// Quality total below which the quality engine's suggestions are merged in
const QUALITY_SUGGESTION_THRESHOLD: f64 = 80.0;

pub const ANOMALY_SUGGESTION: &str = "建议检查和修正异常记录，提高数据准确性";
pub const PROFILE_SUGGESTION: &str = "建议增加记账数据，以便进行更准确的消费习惯分析";
const WEIGHTING_NOTE: &str = "记账质量70% + 异常情况30%";

/// Success/failure envelope around a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportResponse<T> {
    pub success: bool,
    #[serde(flatten)]
    pub report: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl<T> ReportResponse<T> {
    pub fn ok(report: T) -> Self {
        Self {
            success: true,
            report: Some(report),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            report: None,
            error: Some(message.into()),
        }
    }

    fn from_result(result: Result<T>, context: &str) -> Self {
        match result {
            Ok(report) => Self::ok(report),
            Err(Error::NotFound(message)) => Self::failure(message),
            Err(e) => {
                error!(error = %e, "{}", context);
                Self::failure(format!("{}: {}", context, e))
            }
        }
    }

    pub fn into_result(self) -> Result<T> {
        match (self.report, self.error) {
            (Some(report), _) => Ok(report),
            (None, message) => Err(Error::InvalidData(
                message.unwrap_or_else(|| "empty report response".to_string()),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generated_at: String,
    pub household_code: String,
    pub head_name: String,
    pub analysis_range: AnalysisRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComposition {
    pub quality_score: f64,
    /// 100 minus the anomaly score
    pub anomaly_situation_score: f64,
    pub weighting: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComprehensiveAssessment {
    pub score: f64,
    pub level: QualityLevel,
    pub description: String,
    pub suggestions: Vec<String>,
    pub composition: ScoreComposition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseholdAnalysisReport {
    pub report_metadata: ReportMetadata,
    pub household_basic_info: HouseholdOverview,
    pub consumption_profile: HouseholdProfile,
    pub anomaly_detection: AnomalyReport,
    pub quality_assessment: QualityReport,
    pub comprehensive_assessment: ComprehensiveAssessment,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityBatchStatistics {
    pub average_score: f64,
    pub max_score: f64,
    pub min_score: f64,
    pub level_distribution: BTreeMap<QualityLevel, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyBatchStatistics {
    pub average_score: f64,
    pub total_anomalies: usize,
    pub average_per_household: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchOverview {
    pub analysed_count: usize,
    /// Households whose quality total is positive
    pub valid_count: usize,
    pub completeness_ratio: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStatistics {
    pub quality: QualityBatchStatistics,
    pub anomaly: AnomalyBatchStatistics,
    /// Tag frequency per dimension across all profiled households
    pub tag_statistics: BTreeMap<TagDimension, BTreeMap<ProfileTag, usize>>,
    pub overview: BatchOverview,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaInfo {
    pub town_name: Option<String>,
    pub village_name: Option<String>,
    pub household_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchMetadata {
    pub generated_at: String,
    pub household_count: usize,
    pub analysis_range: AnalysisRange,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub area: Option<AreaInfo>,
}

/// Per-household engine output, keyed by household code
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailedResults {
    pub consumption_profiles: BTreeMap<String, ConsumptionProfile>,
    pub anomaly_detections: BTreeMap<String, AnomalyReport>,
    pub quality_assessments: BTreeMap<String, QualityReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchAnalysisReport {
    pub report_metadata: BatchMetadata,
    pub batch_statistics: BatchStatistics,
    pub detailed_results: DetailedResults,
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

pub struct AnalysisReportGenerator<'a> {
    source: &'a dyn SurveySource,
    profiles: ProfileEngine<'a>,
    anomalies: AnomalyEngine<'a>,
    quality: QualityEngine<'a>,
}

impl<'a> AnalysisReportGenerator<'a> {
    pub fn new(source: &'a dyn SurveySource) -> Self {
        Self {
            source,
            profiles: ProfileEngine::new(source),
            anomalies: AnomalyEngine::new(source),
            quality: QualityEngine::new(source),
        }
    }

    pub fn with_config(source: &'a dyn SurveySource, config: &AnalysisConfig) -> Self {
        Self {
            source,
            profiles: ProfileEngine::with_config(source, config),
            anomalies: AnomalyEngine::with_config(source, config),
            quality: QualityEngine::new(source),
        }
    }

    /// Full report for one household
    ///
    /// Returns `Error::NotFound` when the household has no basic info.
    pub fn household_report(
        &self,
        household_code: &str,
        window: &TimeWindow,
    ) -> Result<HouseholdAnalysisReport> {
        info!(household = %household_code, "Generating household analysis report");

        let basic = self
            .source
            .get_household_basic_info(household_code)?
            .ok_or_else(|| {
                Error::NotFound(format!("未找到户代码 {} 的基础信息", household_code))
            })?;
        let overview = self.overview(basic, window)?;

        let profile = self.profiles.generate_household_profile(household_code, window)?;
        let anomalies = self.anomalies.detect_household_anomalies(household_code, window)?;
        let quality = self.quality.evaluate_household_quality(household_code, window)?;
        let assessment = comprehensive_assessment(&profile, &anomalies, &quality);

        Ok(HouseholdAnalysisReport {
            report_metadata: ReportMetadata {
                generated_at: timestamp(),
                household_code: household_code.to_string(),
                head_name: overview.basic.head_name.clone(),
                analysis_range: window.range(),
            },
            household_basic_info: overview,
            consumption_profile: profile,
            anomaly_detection: anomalies,
            quality_assessment: quality,
            comprehensive_assessment: assessment,
        })
    }

    /// Per-household results plus cross-household statistics
    pub fn batch_report(
        &self,
        household_codes: &[String],
        window: &TimeWindow,
    ) -> Result<BatchAnalysisReport> {
        info!(households = household_codes.len(), "Generating batch analysis report");

        let profiles = self.profiles.generate_batch_profiles(household_codes, window);
        let anomalies = self.anomalies.detect_batch_anomalies(household_codes, window);
        let quality = self.quality.evaluate_batch_quality(household_codes, window);
        let statistics = batch_statistics(&profiles, &anomalies, &quality);

        Ok(BatchAnalysisReport {
            report_metadata: BatchMetadata {
                generated_at: timestamp(),
                household_count: household_codes.len(),
                analysis_range: window.range(),
                area: None,
            },
            batch_statistics: statistics,
            detailed_results: DetailedResults {
                consumption_profiles: profiles,
                anomaly_detections: anomalies,
                quality_assessments: quality,
            },
        })
    }

    /// Batch report over every household in a town and/or village
    pub fn area_report(
        &self,
        town_name: Option<&str>,
        village_name: Option<&str>,
        window: &TimeWindow,
    ) -> Result<BatchAnalysisReport> {
        let codes = self.source.get_households_by_area(town_name, village_name)?;
        if codes.is_empty() {
            return Err(Error::NotFound("未找到指定区域的户数据".to_string()));
        }

        let mut report = self.batch_report(&codes, window)?;
        report.report_metadata.area = Some(AreaInfo {
            town_name: town_name.map(str::to_string),
            village_name: village_name.map(str::to_string),
            household_count: codes.len(),
        });
        Ok(report)
    }

    pub fn generate_household_analysis_report(
        &self,
        household_code: &str,
        window: &TimeWindow,
    ) -> ReportResponse<HouseholdAnalysisReport> {
        ReportResponse::from_result(
            self.household_report(household_code, window),
            "生成分析报告失败",
        )
    }

    pub fn generate_batch_analysis_report(
        &self,
        household_codes: &[String],
        window: &TimeWindow,
    ) -> ReportResponse<BatchAnalysisReport> {
        ReportResponse::from_result(
            self.batch_report(household_codes, window),
            "生成批量分析报告失败",
        )
    }

    pub fn generate_area_analysis_report(
        &self,
        town_name: Option<&str>,
        village_name: Option<&str>,
        window: &TimeWindow,
    ) -> ReportResponse<BatchAnalysisReport> {
        ReportResponse::from_result(
            self.area_report(town_name, village_name, window),
            "生成区域分析报告失败",
        )
    }

    fn overview(&self, basic: HouseholdBasicInfo, window: &TimeWindow) -> Result<HouseholdOverview> {
        let code = basic.household_code.clone();
        let records = self.source.get_household_income_expense_data(&code, window)?;
        let monthly = self.source.get_household_monthly_summary(&code, window)?;

        let total = |kind: EntryKind| -> f64 {
            records.iter().filter(|r| r.kind == kind).map(|r| r.amount).sum()
        };
        let total_income = total(EntryKind::Income);
        let total_expense = total(EntryKind::Expense);
        let days: BTreeSet<_> = records.iter().filter_map(|r| r.date).collect();

        Ok(HouseholdOverview {
            basic,
            total_income,
            total_expense,
            net_income: total_income - total_expense,
            recording_days: days.len(),
            record_count: records.len(),
            month_count: monthly.len(),
        })
    }
}

/// Merge the three engine results into one score, level and suggestion list
pub fn comprehensive_assessment(
    profile: &HouseholdProfile,
    anomalies: &AnomalyReport,
    quality: &QualityReport,
) -> ComprehensiveAssessment {
    let quality_score = quality.total_score;
    let anomaly_score = anomalies.statistics.score;
    let score = round2(composite_score(quality_score, anomaly_score));
    let level = QualityLevel::from_score(score);

    let mut suggestions = Vec::new();
    if quality_score < QUALITY_SUGGESTION_THRESHOLD {
        suggestions.extend(quality.suggestions.iter().cloned());
    }
    if anomaly_score > ANOMALY_SUGGESTION_THRESHOLD {
        suggestions.push(ANOMALY_SUGGESTION.to_string());
    }
    let thin_profile = match profile {
        HouseholdProfile::Complete(p) => p.has_insufficient_dimension(),
        HouseholdProfile::InsufficientData { .. } => true,
    };
    if thin_profile {
        suggestions.push(PROFILE_SUGGESTION.to_string());
    }

    ComprehensiveAssessment {
        score,
        level,
        description: level_description(level).to_string(),
        suggestions,
        composition: ScoreComposition {
            quality_score,
            anomaly_situation_score: 100.0 - anomaly_score,
            weighting: WEIGHTING_NOTE.to_string(),
        },
    }
}

/// `quality * 0.7 + (100 - anomaly) * 0.3`
pub fn composite_score(quality_score: f64, anomaly_score: f64) -> f64 {
    quality_score * 0.7 + (100.0 - anomaly_score) * 0.3
}

fn level_description(level: QualityLevel) -> &'static str {
    match level {
        QualityLevel::Excellent => "记账质量优秀，数据可靠性高，异常情况少",
        QualityLevel::Good => "记账质量良好，数据基本可靠，存在少量异常",
        QualityLevel::Fair => "记账质量一般，数据可用性中等，需要关注异常情况",
        QualityLevel::Poor => "记账质量较差，数据可靠性不高，存在较多异常",
        QualityLevel::VeryPoor | QualityLevel::InsufficientData => {
            "记账质量很差，数据可靠性低，异常情况严重"
        }
    }
}

pub fn batch_statistics(
    profiles: &BTreeMap<String, ConsumptionProfile>,
    anomalies: &BTreeMap<String, AnomalyReport>,
    quality: &BTreeMap<String, QualityReport>,
) -> BatchStatistics {
    let quality_scores: Vec<f64> = quality.values().map(|r| r.total_score).collect();
    let mut level_distribution = BTreeMap::new();
    for report in quality.values() {
        *level_distribution.entry(report.level).or_insert(0) += 1;
    }
    let quality_stats = QualityBatchStatistics {
        average_score: round2(mean(&quality_scores)),
        max_score: quality_scores.iter().copied().reduce(f64::max).unwrap_or(0.0),
        min_score: quality_scores.iter().copied().reduce(f64::min).unwrap_or(0.0),
        level_distribution,
    };

    let anomaly_scores: Vec<f64> = anomalies.values().map(|r| r.statistics.score).collect();
    let total_anomalies: usize = anomalies.values().map(|r| r.statistics.total_anomalies).sum();
    let anomaly_stats = AnomalyBatchStatistics {
        average_score: round2(mean(&anomaly_scores)),
        total_anomalies,
        average_per_household: round2(safe_ratio(total_anomalies as f64, anomalies.len() as f64)),
    };

    let mut tag_statistics: BTreeMap<TagDimension, BTreeMap<ProfileTag, usize>> = BTreeMap::new();
    for profile in profiles.values() {
        for dimension in TagDimension::ALL {
            let counts = tag_statistics.entry(dimension).or_default();
            for tag in profile.tags(dimension) {
                *counts.entry(*tag).or_insert(0) += 1;
            }
        }
    }

    let valid_count = quality_scores.iter().filter(|s| **s > 0.0).count();

    BatchStatistics {
        quality: quality_stats,
        anomaly: anomaly_stats,
        tag_statistics,
        overview: BatchOverview {
            analysed_count: quality.len(),
            valid_count,
            completeness_ratio: scored_share(quality),
        },
    }
}
