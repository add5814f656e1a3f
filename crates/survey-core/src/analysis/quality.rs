//! Recording quality engine
//!
//! Scores how well a household keeps its ledger on five independent
//! indicators and combines them into a weighted total:
//!
//! | Indicator        | Weight | Looks at                               |
//! |------------------|--------|----------------------------------------|
//! | Frequency        | 0.25   | records per month                      |
//! | Continuity       | 0.20   | gaps between recorded months           |
//! | TimeDistribution | 0.20   | month-end bulk entry, day spread       |
//! | Completeness     | 0.20   | notes, codes, item variety             |
//! | Consistency      | 0.15   | round amounts, duplicates              |

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{
    AnalysisRange, LedgerRecord, MonthlyRecording, PatternRatios, RecordingPattern, TimeWindow,
    YearMonth,
};
use crate::source::SurveySource;
use crate::stats::{coefficient_of_variation, count_ratio, mean, population_std_dev, round2, safe_ratio};

/// Amounts treated as suspiciously round
const ROUND_AMOUNTS: [f64; 6] = [100.0, 200.0, 500.0, 1000.0, 2000.0, 5000.0];

pub const AFFIRMING_SUGGESTION: &str = "记账质量良好，请继续保持";

/// Indicator weights, summing to 1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    pub frequency: f64,
    pub continuity: f64,
    pub time_distribution: f64,
    pub completeness: f64,
    pub consistency: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            frequency: 0.25,
            continuity: 0.20,
            time_distribution: 0.20,
            completeness: 0.20,
            consistency: 0.15,
        }
    }
}

/// Five sub-scores (0-100) and their weighted total
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityScores {
    pub frequency: f64,
    pub continuity: f64,
    pub time_distribution: f64,
    pub completeness: f64,
    pub consistency: f64,
    pub total: f64,
}

impl QualityScores {
    pub fn new(
        frequency: f64,
        continuity: f64,
        time_distribution: f64,
        completeness: f64,
        consistency: f64,
        weights: &QualityWeights,
    ) -> Self {
        let total = frequency * weights.frequency
            + continuity * weights.continuity
            + time_distribution * weights.time_distribution
            + completeness * weights.completeness
            + consistency * weights.consistency;
        Self {
            frequency,
            continuity,
            time_distribution,
            completeness,
            consistency,
            total: round2(total),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityLevel {
    #[serde(rename = "优秀")]
    Excellent,
    #[serde(rename = "良好")]
    Good,
    #[serde(rename = "一般")]
    Fair,
    #[serde(rename = "较差")]
    Poor,
    #[serde(rename = "很差")]
    VeryPoor,
    #[serde(rename = "数据不足")]
    InsufficientData,
}

impl QualityLevel {
    /// Band for a 0-100 score: ≥90, ≥80, ≥70, ≥60, below
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Self::Excellent
        } else if score >= 80.0 {
            Self::Good
        } else if score >= 70.0 {
            Self::Fair
        } else if score >= 60.0 {
            Self::Poor
        } else {
            Self::VeryPoor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "优秀",
            Self::Good => "良好",
            Self::Fair => "一般",
            Self::Poor => "较差",
            Self::VeryPoor => "很差",
            Self::InsufficientData => "数据不足",
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Intermediate measurements behind the sub-scores
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityIndicators {
    pub month_count: usize,
    pub avg_records_per_month: f64,
    pub missing_months: i64,
    pub month_end_ratio: f64,
    pub day_variation: f64,
    pub note_usage_ratio: f64,
    pub coding_completeness_ratio: f64,
    pub distinct_item_count: i64,
    pub integer_amount_ratio: f64,
    pub duplicate_ratio: f64,
    pub round_amount_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub household_code: String,
    pub analysis_range: AnalysisRange,
    pub level: QualityLevel,
    /// Weighted total, 0 when data is insufficient
    pub total_score: f64,
    pub scores: Option<QualityScores>,
    pub weights: QualityWeights,
    pub indicators: Option<QualityIndicators>,
    pub pattern: Option<RecordingPattern>,
    pub ratios: Option<PatternRatios>,
    pub suggestions: Vec<String>,
}

impl QualityReport {
    fn insufficient(household_code: &str, window: &TimeWindow) -> Self {
        Self {
            household_code: household_code.to_string(),
            analysis_range: window.range(),
            level: QualityLevel::InsufficientData,
            total_score: 0.0,
            scores: None,
            weights: QualityWeights::default(),
            indicators: None,
            pattern: None,
            ratios: None,
            suggestions: Vec::new(),
        }
    }
}

/// Mean of each sub-score over scored households
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorAverages {
    pub frequency: f64,
    pub continuity: f64,
    pub time_distribution: f64,
    pub completeness: f64,
    pub consistency: f64,
}

/// Population statistics across a batch of quality reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityPopulationReport {
    pub household_count: usize,
    pub scored_count: usize,
    pub average_score: f64,
    pub max_score: f64,
    pub min_score: f64,
    pub std_dev: f64,
    pub level_distribution: BTreeMap<QualityLevel, usize>,
    pub indicator_averages: IndicatorAverages,
    pub details: BTreeMap<String, QualityReport>,
}

pub struct QualityEngine<'a> {
    source: &'a dyn SurveySource,
    weights: QualityWeights,
}

impl<'a> QualityEngine<'a> {
    pub fn new(source: &'a dyn SurveySource) -> Self {
        Self {
            source,
            weights: QualityWeights::default(),
        }
    }

    pub fn weights(&self) -> &QualityWeights {
        &self.weights
    }

    /// Score one household's bookkeeping over the window
    pub fn evaluate_household_quality(
        &self,
        household_code: &str,
        window: &TimeWindow,
    ) -> Result<QualityReport> {
        let pattern = match self
            .source
            .get_household_recording_patterns(household_code, window)?
        {
            Some(p) if p.total_records > 0 => p,
            _ => {
                debug!(household = %household_code, "No recording pattern, insufficient data");
                return Ok(QualityReport::insufficient(household_code, window));
            }
        };

        let records = self
            .source
            .get_household_income_expense_data(household_code, window)?;

        let report = assess(household_code, window, pattern, &records, &self.weights);
        debug!(
            household = %household_code,
            total = report.total_score,
            level = %report.level,
            "Quality evaluation complete"
        );
        Ok(report)
    }

    /// Reports for many households; failures are logged and skipped
    pub fn evaluate_batch_quality(
        &self,
        household_codes: &[String],
        window: &TimeWindow,
    ) -> BTreeMap<String, QualityReport> {
        let mut results = BTreeMap::new();
        for code in household_codes {
            match self.evaluate_household_quality(code, window) {
                Ok(report) => {
                    results.insert(code.clone(), report);
                }
                Err(e) => {
                    warn!(household = %code, error = %e, "Quality evaluation failed, skipping");
                }
            }
        }
        info!(
            requested = household_codes.len(),
            evaluated = results.len(),
            "Batch quality evaluation complete"
        );
        results
    }

    /// Population-level statistics over a batch
    pub fn generate_quality_report(
        &self,
        household_codes: &[String],
        window: &TimeWindow,
    ) -> Result<QualityPopulationReport> {
        let details = self.evaluate_batch_quality(household_codes, window);
        population_report(details)
    }
}

/// Pure scoring over a fetched pattern and rows
pub fn assess(
    household_code: &str,
    window: &TimeWindow,
    pattern: RecordingPattern,
    records: &[LedgerRecord],
    weights: &QualityWeights,
) -> QualityReport {
    let mut indicators = QualityIndicators {
        note_usage_ratio: pattern.note_usage_ratio(),
        coding_completeness_ratio: pattern.coding_completeness_ratio(),
        distinct_item_count: pattern.distinct_item_count,
        ..Default::default()
    };

    let frequency = frequency_score(&pattern, &mut indicators);
    let continuity = continuity_score(&pattern.monthly, &mut indicators);
    let time_distribution = time_distribution_score(records, &mut indicators);
    let completeness = completeness_score(&indicators);
    let consistency = consistency_score(records, &mut indicators);

    let scores = QualityScores::new(
        frequency,
        continuity,
        time_distribution,
        completeness,
        consistency,
        weights,
    );
    let level = QualityLevel::from_score(scores.total);
    let suggestions = suggestions(&scores, &indicators);

    QualityReport {
        household_code: household_code.to_string(),
        analysis_range: window.range(),
        level,
        total_score: scores.total,
        scores: Some(scores),
        weights: *weights,
        indicators: Some(indicators),
        ratios: Some(pattern.ratios()),
        pattern: Some(pattern),
        suggestions,
    }
}

fn frequency_score(pattern: &RecordingPattern, indicators: &mut QualityIndicators) -> f64 {
    let months = pattern.monthly.len();
    indicators.month_count = months;
    if months == 0 {
        return 0.0;
    }

    let avg = pattern.total_records as f64 / months as f64;
    indicators.avg_records_per_month = avg;

    if avg >= 30.0 {
        95.0
    } else if avg >= 20.0 {
        85.0
    } else if avg >= 15.0 {
        75.0
    } else if avg >= 10.0 {
        65.0
    } else {
        (avg * 6.0).clamp(0.0, 65.0)
    }
}

fn continuity_score(monthly: &[MonthlyRecording], indicators: &mut QualityIndicators) -> f64 {
    let months: BTreeSet<YearMonth> = monthly
        .iter()
        .filter_map(|m| YearMonth::parse(&m.year, &m.month).ok())
        .collect();

    match months.len() {
        0 => return 0.0,
        1 => return 60.0,
        _ => {}
    }

    let ordered: Vec<YearMonth> = months.into_iter().collect();
    let missing: i64 = ordered
        .windows(2)
        .map(|pair| pair[0].months_until(&pair[1]))
        .filter(|gap| *gap > 1)
        .map(|gap| gap - 1)
        .sum();
    indicators.missing_months = missing;

    if missing == 0 {
        return 100.0;
    }
    let penalty = (missing as f64 * 5.0).min(40.0);
    (100.0 - penalty).max(60.0)
}

fn time_distribution_score(records: &[LedgerRecord], indicators: &mut QualityIndicators) -> f64 {
    let mut days: BTreeMap<u32, usize> = BTreeMap::new();
    for day in records.iter().filter_map(|r| r.day_of_month()) {
        *days.entry(day).or_insert(0) += 1;
    }

    let total: usize = days.values().sum();
    if total == 0 {
        return 0.0;
    }

    let month_end: usize = days.range(25..=31).map(|(_, count)| count).sum();
    let month_end_ratio = count_ratio(month_end, total);

    let counts: Vec<f64> = days.values().map(|c| *c as f64).collect();
    let variation = if counts.len() > 1 {
        coefficient_of_variation(&counts)
    } else {
        0.0
    };

    indicators.month_end_ratio = month_end_ratio;
    indicators.day_variation = variation;

    let mut score: f64 = 100.0;
    if month_end_ratio > 0.5 {
        score -= 30.0;
    } else if month_end_ratio > 0.3 {
        score -= 15.0;
    }
    if variation > 2.0 {
        score -= 20.0;
    } else if variation > 1.0 {
        score -= 10.0;
    }
    score.max(0.0)
}

fn completeness_score(indicators: &QualityIndicators) -> f64 {
    let notes = (indicators.note_usage_ratio * 100.0).min(40.0);
    let coding = (indicators.coding_completeness_ratio * 100.0).min(40.0);
    let variety = (indicators.distinct_item_count as f64 * 2.0).min(20.0);
    (notes + coding + variety).min(100.0)
}

fn consistency_score(records: &[LedgerRecord], indicators: &mut QualityIndicators) -> f64 {
    let total = records.len();
    if total == 0 {
        return 0.0;
    }

    let mut score: f64 = 100.0;

    let integer_ratio = count_ratio(records.iter().filter(|r| r.is_integer_amount()).count(), total);
    if integer_ratio > 0.8 {
        score -= 25.0;
    } else if integer_ratio > 0.6 {
        score -= 15.0;
    }

    let mut seen = HashSet::new();
    let duplicates = records
        .iter()
        .filter(|r| !seen.insert((r.date, r.amount.to_bits(), r.item_name.as_deref())))
        .count();
    let duplicate_ratio = count_ratio(duplicates, total);
    score -= (duplicate_ratio * 100.0).min(20.0);

    let positive: Vec<f64> = records
        .iter()
        .map(|r| r.amount)
        .filter(|a| *a > 0.0)
        .collect();
    let round = positive.iter().filter(|a| ROUND_AMOUNTS.contains(a)).count();
    let round_ratio = count_ratio(round, positive.len());
    if round_ratio > 0.3 {
        score -= 15.0;
    }

    indicators.integer_amount_ratio = integer_ratio;
    indicators.duplicate_ratio = duplicate_ratio;
    indicators.round_amount_ratio = round_ratio;

    score.max(0.0)
}

fn suggestions(scores: &QualityScores, indicators: &QualityIndicators) -> Vec<String> {
    let mut out = Vec::new();

    if scores.frequency < 70.0 {
        out.push("建议增加记账频率，尽量做到每日记账，记录所有收支项目".to_string());
    }
    if scores.continuity < 80.0 {
        out.push("建议保持记账的连续性，避免长时间中断记账".to_string());
    }
    if scores.time_distribution < 80.0 && indicators.month_end_ratio > 0.3 {
        out.push("避免月底集中补记，建议及时记录每日收支".to_string());
    }
    if scores.completeness < 80.0 {
        if indicators.note_usage_ratio < 0.3 {
            out.push("建议增加备注信息，详细说明收支项目的具体内容".to_string());
        }
        if indicators.coding_completeness_ratio < 0.8 {
            out.push("建议完善收支项目的编码，确保分类准确".to_string());
        }
    }
    if scores.consistency < 80.0 && indicators.integer_amount_ratio > 0.7 {
        out.push("建议记录精确金额，避免过多使用整数金额".to_string());
    }

    if out.is_empty() {
        out.push(AFFIRMING_SUGGESTION.to_string());
    }
    out
}

fn population_report(details: BTreeMap<String, QualityReport>) -> Result<QualityPopulationReport> {
    if details.is_empty() {
        return Err(Error::InsufficientData("无有效的质量评估数据".to_string()));
    }

    let totals: Vec<f64> = details
        .values()
        .map(|r| r.total_score)
        .filter(|s| *s > 0.0)
        .collect();
    if totals.is_empty() {
        return Err(Error::InsufficientData("无有效的评分数据".to_string()));
    }

    let mut level_distribution = BTreeMap::new();
    for report in details.values() {
        *level_distribution.entry(report.level).or_insert(0) += 1;
    }

    let scored: Vec<&QualityScores> = details.values().filter_map(|r| r.scores.as_ref()).collect();
    let avg_of = |f: fn(&QualityScores) -> f64| {
        let values: Vec<f64> = scored.iter().map(|s| f(s)).collect();
        round2(mean(&values))
    };
    let indicator_averages = IndicatorAverages {
        frequency: avg_of(|s| s.frequency),
        continuity: avg_of(|s| s.continuity),
        time_distribution: avg_of(|s| s.time_distribution),
        completeness: avg_of(|s| s.completeness),
        consistency: avg_of(|s| s.consistency),
    };

    let max_score = totals.iter().copied().fold(f64::MIN, f64::max);
    let min_score = totals.iter().copied().fold(f64::MAX, f64::min);

    Ok(QualityPopulationReport {
        household_count: details.len(),
        scored_count: totals.len(),
        average_score: round2(mean(&totals)),
        max_score: round2(max_score),
        min_score: round2(min_score),
        std_dev: round2(population_std_dev(&totals)),
        level_distribution,
        indicator_averages,
        details,
    })
}

/// Share of a batch with a positive total, used by batch reports
pub fn scored_share(reports: &BTreeMap<String, QualityReport>) -> f64 {
    let scored = reports.values().filter(|r| r.total_score > 0.0).count();
    safe_ratio(scored as f64, reports.len() as f64)
}
