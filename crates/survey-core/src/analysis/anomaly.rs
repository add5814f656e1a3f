//! Anomaly detection engine
//!
//! Four independent detectors run over the same ledger rows and monthly
//! summaries:
//! - Amount: record amounts outside 2σ/3σ of the population benchmark
//! - Category: records in a statistically rare (prefix, type) category
//! - Balance: months where expense outruns income
//! - Pattern: whole-window bookkeeping habits (round amounts, missing
//!   small change, duplicates, bulk entry on one day)

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::models::{
    AnalysisRange, BenchmarkScope, Benchmarks, EntryKind, LedgerRecord, MonthlySummary,
    TimeWindow,
};
use crate::source::SurveySource;
use crate::stats::{count_ratio, round2};

/// Benchmarks with fewer rows than this mark their category as rare
pub const RARE_CATEGORY_RECORDS: i64 = 50;
/// Records above this count on one date are flagged as bulk entry
pub const DAILY_VOLUME_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnomalyKind {
    #[serde(rename = "极端金额异常")]
    ExtremeAmount,
    #[serde(rename = "金额异常")]
    Amount,
    #[serde(rename = "罕见类别")]
    RareCategory,
    #[serde(rename = "收支严重倒挂")]
    SevereImbalance,
    #[serde(rename = "收支倒挂")]
    Imbalance,
    #[serde(rename = "零收入有支出")]
    ZeroIncomeWithExpense,
    #[serde(rename = "整数金额过多")]
    ExcessIntegerAmounts,
    #[serde(rename = "零钱记录缺失")]
    MissingSmallChange,
    #[serde(rename = "疑似重复记录")]
    SuspectedDuplicate,
    #[serde(rename = "单日记账过多")]
    ExcessDailyVolume,
}

impl AnomalyKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ExtremeAmount => "极端金额异常",
            Self::Amount => "金额异常",
            Self::RareCategory => "罕见类别",
            Self::SevereImbalance => "收支严重倒挂",
            Self::Imbalance => "收支倒挂",
            Self::ZeroIncomeWithExpense => "零收入有支出",
            Self::ExcessIntegerAmounts => "整数金额过多",
            Self::MissingSmallChange => "零钱记录缺失",
            Self::SuspectedDuplicate => "疑似重复记录",
            Self::ExcessDailyVolume => "单日记账过多",
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnomalySeverity {
    #[serde(rename = "高")]
    High,
    #[serde(rename = "中")]
    Medium,
    #[serde(rename = "低")]
    Low,
}

impl AnomalySeverity {
    /// Contribution to the anomaly score
    pub fn weight(&self) -> f64 {
        match self {
            Self::High => 10.0,
            Self::Medium => 5.0,
            Self::Low => 2.0,
        }
    }

    /// Sort rank, higher is more severe
    pub fn rank(&self) -> u8 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "高",
            Self::Medium => "中",
            Self::Low => "低",
        }
    }
}

impl fmt::Display for AnomalySeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Ledger id for record anomalies, a synthetic key for aggregate ones
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnomalyId {
    Record(i64),
    /// `"YYYY-MM"`, `PATTERN_001`, `DUP_<id>` or `FREQ_<date>`
    Synthetic(String),
}

/// Snapshot of what was flagged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum AnomalyDetail {
    Record {
        date: Option<NaiveDate>,
        item_name: Option<String>,
        amount: f64,
        code: Option<String>,
        kind: EntryKind,
    },
    Month {
        year_month: String,
        income: f64,
        expense: f64,
        balance: f64,
    },
    IntegerAmounts {
        total_records: usize,
        integer_count: usize,
        ratio: f64,
    },
    SmallChange {
        total_records: usize,
        small_count: usize,
        ratio: f64,
    },
    Duplicate {
        count: usize,
        record_ids: Vec<i64>,
        date: Option<NaiveDate>,
        amount: f64,
        item_name: Option<String>,
    },
    DailyVolume {
        date: NaiveDate,
        count: usize,
    },
}

/// Benchmark values an amount anomaly was judged against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkInfo {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub record_id: AnomalyId,
    pub kind: AnomalyKind,
    pub severity: AnomalySeverity,
    pub description: String,
    pub detail: AnomalyDetail,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub benchmark: Option<BenchmarkInfo>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityCounts {
    #[serde(rename = "高")]
    pub high: usize,
    #[serde(rename = "中")]
    pub medium: usize,
    #[serde(rename = "低")]
    pub low: usize,
}

impl SeverityCounts {
    pub fn add(&mut self, severity: AnomalySeverity) {
        match severity {
            AnomalySeverity::High => self.high += 1,
            AnomalySeverity::Medium => self.medium += 1,
            AnomalySeverity::Low => self.low += 1,
        }
    }

    pub fn weighted_sum(&self) -> f64 {
        self.high as f64 * AnomalySeverity::High.weight()
            + self.medium as f64 * AnomalySeverity::Medium.weight()
            + self.low as f64 * AnomalySeverity::Low.weight()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyStatistics {
    pub total_records: usize,
    pub total_anomalies: usize,
    /// anomalies / max(total_records, 1)
    pub anomaly_ratio: f64,
    pub by_type: BTreeMap<AnomalyKind, usize>,
    pub by_severity: SeverityCounts,
    /// 0-100, higher means more anomalous
    pub score: f64,
}

/// Flattened anomaly row for tabular reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyDetailRow {
    pub date: Option<String>,
    pub entry_type: Option<String>,
    pub item_name: Option<String>,
    pub amount: f64,
    pub anomaly_type: AnomalyKind,
    pub severity: AnomalySeverity,
    pub reason: String,
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub household_code: String,
    pub analysis_range: AnalysisRange,
    pub anomalies: Vec<AnomalyRecord>,
    pub statistics: AnomalyStatistics,
    /// Sorted by severity then amount, both descending
    pub details: Vec<AnomalyDetailRow>,
}

/// Severity-weighted score: `min(100, 100 * Σ weight / (total_records * 10))`
pub fn anomaly_score(counts: &SeverityCounts, total_records: usize) -> f64 {
    if total_records == 0 {
        return 0.0;
    }
    let max_possible = total_records as f64 * AnomalySeverity::High.weight();
    round2((counts.weighted_sum() / max_possible * 100.0).min(100.0))
}

pub struct AnomalyEngine<'a> {
    source: &'a dyn SurveySource,
    scope: BenchmarkScope,
}

impl<'a> AnomalyEngine<'a> {
    pub fn new(source: &'a dyn SurveySource) -> Self {
        Self {
            source,
            scope: BenchmarkScope::All,
        }
    }

    pub fn with_config(source: &'a dyn SurveySource, config: &AnalysisConfig) -> Self {
        Self {
            source,
            scope: config.benchmark_scope.clone(),
        }
    }

    /// Run all detectors for one household
    pub fn detect_household_anomalies(
        &self,
        household_code: &str,
        window: &TimeWindow,
    ) -> Result<AnomalyReport> {
        let records = self
            .source
            .get_household_income_expense_data(household_code, window)?;
        if records.is_empty() {
            debug!(household = %household_code, "No ledger rows, nothing to check");
            return Ok(analyze(household_code, window, &[], &[], &Benchmarks::new()));
        }

        let monthly = self
            .source
            .get_household_monthly_summary(household_code, window)?;
        let benchmarks = self.source.get_statistical_benchmarks(&self.scope)?;

        let report = analyze(household_code, window, &records, &monthly, &benchmarks);
        debug!(
            household = %household_code,
            anomalies = report.statistics.total_anomalies,
            score = report.statistics.score,
            "Anomaly detection complete"
        );
        Ok(report)
    }

    /// Reports for many households; failures are logged and skipped
    pub fn detect_batch_anomalies(
        &self,
        household_codes: &[String],
        window: &TimeWindow,
    ) -> BTreeMap<String, AnomalyReport> {
        let mut results = BTreeMap::new();
        for code in household_codes {
            match self.detect_household_anomalies(code, window) {
                Ok(report) => {
                    results.insert(code.clone(), report);
                }
                Err(e) => {
                    warn!(household = %code, error = %e, "Anomaly detection failed, skipping");
                }
            }
        }
        info!(
            requested = household_codes.len(),
            checked = results.len(),
            "Batch anomaly detection complete"
        );
        results
    }
}

/// Pure detection over fetched rows
pub fn analyze(
    household_code: &str,
    window: &TimeWindow,
    records: &[LedgerRecord],
    monthly: &[MonthlySummary],
    benchmarks: &Benchmarks,
) -> AnomalyReport {
    let mut anomalies = Vec::new();
    if !records.is_empty() {
        anomalies.extend(detect_amount_anomalies(records, benchmarks));
        anomalies.extend(detect_category_anomalies(records, benchmarks));
        anomalies.extend(detect_balance_anomalies(monthly));
        anomalies.extend(detect_pattern_anomalies(records));
    }

    let statistics = statistics(&anomalies, records.len());
    let details = detail_rows(&anomalies);

    AnomalyReport {
        household_code: household_code.to_string(),
        analysis_range: window.range(),
        anomalies,
        statistics,
        details,
    }
}

fn record_detail(record: &LedgerRecord) -> AnomalyDetail {
    AnomalyDetail::Record {
        date: record.date,
        item_name: record.item_name.clone(),
        amount: record.amount,
        code: record.code.clone(),
        kind: record.kind,
    }
}

fn detect_amount_anomalies(records: &[LedgerRecord], benchmarks: &Benchmarks) -> Vec<AnomalyRecord> {
    let mut anomalies = Vec::new();

    for record in records.iter().filter(|r| r.amount > 0.0) {
        let Some(prefix) = record.category_prefix() else {
            continue;
        };
        let Some(benchmark) = benchmarks.get(prefix, record.kind) else {
            continue;
        };

        let (mean, sd) = (benchmark.mean, benchmark.std_dev);
        let (lower, upper) = (mean - 2.0 * sd, mean + 2.0 * sd);
        let (extreme_lower, extreme_upper) = (mean - 3.0 * sd, mean + 3.0 * sd);

        let (kind, severity) = if record.amount < extreme_lower || record.amount > extreme_upper {
            (AnomalyKind::ExtremeAmount, AnomalySeverity::High)
        } else if record.amount < lower || record.amount > upper {
            (AnomalyKind::Amount, AnomalySeverity::Medium)
        } else {
            continue;
        };

        anomalies.push(AnomalyRecord {
            record_id: AnomalyId::Record(record.id),
            kind,
            severity,
            description: format!(
                "金额{}元超出正常范围[{:.2}, {:.2}]",
                record.amount, lower, upper
            ),
            detail: record_detail(record),
            benchmark: Some(BenchmarkInfo {
                mean,
                std_dev: sd,
                min: benchmark.min,
                max: benchmark.max,
            }),
        });
    }

    anomalies
}

fn detect_category_anomalies(records: &[LedgerRecord], benchmarks: &Benchmarks) -> Vec<AnomalyRecord> {
    records
        .iter()
        .filter_map(|record| {
            let prefix = record.category_prefix()?;
            let benchmark = benchmarks.get(prefix, record.kind)?;
            (benchmark.record_count < RARE_CATEGORY_RECORDS).then(|| AnomalyRecord {
                record_id: AnomalyId::Record(record.id),
                kind: AnomalyKind::RareCategory,
                severity: AnomalySeverity::Low,
                description: format!(
                    "类别{}在统计中较为罕见（仅{}条记录）",
                    prefix, benchmark.record_count
                ),
                detail: record_detail(record),
                benchmark: None,
            })
        })
        .collect()
}

fn detect_balance_anomalies(monthly: &[MonthlySummary]) -> Vec<AnomalyRecord> {
    let mut anomalies = Vec::new();

    for month in monthly {
        let (income, expense) = (month.income_total, month.expense_total);
        let year_month = month.year_month_label();
        let detail = || AnomalyDetail::Month {
            year_month: year_month.clone(),
            income,
            expense,
            balance: month.balance(),
        };

        if income > 0.0 {
            let ratio = expense / income;
            let flagged = if ratio > 2.0 {
                Some((
                    AnomalyKind::SevereImbalance,
                    AnomalySeverity::High,
                    format!("支出({:.2})是收入({:.2})的{:.1}倍", expense, income, ratio),
                ))
            } else if ratio > 1.5 {
                Some((
                    AnomalyKind::Imbalance,
                    AnomalySeverity::Medium,
                    format!("支出({:.2})超过收入({:.2})", expense, income),
                ))
            } else {
                None
            };

            if let Some((kind, severity, description)) = flagged {
                anomalies.push(AnomalyRecord {
                    record_id: AnomalyId::Synthetic(year_month.clone()),
                    kind,
                    severity,
                    description,
                    detail: detail(),
                    benchmark: None,
                });
            }
        } else if income == 0.0 && expense > 0.0 {
            anomalies.push(AnomalyRecord {
                record_id: AnomalyId::Synthetic(year_month.clone()),
                kind: AnomalyKind::ZeroIncomeWithExpense,
                severity: AnomalySeverity::Medium,
                description: format!("无收入记录但有支出{:.2}元", expense),
                detail: detail(),
                benchmark: None,
            });
        }
    }

    anomalies
}

fn detect_pattern_anomalies(records: &[LedgerRecord]) -> Vec<AnomalyRecord> {
    let mut anomalies = Vec::new();
    let total = records.len();
    if total == 0 {
        return anomalies;
    }

    let integer_count = records.iter().filter(|r| r.is_integer_amount()).count();
    let integer_ratio = count_ratio(integer_count, total);
    if integer_ratio > 0.8 {
        anomalies.push(AnomalyRecord {
            record_id: AnomalyId::Synthetic("PATTERN_001".to_string()),
            kind: AnomalyKind::ExcessIntegerAmounts,
            severity: AnomalySeverity::Medium,
            description: format!(
                "整数金额占比{:.1}%，可能存在记账不精确问题",
                integer_ratio * 100.0
            ),
            detail: AnomalyDetail::IntegerAmounts {
                total_records: total,
                integer_count,
                ratio: integer_ratio,
            },
            benchmark: None,
        });
    }

    let small_count = records
        .iter()
        .filter(|r| r.amount > 0.0 && r.amount < 10.0)
        .count();
    let small_ratio = count_ratio(small_count, total);
    if small_ratio < 0.05 && total > 50 {
        anomalies.push(AnomalyRecord {
            record_id: AnomalyId::Synthetic("PATTERN_002".to_string()),
            kind: AnomalyKind::MissingSmallChange,
            severity: AnomalySeverity::Low,
            description: format!(
                "小额支出(10元以下)占比仅{:.1}%，可能遗漏日常小额消费",
                small_ratio * 100.0
            ),
            detail: AnomalyDetail::SmallChange {
                total_records: total,
                small_count,
                ratio: small_ratio,
            },
            benchmark: None,
        });
    }

    for group in duplicate_groups(records) {
        let first = group[0];
        let date_label = first.date.map(|d| d.to_string()).unwrap_or_default();
        let item_label = first.item_name.clone().unwrap_or_default();
        anomalies.push(AnomalyRecord {
            record_id: AnomalyId::Synthetic(format!("DUP_{}", first.id)),
            kind: AnomalyKind::SuspectedDuplicate,
            severity: AnomalySeverity::Medium,
            description: format!(
                "发现{}条相同的记录：{} {} {}元",
                group.len(),
                date_label,
                item_label,
                first.amount
            ),
            detail: AnomalyDetail::Duplicate {
                count: group.len(),
                record_ids: group.iter().map(|r| r.id).collect(),
                date: first.date,
                amount: first.amount,
                item_name: first.item_name.clone(),
            },
            benchmark: None,
        });
    }

    let mut per_date: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for date in records.iter().filter_map(|r| r.date) {
        *per_date.entry(date).or_insert(0) += 1;
    }
    for (date, count) in per_date {
        if count > DAILY_VOLUME_LIMIT {
            anomalies.push(AnomalyRecord {
                record_id: AnomalyId::Synthetic(format!("FREQ_{}", date)),
                kind: AnomalyKind::ExcessDailyVolume,
                severity: AnomalySeverity::Low,
                description: format!("{}当日记账{}笔，可能存在集中补记情况", date, count),
                detail: AnomalyDetail::DailyVolume { date, count },
                benchmark: None,
            });
        }
    }

    anomalies
}

/// Key identifying exact duplicates: date, amount bits and item name
type DuplicateKey<'r> = (Option<NaiveDate>, u64, Option<&'r str>);

fn duplicate_key(record: &LedgerRecord) -> DuplicateKey<'_> {
    (record.date, record.amount.to_bits(), record.item_name.as_deref())
}

/// Groups of records sharing (date, amount, item name), in order of first appearance
pub(crate) fn duplicate_groups(records: &[LedgerRecord]) -> Vec<Vec<&LedgerRecord>> {
    let mut index: HashMap<DuplicateKey, usize> = HashMap::new();
    let mut groups: Vec<Vec<&LedgerRecord>> = Vec::new();

    for record in records {
        let slot = *index.entry(duplicate_key(record)).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(record);
    }

    groups.retain(|g| g.len() > 1);
    groups
}

fn statistics(anomalies: &[AnomalyRecord], total_records: usize) -> AnomalyStatistics {
    let mut by_type = BTreeMap::new();
    let mut by_severity = SeverityCounts::default();
    for anomaly in anomalies {
        *by_type.entry(anomaly.kind).or_insert(0) += 1;
        by_severity.add(anomaly.severity);
    }

    AnomalyStatistics {
        total_records,
        total_anomalies: anomalies.len(),
        anomaly_ratio: count_ratio(anomalies.len(), total_records.max(1)),
        by_type,
        by_severity,
        score: anomaly_score(&by_severity, total_records),
    }
}

fn detail_rows(anomalies: &[AnomalyRecord]) -> Vec<AnomalyDetailRow> {
    let mut rows: Vec<AnomalyDetailRow> = anomalies
        .iter()
        .map(|anomaly| {
            let (date, entry_type, item_name, amount, code) = match &anomaly.detail {
                AnomalyDetail::Record {
                    date,
                    item_name,
                    amount,
                    code,
                    kind,
                } => (
                    date.map(|d| d.to_string()),
                    Some(kind.label().to_string()),
                    item_name.clone(),
                    *amount,
                    code.clone(),
                ),
                AnomalyDetail::Month { year_month, .. } => {
                    (Some(year_month.clone()), None, None, 0.0, None)
                }
                AnomalyDetail::Duplicate {
                    date,
                    amount,
                    item_name,
                    ..
                } => (date.map(|d| d.to_string()), None, item_name.clone(), *amount, None),
                AnomalyDetail::DailyVolume { date, .. } => {
                    (Some(date.to_string()), None, None, 0.0, None)
                }
                AnomalyDetail::IntegerAmounts { .. } | AnomalyDetail::SmallChange { .. } => {
                    (None, None, None, 0.0, None)
                }
            };

            AnomalyDetailRow {
                date,
                entry_type,
                item_name,
                amount,
                anomaly_type: anomaly.kind,
                severity: anomaly.severity,
                reason: anomaly.description.clone(),
                code,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.severity
            .rank()
            .cmp(&a.severity.rank())
            .then_with(|| b.amount.total_cmp(&a.amount))
    });
    rows
}
