//! Domain models for household survey ledgers

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::stats::count_ratio;

/// Income/expense type of a ledger entry (stored as 0/1/2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Not yet classified
    Uncoded,
    Income,
    Expense,
}

impl EntryKind {
    pub fn as_code(&self) -> i64 {
        match self {
            Self::Uncoded => 0,
            Self::Income => 1,
            Self::Expense => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Uncoded),
            1 => Some(Self::Income),
            2 => Some(Self::Expense),
            _ => None,
        }
    }

    /// Label used in report snapshots
    pub fn label(&self) -> &'static str {
        match self {
            Self::Uncoded => "未分类",
            Self::Income => "收入",
            Self::Expense => "支出",
        }
    }
}

impl FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "0" | "uncoded" | "未分类" => Ok(Self::Uncoded),
            "1" | "income" | "收入" => Ok(Self::Income),
            "2" | "expense" | "支出" => Ok(Self::Expense),
            _ => Err(format!("Unknown entry type: {}", s)),
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_code())
    }
}

// ========== Time windows ==========

/// A calendar month, compared numerically
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidData(format!(
                "Month out of range (1-12): {}",
                month
            )));
        }
        Ok(Self { year, month })
    }

    /// Parse from the year/month strings used by the ledger tables
    pub fn parse(year: &str, month: &str) -> Result<Self> {
        let year: i32 = year
            .trim()
            .parse()
            .map_err(|_| Error::InvalidData(format!("Year must be numeric: {}", year)))?;
        let month: u32 = month
            .trim()
            .parse()
            .map_err(|_| Error::InvalidData(format!("Month must be numeric: {}", month)))?;
        Self::new(year, month)
    }

    /// Sortable integer key: `year * 100 + month`
    pub fn key(&self) -> i64 {
        self.year as i64 * 100 + self.month as i64
    }

    /// Number of whole months from `self` to `other`
    pub fn months_until(&self, other: &YearMonth) -> i64 {
        (other.year as i64 - self.year as i64) * 12 + (other.month as i64 - self.month as i64)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// Inclusive analysis window; either end may be open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Option<YearMonth>,
    pub end: Option<YearMonth>,
}

impl TimeWindow {
    /// Unbounded window covering every month
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(start: YearMonth, end: YearMonth) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Build a window from the four optional request strings
    ///
    /// A bound only applies when both its year and month are present.
    /// Returns `InvalidData` for non-numeric parts, months outside 1-12,
    /// or a start after the end.
    pub fn from_parts(
        start_year: Option<&str>,
        start_month: Option<&str>,
        end_year: Option<&str>,
        end_month: Option<&str>,
    ) -> Result<Self> {
        let start = bound(start_year, start_month)?;
        let end = bound(end_year, end_month)?;

        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(Error::InvalidData(format!(
                    "Start {} is after end {}",
                    s, e
                )));
            }
        }

        Ok(Self { start, end })
    }

    pub fn contains(&self, ym: &YearMonth) -> bool {
        self.start.map_or(true, |s| *ym >= s) && self.end.map_or(true, |e| *ym <= e)
    }

    /// Serializable description of the window for report metadata
    pub fn range(&self) -> AnalysisRange {
        AnalysisRange {
            start: self.start.map(|s| s.to_string()),
            end: self.end.map(|e| e.to_string()),
        }
    }
}

fn bound(year: Option<&str>, month: Option<&str>) -> Result<Option<YearMonth>> {
    let year = year.map(str::trim).filter(|s| !s.is_empty());
    let month = month.map(str::trim).filter(|s| !s.is_empty());
    match (year, month) {
        (Some(y), Some(m)) => YearMonth::parse(y, m).map(Some),
        _ => Ok(None),
    }
}

/// Window as it appears in report output (`"2024-01"` style bounds)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Zero-pad a month string to two digits ("3" -> "03")
pub fn normalize_month(month: &str) -> String {
    let trimmed = month.trim();
    match trimmed.parse::<u32>() {
        Ok(m) => format!("{:02}", m),
        Err(_) => trimmed.to_string(),
    }
}

// ========== Households ==========

/// Roster entry plus village/town placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseholdBasicInfo {
    pub household_code: String,
    pub head_name: String,
    pub household_size: u32,
    pub village_code: Option<String>,
    pub village_name: Option<String>,
    pub town_name: Option<String>,
}

/// Basic info enriched with totals for an analysis window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseholdOverview {
    #[serde(flatten)]
    pub basic: HouseholdBasicInfo,
    pub total_income: f64,
    pub total_expense: f64,
    pub net_income: f64,
    pub recording_days: usize,
    pub record_count: usize,
    pub month_count: usize,
}

/// A village row from the town/village mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Village {
    pub village_code: String,
    pub village_name: String,
    pub town_name: String,
}

/// Classification code table entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemCode {
    pub code: String,
    pub name: String,
    pub kind: Option<EntryKind>,
    pub unit_name: Option<String>,
}

// ========== Ledger ==========

/// One income/expense detail record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub id: i64,
    pub household_code: String,
    pub year: String,
    pub month: String,
    pub date: Option<NaiveDate>,
    pub kind: EntryKind,
    pub code: Option<String>,
    pub item_name: Option<String>,
    pub quantity: f64,
    pub amount: f64,
    pub note: Option<String>,
    pub unit_name: Option<String>,
}

impl LedgerRecord {
    /// First two characters of the classification code
    pub fn category_prefix(&self) -> Option<&str> {
        self.code.as_deref().map(code_prefix)
    }

    pub fn is_coded(&self) -> bool {
        self.code.is_some()
    }

    /// True if the prefix matches and the record is an expense
    pub fn is_expense_in(&self, prefix: &str) -> bool {
        self.kind == EntryKind::Expense && self.category_prefix() == Some(prefix)
    }

    pub fn is_integer_amount(&self) -> bool {
        self.amount == self.amount.trunc()
    }

    pub fn day_of_month(&self) -> Option<u32> {
        self.date.map(|d| d.day())
    }
}

/// First two characters of a code (the whole code if shorter)
pub fn code_prefix(code: &str) -> &str {
    match code.char_indices().nth(2) {
        Some((idx, _)) => &code[..idx],
        None => code,
    }
}

/// A ledger entry to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub household_code: String,
    pub year: String,
    pub month: String,
    pub date: Option<NaiveDate>,
    pub kind: EntryKind,
    pub code: Option<String>,
    pub item_name: Option<String>,
    pub quantity: f64,
    pub amount: f64,
    pub note: Option<String>,
    pub unit_name: Option<String>,
}

impl NewLedgerEntry {
    /// Entry dated `date`, with year/month derived from it
    pub fn new(
        household_code: impl Into<String>,
        date: NaiveDate,
        kind: EntryKind,
        code: Option<&str>,
        item_name: impl Into<String>,
        amount: f64,
    ) -> Self {
        Self {
            household_code: household_code.into(),
            year: date.year().to_string(),
            month: format!("{:02}", date.month()),
            date: Some(date),
            kind,
            code: code.map(str::to_string),
            item_name: Some(item_name.into()),
            quantity: 1.0,
            amount,
            note: None,
            unit_name: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Per-month aggregates for one household
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub year: String,
    pub month: String,
    pub record_count: i64,
    pub income_count: i64,
    pub expense_count: i64,
    pub income_total: f64,
    pub expense_total: f64,
    pub uncoded_count: i64,
    pub coded_count: i64,
    pub recording_days: i64,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
}

impl MonthlySummary {
    pub fn balance(&self) -> f64 {
        self.income_total - self.expense_total
    }

    pub fn year_month_label(&self) -> String {
        format!("{}-{}", self.year, self.month)
    }

    pub fn year_month(&self) -> Option<YearMonth> {
        YearMonth::parse(&self.year, &self.month).ok()
    }
}

/// Per-(prefix, type) aggregates for one household
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub prefix: String,
    pub kind: EntryKind,
    pub record_count: i64,
    pub total_amount: f64,
    pub avg_amount: f64,
    pub min_amount: f64,
    pub max_amount: f64,
    pub month_count: i64,
}

impl CategorySummary {
    pub fn category_label(&self) -> &'static str {
        category_label(&self.prefix)
    }
}

// ========== Benchmarks ==========

/// Population statistics for one (prefix, type) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalBenchmark {
    pub prefix: String,
    pub kind: EntryKind,
    pub record_count: i64,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

/// Population over which benchmarks are computed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BenchmarkScope {
    #[default]
    All,
    Town(String),
    Village(String),
}

impl FromStr for BenchmarkScope {
    type Err = String;

    /// Accepts `all`, `town:<name>` or `village:<name>`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") || s.is_empty() {
            return Ok(Self::All);
        }
        match s.split_once(':') {
            Some(("town", name)) if !name.trim().is_empty() => Ok(Self::Town(name.trim().to_string())),
            Some(("village", name)) if !name.trim().is_empty() => {
                Ok(Self::Village(name.trim().to_string()))
            }
            _ => Err(format!("Unknown benchmark scope: {}", s)),
        }
    }
}

/// Benchmarks keyed by (code prefix, entry type)
#[derive(Debug, Clone, Default)]
pub struct Benchmarks {
    entries: HashMap<(String, EntryKind), StatisticalBenchmark>,
}

impl Benchmarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, benchmark: StatisticalBenchmark) {
        self.entries
            .insert((benchmark.prefix.clone(), benchmark.kind), benchmark);
    }

    pub fn get(&self, prefix: &str, kind: EntryKind) -> Option<&StatisticalBenchmark> {
        self.entries.get(&(prefix.to_string(), kind))
    }

    /// Lookup by the legacy `"<prefix>_<type>"` key
    pub fn get_by_key(&self, key: &str) -> Option<&StatisticalBenchmark> {
        let (prefix, kind) = key.split_once('_')?;
        let kind = kind.parse::<EntryKind>().ok()?;
        self.get(prefix, kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatisticalBenchmark> {
        self.entries.values()
    }
}

impl FromIterator<StatisticalBenchmark> for Benchmarks {
    fn from_iter<I: IntoIterator<Item = StatisticalBenchmark>>(iter: I) -> Self {
        let mut benchmarks = Self::new();
        for b in iter {
            benchmarks.insert(b);
        }
        benchmarks
    }
}

// ========== Recording patterns ==========

/// Per-month slice of a recording pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRecording {
    pub year: String,
    pub month: String,
    pub record_count: i64,
    pub recording_days: i64,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
}

/// Raw bookkeeping-behaviour counts for a household and window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingPattern {
    pub total_records: i64,
    pub recording_days: i64,
    pub integer_amount_count: i64,
    pub noted_count: i64,
    pub coded_count: i64,
    pub avg_day_of_month: f64,
    pub month_end_count: i64,
    pub distinct_item_count: i64,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
    pub monthly: Vec<MonthlyRecording>,
}

impl RecordingPattern {
    fn ratio(&self, count: i64) -> f64 {
        count_ratio(count.max(0) as usize, self.total_records.max(0) as usize)
    }

    pub fn integer_amount_ratio(&self) -> f64 {
        self.ratio(self.integer_amount_count)
    }

    pub fn note_usage_ratio(&self) -> f64 {
        self.ratio(self.noted_count)
    }

    pub fn coding_completeness_ratio(&self) -> f64 {
        self.ratio(self.coded_count)
    }

    /// Share of records dated on day 25 or later
    pub fn month_end_ratio(&self) -> f64 {
        self.ratio(self.month_end_count)
    }

    pub fn ratios(&self) -> PatternRatios {
        PatternRatios {
            integer_amount_ratio: self.integer_amount_ratio(),
            note_usage_ratio: self.note_usage_ratio(),
            coding_completeness_ratio: self.coding_completeness_ratio(),
            month_end_ratio: self.month_end_ratio(),
        }
    }
}

/// Derived ratios reported alongside a pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRatios {
    pub integer_amount_ratio: f64,
    pub note_usage_ratio: f64,
    pub coding_completeness_ratio: f64,
    pub month_end_ratio: f64,
}

// ========== Category taxonomy ==========

/// The eight standard consumption-expenditure categories, in code order
pub const STANDARD_EXPENSE_CATEGORIES: [(&str, &str); 8] = [
    ("31", "食品烟酒"),
    ("32", "衣着"),
    ("33", "居住"),
    ("34", "生活用品及服务"),
    ("35", "交通通信"),
    ("36", "教育文化娱乐"),
    ("37", "医疗保健"),
    ("38", "其他用品及服务"),
];

const INCOME_CATEGORIES: [(&str, &str); 8] = [
    ("21", "工资性收入"),
    ("22", "经营净收入"),
    ("23", "财产净收入"),
    ("24", "转移净收入"),
    ("12", "出售农产品及提供农业服务"),
    ("25", "非收入所得"),
    ("26", "借贷性所得"),
    ("42", "从政府得到的实物和服务"),
];

const OTHER_EXPENSE_CATEGORIES: [(&str, &str); 7] = [
    ("41", "从单位或雇主得到的实物和服务"),
    ("43", "从社会得到的实物和服务"),
    ("51", "非农业生产经营费用"),
    ("52", "财产性支出"),
    ("53", "转移性支出"),
    ("13", "购买农业生产资料和农业服务"),
    ("14", "购建农业生产性固定资产"),
];

/// Main category label for a code or code prefix
pub fn category_label(code: &str) -> &'static str {
    let prefix = code_prefix(code);
    INCOME_CATEGORIES
        .iter()
        .chain(STANDARD_EXPENSE_CATEGORIES.iter())
        .chain(OTHER_EXPENSE_CATEGORIES.iter())
        .find(|(p, _)| *p == prefix)
        .map(|(_, label)| *label)
        .unwrap_or("其他")
}
