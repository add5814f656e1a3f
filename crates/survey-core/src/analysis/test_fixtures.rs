//! In-memory `SurveySource` for engine unit tests

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{Datelike, NaiveDate};

use crate::error::{Error, Result};
use crate::models::{
    BenchmarkScope, Benchmarks, CategorySummary, EntryKind, HouseholdBasicInfo, LedgerRecord,
    MonthlyRecording, MonthlySummary, RecordingPattern, StatisticalBenchmark, TimeWindow,
};
use crate::source::SurveySource;

fn record(
    id: i64,
    date: &str,
    kind: EntryKind,
    code: Option<&str>,
    item: &str,
    amount: f64,
) -> LedgerRecord {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
    LedgerRecord {
        id,
        household_code: "H1".to_string(),
        year: date.year().to_string(),
        month: format!("{:02}", date.month()),
        date: Some(date),
        kind,
        code: code.map(str::to_string),
        item_name: Some(item.to_string()),
        quantity: 1.0,
        amount,
        note: None,
        unit_name: None,
    }
}

pub fn expense(id: i64, date: &str, code: Option<&str>, item: &str, amount: f64) -> LedgerRecord {
    record(id, date, EntryKind::Expense, code, item, amount)
}

pub fn income(id: i64, date: &str, code: Option<&str>, item: &str, amount: f64) -> LedgerRecord {
    record(id, date, EntryKind::Income, code, item, amount)
}

pub fn month(year: &str, month: &str, income_total: f64, expense_total: f64) -> MonthlySummary {
    MonthlySummary {
        year: year.to_string(),
        month: month.to_string(),
        record_count: 1,
        income_count: 0,
        expense_count: 0,
        income_total,
        expense_total,
        uncoded_count: 0,
        coded_count: 0,
        recording_days: 1,
        first_date: None,
        last_date: None,
    }
}

pub fn benchmark(prefix: &str, kind: EntryKind, count: i64, mean: f64, std_dev: f64) -> StatisticalBenchmark {
    StatisticalBenchmark {
        prefix: prefix.to_string(),
        kind,
        record_count: count,
        mean,
        std_dev,
        min: 0.0,
        max: mean + 10.0 * std_dev,
    }
}

/// One known household plus whatever rows a test assigns
pub struct FixtureSource {
    pub basic: HouseholdBasicInfo,
    pub records: Vec<LedgerRecord>,
    pub monthly: Vec<MonthlySummary>,
    pub categories: Vec<CategorySummary>,
    pub pattern: Option<RecordingPattern>,
    pub benchmarks: Vec<StatisticalBenchmark>,
    /// Codes whose queries fail
    pub failing: HashSet<String>,
}

impl FixtureSource {
    pub fn new(household_code: &str) -> Self {
        Self {
            basic: HouseholdBasicInfo {
                household_code: household_code.to_string(),
                head_name: "张三".to_string(),
                household_size: 1,
                village_code: None,
                village_name: None,
                town_name: None,
            },
            records: Vec::new(),
            monthly: Vec::new(),
            categories: Vec::new(),
            pattern: None,
            benchmarks: Vec::new(),
            failing: HashSet::new(),
        }
    }

    /// Recompute monthly, category and pattern aggregates from `records`
    pub fn derive_summaries(&mut self) {
        let mut months: BTreeMap<(i64, i64), Vec<&LedgerRecord>> = BTreeMap::new();
        for r in &self.records {
            let key = (r.year.parse().unwrap(), r.month.parse().unwrap());
            months.entry(key).or_default().push(r);
        }

        self.monthly = months
            .values()
            .map(|rows| {
                let sum = |kind: EntryKind| -> f64 {
                    rows.iter().filter(|r| r.kind == kind).map(|r| r.amount).sum()
                };
                let count = |kind: EntryKind| -> i64 {
                    rows.iter().filter(|r| r.kind == kind).count() as i64
                };
                let days: BTreeSet<_> = rows.iter().filter_map(|r| r.date).collect();
                MonthlySummary {
                    year: rows[0].year.clone(),
                    month: rows[0].month.clone(),
                    record_count: rows.len() as i64,
                    income_count: count(EntryKind::Income),
                    expense_count: count(EntryKind::Expense),
                    income_total: sum(EntryKind::Income),
                    expense_total: sum(EntryKind::Expense),
                    uncoded_count: rows.iter().filter(|r| r.code.is_none()).count() as i64,
                    coded_count: rows.iter().filter(|r| r.code.is_some()).count() as i64,
                    recording_days: days.len() as i64,
                    first_date: days.first().map(|d| d.to_string()),
                    last_date: days.last().map(|d| d.to_string()),
                }
            })
            .collect();

        let mut cats: BTreeMap<(String, EntryKind), Vec<&LedgerRecord>> = BTreeMap::new();
        for r in self.records.iter().filter(|r| r.code.is_some()) {
            let prefix = r.category_prefix().unwrap_or_default().to_string();
            cats.entry((prefix, r.kind)).or_default().push(r);
        }
        self.categories = cats
            .into_iter()
            .map(|((prefix, kind), rows)| {
                let amounts: Vec<f64> = rows.iter().map(|r| r.amount).collect();
                let total: f64 = amounts.iter().sum();
                let months: BTreeSet<_> = rows.iter().map(|r| (&r.year, &r.month)).collect();
                CategorySummary {
                    prefix,
                    kind,
                    record_count: rows.len() as i64,
                    total_amount: total,
                    avg_amount: total / rows.len() as f64,
                    min_amount: amounts.iter().copied().fold(f64::INFINITY, f64::min),
                    max_amount: amounts.iter().copied().fold(0.0, f64::max),
                    month_count: months.len() as i64,
                }
            })
            .collect();

        self.pattern = if self.records.is_empty() {
            None
        } else {
            let days: Vec<u32> = self.records.iter().filter_map(|r| r.day_of_month()).collect();
            let dates: BTreeSet<_> = self.records.iter().filter_map(|r| r.date).collect();
            let items: BTreeSet<_> = self.records.iter().filter_map(|r| r.item_name.as_ref()).collect();
            Some(RecordingPattern {
                total_records: self.records.len() as i64,
                recording_days: dates.len() as i64,
                integer_amount_count: self.records.iter().filter(|r| r.is_integer_amount()).count() as i64,
                noted_count: self
                    .records
                    .iter()
                    .filter(|r| r.note.as_deref().is_some_and(|n| !n.trim().is_empty()))
                    .count() as i64,
                coded_count: self.records.iter().filter(|r| r.is_coded()).count() as i64,
                avg_day_of_month: days.iter().map(|d| *d as f64).sum::<f64>() / days.len().max(1) as f64,
                month_end_count: days.iter().filter(|d| **d >= 25).count() as i64,
                distinct_item_count: items.len() as i64,
                first_date: dates.first().map(|d| d.to_string()),
                last_date: dates.last().map(|d| d.to_string()),
                monthly: self
                    .monthly
                    .iter()
                    .map(|m| MonthlyRecording {
                        year: m.year.clone(),
                        month: m.month.clone(),
                        record_count: m.record_count,
                        recording_days: m.recording_days,
                        first_date: m.first_date.clone(),
                        last_date: m.last_date.clone(),
                    })
                    .collect(),
            })
        };
    }

    fn check(&self, household_code: &str) -> Result<bool> {
        if self.failing.contains(household_code) {
            return Err(Error::InvalidData(format!("simulated failure for {}", household_code)));
        }
        Ok(household_code == self.basic.household_code)
    }
}

impl SurveySource for FixtureSource {
    fn get_household_basic_info(&self, household_code: &str) -> Result<Option<HouseholdBasicInfo>> {
        Ok(self.check(household_code)?.then(|| self.basic.clone()))
    }

    fn get_household_income_expense_data(
        &self,
        household_code: &str,
        _window: &TimeWindow,
    ) -> Result<Vec<LedgerRecord>> {
        Ok(if self.check(household_code)? { self.records.clone() } else { Vec::new() })
    }

    fn get_household_monthly_summary(
        &self,
        household_code: &str,
        _window: &TimeWindow,
    ) -> Result<Vec<MonthlySummary>> {
        Ok(if self.check(household_code)? { self.monthly.clone() } else { Vec::new() })
    }

    fn get_household_category_summary(
        &self,
        household_code: &str,
        _window: &TimeWindow,
    ) -> Result<Vec<CategorySummary>> {
        Ok(if self.check(household_code)? { self.categories.clone() } else { Vec::new() })
    }

    fn get_statistical_benchmarks(&self, _scope: &BenchmarkScope) -> Result<Benchmarks> {
        Ok(self.benchmarks.iter().cloned().collect())
    }

    fn get_household_recording_patterns(
        &self,
        household_code: &str,
        _window: &TimeWindow,
    ) -> Result<Option<RecordingPattern>> {
        Ok(if self.check(household_code)? { self.pattern.clone() } else { None })
    }

    fn get_households_by_area(
        &self,
        _town_name: Option<&str>,
        _village_name: Option<&str>,
    ) -> Result<Vec<String>> {
        Ok(vec![self.basic.household_code.clone()])
    }
}
