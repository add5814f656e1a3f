//! Population benchmarks for amount anomaly detection

use tracing::debug;

use super::{param_refs, Database};
use crate::error::Result;
use crate::models::{BenchmarkScope, Benchmarks, EntryKind, StatisticalBenchmark};
use crate::stats::sample_std_dev_from_sums;

/// Groups with fewer coded, positive-amount rows than this get no benchmark
pub const MIN_BENCHMARK_RECORDS: i64 = 10;

impl Database {
    /// Mean/stdev/min/max per (code prefix, entry type) over a population
    ///
    /// Only coded entries with a positive amount count. A town or village
    /// scope that matches no villages yields an empty set.
    pub fn get_statistical_benchmarks(&self, scope: &BenchmarkScope) -> Result<Benchmarks> {
        let conn = self.conn()?;

        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        let area_clause = match scope {
            BenchmarkScope::All => String::new(),
            BenchmarkScope::Town(town) => {
                params.push(Box::new(town.clone()));
                "AND SUBSTR(t.household_code, 1, 12) IN (SELECT village_code FROM villages WHERE town_name = ?)"
                    .to_string()
            }
            BenchmarkScope::Village(village) => {
                params.push(Box::new(village.clone()));
                "AND SUBSTR(t.household_code, 1, 12) IN (SELECT village_code FROM villages WHERE village_name = ?)"
                    .to_string()
            }
        };

        // SQLite has no STDEV; carry the sum of squares and finish in Rust
        let sql = format!(
            r#"
            SELECT
                SUBSTR(t.code, 1, 2),
                t.entry_type,
                COUNT(*),
                SUM(t.amount),
                SUM(t.amount * t.amount),
                MIN(t.amount),
                MAX(t.amount)
            FROM ledger_entries t
            WHERE t.code IS NOT NULL AND t.amount > 0 {}
            GROUP BY SUBSTR(t.code, 1, 2), t.entry_type
            HAVING COUNT(*) >= {}
            "#,
            area_clause, MIN_BENCHMARK_RECORDS
        );

        let mut stmt = conn.prepare(&sql)?;
        let benchmarks: Benchmarks = stmt
            .query_map(param_refs(&params).as_slice(), |row| {
                let entry_type: i64 = row.get(1)?;
                let count: i64 = row.get(2)?;
                let sum: f64 = row.get(3)?;
                let sum_squares: f64 = row.get(4)?;
                Ok(StatisticalBenchmark {
                    prefix: row.get(0)?,
                    kind: EntryKind::from_code(entry_type).unwrap_or(EntryKind::Uncoded),
                    record_count: count,
                    mean: sum / count as f64,
                    std_dev: sample_std_dev_from_sums(count, sum, sum_squares),
                    min: row.get(5)?,
                    max: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .collect();

        debug!(count = benchmarks.len(), ?scope, "Loaded statistical benchmarks");
        Ok(benchmarks)
    }
}
