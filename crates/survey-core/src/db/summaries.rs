//! Monthly and per-category aggregates for one household

use super::{param_refs, window_clause, Database};
use crate::error::Result;
use crate::models::{CategorySummary, EntryKind, MonthlySummary, TimeWindow};

impl Database {
    /// One row per (year, month) with counts and income/expense totals
    pub fn get_household_monthly_summary(
        &self,
        household_code: &str,
        window: &TimeWindow,
    ) -> Result<Vec<MonthlySummary>> {
        let conn = self.conn()?;
        let (time_clause, time_params) = window_clause("t", window);

        let sql = format!(
            r#"
            SELECT
                t.year,
                t.month,
                COUNT(*),
                COUNT(CASE WHEN t.entry_type = 1 THEN 1 END),
                COUNT(CASE WHEN t.entry_type = 2 THEN 1 END),
                COALESCE(SUM(CASE WHEN t.entry_type = 1 THEN t.amount ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN t.entry_type = 2 THEN t.amount ELSE 0 END), 0),
                COUNT(CASE WHEN t.code IS NULL THEN 1 END),
                COUNT(CASE WHEN t.code IS NOT NULL THEN 1 END),
                COUNT(DISTINCT t.date),
                MIN(t.date),
                MAX(t.date)
            FROM ledger_entries t
            WHERE t.household_code = ? {}
            GROUP BY t.year, t.month
            ORDER BY CAST(t.year AS INTEGER), CAST(t.month AS INTEGER)
            "#,
            time_clause
        );

        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(household_code.to_string())];
        params.extend(time_params);

        let mut stmt = conn.prepare(&sql)?;
        let summaries = stmt
            .query_map(param_refs(&params).as_slice(), |row| {
                Ok(MonthlySummary {
                    year: row.get(0)?,
                    month: row.get(1)?,
                    record_count: row.get(2)?,
                    income_count: row.get(3)?,
                    expense_count: row.get(4)?,
                    income_total: row.get(5)?,
                    expense_total: row.get(6)?,
                    uncoded_count: row.get(7)?,
                    coded_count: row.get(8)?,
                    recording_days: row.get(9)?,
                    first_date: row.get(10)?,
                    last_date: row.get(11)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(summaries)
    }

    /// One row per (code prefix, entry type) over coded entries
    pub fn get_household_category_summary(
        &self,
        household_code: &str,
        window: &TimeWindow,
    ) -> Result<Vec<CategorySummary>> {
        let conn = self.conn()?;
        let (time_clause, time_params) = window_clause("t", window);

        let sql = format!(
            r#"
            SELECT
                SUBSTR(t.code, 1, 2),
                t.entry_type,
                COUNT(*),
                COALESCE(SUM(t.amount), 0),
                COALESCE(AVG(t.amount), 0),
                COALESCE(MIN(t.amount), 0),
                COALESCE(MAX(t.amount), 0),
                COUNT(DISTINCT (t.year || '-' || t.month))
            FROM ledger_entries t
            WHERE t.household_code = ? AND t.code IS NOT NULL {}
            GROUP BY SUBSTR(t.code, 1, 2), t.entry_type
            ORDER BY t.entry_type, SUM(t.amount) DESC
            "#,
            time_clause
        );

        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(household_code.to_string())];
        params.extend(time_params);

        let mut stmt = conn.prepare(&sql)?;
        let summaries = stmt
            .query_map(param_refs(&params).as_slice(), |row| {
                let entry_type: i64 = row.get(1)?;
                Ok(CategorySummary {
                    prefix: row.get(0)?,
                    kind: EntryKind::from_code(entry_type).unwrap_or(EntryKind::Uncoded),
                    record_count: row.get(2)?,
                    total_amount: row.get(3)?,
                    avg_amount: row.get(4)?,
                    min_amount: row.get(5)?,
                    max_amount: row.get(6)?,
                    month_count: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(summaries)
    }
}
