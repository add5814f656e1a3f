//! Recording-behaviour statistics

use super::{param_refs, window_clause, Database};
use crate::error::Result;
use crate::models::{MonthlyRecording, RecordingPattern, TimeWindow};

impl Database {
    /// Bookkeeping counts for a household and window
    ///
    /// Returns `None` when the household has no entries in the window.
    pub fn get_household_recording_patterns(
        &self,
        household_code: &str,
        window: &TimeWindow,
    ) -> Result<Option<RecordingPattern>> {
        let conn = self.conn()?;
        let (time_clause, time_params) = window_clause("t", window);

        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(household_code.to_string())];
        params.extend(time_params);
        let refs = param_refs(&params);

        let pattern_sql = format!(
            r#"
            SELECT
                COUNT(*),
                COUNT(DISTINCT t.date),
                COUNT(CASE WHEN t.amount = CAST(t.amount AS INTEGER) THEN 1 END),
                COUNT(CASE WHEN t.note IS NOT NULL AND LENGTH(TRIM(t.note)) > 0 THEN 1 END),
                COUNT(CASE WHEN t.code IS NOT NULL THEN 1 END),
                AVG(CAST(STRFTIME('%d', t.date) AS REAL)),
                COUNT(CASE WHEN CAST(STRFTIME('%d', t.date) AS INTEGER) >= 25 THEN 1 END),
                COUNT(DISTINCT t.item_name),
                MIN(t.date),
                MAX(t.date)
            FROM ledger_entries t
            WHERE t.household_code = ? {}
            "#,
            time_clause
        );

        let mut pattern = conn.query_row(&pattern_sql, refs.as_slice(), |row| {
            let avg_day: Option<f64> = row.get(5)?;
            Ok(RecordingPattern {
                total_records: row.get(0)?,
                recording_days: row.get(1)?,
                integer_amount_count: row.get(2)?,
                noted_count: row.get(3)?,
                coded_count: row.get(4)?,
                avg_day_of_month: avg_day.unwrap_or(0.0),
                month_end_count: row.get(6)?,
                distinct_item_count: row.get(7)?,
                first_date: row.get(8)?,
                last_date: row.get(9)?,
                monthly: Vec::new(),
            })
        })?;

        if pattern.total_records == 0 {
            return Ok(None);
        }

        let monthly_sql = format!(
            r#"
            SELECT t.year, t.month, COUNT(*), COUNT(DISTINCT t.date), MIN(t.date), MAX(t.date)
            FROM ledger_entries t
            WHERE t.household_code = ? {}
            GROUP BY t.year, t.month
            ORDER BY CAST(t.year AS INTEGER), CAST(t.month AS INTEGER)
            "#,
            time_clause
        );

        let mut stmt = conn.prepare(&monthly_sql)?;
        pattern.monthly = stmt
            .query_map(refs.as_slice(), |row| {
                Ok(MonthlyRecording {
                    year: row.get(0)?,
                    month: row.get(1)?,
                    record_count: row.get(2)?,
                    recording_days: row.get(3)?,
                    first_date: row.get(4)?,
                    last_date: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Some(pattern))
    }
}
