//! Ledger entries and the classification code table

use chrono::NaiveDate;
use rusqlite::{params, Row};
use serde::Serialize;
use tracing::info;

use super::{param_refs, window_clause, Database};
use crate::coding::CodingCache;
use crate::error::Result;
use crate::models::{normalize_month, EntryKind, ItemCode, LedgerRecord, NewLedgerEntry, TimeWindow};
use crate::stats::count_ratio;

/// Result of an auto-coding pass over uncoded entries
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CodingOutcome {
    pub total_records: usize,
    pub matched_records: usize,
    pub unmatched_records: usize,
    /// Percentage (0-100) of processed entries that received a code
    pub match_rate: f64,
}

pub(crate) fn ledger_record_from_row(row: &Row) -> rusqlite::Result<LedgerRecord> {
    let date_str: Option<String> = row.get(4)?;
    let entry_type: i64 = row.get(5)?;

    Ok(LedgerRecord {
        id: row.get(0)?,
        household_code: row.get(1)?,
        year: row.get(2)?,
        month: row.get(3)?,
        date: date_str.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        kind: EntryKind::from_code(entry_type).unwrap_or(EntryKind::Uncoded),
        code: row.get(6)?,
        item_name: row.get(7)?,
        quantity: row.get(8)?,
        amount: row.get(9)?,
        note: row.get(10)?,
        unit_name: row.get(11)?,
    })
}

/// Empty or whitespace-only strings are stored as NULL
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

impl Database {
    /// Insert a single ledger entry, returning its id
    pub fn insert_ledger_entry(&self, entry: &NewLedgerEntry) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO ledger_entries
                (household_code, year, month, date, entry_type, code, item_name, quantity, amount, note, unit_name)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                entry.household_code,
                entry.year.trim(),
                normalize_month(&entry.month),
                entry.date.map(|d| d.format("%Y-%m-%d").to_string()),
                entry.kind.as_code(),
                non_empty(entry.code.as_deref()),
                non_empty(entry.item_name.as_deref()),
                entry.quantity,
                entry.amount,
                non_empty(entry.note.as_deref()),
                non_empty(entry.unit_name.as_deref()),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert many ledger entries in one transaction
    pub fn insert_ledger_entries(&self, entries: &[NewLedgerEntry]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO ledger_entries
                    (household_code, year, month, date, entry_type, code, item_name, quantity, amount, note, unit_name)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )?;
            for entry in entries {
                stmt.execute(params![
                    entry.household_code,
                    entry.year.trim(),
                    normalize_month(&entry.month),
                    entry.date.map(|d| d.format("%Y-%m-%d").to_string()),
                    entry.kind.as_code(),
                    non_empty(entry.code.as_deref()),
                    non_empty(entry.item_name.as_deref()),
                    entry.quantity,
                    entry.amount,
                    non_empty(entry.note.as_deref()),
                    non_empty(entry.unit_name.as_deref()),
                ])?;
            }
        }
        tx.commit()?;
        Ok(entries.len())
    }

    /// All ledger entries for a household in the window, ordered by date then id
    pub fn get_household_income_expense_data(
        &self,
        household_code: &str,
        window: &TimeWindow,
    ) -> Result<Vec<LedgerRecord>> {
        let conn = self.conn()?;
        let (time_clause, time_params) = window_clause("t", window);

        let sql = format!(
            r#"
            SELECT t.id, t.household_code, t.year, t.month, t.date, t.entry_type,
                   t.code, t.item_name, t.quantity, t.amount, t.note, t.unit_name
            FROM ledger_entries t
            WHERE t.household_code = ? {}
            ORDER BY t.date, t.id
            "#,
            time_clause
        );

        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(household_code.to_string())];
        params.extend(time_params);

        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(param_refs(&params).as_slice(), ledger_record_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Insert or replace a classification code
    pub fn upsert_item_code(&self, item: &ItemCode) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO item_codes (code, name, entry_type, unit_name) VALUES (?, ?, ?, ?)
            ON CONFLICT(code) DO UPDATE SET
                name = excluded.name,
                entry_type = excluded.entry_type,
                unit_name = excluded.unit_name
            "#,
            params![
                item.code,
                item.name,
                item.kind.map(|k| k.as_code()),
                item.unit_name
            ],
        )?;
        Ok(())
    }

    /// List the classification code table ordered by code
    pub fn list_item_codes(&self) -> Result<Vec<ItemCode>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT code, name, entry_type, unit_name FROM item_codes ORDER BY code")?;

        let codes = stmt
            .query_map([], |row| {
                let entry_type: Option<i64> = row.get(2)?;
                Ok(ItemCode {
                    code: row.get(0)?,
                    name: row.get(1)?,
                    kind: entry_type.and_then(EntryKind::from_code),
                    unit_name: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(codes)
    }

    /// (item name, code, frequency) for every coded item, most frequent code first per item
    pub fn coded_item_frequencies(&self) -> Result<Vec<(String, String, i64)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT TRIM(item_name), TRIM(code), COUNT(*) AS frequency
            FROM ledger_entries
            WHERE code IS NOT NULL AND TRIM(code) != ''
              AND item_name IS NOT NULL AND TRIM(item_name) != ''
            GROUP BY TRIM(item_name), TRIM(code)
            ORDER BY TRIM(item_name), frequency DESC, TRIM(code)
            "#,
        )?;

        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Number of entries without a code that have an item name to match on
    pub fn count_uncoded(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            r#"
            SELECT COUNT(*) FROM ledger_entries
            WHERE (code IS NULL OR TRIM(code) = '')
              AND item_name IS NOT NULL AND TRIM(item_name) != ''
            "#,
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Assign codes to up to `limit` uncoded entries using the direct-match cache
    ///
    /// Entries still typed as uncoded also take their income/expense type from
    /// the code table when it knows the matched code.
    pub fn apply_direct_coding(&self, cache: &CodingCache, limit: usize) -> Result<CodingOutcome> {
        let mut conn = self.conn()?;

        let uncoded: Vec<(i64, String)> = {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, item_name FROM ledger_entries
                WHERE (code IS NULL OR TRIM(code) = '')
                  AND item_name IS NOT NULL AND TRIM(item_name) != ''
                ORDER BY id
                LIMIT ?
                "#,
            )?;
            let rows = stmt
                .query_map(params![limit as i64], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        let mut matched = 0;
        let tx = conn.transaction()?;
        for (id, item_name) in &uncoded {
            if let Some(code) = cache.find_direct_match(item_name) {
                tx.execute(
                    r#"
                    UPDATE ledger_entries SET
                        code = ?1,
                        entry_type = CASE
                            WHEN entry_type = 0 THEN COALESCE(
                                (SELECT entry_type FROM item_codes WHERE code = ?1), 0)
                            ELSE entry_type
                        END
                    WHERE id = ?2
                    "#,
                    params![code, id],
                )?;
                matched += 1;
            }
        }
        tx.commit()?;

        let total = uncoded.len();
        let outcome = CodingOutcome {
            total_records: total,
            matched_records: matched,
            unmatched_records: total - matched,
            match_rate: count_ratio(matched, total) * 100.0,
        };

        info!(
            total = outcome.total_records,
            matched = outcome.matched_records,
            "Direct coding pass complete"
        );
        Ok(outcome)
    }
}
