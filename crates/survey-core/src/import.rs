//! CSV loaders for ledger entries, the household roster, villages and the
//! classification code table
//!
//! Every loader validates the whole file before anything is written, so a
//! bad row leaves the database untouched.

use std::io::Read;

use chrono::{Datelike, NaiveDate};
use csv::{ReaderBuilder, Trim};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{normalize_month, EntryKind, ItemCode, NewLedgerEntry, Village, YearMonth};

/// A roster row ready for `Database::upsert_household`
#[derive(Debug, Clone, PartialEq)]
pub struct HouseholdRow {
    pub household_code: String,
    pub head_name: String,
    pub household_size: u32,
    pub town_name: Option<String>,
    pub village_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLedgerRow {
    household_code: String,
    year: Option<String>,
    month: Option<String>,
    date: Option<String>,
    #[serde(rename = "type")]
    entry_type: Option<String>,
    code: Option<String>,
    item_name: Option<String>,
    quantity: Option<String>,
    amount: String,
    note: Option<String>,
    unit_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawHouseholdRow {
    household_code: String,
    head_name: Option<String>,
    household_size: Option<String>,
    town_name: Option<String>,
    village_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVillageRow {
    village_code: String,
    village_name: String,
    town_name: String,
}

#[derive(Debug, Deserialize)]
struct RawCodeRow {
    code: String,
    name: String,
    #[serde(rename = "type")]
    entry_type: Option<String>,
    unit_name: Option<String>,
}

/// Deserialize every row, reporting the 1-based data line on failure
fn read_rows<R: Read, T: DeserializeOwned>(reader: R) -> Result<Vec<(usize, T)>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (idx, result) in rdr.deserialize().enumerate() {
        let line = idx + 2;
        let row: T = result.map_err(|e| Error::Import(format!("line {}: {}", line, e)))?;
        rows.push((line, row));
    }
    Ok(rows)
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn parse_date(line: usize, s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }
    Err(Error::Import(format!("line {}: unable to parse date: {}", line, s)))
}

/// Non-negative amount; thousands separators and currency marks are ignored
fn parse_amount(line: usize, s: &str) -> Result<f64> {
    let cleaned: String = s.trim().replace([',', ' ', '¥', '￥'], "");
    let amount = cleaned
        .parse::<f64>()
        .map_err(|_| Error::Import(format!("line {}: unable to parse amount: {}", line, s)))?;
    if amount < 0.0 || !amount.is_finite() {
        return Err(Error::Import(format!(
            "line {}: amount must be non-negative: {}",
            line, s
        )));
    }
    Ok(amount)
}

fn parse_kind(line: usize, s: Option<&str>) -> Result<EntryKind> {
    s.unwrap_or("")
        .parse()
        .map_err(|e: String| Error::Import(format!("line {}: {}", line, e)))
}

/// Parse ledger rows
///
/// Columns: `household_code, year, month, date, type, code, item_name,
/// quantity, amount, note, unit_name`. Year and month fall back to the
/// date when blank.
pub fn parse_ledger_csv<R: Read>(reader: R) -> Result<Vec<NewLedgerEntry>> {
    let rows: Vec<(usize, RawLedgerRow)> = read_rows(reader)?;
    let mut entries = Vec::with_capacity(rows.len());

    for (line, raw) in rows {
        if raw.household_code.is_empty() {
            return Err(Error::Import(format!("line {}: missing household_code", line)));
        }

        let date = blank_to_none(raw.date)
            .map(|d| parse_date(line, &d))
            .transpose()?;
        let (year, month) = match (blank_to_none(raw.year), blank_to_none(raw.month), date) {
            (Some(y), Some(m), _) => (y, normalize_month(&m)),
            (_, _, Some(d)) => (d.year().to_string(), format!("{:02}", d.month())),
            _ => {
                return Err(Error::Import(format!(
                    "line {}: year/month or date required",
                    line
                )))
            }
        };
        YearMonth::parse(&year, &month)
            .map_err(|e| Error::Import(format!("line {}: {}", line, e)))?;

        let quantity = match blank_to_none(raw.quantity) {
            Some(q) => q
                .parse::<f64>()
                .map_err(|_| Error::Import(format!("line {}: invalid quantity: {}", line, q)))?,
            None => 1.0,
        };

        entries.push(NewLedgerEntry {
            household_code: raw.household_code,
            year,
            month,
            date,
            kind: parse_kind(line, raw.entry_type.as_deref())?,
            code: blank_to_none(raw.code),
            item_name: blank_to_none(raw.item_name),
            quantity,
            amount: parse_amount(line, &raw.amount)?,
            note: blank_to_none(raw.note),
            unit_name: blank_to_none(raw.unit_name),
        });
    }

    debug!(rows = entries.len(), "Parsed ledger CSV");
    Ok(entries)
}

/// Parse roster rows: `household_code, head_name, household_size, town_name, village_name`
pub fn parse_households_csv<R: Read>(reader: R) -> Result<Vec<HouseholdRow>> {
    let rows: Vec<(usize, RawHouseholdRow)> = read_rows(reader)?;
    rows.into_iter()
        .map(|(line, raw)| {
            if raw.household_code.is_empty() {
                return Err(Error::Import(format!("line {}: missing household_code", line)));
            }
            let household_size = match blank_to_none(raw.household_size) {
                Some(s) => s.parse::<u32>().map_err(|_| {
                    Error::Import(format!("line {}: invalid household_size: {}", line, s))
                })?,
                None => 1,
            };
            Ok(HouseholdRow {
                head_name: blank_to_none(raw.head_name).unwrap_or_default(),
                household_code: raw.household_code,
                household_size: household_size.max(1),
                town_name: blank_to_none(raw.town_name),
                village_name: blank_to_none(raw.village_name),
            })
        })
        .collect()
}

/// Parse village rows: `village_code, village_name, town_name`
pub fn parse_villages_csv<R: Read>(reader: R) -> Result<Vec<Village>> {
    let rows: Vec<(usize, RawVillageRow)> = read_rows(reader)?;
    rows.into_iter()
        .map(|(line, raw)| {
            if raw.village_code.is_empty() {
                return Err(Error::Import(format!("line {}: missing village_code", line)));
            }
            Ok(Village {
                village_code: raw.village_code,
                village_name: raw.village_name,
                town_name: raw.town_name,
            })
        })
        .collect()
}

/// Parse code table rows: `code, name, type, unit_name`
pub fn parse_item_codes_csv<R: Read>(reader: R) -> Result<Vec<ItemCode>> {
    let rows: Vec<(usize, RawCodeRow)> = read_rows(reader)?;
    rows.into_iter()
        .map(|(line, raw)| {
            if raw.code.is_empty() {
                return Err(Error::Import(format!("line {}: missing code", line)));
            }
            let kind = match blank_to_none(raw.entry_type) {
                Some(t) => Some(parse_kind(line, Some(&t))?),
                None => None,
            };
            Ok(ItemCode {
                code: raw.code,
                name: raw.name,
                kind,
                unit_name: blank_to_none(raw.unit_name),
            })
        })
        .collect()
}

pub fn import_ledger<R: Read>(db: &Database, reader: R) -> Result<usize> {
    let entries = parse_ledger_csv(reader)?;
    let count = db.insert_ledger_entries(&entries)?;
    info!(rows = count, "Imported ledger entries");
    Ok(count)
}

pub fn import_households<R: Read>(db: &Database, reader: R) -> Result<usize> {
    let rows = parse_households_csv(reader)?;
    for row in &rows {
        db.upsert_household(
            &row.household_code,
            &row.head_name,
            row.household_size,
            row.town_name.as_deref(),
            row.village_name.as_deref(),
        )?;
    }
    info!(rows = rows.len(), "Imported households");
    Ok(rows.len())
}

pub fn import_villages<R: Read>(db: &Database, reader: R) -> Result<usize> {
    let villages = parse_villages_csv(reader)?;
    for village in &villages {
        db.upsert_village(village)?;
    }
    info!(rows = villages.len(), "Imported villages");
    Ok(villages.len())
}

pub fn import_item_codes<R: Read>(db: &Database, reader: R) -> Result<usize> {
    let codes = parse_item_codes_csv(reader)?;
    for code in &codes {
        db.upsert_item_code(code)?;
    }
    info!(rows = codes.len(), "Imported item codes");
    Ok(codes.len())
}
