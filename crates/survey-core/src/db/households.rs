//! Household roster and town/village mapping

use rusqlite::{params, OptionalExtension};
use tracing::{debug, warn};

use super::{param_refs, window_clause, Database};
use crate::error::Result;
use crate::models::{HouseholdBasicInfo, TimeWindow, Village};

/// Household codes embed their village code in the first 12 characters
pub fn village_code_of(household_code: &str) -> Option<&str> {
    if household_code.chars().count() < 12 {
        return None;
    }
    Some(match household_code.char_indices().nth(12) {
        Some((idx, _)) => &household_code[..idx],
        None => household_code,
    })
}

impl Database {
    /// Insert or replace a village in the town/village mapping
    pub fn upsert_village(&self, village: &Village) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO villages (village_code, village_name, town_name) VALUES (?, ?, ?)
            ON CONFLICT(village_code) DO UPDATE SET
                village_name = excluded.village_name,
                town_name = excluded.town_name
            "#,
            params![village.village_code, village.village_name, village.town_name],
        )?;
        Ok(())
    }

    /// List all villages ordered by town then village
    pub fn list_villages(&self) -> Result<Vec<Village>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT village_code, village_name, town_name FROM villages ORDER BY town_name, village_name",
        )?;

        let villages = stmt
            .query_map([], |row| {
                Ok(Village {
                    village_code: row.get(0)?,
                    village_name: row.get(1)?,
                    town_name: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(villages)
    }

    /// Insert or replace a roster entry
    pub fn upsert_household(
        &self,
        household_code: &str,
        head_name: &str,
        household_size: u32,
        town_name: Option<&str>,
        village_name: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO households (household_code, head_name, household_size, town_name, village_name)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(household_code) DO UPDATE SET
                head_name = excluded.head_name,
                household_size = excluded.household_size,
                town_name = excluded.town_name,
                village_name = excluded.village_name
            "#,
            params![
                household_code,
                head_name,
                household_size.max(1),
                town_name,
                village_name
            ],
        )?;
        Ok(())
    }

    /// Basic info for a household
    ///
    /// Falls back to a synthetic head name (`户主_<last 3 chars>`, size 1)
    /// when the roster lacks the household but ledger rows exist. Returns
    /// `None` when neither source knows the code.
    pub fn get_household_basic_info(
        &self,
        household_code: &str,
    ) -> Result<Option<HouseholdBasicInfo>> {
        let conn = self.conn()?;

        let roster: Option<(String, i64, Option<String>, Option<String>)> = conn
            .query_row(
                "SELECT head_name, household_size, town_name, village_name FROM households WHERE household_code = ?",
                params![household_code],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let (head_name, household_size, roster_town, roster_village) = match roster {
            Some((head, size, town, village)) => {
                let size = u32::try_from(size.max(1)).unwrap_or(u32::MAX);
                (head, size, town, village)
            }
            None => {
                debug!(household = %household_code, "Not in roster, checking ledger");
                let ledger_rows: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM ledger_entries WHERE household_code = ?",
                    params![household_code],
                    |row| row.get(0),
                )?;
                if ledger_rows == 0 {
                    warn!(household = %household_code, "Household not found in roster or ledger");
                    return Ok(None);
                }
                (synthetic_head_name(household_code), 1, None, None)
            }
        };

        let village_code = village_code_of(household_code).map(str::to_string);
        let village: Option<(String, String)> = match &village_code {
            Some(code) => conn
                .query_row(
                    "SELECT village_name, town_name FROM villages WHERE village_code = ?",
                    params![code],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?,
            None => None,
        };

        let (village_name, town_name) = match village {
            Some((v, t)) => (Some(v), Some(t)),
            None => (roster_village, roster_town),
        };

        Ok(Some(HouseholdBasicInfo {
            household_code: household_code.to_string(),
            head_name,
            household_size,
            village_code,
            village_name,
            town_name,
        }))
    }

    /// Household codes whose village matches the given town and/or village name
    ///
    /// With neither filter every roster household in a known village is returned.
    pub fn get_households_by_area(
        &self,
        town_name: Option<&str>,
        village_name: Option<&str>,
    ) -> Result<Vec<String>> {
        let conn = self.conn()?;

        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(town) = town_name.filter(|t| !t.is_empty()) {
            conditions.push("v.town_name = ?");
            params.push(Box::new(town.to_string()));
        }
        if let Some(village) = village_name.filter(|v| !v.is_empty()) {
            conditions.push("v.village_name = ?");
            params.push(Box::new(village.to_string()));
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            r#"
            SELECT DISTINCT h.household_code
            FROM households h
            WHERE SUBSTR(h.household_code, 1, 12) IN (
                SELECT v.village_code FROM villages v {}
            )
            ORDER BY h.household_code
            "#,
            where_clause
        );

        let mut stmt = conn.prepare(&sql)?;
        let codes = stmt
            .query_map(param_refs(&params).as_slice(), |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(codes)
    }

    /// Every household code with at least one ledger entry in the window
    pub fn get_all_households_with_data(&self, window: &TimeWindow) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let (time_clause, params) = window_clause("t", window);
        let sql = format!(
            "SELECT DISTINCT t.household_code FROM ledger_entries t WHERE 1 = 1 {} ORDER BY t.household_code",
            time_clause
        );

        let mut stmt = conn.prepare(&sql)?;
        let codes = stmt
            .query_map(param_refs(&params).as_slice(), |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(codes)
    }
}

fn synthetic_head_name(household_code: &str) -> String {
    let chars: Vec<char> = household_code.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(3)..].iter().collect();
    format!("户主_{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_village_code_of() {
        assert_eq!(village_code_of("110101001001001"), Some("110101001001"));
        assert_eq!(village_code_of("110101001001"), Some("110101001001"));
        assert_eq!(village_code_of("1101"), None);
    }

    #[test]
    fn test_synthetic_head_name() {
        assert_eq!(synthetic_head_name("110101001001007"), "户主_007");
        assert_eq!(synthetic_head_name("7"), "户主_7");
    }
}
