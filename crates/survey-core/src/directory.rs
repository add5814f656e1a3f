//! Town → village directory cache

use std::collections::BTreeMap;

use tracing::info;

use crate::db::Database;
use crate::error::Result;
use crate::models::Village;

/// Villages grouped by town, loaded once and refreshed on demand
#[derive(Debug, Clone, Default)]
pub struct VillageDirectory {
    towns: BTreeMap<String, Vec<Village>>,
}

impl VillageDirectory {
    pub fn load(db: &Database) -> Result<Self> {
        let directory = Self::from_villages(db.list_villages()?);
        info!(
            towns = directory.towns.len(),
            villages = directory.village_count(),
            "Village directory loaded"
        );
        Ok(directory)
    }

    pub fn refresh(&mut self, db: &Database) -> Result<()> {
        *self = Self::load(db)?;
        Ok(())
    }

    pub fn from_villages<I: IntoIterator<Item = Village>>(villages: I) -> Self {
        let mut towns: BTreeMap<String, Vec<Village>> = BTreeMap::new();
        for village in villages {
            towns.entry(village.town_name.clone()).or_default().push(village);
        }
        for list in towns.values_mut() {
            list.sort_by(|a, b| a.village_name.cmp(&b.village_name));
        }
        Self { towns }
    }

    /// Town names in sorted order
    pub fn towns(&self) -> Vec<&str> {
        self.towns.keys().map(String::as_str).collect()
    }

    /// Villages of a town, empty for an unknown town
    pub fn villages_in(&self, town_name: &str) -> &[Village] {
        self.towns.get(town_name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find_village(&self, village_code: &str) -> Option<&Village> {
        self.towns
            .values()
            .flatten()
            .find(|v| v.village_code == village_code)
    }

    pub fn village_count(&self) -> usize {
        self.towns.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.towns.is_empty()
    }
}
