//! Direct-match auto-coding cache
//!
//! Learns item name → classification code from entries that are already
//! coded, then proposes codes for uncoded entries with the same (or a
//! containing/contained) item name. The most frequent code per name wins.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, info};

use crate::db::Database;
use crate::error::Result;
use crate::stats::safe_ratio;

#[derive(Debug, Clone, PartialEq)]
struct CodeMapping {
    code: String,
    /// Uses of this item name across all of its codes
    total_frequency: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodingStatistics {
    pub total_mappings: usize,
    pub total_frequency: i64,
    pub avg_frequency: f64,
    pub unique_codes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodingPreview {
    pub item_name: String,
    pub code: String,
    pub frequency: i64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default)]
pub struct CodingCache {
    mappings: BTreeMap<String, CodeMapping>,
}

impl CodingCache {
    /// Build the cache from the coded entries in `db`
    pub fn load(db: &Database) -> Result<Self> {
        let cache = Self::from_frequencies(db.coded_item_frequencies()?);
        info!(mappings = cache.len(), "Coding cache loaded");
        Ok(cache)
    }

    /// Reload from `db`, replacing every mapping
    pub fn refresh(&mut self, db: &Database) -> Result<()> {
        *self = Self::load(db)?;
        Ok(())
    }

    /// Build from `(item_name, code, frequency)` rows
    ///
    /// Rows for one item are expected most-frequent first; the first code
    /// seen for an item is kept.
    pub fn from_frequencies<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (String, String, i64)>,
    {
        let mut mappings: BTreeMap<String, CodeMapping> = BTreeMap::new();
        for (item, code, frequency) in rows {
            let item = item.trim().to_string();
            if item.is_empty() || code.trim().is_empty() {
                continue;
            }
            mappings
                .entry(item)
                .and_modify(|m| m.total_frequency += frequency)
                .or_insert(CodeMapping {
                    code,
                    total_frequency: frequency,
                });
        }
        Self { mappings }
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Code for an item name: exact match first, then the first cached name
    /// (in sorted order) that contains or is contained in it
    pub fn find_direct_match(&self, item_name: &str) -> Option<&str> {
        let item_name = item_name.trim();
        if item_name.is_empty() {
            return None;
        }

        if let Some(mapping) = self.mappings.get(item_name) {
            return Some(&mapping.code);
        }

        let fuzzy = self
            .mappings
            .iter()
            .find(|(name, _)| name.contains(item_name) || item_name.contains(name.as_str()));
        if let Some((name, mapping)) = fuzzy {
            debug!(item = %item_name, matched = %name, code = %mapping.code, "Fuzzy code match");
            return Some(&mapping.code);
        }
        None
    }

    pub fn statistics(&self) -> CodingStatistics {
        let total_frequency: i64 = self.mappings.values().map(|m| m.total_frequency).sum();
        let unique_codes: BTreeSet<&str> = self.mappings.values().map(|m| m.code.as_str()).collect();
        CodingStatistics {
            total_mappings: self.mappings.len(),
            total_frequency,
            avg_frequency: safe_ratio(total_frequency as f64, self.mappings.len() as f64),
            unique_codes: unique_codes.len(),
        }
    }

    /// Most-used mappings first
    pub fn preview(&self, limit: usize) -> Vec<CodingPreview> {
        let mut rows: Vec<CodingPreview> = self
            .mappings
            .iter()
            .map(|(name, m)| CodingPreview {
                item_name: name.clone(),
                code: m.code.clone(),
                frequency: m.total_frequency,
                confidence: 1.0,
            })
            .collect();
        rows.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.item_name.cmp(&b.item_name)));
        rows.truncate(limit);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> CodingCache {
        CodingCache::from_frequencies(vec![
            ("大米".to_string(), "310101".to_string(), 8),
            ("大米".to_string(), "310199".to_string(), 2),
            ("猪肉".to_string(), "310201".to_string(), 5),
            ("电费".to_string(), "330301".to_string(), 12),
            ("".to_string(), "999999".to_string(), 50),
        ])
    }

    #[test]
    fn test_most_frequent_code_wins() {
        let cache = cache();
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.find_direct_match("大米"), Some("310101"));
    }

    #[test]
    fn test_fuzzy_match_both_directions() {
        let cache = cache();
        assert_eq!(cache.find_direct_match("东北大米"), Some("310101"));
        assert_eq!(cache.find_direct_match("电"), Some("330301"));
        assert_eq!(cache.find_direct_match("牛奶"), None);
        assert_eq!(cache.find_direct_match("  "), None);
    }

    #[test]
    fn test_statistics_and_preview() {
        let cache = cache();
        let stats = cache.statistics();
        assert_eq!(stats.total_mappings, 3);
        assert_eq!(stats.total_frequency, 27);
        assert_eq!(stats.avg_frequency, 9.0);
        assert_eq!(stats.unique_codes, 3);

        let preview = cache.preview(2);
        assert_eq!(preview.len(), 2);
        assert_eq!(preview[0].item_name, "电费");
        assert_eq!(preview[1].item_name, "大米");
        assert_eq!(preview[1].frequency, 10);
        assert!(preview.iter().all(|p| p.confidence == 1.0));
    }

    #[test]
    fn test_empty_cache() {
        let cache = CodingCache::default();
        assert!(cache.is_empty());
        assert_eq!(cache.statistics().avg_frequency, 0.0);
        assert!(cache.preview(10).is_empty());
    }
}
