//! Auto-coding and area directory commands

use anyhow::{Context, Result};
use survey_core::{CodingCache, CodingOutcome, Database, VillageDirectory};

use super::truncate;

pub fn cmd_coding_stats(db: &Database) -> Result<()> {
    let cache = CodingCache::load(db).context("Failed to build coding cache")?;
    let stats = cache.statistics();
    let uncoded = db.count_uncoded()?;

    println!();
    println!("🏷️  Coding Cache");
    println!("   ─────────────────────────────");
    println!("   Item mappings:    {}", stats.total_mappings);
    println!("   Distinct codes:   {}", stats.unique_codes);
    println!("   Coded entries:    {}", stats.total_frequency);
    println!("   Avg per mapping:  {:.2}", stats.avg_frequency);
    println!("   Uncoded entries:  {}", uncoded);

    Ok(())
}

pub fn cmd_coding_preview(db: &Database, limit: usize) -> Result<()> {
    let cache = CodingCache::load(db).context("Failed to build coding cache")?;
    let preview = cache.preview(limit);

    println!();
    if preview.is_empty() {
        println!("   No coded entries yet. Import a coded ledger first.");
        return Ok(());
    }

    println!("   {:20} │ {:>8} │ {:>9}", "Item", "Code", "Frequency");
    println!("   ─────────────────────┼──────────┼───────────");
    for entry in &preview {
        println!(
            "   {:20} │ {:>8} │ {:>9}",
            truncate(&entry.item_name, 20),
            entry.code,
            entry.frequency
        );
    }

    Ok(())
}

pub fn cmd_coding_apply(db: &Database, limit: usize) -> Result<CodingOutcome> {
    let cache = CodingCache::load(db).context("Failed to build coding cache")?;
    if cache.is_empty() {
        println!("   No coded entries to learn from; nothing to do.");
        return Ok(CodingOutcome::default());
    }

    println!("🏷️  Coding up to {} uncoded entries...", limit);
    let outcome = db
        .apply_direct_coding(&cache, limit)
        .context("Failed to apply coding")?;

    println!("✅ Coding complete!");
    println!("   Processed: {}", outcome.total_records);
    println!("   Matched:   {}", outcome.matched_records);
    println!("   Unmatched: {}", outcome.unmatched_records);
    println!("   Match rate: {:.2}%", outcome.match_rate);

    Ok(outcome)
}

pub fn cmd_areas(db: &Database) -> Result<()> {
    let directory = VillageDirectory::load(db).context("Failed to load villages")?;

    println!();
    if directory.is_empty() {
        println!("   No villages loaded. Run 'survey import villages --file <csv>'.");
        return Ok(());
    }

    for town in directory.towns() {
        let villages = directory.villages_in(town);
        println!("📍 {} ({} villages)", town, villages.len());
        for village in villages {
            println!("   {}  {}", village.village_code, village.village_name);
        }
    }
    println!();
    println!("   Total villages: {}", directory.village_count());

    Ok(())
}
