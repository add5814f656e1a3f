//! CSV import command implementations

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use survey_core::db::Database;
use survey_core::import::{import_households, import_item_codes, import_ledger, import_villages};

use crate::cli::ImportKind;

pub fn cmd_import(db: &Database, kind: ImportKind, file: &Path) -> Result<usize> {
    let csv_file =
        File::open(file).with_context(|| format!("Failed to open file: {}", file.display()))?;

    let label = match kind {
        ImportKind::Ledger => "ledger entries",
        ImportKind::Households => "households",
        ImportKind::Villages => "villages",
        ImportKind::Codes => "item codes",
    };
    println!("📥 Importing {} from {}...", label, file.display());

    let imported = match kind {
        ImportKind::Ledger => import_ledger(db, csv_file),
        ImportKind::Households => import_households(db, csv_file),
        ImportKind::Villages => import_villages(db, csv_file),
        ImportKind::Codes => import_item_codes(db, csv_file),
    }
    .with_context(|| format!("Failed to import {}", file.display()))?;

    println!("✅ Import complete!");
    println!("   Imported: {}", imported);

    if kind == ImportKind::Ledger {
        let uncoded = db.count_uncoded()?;
        if uncoded > 0 {
            println!();
            println!("💡 {} entries have no code. Run 'survey coding apply' to fill them.", uncoded);
        }
    }

    Ok(imported)
}
