//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use survey_core::{AnalysisConfig, Database, TimeWindow};
use tempfile::TempDir;

use crate::cli::{Cli, Commands, ImportKind, ReportType, WindowArgs};
use crate::commands::{self, truncate};

const HOUSEHOLD: &str = "110101001001001";

fn write_csv(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Database with one village, two households and two months of entries
fn setup_test_db(dir: &TempDir) -> Database {
    let db = Database::in_memory().unwrap();

    let villages = write_csv(
        dir,
        "villages.csv",
        "village_code,village_name,town_name\n110101001001,东村,城关镇\n",
    );
    let households = write_csv(
        dir,
        "households.csv",
        "household_code,head_name,household_size,town_name,village_name\n\
         110101001001001,张三,3,城关镇,东村\n\
         110101001001002,李四,2,城关镇,东村\n",
    );
    let mut ledger = String::from(
        "household_code,year,month,date,type,code,item_name,quantity,amount,note,unit_name\n",
    );
    for month in ["05", "06"] {
        ledger.push_str(&format!(
            "{},2024,{m},2024-{m}-01,1,210101,工资,1,5000,,元\n",
            HOUSEHOLD,
            m = month
        ));
        for day in 2..=12 {
            let (code, item) = if day % 3 == 0 { ("", "鸡蛋") } else { ("310101", "大米") };
            ledger.push_str(&format!(
                "{},2024,{m},2024-{m}-{d:02},2,{c},{i},1,{a},,\n",
                HOUSEHOLD,
                m = month,
                d = day,
                c = code,
                i = item,
                a = 20.0 + day as f64 * 1.3,
            ));
        }
    }
    let ledger = write_csv(dir, "ledger.csv", &ledger);

    commands::cmd_import(&db, ImportKind::Villages, &villages).unwrap();
    commands::cmd_import(&db, ImportKind::Households, &households).unwrap();
    commands::cmd_import(&db, ImportKind::Ledger, &ledger).unwrap();
    db
}

// ========== Helpers ==========

#[test]
fn test_truncate_counts_characters() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a long item name", 10), "a long ...");
    assert_eq!(truncate("城关镇东村西组", 5), "城关...");
}

#[test]
fn test_window_args() {
    let all = WindowArgs::default().to_window().unwrap();
    assert_eq!(all, TimeWindow::all());

    let bad = WindowArgs {
        start_year: Some("2024".into()),
        start_month: Some("13".into()),
        ..Default::default()
    };
    assert!(bad.to_window().is_err());

    let reversed = WindowArgs {
        start_year: Some("2024".into()),
        start_month: Some("06".into()),
        end_year: Some("2024".into()),
        end_month: Some("01".into()),
    };
    assert!(reversed.to_window().is_err());
}

// ========== Argument Parsing Tests ==========

#[test]
fn test_parse_batch_report_households() {
    let cli = Cli::try_parse_from([
        "survey",
        "--no-encrypt",
        "report",
        "batch",
        "--households",
        "H1,H2",
        "--start-year",
        "2024",
        "--start-month",
        "01",
    ])
    .unwrap();

    assert!(cli.no_encrypt);
    match cli.command {
        Commands::Report {
            report_type: ReportType::Batch { households, window, output },
        } => {
            assert_eq!(households, vec!["H1".to_string(), "H2".to_string()]);
            assert_eq!(window.start_year.as_deref(), Some("2024"));
            assert!(output.is_none());
        }
        _ => panic!("expected batch report"),
    }
}

#[test]
fn test_parse_import_kind() {
    let cli = Cli::try_parse_from(["survey", "import", "codes", "--file", "codes.csv"]).unwrap();
    match cli.command {
        Commands::Import { kind, file } => {
            assert_eq!(kind, ImportKind::Codes);
            assert_eq!(file, PathBuf::from("codes.csv"));
        }
        _ => panic!("expected import"),
    }

    assert!(Cli::try_parse_from(["survey", "import", "receipts", "--file", "x.csv"]).is_err());
}

#[test]
fn test_parse_init_needs_no_config() {
    let cli = Cli::try_parse_from(["survey", "--no-encrypt", "init"]).unwrap();
    assert!(matches!(cli.command, Commands::Init));
    assert!(cli.config.is_none());
}

#[test]
fn test_cmd_init_creates_database() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("survey.db");

    commands::cmd_init(&path, true).unwrap();
    assert!(path.exists());

    let db = commands::open_db(&path, true).unwrap();
    assert!(db.list_villages().unwrap().is_empty());
}

// ========== Import Command Tests ==========

#[test]
fn test_cmd_import_counts_rows() {
    let dir = TempDir::new().unwrap();
    let db = Database::in_memory().unwrap();
    let codes = write_csv(
        &dir,
        "codes.csv",
        "code,name,type,unit_name\n310101,大米,2,公斤\n210101,工资,1,元\n",
    );

    let imported = commands::cmd_import(&db, ImportKind::Codes, &codes).unwrap();
    assert_eq!(imported, 2);
    assert_eq!(db.list_item_codes().unwrap().len(), 2);
}

#[test]
fn test_cmd_import_missing_file() {
    let db = Database::in_memory().unwrap();
    let result = commands::cmd_import(&db, ImportKind::Ledger, &PathBuf::from("/nonexistent.csv"));
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("Failed to open file"));
}

#[test]
fn test_cmd_import_rejects_negative_amount() {
    let dir = TempDir::new().unwrap();
    let db = Database::in_memory().unwrap();
    let ledger = write_csv(
        &dir,
        "bad.csv",
        "household_code,year,month,date,type,code,item_name,quantity,amount,note,unit_name\n\
         110101001001001,2024,01,2024-01-05,2,310101,大米,1,-3,,\n",
    );

    assert!(commands::cmd_import(&db, ImportKind::Ledger, &ledger).is_err());
}

// ========== Analysis Command Tests ==========

#[test]
fn test_analysis_commands_run() {
    let dir = TempDir::new().unwrap();
    let db = setup_test_db(&dir);
    let config = AnalysisConfig::embedded().unwrap();
    let window = TimeWindow::all();

    assert!(commands::cmd_profile(&db, &config, HOUSEHOLD, &window).is_ok());
    assert!(commands::cmd_anomalies(&db, &config, HOUSEHOLD, &window).is_ok());
    assert!(commands::cmd_quality(&db, HOUSEHOLD, &window).is_ok());
    assert!(commands::cmd_quality_report(&db, &[], &window).is_ok());
}

#[test]
fn test_cmd_profile_unknown_household() {
    let dir = TempDir::new().unwrap();
    let db = setup_test_db(&dir);
    let config = AnalysisConfig::embedded().unwrap();

    let result = commands::cmd_profile(&db, &config, "999999999999999", &TimeWindow::all());
    assert!(result.is_err());
}

#[test]
fn test_cmd_quality_report_without_data_fails() {
    let db = Database::in_memory().unwrap();
    let result = commands::cmd_quality_report(&db, &[], &TimeWindow::all());
    assert!(result.is_err());
}

// ========== Report Command Tests ==========

#[test]
fn test_cmd_report_household_writes_json() {
    let dir = TempDir::new().unwrap();
    let db = setup_test_db(&dir);
    let config = AnalysisConfig::embedded().unwrap();
    let output = dir.path().join("out").join("household.json");

    commands::cmd_report_household(&db, &config, HOUSEHOLD, &TimeWindow::all(), Some(&output))
        .unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["report_metadata"]["head_name"], "张三");
    assert!(json.get("error").is_none());
}

#[test]
fn test_cmd_report_unknown_household_writes_failure() {
    let dir = TempDir::new().unwrap();
    let db = setup_test_db(&dir);
    let config = AnalysisConfig::embedded().unwrap();
    let output = dir.path().join("missing.json");

    let result = commands::cmd_report_household(
        &db,
        &config,
        "999999999999999",
        &TimeWindow::all(),
        Some(&output),
    );
    assert!(result.is_err());

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "未找到户代码 999999999999999 的基础信息");
}

#[test]
fn test_cmd_report_area() {
    let dir = TempDir::new().unwrap();
    let db = setup_test_db(&dir);
    let config = AnalysisConfig::embedded().unwrap();
    let output = dir.path().join("area.json");

    commands::cmd_report_area(
        &db,
        &config,
        Some("城关镇"),
        None,
        &TimeWindow::all(),
        Some(&output),
    )
    .unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(json["report_metadata"]["area"]["household_count"], 2);

    let none = commands::cmd_report_area(&db, &config, None, None, &TimeWindow::all(), None);
    assert!(none.is_err());
}

#[test]
fn test_cmd_report_batch() {
    let dir = TempDir::new().unwrap();
    let db = setup_test_db(&dir);
    let config = AnalysisConfig::embedded().unwrap();
    let output = dir.path().join("batch.json");
    let codes = vec![HOUSEHOLD.to_string(), "nobody".to_string()];

    commands::cmd_report_batch(&db, &config, &codes, &TimeWindow::all(), Some(&output)).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(json["success"], true);
    assert!(json["detailed_results"]["quality_assessments"].get(HOUSEHOLD).is_some());
    assert!(json["detailed_results"]["consumption_profiles"].get("nobody").is_none());
}

// ========== Coding Command Tests ==========

#[test]
fn test_cmd_coding_apply() {
    let dir = TempDir::new().unwrap();
    let db = setup_test_db(&dir);

    // Teach the cache one 鸡蛋 code
    let conn = db.conn().unwrap();
    conn.execute(
        "UPDATE ledger_entries SET code = ?1 WHERE id = (SELECT MIN(id) FROM ledger_entries WHERE item_name = ?2)",
        rusqlite::params!["310401", "鸡蛋"],
    )
    .unwrap();
    drop(conn);

    let before = db.count_uncoded().unwrap();
    assert!(before > 0);

    let outcome = commands::cmd_coding_apply(&db, 100).unwrap();
    assert_eq!(outcome.total_records as i64, before);
    assert_eq!(outcome.matched_records as i64, before);
    assert_eq!(db.count_uncoded().unwrap(), 0);

    assert!(commands::cmd_coding_stats(&db).is_ok());
    assert!(commands::cmd_coding_preview(&db, 5).is_ok());
}

#[test]
fn test_cmd_coding_apply_empty_cache() {
    let db = Database::in_memory().unwrap();
    let outcome = commands::cmd_coding_apply(&db, 100).unwrap();
    assert_eq!(outcome.total_records, 0);
}

#[test]
fn test_cmd_areas() {
    let dir = TempDir::new().unwrap();
    let db = setup_test_db(&dir);
    assert!(commands::cmd_areas(&db).is_ok());

    let empty = Database::in_memory().unwrap();
    assert!(commands::cmd_areas(&empty).is_ok());
}

// ========== Config Tests ==========

#[test]
fn test_load_config_explicit_path() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "analysis.toml", "[profile]\nfoodie_min_items = 4\n");

    let config = commands::load_config(Some(&path)).unwrap();
    assert_eq!(config.source.as_deref(), Some(path.as_path()));
    assert_eq!(config.profile.foodie_min_items, 4);
}

#[test]
fn test_load_config_missing_file() {
    let result = commands::load_config(Some(&PathBuf::from("/nonexistent/analysis.toml")));
    assert!(result.is_err());
}
