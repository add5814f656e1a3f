//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `households` - Household roster, villages and the town/village mapping
//! - `ledger` - Income/expense ledger entries and the classification code table
//! - `summaries` - Monthly and category aggregates for one household
//! - `benchmarks` - Population statistics used by anomaly detection
//! - `patterns` - Recording-behaviour statistics used by quality scoring

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::{Error, Result};
use crate::models::TimeWindow;

mod benchmarks;
mod households;
mod ledger;
mod patterns;
mod summaries;

pub use ledger::CodingOutcome;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Passphrase protecting household survey data at rest
pub const DB_KEY_ENV: &str = "SURVEY_DB_KEY";

/// Connections shared by import, coding and report runs
const POOL_SIZE: u32 = 10;

/// Turn the survey passphrase into a hex SQLCipher key (Argon2)
///
/// The salt is fixed, so one passphrase opens every survey database file
/// it was used to create.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Changing this locks out every survey database already on disk
    const APP_SALT: &[u8; 16] = b"survey-salt-v1-x";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    let hash_str = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(hash_str.as_bytes()))
}

/// Build the `year/month` window predicate for ledger queries
///
/// Months are compared numerically so that "3" and "03" sort the same way.
/// Returns the SQL fragment (starting with ` AND`, or empty) and its params.
pub(crate) fn window_clause(
    alias: &str,
    window: &TimeWindow,
) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
    let mut clause = String::new();
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
    let key = format!(
        "(CAST({a}.year AS INTEGER) * 100 + CAST({a}.month AS INTEGER))",
        a = alias
    );

    if let Some(start) = window.start {
        clause.push_str(&format!(" AND {} >= ?", key));
        params.push(Box::new(start.key()));
    }
    if let Some(end) = window.end {
        clause.push_str(&format!(" AND {} <= ?", key));
        params.push(Box::new(end.key()));
    }

    (clause, params)
}

/// Borrow boxed params as the slice rusqlite expects
pub(crate) fn param_refs(params: &[Box<dyn rusqlite::ToSql>]) -> Vec<&dyn rusqlite::ToSql> {
    params.iter().map(|p| p.as_ref()).collect()
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Open the survey database, keyed from `SURVEY_DB_KEY`
    ///
    /// An unset key is an [`Error::Encryption`]. The CLI's `--no-encrypt`
    /// flag opens through [`Database::new_unencrypted`] instead.
    pub fn new(path: &str) -> Result<Self> {
        match std::env::var(DB_KEY_ENV).ok() {
            Some(key) => Self::new_with_key(path, Some(&key)),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases.",
                DB_KEY_ENV
            ))),
        }
    }

    /// Open a plaintext survey database (fixtures and local trials)
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Open (creating if needed) the survey database at `path`
    ///
    /// Every pooled connection is keyed when a passphrase is given. The
    /// household, ledger and code tables are migrated before returning.
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);

        let pool = if let Some(pass) = passphrase {
            let key = derive_key(pass)?;
            let key_pragma = format!("PRAGMA key = 'x\"{}\"';", key);

            let manager = manager.with_init(move |conn| {
                conn.execute_batch(&key_pragma)?;
                Ok(())
            });

            Pool::builder().max_size(POOL_SIZE).build(manager)?
        } else {
            Pool::builder().max_size(POOL_SIZE).build(manager)?
        };

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Survey database file backing this pool
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Unencrypted scratch survey database for tests and fixtures
    ///
    /// Uses a temporary file rather than `:memory:` because every pooled
    /// connection to `:memory:` would see its own empty database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "survey_test_{}_{}.db",
            std::process::id(),
            id
        ));

        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path.to_string_lossy())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Remove all ledger entries but keep roster, villages and codes
    pub fn clear_ledger(&self) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM ledger_entries", [])?;
        info!(deleted, "Ledger entries cleared");
        Ok(deleted)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: readers don't block writers
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Town/village mapping (village_code = first 12 chars of a household code)
            CREATE TABLE IF NOT EXISTS villages (
                village_code TEXT PRIMARY KEY,
                village_name TEXT NOT NULL,
                town_name TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_villages_town ON villages(town_name);
            CREATE INDEX IF NOT EXISTS idx_villages_name ON villages(village_name);

            -- Household roster
            CREATE TABLE IF NOT EXISTS households (
                household_code TEXT PRIMARY KEY,
                head_name TEXT NOT NULL,
                household_size INTEGER NOT NULL DEFAULT 1,
                town_name TEXT,
                village_name TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Classification code table
            CREATE TABLE IF NOT EXISTS item_codes (
                code TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                entry_type INTEGER,                     -- 1 income, 2 expense
                unit_name TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_item_codes_name ON item_codes(name);

            -- Income/expense ledger
            CREATE TABLE IF NOT EXISTS ledger_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                household_code TEXT NOT NULL,
                year TEXT NOT NULL,
                month TEXT NOT NULL,                    -- zero-padded, "01".."12"
                date TEXT,                              -- YYYY-MM-DD
                entry_type INTEGER NOT NULL DEFAULT 0,  -- 0 uncoded, 1 income, 2 expense
                code TEXT,                              -- NULL when uncoded
                item_name TEXT,
                quantity REAL NOT NULL DEFAULT 1,
                amount REAL NOT NULL DEFAULT 0,
                note TEXT,
                unit_name TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_ledger_household ON ledger_entries(household_code);
            CREATE INDEX IF NOT EXISTS idx_ledger_period ON ledger_entries(household_code, year, month);
            CREATE INDEX IF NOT EXISTS idx_ledger_code ON ledger_entries(code);
            CREATE INDEX IF NOT EXISTS idx_ledger_item ON ledger_entries(item_name);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}
