//! Error types for survey analysis

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Missing or unusable SURVEY_DB_KEY
    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A keyword rule failed to compile
    #[error("Keyword rule error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Analysis config error: {0}")]
    Config(String),

    /// A CSV row failed validation; the message names the line
    #[error("Import failed: {0}")]
    Import(String),

    /// Malformed request values such as a bad time window
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Unknown household or empty area. Report envelopes carry the bare message.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Population statistics requested over zero scored households
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
}

pub type Result<T> = std::result::Result<T, Error>;
