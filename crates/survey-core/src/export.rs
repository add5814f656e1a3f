//! JSON export of analysis reports

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::error::Result;

/// Where an exported report ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportTarget {
    /// No destination given; the JSON text itself
    Text(String),
    File(PathBuf),
}

/// Serialize a report as pretty-printed JSON (non-ASCII kept as is)
///
/// Writes to `path` when given, otherwise returns the text.
pub fn export_report_to_json<T: Serialize>(report: &T, path: Option<&Path>) -> Result<ExportTarget> {
    let json = serde_json::to_string_pretty(report)?;

    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, json)?;
            info!(path = %path.display(), "Report exported");
            Ok(ExportTarget::File(path.to_path_buf()))
        }
        None => Ok(ExportTarget::Text(json)),
    }
}
