//! External loader boundary: resolves the configured source into a raw
//! table, substituting an embedded demo dataset when loading fails so the
//! dashboard core always receives *some* table.

use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::{info, warn};

use crate::io_utils;

/// Environment variable consulted when no `--input` flag is given.
pub const CSV_PATH_ENV: &str = "CSV_PATH";
const DEFAULT_SOURCE: &str = "data/ativo.csv";

/// An untyped table exactly as the source provided it. Column names are
/// caller-supplied and carry no guaranteed vocabulary or casing.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

pub fn resolve_source(path: Option<&Path>) -> PathBuf {
    match path {
        Some(p) => p.to_path_buf(),
        None => env::var(CSV_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SOURCE)),
    }
}

/// Loads the raw table from the resolved source path. Load failures are not
/// surfaced: the embedded demo table is returned instead, with a warning.
pub fn load_table(path: Option<&Path>, delimiter: Option<u8>, encoding: &'static Encoding) -> RawTable {
    let source = resolve_source(path);
    let delimiter = io_utils::resolve_input_delimiter(&source, delimiter);
    match read_table(&source, delimiter, encoding) {
        Ok(table) => {
            info!(
                "Loaded {} row(s) from '{}'",
                table.row_count(),
                source.display()
            );
            table
        }
        Err(err) => {
            warn!(
                "Could not load '{}' ({err:#}); using demo dataset",
                source.display()
            );
            demo_table()
        }
    }
}

fn read_table(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<RawTable> {
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
    let headers = io_utils::reader_headers(&mut reader, encoding)?;
    let mut rows = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
        rows.push(io_utils::decode_record(&record, encoding)?);
    }
    Ok(RawTable { headers, rows })
}

/// Five-row sample portfolio spanning a single date, so a misconfigured
/// deployment still renders a populated dashboard.
pub fn demo_table() -> RawTable {
    const HEADERS: &[&str] = &["DATA", "CART", "ATIVO", "QNT", "PRECO", "VM", "PL", "BP"];
    const ROWS: &[&[&str]] = &[
        &["31/07/2025", "INTRAGS3120", "LFT_01/06/2030", "42", "16958.28", "712247.8", "402.46", "0"],
        &["31/07/2025", "INTRAGS3120", "ZERAGEM", "", "", "200289.59", "103.95", "0"],
        &["31/07/2025", "INTRAGS3120", "FACT SEED II FIC FIM", "195727519.93", "1.404275", "274855263.05", "-281593.18", "-5.4"],
        &["31/07/2025", "INTRAGS3120", "ITAU SOBERANO", "1387.98", "20.625698", "28628.14", "15.58", "0"],
        &["31/07/2025", "INTRAGS3120", "CAPITAL FIDC NP", "0.45188", "320818.7425", "144971.57", "-12.15", "0"],
    ];
    RawTable {
        headers: HEADERS.iter().map(|h| h.to_string()).collect(),
        rows: ROWS
            .iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect(),
    }
}
