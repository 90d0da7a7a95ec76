use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Filter and summarize loosely-structured portfolio CSV exports", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Report which columns carry each semantic role, the selectable
    /// categories, and the date span
    Probe(ProbeArgs),
    /// Print summary scalars and the per-day value series for a filter
    Summary(SummaryArgs),
    /// Print the filtered, date-sorted rows
    View(ViewArgs),
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Input CSV file ('-' for stdin); falls back to $CSV_PATH, then data/ativo.csv
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct FilterArgs {
    /// Keep only rows whose sector/category equals this value exactly
    #[arg(short = 's', long = "sector")]
    pub sector: Option<String>,
    /// Lower date bound, inclusive (accepts '31/07/2025' or '2025-07-31')
    #[arg(long)]
    pub from: Option<String>,
    /// Upper date bound, inclusive; swapped with --from when inverted
    #[arg(long)]
    pub to: Option<String>,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Emit machine-readable JSON instead of tables
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Emit machine-readable JSON instead of tables
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ViewArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Limit number of rows printed
    #[arg(long)]
    pub limit: Option<usize>,
    /// Emit machine-readable JSON instead of tables
    #[arg(long)]
    pub json: bool,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
