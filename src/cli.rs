use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Derive spreadsheet ingest migrations and read worksheet rows",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the records a spreadsheet source yields
    Preview(PreviewArgs),
    /// List the resolved field names and key fields of a spreadsheet source
    Fields(PreviewArgs),
    /// List the worksheet columns referenced by a request's pipelines
    UsedColumns(RequestArgs),
    /// Create the request's migration group and derive its migrations
    Derive(StoreRequestArgs),
    /// Delete the request's derived migrations and its migration group
    Teardown(StoreRequestArgs),
    /// List the templates requests can derive from
    Templates(StoreArgs),
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Spreadsheet file to read (CSV, TSV or workbook)
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,
    /// Worksheet name (ignored for delimited text)
    #[arg(short = 'w', long = "worksheet")]
    pub worksheet: Option<String>,
    /// YAML source configuration to start from
    #[arg(long = "source")]
    pub source: Option<PathBuf>,
    /// Read the source configuration of this stored migration instead
    #[arg(long = "migration", requires = "config_dir")]
    pub migration: Option<String>,
    /// Directory holding migration and group definitions
    #[arg(long = "config-dir")]
    pub config_dir: Option<PathBuf>,
    /// Zero-based index of the header row
    #[arg(long = "header-row")]
    pub header_row: Option<usize>,
    /// Explicit field names, skipping header discovery
    #[arg(short = 'C', long = "columns", value_delimiter = ',')]
    pub columns: Vec<String>,
    /// Name of a synthetic field carrying each row's index
    #[arg(long = "row-index-column")]
    pub row_index_column: Option<String>,
    /// Delimiter for text input (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of text input (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Stop after this many records
    #[arg(long)]
    pub limit: Option<usize>,
    /// Output format for records
    #[arg(long, default_value = "yaml")]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

#[derive(Debug, Args)]
pub struct RequestArgs {
    /// Request YAML document
    #[arg(short = 'r', long = "request")]
    pub request: PathBuf,
}

#[derive(Debug, Args)]
pub struct StoreArgs {
    /// Directory holding migration and group definitions
    #[arg(short = 'd', long = "config-dir")]
    pub config_dir: PathBuf,
}

#[derive(Debug, Args)]
pub struct StoreRequestArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    #[command(flatten)]
    pub request: RequestArgs,
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
