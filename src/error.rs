//! Fatal conditions raised by the reader, the column resolver and the
//! migration deriver.
//!
//! Functions in this crate return [`anyhow::Result`]; the variants below are
//! wrapped into it so callers can recover the exact condition with
//! `err.downcast_ref::<IngestError>()`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to find worksheet of the name '{0}'")]
    WorksheetNotFound(String),

    #[error("Failed to find header row {0}")]
    HeaderRowNotFound(usize),

    #[error(
        "Row index should act as key but no name has been provided. \
         Set 'row_index_column' in source config to provide a name for this column"
    )]
    MissingKeyConfiguration,

    #[error("No spreadsheet file configured for source")]
    MissingFile,

    #[error("Unknown migration '{0}'")]
    UnknownMigration(String),

    #[error("Migration group '{0}' does not exist")]
    MissingGroup(String),

    #[error("Invalid document id '{0}': ids may not be empty or contain path separators")]
    InvalidDocumentId(String),

    #[error("Unable to read spreadsheet {path:?}")]
    UnreadableResource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Encoding {0} is not ASCII-compatible and cannot be used for delimited text")]
    UnsupportedEncoding(&'static str),

    #[error("Failed to decode row {row} with encoding {encoding}")]
    Decode { row: usize, encoding: &'static str },
}
