//! I/O helpers shared by the tabular reader and the definition store.
//!
//! - **Format sniffing**: workbooks are recognised by their leading magic
//!   bytes (ZIP container or OLE compound file), with the file extension as a
//!   fallback when the content cannot be inspected.
//! - **Delimiter resolution**: `.tsv` → tab, everything else comma, unless
//!   overridden.
//! - **Encoding**: delimited text is decoded through `encoding_rs`, defaulting
//!   to UTF-8.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

use crate::error::IngestError;

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "xla", "xlam", "ods"];

/// Delimited text is split on ASCII bytes before decoding, so only
/// ASCII-compatible encodings are accepted.
pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    let Some(value) = label else {
        return Ok(UTF_8);
    };
    let encoding = Encoding::for_label(value.trim().as_bytes())
        .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))?;
    if !encoding.is_ascii_compatible() {
        return Err(IngestError::UnsupportedEncoding(encoding.name()).into());
    }
    Ok(encoding)
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match extension(path) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

pub fn has_workbook_extension(path: &Path) -> bool {
    extension(path).is_some_and(|ext| {
        WORKBOOK_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known))
    })
}

pub fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| {
        IngestError::UnreadableResource {
            path: path.to_path_buf(),
            source,
        }
        .into()
    })
}

/// Reports whether the resource holds a binary workbook rather than
/// delimited text.
pub fn looks_like_workbook(path: &Path) -> Result<bool> {
    let mut file = open_file(path)?;
    let mut magic = [0u8; 8];
    let mut filled = 0usize;
    while filled < magic.len() {
        let read = file
            .read(&mut magic[filled..])
            .map_err(|source| IngestError::UnreadableResource {
                path: path.to_path_buf(),
                source,
            })?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    let head = &magic[..filled];
    if head.starts_with(ZIP_MAGIC) || head.starts_with(OLE_MAGIC) {
        return Ok(true);
    }
    Ok(filled == 0 && has_workbook_extension(path))
}

pub fn open_csv_reader(path: &Path, delimiter: u8) -> Result<csv::Reader<BufReader<File>>> {
    let reader = BufReader::new(open_file(path)?);
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    Ok(builder.from_reader(reader))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        None
    } else {
        Some(text.into_owned())
    }
}

pub fn decode_record(
    record: &csv::ByteRecord,
    encoding: &'static Encoding,
    row: usize,
) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| {
            decode_bytes(field, encoding).ok_or_else(|| {
                IngestError::Decode {
                    row,
                    encoding: encoding.name(),
                }
                .into()
            })
        })
        .collect()
}
