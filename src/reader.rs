//! Forward-only row access over a spreadsheet resource.
//!
//! [`TabularReader`] opens its resource lazily on the first row request and
//! keeps a single cursor. Delimited text yields its only sheet no matter which
//! worksheet name is configured; workbooks are scanned for the named sheet.
//! [`TabularReader::reset`] closes the resource so the next request reopens
//! it from the first row.

use std::{
    fs::File,
    io::{BufReader, Cursor, Read, Seek},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use calamine::{Data, Range, Reader, Sheets, open_workbook_auto, open_workbook_auto_from_rs};
use csv::ByteRecord;
use encoding_rs::Encoding;
use log::debug;

use crate::{data::CellValue, error::IngestError, io_utils};

/// Storage layout of a tabular resource, detected from its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Delimited { delimiter: u8 },
    Workbook,
}

impl SheetFormat {
    pub fn detect(path: &Path, delimiter: Option<u8>) -> Result<Self> {
        if io_utils::looks_like_workbook(path)? {
            Ok(SheetFormat::Workbook)
        } else {
            Ok(SheetFormat::Delimited {
                delimiter: io_utils::resolve_input_delimiter(path, delimiter),
            })
        }
    }
}

/// A physical worksheet row and its zero-based position.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub index: usize,
    pub cells: Vec<CellValue>,
}

enum OpenSheet {
    Delimited {
        reader: csv::Reader<BufReader<File>>,
        record: ByteRecord,
        next_index: usize,
    },
    Workbook {
        range: Range<Data>,
        next_index: u32,
    },
}

pub struct TabularReader {
    path: PathBuf,
    worksheet: Option<String>,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
    sheet: Option<OpenSheet>,
}

impl TabularReader {
    pub fn new(path: impl Into<PathBuf>, worksheet: Option<String>) -> Self {
        Self {
            path: path.into(),
            worksheet,
            delimiter: None,
            encoding: encoding_rs::UTF_8,
            sheet: None,
        }
    }

    pub fn with_delimiter(mut self, delimiter: Option<u8>) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn is_open(&self) -> bool {
        self.sheet.is_some()
    }

    /// Pulls the next row, opening the resource on first use.
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        if self.sheet.is_none() {
            self.sheet = Some(self.open()?);
        }
        let encoding = self.encoding;
        let path = &self.path;
        match self.sheet.as_mut() {
            Some(OpenSheet::Delimited {
                reader,
                record,
                next_index,
            }) => {
                let index = *next_index;
                let more = reader
                    .read_byte_record(record)
                    .with_context(|| format!("Reading row {index} of {path:?}"))?;
                if !more {
                    return Ok(None);
                }
                *next_index += 1;
                let mut decoded = io_utils::decode_record(record, encoding, index)?;
                if index == 0 {
                    if let Some(first) = decoded.first_mut() {
                        if let Some(stripped) = first.strip_prefix('\u{feff}') {
                            *first = stripped.to_string();
                        }
                    }
                }
                let cells = decoded.into_iter().map(CellValue::String).collect();
                Ok(Some(Row { index, cells }))
            }
            Some(OpenSheet::Workbook { range, next_index }) => {
                let Some((last_row, last_col)) = range.end() else {
                    return Ok(None);
                };
                if *next_index > last_row {
                    return Ok(None);
                }
                let row = *next_index;
                *next_index += 1;
                let cells = (0..=last_col)
                    .map(|col| {
                        range
                            .get_value((row, col))
                            .map(CellValue::from)
                            .unwrap_or_default()
                    })
                    .collect();
                Ok(Some(Row {
                    index: row as usize,
                    cells,
                }))
            }
            None => Ok(None),
        }
    }

    pub fn rows(&mut self) -> Rows<'_> {
        Rows { reader: self }
    }

    /// Discards any open iteration; the next row request reopens the resource.
    pub fn reset(&mut self) {
        debug!("Resetting reader for {:?}", self.path);
        self.close();
    }

    pub fn close(&mut self) {
        if self.sheet.take().is_some() {
            debug!("Closed spreadsheet {:?}", self.path);
        }
    }

    fn open(&self) -> Result<OpenSheet> {
        let format = SheetFormat::detect(&self.path, self.delimiter)?;
        debug!("Opening {:?} as {:?}", self.path, format);
        match format {
            SheetFormat::Delimited { delimiter } => Ok(OpenSheet::Delimited {
                reader: io_utils::open_csv_reader(&self.path, delimiter)?,
                record: ByteRecord::new(),
                next_index: 0,
            }),
            SheetFormat::Workbook => Ok(OpenSheet::Workbook {
                range: self.open_worksheet()?,
                next_index: 0,
            }),
        }
    }

    fn open_worksheet(&self) -> Result<Range<Data>> {
        let name = self.worksheet.clone().unwrap_or_default();
        if io_utils::has_workbook_extension(&self.path) {
            let mut workbook = open_workbook_auto(&self.path)
                .with_context(|| format!("Opening workbook {:?}", self.path))?;
            return worksheet_range(&mut workbook, name, &self.path);
        }

        let mut bytes = Vec::new();
        io_utils::open_file(&self.path)?
            .read_to_end(&mut bytes)
            .with_context(|| format!("Reading workbook {:?}", self.path))?;
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
            .with_context(|| format!("Opening workbook {:?}", self.path))?;
        worksheet_range(&mut workbook, name, &self.path)
    }
}

fn worksheet_range<RS: Read + Seek>(
    workbook: &mut Sheets<RS>,
    name: String,
    path: &Path,
) -> Result<Range<Data>> {
    if !workbook.sheet_names().iter().any(|sheet| *sheet == name) {
        return Err(IngestError::WorksheetNotFound(name).into());
    }
    workbook
        .worksheet_range(&name)
        .with_context(|| format!("Reading worksheet '{name}' of {path:?}"))
}

impl Drop for TabularReader {
    fn drop(&mut self) {
        self.close();
    }
}

/// Borrowing iterator over the remaining rows of a reader.
pub struct Rows<'a> {
    reader: &'a mut TabularReader,
}

impl Iterator for Rows<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_row().transpose()
    }
}
