//! Spreadsheet rows presented as keyed records.

use anyhow::Result;
use indexmap::IndexMap;
use log::debug;

use crate::{
    columns::{self, KeyDefinition, SourceConfig},
    data::{CellValue, Record},
    reader::TabularReader,
};

/// A configured spreadsheet source. Field names are resolved once per source
/// and reused by every record iteration.
pub struct SpreadsheetSource {
    config: SourceConfig,
    reader: TabularReader,
    fields: Option<Vec<String>>,
}

impl SpreadsheetSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let reader = config.open_reader()?;
        Ok(Self {
            config,
            reader,
            fields: None,
        })
    }

    pub fn fields(&mut self) -> Result<&[String]> {
        if self.fields.is_none() {
            let fields = columns::resolve_fields(&self.config, &mut self.reader)?;
            debug!("Resolved fields {:?}", fields);
            self.fields = Some(fields);
        }
        Ok(self.fields.as_deref().unwrap_or_default())
    }

    pub fn ids(&self) -> Result<IndexMap<String, KeyDefinition>> {
        self.config.ids()
    }

    /// Records for the rows after the header row, continuing from the
    /// reader's current position.
    pub fn records(&mut self) -> Result<Records<'_>> {
        self.fields()?;
        let row_index = columns::has_row_index(&self.config);
        let Self {
            config,
            reader,
            fields,
        } = self;
        Ok(Records {
            reader,
            fields: fields.as_deref().unwrap_or_default(),
            header_row: config.header_row,
            row_index,
        })
    }

    /// Restarts record iteration from the first row of the resource.
    pub fn rewind(&mut self) {
        self.reader.reset();
    }

    pub fn close(&mut self) {
        self.reader.close();
    }
}

pub struct Records<'a> {
    reader: &'a mut TabularReader,
    fields: &'a [String],
    header_row: usize,
    row_index: bool,
}

impl Iterator for Records<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let row = match self.reader.next_row() {
                Ok(Some(row)) => row,
                Ok(None) => return None,
                Err(err) => return Some(Err(err)),
            };
            if row.index <= self.header_row {
                continue;
            }
            let mut cells = row.cells;
            if self.row_index {
                let data_width = self.fields.len().saturating_sub(1);
                cells.resize(data_width, CellValue::Empty);
                cells.push(CellValue::Integer(row.index as i64));
            }
            return Some(Ok(zip_record(self.fields, cells)));
        }
    }
}

/// Pairs fields with cells by position. Missing cells are empty and surplus
/// cells are dropped.
pub fn zip_record(fields: &[String], cells: Vec<CellValue>) -> Record {
    let mut cells = cells.into_iter();
    let mut record = Record::with_capacity(fields.len());
    for field in fields {
        let value = cells.next().unwrap_or_default();
        record.insert(field.clone(), value);
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip_pads_short_rows_and_truncates_long_ones() {
        let fields = vec!["a".to_string(), "b".to_string()];
        let short = zip_record(&fields, vec![CellValue::from("1")]);
        assert_eq!(short["b"], CellValue::Empty);

        let long = zip_record(
            &fields,
            vec![CellValue::from("1"), CellValue::from("2"), CellValue::from("3")],
        );
        assert_eq!(long.len(), 2);
        assert_eq!(long["b"], CellValue::from("2"));
    }

    #[test]
    fn duplicate_fields_keep_first_position_and_last_value() {
        let fields = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        let record = zip_record(
            &fields,
            vec![CellValue::from("1"), CellValue::from("2"), CellValue::from("3")],
        );
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(record["a"], CellValue::from("3"));
    }
}
