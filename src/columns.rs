//! Column resolution for spreadsheet sources.
//!
//! Field names come from the explicit `columns` list when one is configured,
//! otherwise from the cells of the `header_row`. A configured
//! `row_index_column` is appended as a synthetic field carrying each row's
//! own index.

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    data::field_name,
    error::IngestError,
    merge,
    migration::{MigrationDefinition, MigrationGroup},
    reader::TabularReader,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyDefinition {
    #[serde(rename = "type")]
    pub key_type: String,
}

impl KeyDefinition {
    pub fn integer() -> Self {
        KeyDefinition {
            key_type: "integer".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    pub file: Option<PathBuf>,
    pub worksheet: Option<String>,
    pub header_row: usize,
    pub columns: Vec<String>,
    pub keys: IndexMap<String, KeyDefinition>,
    pub row_index_column: Option<String>,
    pub delimiter: Option<char>,
    pub encoding: Option<String>,
}

impl SourceConfig {
    /// Effective source of a migration: its group's shared source overlaid
    /// with the migration's own source section.
    pub fn for_migration(
        migration: &MigrationDefinition,
        group: Option<&MigrationGroup>,
    ) -> Result<Self> {
        let shared = group
            .and_then(|group| group.shared_source())
            .cloned()
            .unwrap_or_else(|| serde_yaml::Value::Mapping(Default::default()));
        let merged = merge::merge_deep(shared, migration.source.clone());
        let config = serde_yaml::from_value(merged)?;
        Ok(config)
    }

    pub fn open_reader(&self) -> Result<TabularReader> {
        let file = self.file.clone().ok_or(IngestError::MissingFile)?;
        let delimiter = match self.delimiter {
            Some(c) if c.is_ascii() => Some(c as u8),
            Some(c) => return Err(anyhow!("Delimiter '{c}' must be ASCII")),
            None => None,
        };
        let encoding = crate::io_utils::resolve_encoding(self.encoding.as_deref())?;
        Ok(TabularReader::new(file, self.worksheet.clone())
            .with_delimiter(delimiter)
            .with_encoding(encoding))
    }

    /// Key fields identifying each record.
    pub fn ids(&self) -> Result<IndexMap<String, KeyDefinition>> {
        if !self.keys.is_empty() {
            return Ok(self.keys.clone());
        }
        match self.row_index_column.as_deref() {
            Some(name) if !name.is_empty() => {
                let mut ids = IndexMap::new();
                ids.insert(name.to_string(), KeyDefinition::integer());
                Ok(ids)
            }
            _ => Err(IngestError::MissingKeyConfiguration.into()),
        }
    }

    fn row_index_field(&self) -> Option<&str> {
        self.row_index_column.as_deref().filter(|name| !name.is_empty())
    }
}

/// Reads the configured header row. The reader is left positioned after it;
/// callers reset it before iterating records.
pub fn read_header(reader: &mut TabularReader, header_row: usize) -> Result<Vec<String>> {
    for row in reader.rows() {
        let row = row?;
        if row.index == header_row {
            return Ok(row.cells.iter().map(field_name).collect());
        }
    }
    Err(IngestError::HeaderRowNotFound(header_row).into())
}

/// Ordered field names for records produced under `config`.
pub fn resolve_fields(config: &SourceConfig, reader: &mut TabularReader) -> Result<Vec<String>> {
    let mut fields = if config.columns.is_empty() {
        let header = read_header(reader, config.header_row);
        reader.reset();
        header?
    } else {
        config.columns.clone()
    };
    if let Some(name) = config.row_index_field() {
        fields.push(name.to_string());
    }
    Ok(fields)
}

pub(crate) fn has_row_index(config: &SourceConfig) -> bool {
    config.row_index_field().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_empty_configuration() {
        let config: SourceConfig = serde_yaml::from_str("plugin: spreadsheet\n").unwrap();
        assert_eq!(config, SourceConfig::default());
        assert_eq!(config.header_row, 0);
    }

    #[test]
    fn explicit_keys_take_precedence() {
        let config: SourceConfig = serde_yaml::from_str(
            "keys:\n  pid:\n    type: string\nrow_index_column: row\n",
        )
        .unwrap();
        let ids = config.ids().unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids["pid"].key_type, "string");
    }

    #[test]
    fn row_index_column_becomes_integer_key() {
        let config = SourceConfig {
            row_index_column: Some("row".into()),
            ..SourceConfig::default()
        };
        let ids = config.ids().unwrap();
        assert_eq!(ids["row"], KeyDefinition::integer());
    }

    #[test]
    fn missing_keys_and_row_index_is_a_configuration_error() {
        let err = SourceConfig::default().ids().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IngestError>(),
            Some(IngestError::MissingKeyConfiguration)
        ));
    }

    #[test]
    fn explicit_columns_skip_header_discovery() {
        let config = SourceConfig {
            columns: vec!["a".into(), "b".into()],
            row_index_column: Some("idx".into()),
            ..SourceConfig::default()
        };
        // The reader is never opened, so the missing file is irrelevant.
        let mut reader = TabularReader::new("/does/not/exist.csv", None);
        let fields = resolve_fields(&config, &mut reader).unwrap();
        assert_eq!(fields, vec!["a", "b", "idx"]);
        assert!(!reader.is_open());
    }
}
