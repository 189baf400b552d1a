use std::fmt;

use calamine::Data;
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One data row keyed by resolved field name, in field order.
pub type Record = IndexMap<String, CellValue>;

/// Scalar value of a single worksheet cell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    DateTime(NaiveDateTime),
    String(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Boolean(b) => b.to_string(),
            CellValue::Integer(i) => i.to_string(),
            CellValue::Float(f) => f.to_string(),
            CellValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            CellValue::String(s) => s.clone(),
        }
    }

    /// Numbers whose fractional part is zero are reported as integers.
    pub fn from_number(value: f64) -> Self {
        if value.fract() == 0.0 && value >= i64::MIN as f64 && value <= i64::MAX as f64 {
            CellValue::Integer(value as i64)
        } else {
            CellValue::Float(value)
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::String(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value)
    }
}

impl From<&Data> for CellValue {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::Empty => CellValue::Empty,
            Data::String(s) => CellValue::String(s.clone()),
            Data::Int(i) => CellValue::Integer(*i),
            Data::Float(f) => CellValue::from_number(*f),
            Data::Bool(b) => CellValue::Boolean(*b),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(parsed) => CellValue::DateTime(parsed),
                None => CellValue::from_number(dt.as_f64()),
            },
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::String(s.clone()),
            Data::Error(err) => CellValue::String(err.to_string()),
        }
    }
}

/// Header cells are used verbatim as field names.
pub fn field_name(cell: &CellValue) -> String {
    cell.as_display()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_numbers_become_integers() {
        assert_eq!(CellValue::from_number(2020.0), CellValue::Integer(2020));
        assert_eq!(CellValue::from_number(1.5), CellValue::Float(1.5));
    }

    #[test]
    fn workbook_cells_convert_to_values() {
        assert_eq!(
            CellValue::from(&Data::String("A".into())),
            CellValue::String("A".into())
        );
        assert_eq!(CellValue::from(&Data::Float(3.0)), CellValue::Integer(3));
        assert_eq!(CellValue::from(&Data::Bool(true)), CellValue::Boolean(true));
        assert_eq!(CellValue::from(&Data::Empty), CellValue::Empty);
    }

    #[test]
    fn values_serialize_untagged() {
        let json = serde_json::to_string(&vec![
            CellValue::from("x"),
            CellValue::Integer(4),
            CellValue::Empty,
        ])
        .unwrap();
        assert_eq!(json, r#"["x",4,null]"#);
    }
}
