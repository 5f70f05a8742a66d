//! Tabular data as it moves between the warehouse and the stages.
//!
//! A [`Table`] is a schema (ordered [`Field`]s) plus rows of [`Value`]s. Every
//! stage reads one table fully into memory, adds a column, and writes it back.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WarehouseError;

/// Fully qualified `dataset.table` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableId {
    pub dataset: String,
    pub table: String,
}

impl TableId {
    pub fn new(dataset: &str, table: &str) -> Result<Self, WarehouseError> {
        format!("{dataset}.{table}").parse()
    }

    /// Split a built-in `dataset.table` constant without validation.
    pub(crate) fn from_static(id: &'static str) -> Self {
        let (dataset, table) = id.split_once('.').unwrap_or(("", id));
        Self {
            dataset: dataset.to_string(),
            table: table.to_string(),
        }
    }
}

fn is_identifier(part: &str) -> bool {
    !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl FromStr for TableId {
    type Err = WarehouseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((dataset, table)) if is_identifier(dataset) && is_identifier(table) => Ok(Self {
                dataset: dataset.to_string(),
                table: table.to_string(),
            }),
            _ => Err(WarehouseError::InvalidTableId(s.to_string())),
        }
    }
}

impl TryFrom<String> for TableId {
    type Error = WarehouseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TableId> for String {
    fn from(id: TableId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.dataset, self.table)
    }
}

/// Column type, named the way the warehouse names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldKind {
    String,
    Int64,
    Float64,
    Bool,
}

impl FieldKind {
    /// Prefix used for positional column names when a CSV has no header row.
    pub fn positional_prefix(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Int64 => "int64",
            FieldKind::Float64 => "double",
            FieldKind::Bool => "bool",
        }
    }

    pub fn positional_name(self, index: usize) -> String {
        format!("{}_field_{}", self.positional_prefix(), index)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::String => "STRING",
            FieldKind::Int64 => "INT64",
            FieldKind::Float64 => "FLOAT64",
            FieldKind::Bool => "BOOL",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Text rendering used when a non-string cell is treated as text.
    /// `NULL` renders as the empty string.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(x) => x.to_string(),
            Value::String(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            other => f.write_str(&other.to_text()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

pub type Row = Vec<Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub schema: Vec<Field>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(schema: Vec<Field>) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(schema: Vec<Field>, rows: Vec<Row>) -> Self {
        Self { schema, rows }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.schema.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.schema.iter().position(|f| f.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Borrow every cell of one column, in row order.
    pub fn column_values(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(idx).unwrap_or(&Value::Null))
                .collect(),
        )
    }

    /// Rename columns in place. Pairs whose source column is absent are ignored.
    /// Returns how many columns were renamed.
    pub fn rename_columns<'a, I>(&mut self, mapping: I) -> usize
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut renamed = 0;
        for (from, to) in mapping {
            if let Some(field) = self.schema.iter_mut().find(|f| f.name == from) {
                field.name = to.to_string();
                renamed += 1;
            }
        }
        renamed
    }

    /// Append a column. Replaces an existing column of the same name.
    pub fn push_column(&mut self, field: Field, values: Vec<Value>) -> Result<(), WarehouseError> {
        if values.len() != self.rows.len() {
            return Err(WarehouseError::ColumnLength {
                column: field.name,
                expected: self.rows.len(),
                found: values.len(),
            });
        }

        if let Some(idx) = self.column_index(&field.name) {
            self.schema[idx] = field;
            for (row, value) in self.rows.iter_mut().zip(values) {
                row[idx] = value;
            }
        } else {
            self.schema.push(field);
            for (row, value) in self.rows.iter_mut().zip(values) {
                row.push(value);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::with_rows(
            vec![Field::string("string_field_0"), Field::string("string_field_1")],
            vec![
                vec!["Stocks up".into(), "positive".into()],
                vec!["Stocks down".into(), "negative".into()],
            ],
        )
    }

    #[test]
    fn test_table_id_parsing() {
        let id: TableId = "sentiment_demo.raw_news".parse().unwrap();
        assert_eq!(id.dataset, "sentiment_demo");
        assert_eq!(id.table, "raw_news");
        assert_eq!(id.to_string(), "sentiment_demo.raw_news");

        assert!("raw_news".parse::<TableId>().is_err());
        assert!("a.b.c".parse::<TableId>().is_err());
        assert!(".raw".parse::<TableId>().is_err());
        assert!("bad-name.raw".parse::<TableId>().is_err());

        assert_eq!(TableId::from_static("sentiment_demo.raw_news"), id);
    }

    #[test]
    fn test_rename_ignores_absent_columns() {
        let mut table = sample();
        let renamed = table.rename_columns([
            ("string_field_0", "title"),
            ("string_field_1", "sentiment"),
            ("string_field_9", "unused"),
        ]);
        assert_eq!(renamed, 2);
        assert_eq!(table.column_names(), vec!["title", "sentiment"]);
    }

    #[test]
    fn test_push_column_checks_length() {
        let mut table = sample();
        assert!(table
            .push_column(Field::string("extra"), vec![Value::Null])
            .is_err());

        table
            .push_column(Field::string("extra"), vec!["a".into(), "b".into()])
            .unwrap();
        assert_eq!(table.schema.len(), 3);
        assert_eq!(table.rows[1][2], Value::from("b"));
    }

    #[test]
    fn test_push_column_replaces_existing() {
        let mut table = sample();
        table
            .push_column(Field::string("string_field_1"), vec![Value::Null, Value::Null])
            .unwrap();
        assert_eq!(table.schema.len(), 2);
        assert!(table.rows[0][1].is_null());
    }

    #[test]
    fn test_value_text_rendering() {
        assert_eq!(Value::Null.to_text(), "");
        assert_eq!(Value::Int(5).to_text(), "5");
        assert_eq!(Value::Bool(true).to_text(), "true");
        assert_eq!(Value::Null.to_string(), "NULL");
    }
}
