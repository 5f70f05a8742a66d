//! CSV bulk-load parsing with column type autodetection.
//!
//! Mirrors the warehouse load job: headerless files get positional column names
//! (`string_field_0`, `int64_field_1`, ...) and every empty cell is `NULL`.

use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};

use super::traits::WriteDisposition;
use crate::domain::{Field, FieldKind, Table, Value};
use crate::error::WarehouseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SourceEncoding {
    #[default]
    #[serde(rename = "UTF-8", alias = "utf-8", alias = "utf8")]
    Utf8,
    #[serde(rename = "ISO-8859-1", alias = "iso-8859-1", alias = "latin1")]
    Iso88591,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvLoadOptions {
    pub skip_leading_rows: usize,
    pub autodetect: bool,
    pub field_delimiter: char,
    pub encoding: SourceEncoding,
    pub allow_jagged_rows: bool,
    pub write_disposition: WriteDisposition,
}

impl Default for CsvLoadOptions {
    fn default() -> Self {
        Self {
            skip_leading_rows: 0,
            autodetect: true,
            field_delimiter: ',',
            encoding: SourceEncoding::Utf8,
            allow_jagged_rows: false,
            write_disposition: WriteDisposition::WriteTruncate,
        }
    }
}

fn decode(bytes: &[u8], encoding: SourceEncoding) -> Result<String, WarehouseError> {
    match encoding {
        SourceEncoding::Utf8 => std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| WarehouseError::Encoding(e.valid_up_to())),
        // Every Latin-1 byte maps to the code point of the same value.
        SourceEncoding::Iso88591 => Ok(bytes.iter().map(|&b| b as char).collect()),
    }
}

/// Parse CSV bytes into a [`Table`] according to `options`.
pub fn parse_csv(bytes: &[u8], options: &CsvLoadOptions) -> Result<Table, WarehouseError> {
    if !options.field_delimiter.is_ascii() {
        return Err(WarehouseError::InvalidDelimiter(options.field_delimiter));
    }
    let delimiter = options.field_delimiter as u8;
    let text = decode(bytes, options.encoding)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut header: Option<Vec<String>> = None;
    let mut records: Vec<Vec<String>> = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let cells: Vec<String> = record.iter().map(str::to_string).collect();
        if i < options.skip_leading_rows {
            header = Some(cells);
        } else {
            records.push(cells);
        }
    }
    let header = header.filter(|_| options.autodetect);

    let width = header
        .as_ref()
        .map(Vec::len)
        .or_else(|| records.first().map(Vec::len))
        .unwrap_or(0);

    let mut cells: Vec<Vec<Option<String>>> = Vec::with_capacity(records.len());
    for (i, record) in records.into_iter().enumerate() {
        let found = record.len();
        if found != width && !(options.allow_jagged_rows && found < width) {
            return Err(WarehouseError::JaggedRow {
                row: i + options.skip_leading_rows + 1,
                expected: width,
                found,
            });
        }
        let mut row: Vec<Option<String>> = record
            .into_iter()
            .map(|cell| if cell.is_empty() { None } else { Some(cell) })
            .collect();
        row.resize(width, None);
        cells.push(row);
    }

    let kinds: Vec<FieldKind> = (0..width)
        .map(|col| {
            if options.autodetect {
                infer_kind(cells.iter().filter_map(|row| row[col].as_deref()))
            } else {
                FieldKind::String
            }
        })
        .collect();

    let schema = column_names(header.as_deref(), &kinds)
        .into_iter()
        .zip(&kinds)
        .map(|(name, &kind)| Field::new(name, kind))
        .collect();

    let rows = cells
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&kinds)
                .map(|(cell, &kind)| convert(cell, kind))
                .collect()
        })
        .collect();

    Ok(Table::with_rows(schema, rows))
}

fn is_int(s: &str) -> bool {
    s.trim().parse::<i64>().is_ok()
}

fn is_float(s: &str) -> bool {
    let t = s.trim();
    t.chars().any(|c| c.is_ascii_digit()) && t.parse::<f64>().is_ok()
}

fn is_bool(s: &str) -> bool {
    let t = s.trim();
    t.eq_ignore_ascii_case("true") || t.eq_ignore_ascii_case("false")
}

/// Narrowest kind that accepts every non-empty cell. All-empty columns are STRING.
fn infer_kind<'a>(values: impl Iterator<Item = &'a str> + Clone) -> FieldKind {
    let mut any = values.clone().peekable();
    if any.peek().is_none() {
        return FieldKind::String;
    }
    if values.clone().all(is_int) {
        FieldKind::Int64
    } else if values.clone().all(is_float) {
        FieldKind::Float64
    } else if values.clone().all(is_bool) {
        FieldKind::Bool
    } else {
        FieldKind::String
    }
}

fn convert(cell: Option<String>, kind: FieldKind) -> Value {
    let Some(cell) = cell else {
        return Value::Null;
    };
    let parsed = match kind {
        FieldKind::Int64 => cell.trim().parse().ok().map(Value::Int),
        FieldKind::Float64 => cell.trim().parse().ok().map(Value::Float),
        FieldKind::Bool => Some(Value::Bool(cell.trim().eq_ignore_ascii_case("true"))),
        FieldKind::String => None,
    };
    parsed.unwrap_or(Value::String(cell))
}

fn sanitize(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn column_names(header: Option<&[String]>, kinds: &[FieldKind]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(kinds.len());
    for (i, kind) in kinds.iter().enumerate() {
        let candidate = header
            .and_then(|h| h.get(i))
            .map(|h| sanitize(h))
            .filter(|n| !n.is_empty() && !names.contains(n));
        names.push(candidate.unwrap_or_else(|| kind.positional_name(i)));
    }
    names
}
