use serde::{Deserialize, Serialize};
use tracing::info;

use crate::common::constants::{SENTIMENT_COLUMN, TITLE_COLUMN};
use crate::domain::Table;

/// Declared column renames applied when a table arrives without its expected
/// columns, e.g. after a headerless CSV load auto-named them positionally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMapping {
    /// Column whose presence means the table is already normalized.
    pub expected_column: String,
    /// `(source, target)` pairs.
    pub renames: Vec<(String, String)>,
}

impl Default for SchemaMapping {
    fn default() -> Self {
        Self {
            expected_column: TITLE_COLUMN.to_string(),
            renames: vec![
                ("string_field_0".to_string(), TITLE_COLUMN.to_string()),
                ("string_field_1".to_string(), SENTIMENT_COLUMN.to_string()),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalization {
    AlreadyNormalized,
    Renamed(usize),
}

impl SchemaMapping {
    /// Rename columns per the mapping unless `expected_column` is present.
    pub fn apply(&self, table: &mut Table) -> Normalization {
        if table.has_column(&self.expected_column) {
            return Normalization::AlreadyNormalized;
        }
        let renamed = table.rename_columns(
            self.renames
                .iter()
                .map(|(from, to)| (from.as_str(), to.as_str())),
        );
        info!(renamed, "Applied positional column mapping");
        Normalization::Renamed(renamed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Field;

    #[test]
    fn test_positional_columns_are_renamed() {
        let mut table = Table::new(vec![
            Field::string("string_field_0"),
            Field::string("string_field_1"),
        ]);
        let outcome = SchemaMapping::default().apply(&mut table);
        assert_eq!(outcome, Normalization::Renamed(2));
        assert_eq!(table.column_names(), vec!["title", "sentiment"]);
    }

    #[test]
    fn test_present_title_skips_mapping() {
        let mut table = Table::new(vec![Field::string("title"), Field::string("string_field_1")]);
        let outcome = SchemaMapping::default().apply(&mut table);
        assert_eq!(outcome, Normalization::AlreadyNormalized);
        assert_eq!(table.column_names(), vec!["title", "string_field_1"]);
    }
}
