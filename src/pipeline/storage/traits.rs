use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::csv_load::{parse_csv, CsvLoadOptions};
use crate::domain::{Field, Table, TableId};
use crate::error::WarehouseError;

/// What a write does to rows already in the destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteDisposition {
    /// Replace schema and contents.
    #[default]
    WriteTruncate,
    /// Add rows; the incoming schema must equal the existing one.
    WriteAppend,
    /// Fail if the destination already holds rows.
    WriteEmpty,
}

/// How a write resolves against the current destination state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAction {
    Replace,
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteStats {
    pub rows_written: usize,
    pub total_rows: usize,
}

/// Decide whether a write replaces or appends, or reject it.
///
/// `existing` is the destination's schema and row count, if the table exists.
pub fn resolve_write(
    id: &TableId,
    existing: Option<(&[Field], usize)>,
    incoming: &[Field],
    disposition: WriteDisposition,
) -> Result<WriteAction, WarehouseError> {
    match (disposition, existing) {
        (WriteDisposition::WriteTruncate, _) | (_, None) => Ok(WriteAction::Replace),
        (WriteDisposition::WriteEmpty, Some((_, rows))) if rows > 0 => {
            Err(WarehouseError::NotEmpty(id.clone()))
        }
        (WriteDisposition::WriteEmpty, Some(_)) => Ok(WriteAction::Replace),
        (WriteDisposition::WriteAppend, Some((schema, _))) => {
            if schema == incoming {
                Ok(WriteAction::Append)
            } else {
                Err(WarehouseError::SchemaMismatch {
                    table: id.clone(),
                    message: format!(
                        "append schema [{}] does not match existing [{}]",
                        describe(incoming),
                        describe(schema)
                    ),
                })
            }
        }
    }
}

fn describe(schema: &[Field]) -> String {
    schema
        .iter()
        .map(|f| format!("{} {}", f.name, f.kind))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Warehouse port: whole-table reads, whole-table writes, and CSV bulk loads.
#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn read_table(&self, id: &TableId) -> Result<Table, WarehouseError>;

    async fn write_table(
        &self,
        id: &TableId,
        table: &Table,
        disposition: WriteDisposition,
    ) -> Result<WriteStats, WarehouseError>;

    async fn table_exists(&self, id: &TableId) -> Result<bool, WarehouseError>;

    async fn list_tables(&self) -> Result<Vec<TableId>, WarehouseError>;

    async fn row_count(&self, id: &TableId) -> Result<usize, WarehouseError> {
        Ok(self.read_table(id).await?.num_rows())
    }

    /// Bulk-load CSV bytes into `id`. A load that yields no data rows fails.
    async fn load_csv(
        &self,
        id: &TableId,
        bytes: &[u8],
        options: &CsvLoadOptions,
    ) -> Result<WriteStats, WarehouseError> {
        let table = parse_csv(bytes, options)?;
        if table.rows.is_empty() {
            return Err(WarehouseError::EmptyLoad(id.clone()));
        }
        self.write_table(id, &table, options.write_disposition).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> TableId {
        "sentiment_demo.raw_news".parse().unwrap()
    }

    #[test]
    fn test_truncate_always_replaces() {
        let schema = vec![Field::string("a")];
        let other = vec![Field::string("b")];
        let action = resolve_write(
            &id(),
            Some((&schema, 10)),
            &other,
            WriteDisposition::WriteTruncate,
        )
        .unwrap();
        assert_eq!(action, WriteAction::Replace);
    }

    #[test]
    fn test_append_requires_matching_schema() {
        let schema = vec![Field::string("a")];
        let other = vec![Field::string("b")];
        assert_eq!(
            resolve_write(&id(), Some((&schema, 1)), &schema, WriteDisposition::WriteAppend)
                .unwrap(),
            WriteAction::Append
        );
        assert!(matches!(
            resolve_write(&id(), Some((&schema, 1)), &other, WriteDisposition::WriteAppend),
            Err(WarehouseError::SchemaMismatch { .. })
        ));
        assert_eq!(
            resolve_write(&id(), None, &other, WriteDisposition::WriteAppend).unwrap(),
            WriteAction::Replace
        );
    }

    #[test]
    fn test_write_empty_rejects_populated_table() {
        let schema = vec![Field::string("a")];
        assert!(matches!(
            resolve_write(&id(), Some((&schema, 3)), &schema, WriteDisposition::WriteEmpty),
            Err(WarehouseError::NotEmpty(_))
        ));
        assert_eq!(
            resolve_write(&id(), Some((&schema, 0)), &schema, WriteDisposition::WriteEmpty)
                .unwrap(),
            WriteAction::Replace
        );
    }
}
