use super::traits::{resolve_write, Warehouse, WriteAction, WriteDisposition, WriteStats};
use crate::domain::{Table, TableId};
use crate::error::WarehouseError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// In-memory warehouse for development/testing
#[derive(Clone, Default)]
pub struct InMemoryWarehouse {
    tables: Arc<Mutex<BTreeMap<TableId, Table>>>,
}

impl InMemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Warehouse for InMemoryWarehouse {
    async fn read_table(&self, id: &TableId) -> Result<Table, WarehouseError> {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        tables
            .get(id)
            .cloned()
            .ok_or_else(|| WarehouseError::NotFound(id.clone()))
    }

    async fn write_table(
        &self,
        id: &TableId,
        table: &Table,
        disposition: WriteDisposition,
    ) -> Result<WriteStats, WarehouseError> {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let existing = tables
            .get(id)
            .map(|t| (t.schema.as_slice(), t.num_rows()));
        let action = resolve_write(id, existing, &table.schema, disposition)?;

        let total_rows = match action {
            WriteAction::Replace => {
                tables.insert(id.clone(), table.clone());
                table.num_rows()
            }
            WriteAction::Append => {
                let target = tables
                    .get_mut(id)
                    .ok_or_else(|| WarehouseError::NotFound(id.clone()))?;
                target.rows.extend(table.rows.iter().cloned());
                target.num_rows()
            }
        };

        debug!(table = %id, ?action, rows = table.num_rows(), "Wrote table");
        Ok(WriteStats {
            rows_written: table.num_rows(),
            total_rows,
        })
    }

    async fn table_exists(&self, id: &TableId) -> Result<bool, WarehouseError> {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.contains_key(id))
    }

    async fn list_tables(&self) -> Result<Vec<TableId>, WarehouseError> {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.keys().cloned().collect())
    }
}
