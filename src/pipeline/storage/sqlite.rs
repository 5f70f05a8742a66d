//! SQLite-file warehouse.
//!
//! Each warehouse table is a physical SQLite table named after its full
//! `dataset.table` identifier. Column kinds are kept in a `_table_catalog` table
//! as JSON so reads return the same schema that was written.

use super::traits::{resolve_write, Warehouse, WriteAction, WriteDisposition, WriteStats};
use crate::domain::{Field, FieldKind, Row, Table, TableId, Value};
use crate::error::WarehouseError;
use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

pub struct SqliteWarehouse {
    conn: Mutex<Connection>,
}

impl SqliteWarehouse {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WarehouseError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), "Opened SQLite warehouse");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, WarehouseError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, WarehouseError> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS _table_catalog (
                table_id     TEXT PRIMARY KEY,
                schema_json  TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_type(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::String => "TEXT",
        FieldKind::Int64 | FieldKind::Bool => "INTEGER",
        FieldKind::Float64 => "REAL",
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(x) => SqlValue::Real(*x),
        Value::String(s) => SqlValue::Text(s.clone()),
    }
}

fn from_sql(value: SqlValue, kind: FieldKind) -> Value {
    match (value, kind) {
        (SqlValue::Null, _) => Value::Null,
        (SqlValue::Integer(i), FieldKind::Bool) => Value::Bool(i != 0),
        (SqlValue::Integer(i), FieldKind::Float64) => Value::Float(i as f64),
        (SqlValue::Integer(i), _) => Value::Int(i),
        (SqlValue::Real(x), _) => Value::Float(x),
        (SqlValue::Text(s), _) => Value::String(s),
        (SqlValue::Blob(b), _) => Value::String(String::from_utf8_lossy(&b).into_owned()),
    }
}

fn load_schema(conn: &Connection, id: &TableId) -> Result<Option<Vec<Field>>, WarehouseError> {
    let json: Option<String> = conn
        .query_row(
            "SELECT schema_json FROM _table_catalog WHERE table_id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    match json {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

fn count_rows(conn: &Connection, id: &TableId) -> Result<usize, WarehouseError> {
    let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(&id.to_string()));
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count as usize)
}

#[async_trait]
impl Warehouse for SqliteWarehouse {
    async fn read_table(&self, id: &TableId) -> Result<Table, WarehouseError> {
        let conn = self.lock();
        let schema = load_schema(&conn, id)?.ok_or_else(|| WarehouseError::NotFound(id.clone()))?;

        let columns = schema
            .iter()
            .map(|f| quote_ident(&f.name))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM {} ORDER BY rowid",
            columns,
            quote_ident(&id.to_string())
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                schema
                    .iter()
                    .enumerate()
                    .map(|(i, field)| Ok(from_sql(row.get::<_, SqlValue>(i)?, field.kind)))
                    .collect::<rusqlite::Result<Row>>()
            })?
            .collect::<rusqlite::Result<Vec<Row>>>()?;
        drop(stmt);

        debug!(table = %id, rows = rows.len(), "Read table");
        Ok(Table::with_rows(schema, rows))
    }

    async fn write_table(
        &self,
        id: &TableId,
        table: &Table,
        disposition: WriteDisposition,
    ) -> Result<WriteStats, WarehouseError> {
        if table.schema.is_empty() {
            return Err(WarehouseError::SchemaMismatch {
                table: id.clone(),
                message: "table must have at least one column".to_string(),
            });
        }

        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let existing_schema = load_schema(&tx, id)?;
        let existing_rows = match existing_schema {
            Some(_) => count_rows(&tx, id)?,
            None => 0,
        };
        let action = resolve_write(
            id,
            existing_schema.as_deref().map(|s| (s, existing_rows)),
            &table.schema,
            disposition,
        )?;

        let physical = quote_ident(&id.to_string());
        if action == WriteAction::Replace {
            let columns = table
                .schema
                .iter()
                .map(|f| format!("{} {}", quote_ident(&f.name), sql_type(f.kind)))
                .collect::<Vec<_>>()
                .join(", ");
            tx.execute_batch(&format!(
                "DROP TABLE IF EXISTS {physical}; CREATE TABLE {physical} ({columns});"
            ))?;
            tx.execute(
                "INSERT INTO _table_catalog (table_id, schema_json) VALUES (?1, ?2)
                 ON CONFLICT(table_id) DO UPDATE SET schema_json=excluded.schema_json",
                params![id.to_string(), serde_json::to_string(&table.schema)?],
            )?;
        }

        {
            let columns = table
                .schema
                .iter()
                .map(|f| quote_ident(&f.name))
                .collect::<Vec<_>>()
                .join(", ");
            let placeholders = (1..=table.schema.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let mut insert = tx.prepare(&format!(
                "INSERT INTO {physical} ({columns}) VALUES ({placeholders})"
            ))?;
            for row in &table.rows {
                insert.execute(params_from_iter(row.iter().map(to_sql)))?;
            }
        }

        let total_rows = count_rows(&tx, id)?;
        tx.commit()?;

        debug!(table = %id, ?action, rows = table.num_rows(), total_rows, "Wrote table");
        Ok(WriteStats {
            rows_written: table.num_rows(),
            total_rows,
        })
    }

    async fn table_exists(&self, id: &TableId) -> Result<bool, WarehouseError> {
        let conn = self.lock();
        Ok(load_schema(&conn, id)?.is_some())
    }

    async fn list_tables(&self) -> Result<Vec<TableId>, WarehouseError> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT table_id FROM _table_catalog ORDER BY table_id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        ids.into_iter().map(|s| s.parse()).collect()
    }

    async fn row_count(&self, id: &TableId) -> Result<usize, WarehouseError> {
        let conn = self.lock();
        if load_schema(&conn, id)?.is_none() {
            return Err(WarehouseError::NotFound(id.clone()));
        }
        count_rows(&conn, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> TableId {
        "sentiment_demo.raw_news".parse().unwrap()
    }

    fn mixed() -> Table {
        Table::with_rows(
            vec![
                Field::string("title"),
                Field::new("score", FieldKind::Float64),
                Field::new("count", FieldKind::Int64),
                Field::new("flag", FieldKind::Bool),
            ],
            vec![
                vec!["up".into(), Value::Float(0.5), Value::Int(3), Value::Bool(true)],
                vec![Value::Null, Value::Float(2.0), Value::Null, Value::Bool(false)],
            ],
        )
    }

    #[tokio::test]
    async fn test_round_trip_preserves_schema_and_values() {
        let warehouse = SqliteWarehouse::open_in_memory().unwrap();
        warehouse
            .write_table(&id(), &mixed(), WriteDisposition::WriteTruncate)
            .await
            .unwrap();

        let read = warehouse.read_table(&id()).await.unwrap();
        assert_eq!(read, mixed());
        assert_eq!(warehouse.list_tables().await.unwrap(), vec![id()]);
    }

    #[tokio::test]
    async fn test_dispositions() {
        let warehouse = SqliteWarehouse::open_in_memory().unwrap();
        warehouse
            .write_table(&id(), &mixed(), WriteDisposition::WriteEmpty)
            .await
            .unwrap();

        assert!(matches!(
            warehouse
                .write_table(&id(), &mixed(), WriteDisposition::WriteEmpty)
                .await,
            Err(WarehouseError::NotEmpty(_))
        ));

        let stats = warehouse
            .write_table(&id(), &mixed(), WriteDisposition::WriteAppend)
            .await
            .unwrap();
        assert_eq!(stats.total_rows, 4);

        let single = Table::with_rows(vec![Field::string("other")], vec![vec!["x".into()]]);
        let stats = warehouse
            .write_table(&id(), &single, WriteDisposition::WriteTruncate)
            .await
            .unwrap();
        assert_eq!(stats.total_rows, 1);
        assert_eq!(warehouse.read_table(&id()).await.unwrap(), single);
    }

    #[tokio::test]
    async fn test_file_backed_warehouse_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warehouse").join("demo.db");

        {
            let warehouse = SqliteWarehouse::open(&path).unwrap();
            warehouse
                .write_table(&id(), &mixed(), WriteDisposition::WriteTruncate)
                .await
                .unwrap();
        }

        let reopened = SqliteWarehouse::open(&path).unwrap();
        assert_eq!(reopened.row_count(&id()).await.unwrap(), 2);
    }
}
