use async_trait::async_trait;
use std::time::Instant;
use tracing::info;

use super::{PipelineStep, StepResult};
use crate::common::constants::{CLEAN_HEADLINE_COLUMN, TITLE_COLUMN};
use crate::domain::{Field, Table, TableId, Value};
use crate::error::StageError;
use crate::observability::metrics;
use crate::pipeline::processing::clean::clean_headline;
use crate::pipeline::processing::schema::{Normalization, SchemaMapping};
use crate::pipeline::storage::{Warehouse, WriteDisposition};

/// Normalizes column names and adds `clean_headline` to every row.
pub struct PreprocessStep {
    task_id: String,
    source: TableId,
    destination: TableId,
    mapping: SchemaMapping,
}

impl PreprocessStep {
    pub fn new(
        task_id: impl Into<String>,
        source: TableId,
        destination: TableId,
        mapping: SchemaMapping,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            source,
            destination,
            mapping,
        }
    }
}

/// A NULL title is cleaned from the literal text `None`, so it becomes `none`.
fn title_text(title: &Value) -> String {
    match title {
        Value::Null => "None".to_string(),
        other => other.to_text(),
    }
}

/// Apply the schema mapping, then derive `clean_headline` from `title`.
///
/// Returns how many columns the mapping renamed.
pub fn preprocess_table(
    table: &mut Table,
    source: &TableId,
    mapping: &SchemaMapping,
) -> Result<usize, StageError> {
    let renamed = match mapping.apply(table) {
        Normalization::AlreadyNormalized => 0,
        Normalization::Renamed(n) => n,
    };

    let cleaned: Vec<Value> = table
        .column_values(TITLE_COLUMN)
        .ok_or_else(|| StageError::MissingColumn {
            table: source.clone(),
            column: TITLE_COLUMN.to_string(),
        })?
        .into_iter()
        .map(|title| Value::String(clean_headline(&title_text(title))))
        .collect();

    table.push_column(Field::string(CLEAN_HEADLINE_COLUMN), cleaned)?;
    Ok(renamed)
}

#[async_trait]
impl PipelineStep for PreprocessStep {
    async fn execute(&self, warehouse: &dyn Warehouse) -> Result<StepResult, StageError> {
        let started = Instant::now();
        let mut table = warehouse.read_table(&self.source).await?;
        info!(table = %self.source, rows = table.num_rows(), "🧹 Cleaning headlines");

        let renamed = preprocess_table(&mut table, &self.source, &self.mapping)?;
        let stats = warehouse
            .write_table(&self.destination, &table, WriteDisposition::WriteTruncate)
            .await?;

        metrics::preprocess::batch_cleaned(stats.rows_written, renamed, started.elapsed().as_secs_f64());
        info!(
            rows = stats.rows_written,
            renamed,
            "✅ Wrote {} cleaned rows to {}",
            stats.rows_written,
            self.destination
        );

        Ok(StepResult::success(
            stats.rows_written,
            format!("Cleaned {} rows into {}", stats.rows_written, self.destination),
        )
        .with_metadata("columns_renamed", renamed))
    }

    fn step_name(&self) -> &str {
        &self.task_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FieldKind;
    use crate::pipeline::storage::InMemoryWarehouse;

    fn raw_id() -> TableId {
        "sentiment_demo.raw_news".parse().unwrap()
    }

    fn processed_id() -> TableId {
        "sentiment_demo.processed_news".parse().unwrap()
    }

    #[test]
    fn test_positional_columns_are_renamed_before_cleaning() {
        let mut table = Table::with_rows(
            vec![Field::string("string_field_0"), Field::string("string_field_1")],
            vec![vec!["Stocks Rally 5%!".into(), "positive".into()]],
        );

        let renamed = preprocess_table(&mut table, &raw_id(), &SchemaMapping::default()).unwrap();

        assert_eq!(renamed, 2);
        assert_eq!(table.column_names(), vec!["title", "sentiment", "clean_headline"]);
        assert_eq!(table.rows[0][2], Value::from("stocks rally "));
    }

    #[test]
    fn test_null_and_numeric_titles() {
        let mut table = Table::with_rows(
            vec![Field::new("title", FieldKind::String)],
            vec![vec![Value::Null], vec![Value::Int(42)], vec!["Up 3%".into()]],
        );
        preprocess_table(&mut table, &raw_id(), &SchemaMapping::default()).unwrap();
        let cleaned: Vec<String> = table
            .column_values(CLEAN_HEADLINE_COLUMN)
            .unwrap()
            .into_iter()
            .map(Value::to_text)
            .collect();
        assert_eq!(cleaned, vec!["none", "", "up "]);
    }

    #[test]
    fn test_missing_title_is_an_error() {
        let mut table = Table::new(vec![Field::string("headline")]);
        let err = preprocess_table(&mut table, &raw_id(), &SchemaMapping::default()).unwrap_err();
        assert!(matches!(err, StageError::MissingColumn { ref column, .. } if column == "title"));
    }

    #[tokio::test]
    async fn test_step_overwrites_processed_table() {
        let warehouse = InMemoryWarehouse::new();
        let raw = Table::with_rows(
            vec![Field::string("string_field_0"), Field::string("string_field_1")],
            vec![
                vec!["Profit Up".into(), "positive".into()],
                vec!["Sales Down".into(), "negative".into()],
            ],
        );
        warehouse
            .write_table(&raw_id(), &raw, WriteDisposition::WriteTruncate)
            .await
            .unwrap();
        let stale = Table::with_rows(vec![Field::string("x")], vec![vec!["old".into()]; 5]);
        warehouse
            .write_table(&processed_id(), &stale, WriteDisposition::WriteTruncate)
            .await
            .unwrap();

        let step = PreprocessStep::new(
            "preprocess_text",
            raw_id(),
            processed_id(),
            SchemaMapping::default(),
        );
        let result = step.execute(&warehouse).await.unwrap();

        assert_eq!(result.processed_count, 2);
        let processed = warehouse.read_table(&processed_id()).await.unwrap();
        assert_eq!(processed.num_rows(), 2);
        assert_eq!(processed.rows[1][2], Value::from("sales down"));
    }
}
