use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Instant;
use tracing::info;

use super::{PipelineStep, StepResult};
use crate::common::constants::{CLEAN_HEADLINE_COLUMN, PREDICTED_SENTIMENT_COLUMN, SENTIMENT_COLUMN};
use crate::domain::{Field, FieldKind, Table, TableId, Value};
use crate::error::{ModelError, StageError};
use crate::model::{fit_predict, LogisticRegressionConfig, TrainingSummary};
use crate::observability::metrics;
use crate::pipeline::storage::{Warehouse, WriteDisposition};

/// Trains a bag-of-words classifier on the processed table and writes its
/// predictions for the same rows.
pub struct PredictStep {
    task_id: String,
    source: TableId,
    destination: TableId,
    config: LogisticRegressionConfig,
}

impl PredictStep {
    pub fn new(
        task_id: impl Into<String>,
        source: TableId,
        destination: TableId,
        config: LogisticRegressionConfig,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            source,
            destination,
            config,
        }
    }
}

fn required_column<'a>(table: &'a Table, source: &TableId, column: &str) -> Result<Vec<&'a Value>, StageError> {
    table
        .column_values(column)
        .ok_or_else(|| StageError::MissingColumn {
            table: source.clone(),
            column: column.to_string(),
        })
}

/// Fit on `clean_headline` against `sentiment` and append `predicted_sentiment`.
pub fn predict_table(
    table: &mut Table,
    source: &TableId,
    config: LogisticRegressionConfig,
) -> Result<TrainingSummary, StageError> {
    let documents: Vec<String> = required_column(table, source, CLEAN_HEADLINE_COLUMN)?
        .into_iter()
        .map(Value::to_text)
        .collect();
    let label_kind = table
        .column_index(SENTIMENT_COLUMN)
        .map_or(FieldKind::String, |idx| table.schema[idx].kind);
    let mut typed_labels: HashMap<String, Value> = HashMap::new();
    let labels: Vec<String> = required_column(table, source, SENTIMENT_COLUMN)?
        .into_iter()
        .enumerate()
        .map(|(i, label)| {
            if label.is_null() {
                return Err(ModelError::NullLabel(i));
            }
            let text = label.to_text();
            typed_labels
                .entry(text.clone())
                .or_insert_with(|| label.clone());
            Ok(text)
        })
        .collect::<Result<_, _>>()?;

    let outcome = fit_predict(&documents, &labels, config)?;
    // Predictions carry the label column's type, so INT64 labels predict INT64.
    let predicted = outcome
        .predictions
        .into_iter()
        .map(|p| typed_labels.get(&p).cloned().unwrap_or(Value::String(p)))
        .collect();
    table.push_column(Field::new(PREDICTED_SENTIMENT_COLUMN, label_kind), predicted)?;
    Ok(outcome.summary)
}

#[async_trait]
impl PipelineStep for PredictStep {
    async fn execute(&self, warehouse: &dyn Warehouse) -> Result<StepResult, StageError> {
        let started = Instant::now();
        let mut table = warehouse.read_table(&self.source).await?;
        info!(table = %self.source, rows = table.num_rows(), "🤖 Training sentiment model");

        let summary = predict_table(&mut table, &self.source, self.config)?;
        info!(
            rows = summary.rows,
            vocabulary = summary.vocabulary_size,
            classes = ?summary.classes,
            iterations = summary.iterations,
            converged = summary.converged,
            final_loss = summary.final_loss,
            training_accuracy = summary.training_accuracy,
            "Model fitted"
        );

        let stats = warehouse
            .write_table(&self.destination, &table, WriteDisposition::WriteTruncate)
            .await?;
        metrics::model::training_completed(&summary, started.elapsed().as_secs_f64());
        info!("✅ Wrote {} predictions to {}", stats.rows_written, self.destination);

        Ok(StepResult::success(
            stats.rows_written,
            format!("Wrote {} predictions to {}", stats.rows_written, self.destination),
        )
        .with_metadata("vocabulary_size", summary.vocabulary_size)
        .with_metadata("classes", summary.classes.join(","))
        .with_metadata("iterations", summary.iterations)
        .with_metadata("converged", summary.converged)
        .with_metadata("training_accuracy", format!("{:.4}", summary.training_accuracy)))
    }

    fn step_name(&self) -> &str {
        &self.task_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::storage::InMemoryWarehouse;

    fn processed_id() -> TableId {
        "sentiment_demo.processed_news".parse().unwrap()
    }

    fn processed(rows: &[(&str, &str)]) -> Table {
        Table::with_rows(
            vec![
                Field::string("title"),
                Field::string("sentiment"),
                Field::string("clean_headline"),
            ],
            rows.iter()
                .map(|(headline, label)| {
                    vec![
                        Value::from(*headline),
                        Value::from(*label),
                        Value::from(headline.to_lowercase()),
                    ]
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_every_row_gets_a_prediction() {
        let warehouse = InMemoryWarehouse::new();
        let output: TableId = "sentiment_demo.predictions".parse().unwrap();
        let table = processed(&[
            ("Profit rose sharply", "positive"),
            ("Sales grew strongly", "positive"),
            ("Profit fell sharply", "negative"),
            ("Orders dropped again", "negative"),
        ]);
        warehouse
            .write_table(&processed_id(), &table, WriteDisposition::WriteTruncate)
            .await
            .unwrap();

        let step = PredictStep::new(
            "ml_predict",
            processed_id(),
            output.clone(),
            LogisticRegressionConfig::default(),
        );
        let result = step.execute(&warehouse).await.unwrap();
        assert_eq!(result.processed_count, 4);
        assert_eq!(result.metadata["classes"], "negative,positive");

        let predictions = warehouse.read_table(&output).await.unwrap();
        assert_eq!(predictions.num_rows(), table.num_rows());
        assert_eq!(
            predictions.column_names(),
            vec!["title", "sentiment", "clean_headline", "predicted_sentiment"]
        );
        for value in predictions.column_values("predicted_sentiment").unwrap() {
            let label = value.as_str().unwrap();
            assert!(label == "positive" || label == "negative");
        }
    }

    #[test]
    fn test_integer_labels_predict_integers() {
        let mut table = Table::with_rows(
            vec![
                Field::string("clean_headline"),
                Field::new("sentiment", FieldKind::Int64),
            ],
            vec![
                vec!["profit rose sharply".into(), Value::Int(1)],
                vec!["sales grew strongly".into(), Value::Int(1)],
                vec!["profit fell sharply".into(), Value::Int(0)],
                vec!["orders dropped again".into(), Value::Int(0)],
            ],
        );

        let summary =
            predict_table(&mut table, &processed_id(), LogisticRegressionConfig::default()).unwrap();

        assert_eq!(summary.classes, vec!["0", "1"]);
        let field = &table.schema[table.column_index("predicted_sentiment").unwrap()];
        assert_eq!(field.kind, FieldKind::Int64);
        for value in table.column_values("predicted_sentiment").unwrap() {
            assert!(matches!(value, Value::Int(0) | Value::Int(1)));
        }
    }

    #[test]
    fn test_single_class_fails() {
        let mut table = processed(&[("profit rose", "positive"), ("sales grew", "positive")]);
        let err = predict_table(&mut table, &processed_id(), LogisticRegressionConfig::default())
            .unwrap_err();
        assert!(matches!(err, StageError::Model(ModelError::SingleClass(1))));
    }

    #[test]
    fn test_null_label_fails() {
        let mut table = processed(&[("profit rose", "positive"), ("sales fell", "negative")]);
        table.rows[1][1] = Value::Null;
        let err = predict_table(&mut table, &processed_id(), LogisticRegressionConfig::default())
            .unwrap_err();
        assert!(matches!(err, StageError::Model(ModelError::NullLabel(1))));
    }

    #[test]
    fn test_missing_clean_headline() {
        let mut table = Table::new(vec![Field::string("title"), Field::string("sentiment")]);
        let err = predict_table(&mut table, &processed_id(), LogisticRegressionConfig::default())
            .unwrap_err();
        assert!(matches!(err, StageError::MissingColumn { ref column, .. } if column == "clean_headline"));
    }
}
