use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use super::{PipelineStep, StepResult};
use crate::domain::TableId;
use crate::error::StageError;
use crate::observability::metrics;
use crate::pipeline::ingestion::blob::{BlobStore, ObjectRef};
use crate::pipeline::storage::{CsvLoadOptions, Warehouse};

/// Bulk-loads one CSV object from bucket storage into the raw table.
pub struct IngestionStep {
    task_id: String,
    blob_store: Arc<dyn BlobStore>,
    source: ObjectRef,
    destination: TableId,
    options: CsvLoadOptions,
}

impl IngestionStep {
    pub fn new(
        task_id: impl Into<String>,
        blob_store: Arc<dyn BlobStore>,
        source: ObjectRef,
        destination: TableId,
        options: CsvLoadOptions,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            blob_store,
            source,
            destination,
            options,
        }
    }
}

#[async_trait]
impl PipelineStep for IngestionStep {
    async fn execute(&self, warehouse: &dyn Warehouse) -> Result<StepResult, StageError> {
        let started = Instant::now();
        info!(source = %self.source, destination = %self.destination, "📥 Loading CSV object");

        let bytes = self.blob_store.get(&self.source).await?;
        let stats = warehouse
            .load_csv(&self.destination, &bytes, &self.options)
            .await?;

        metrics::ingest::load_completed(stats.rows_written, bytes.len(), started.elapsed().as_secs_f64());
        info!(
            rows = stats.rows_written,
            bytes = bytes.len(),
            "✅ Loaded {} rows into {}",
            stats.rows_written,
            self.destination
        );

        Ok(StepResult::success(
            stats.rows_written,
            format!("Loaded {} rows into {}", stats.rows_written, self.destination),
        )
        .with_metadata("bytes", bytes.len())
        .with_metadata("source", &self.source))
    }

    fn step_name(&self) -> &str {
        &self.task_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BlobError;
    use crate::pipeline::storage::InMemoryWarehouse;

    struct StaticBlob(&'static [u8]);

    #[async_trait]
    impl BlobStore for StaticBlob {
        async fn get(&self, _object: &ObjectRef) -> Result<Vec<u8>, BlobError> {
            Ok(self.0.to_vec())
        }
    }

    fn step(bytes: &'static [u8]) -> IngestionStep {
        IngestionStep::new(
            "gcs_to_bq",
            Arc::new(StaticBlob(bytes)),
            ObjectRef::new("bucket", "all-data.csv"),
            "sentiment_demo.raw_news".parse().unwrap(),
            CsvLoadOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_load_truncates_previous_contents() {
        let warehouse = InMemoryWarehouse::new();
        let id: TableId = "sentiment_demo.raw_news".parse().unwrap();

        step(b"a,positive\nb,negative\nc,neutral\n")
            .execute(&warehouse)
            .await
            .unwrap();
        let result = step(b"d,positive\n").execute(&warehouse).await.unwrap();

        assert_eq!(result.processed_count, 1);
        let table = warehouse.read_table(&id).await.unwrap();
        assert_eq!(table.num_rows(), 1);
        assert_eq!(table.column_names(), vec!["string_field_0", "string_field_1"]);
    }

    #[tokio::test]
    async fn test_empty_object_fails() {
        let warehouse = InMemoryWarehouse::new();
        let err = step(b"").execute(&warehouse).await.unwrap_err();
        assert!(matches!(
            err,
            StageError::Warehouse(crate::error::WarehouseError::EmptyLoad(_))
        ));
    }
}
