use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::StageError;
use crate::pipeline::storage::Warehouse;

/// Common trait for all pipeline steps
#[async_trait]
pub trait PipelineStep: Send + Sync {
    /// Execute this step once over the whole dataset
    async fn execute(&self, warehouse: &dyn Warehouse) -> Result<StepResult, StageError>;

    /// Task id this step is registered under in the workflow graph
    fn step_name(&self) -> &str;
}

/// Result of executing a pipeline step
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub processed_count: usize,
    pub message: String,
    pub metadata: BTreeMap<String, String>,
}

impl StepResult {
    pub fn success(processed: usize, message: String) -> Self {
        Self {
            processed_count: processed,
            message,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

pub mod ingestion;
pub mod predict;
pub mod preprocess;

pub use ingestion::IngestionStep;
pub use predict::PredictStep;
pub use preprocess::PreprocessStep;
