use std::sync::Arc;

use super::ingestion::blob::BlobStore;
use super::processing::schema::SchemaMapping;
use super::steps::{IngestionStep, PredictStep, PreprocessStep};
use super::workflow::Workflow;
use crate::common::constants::{INGEST_TASK, PREDICT_TASK, PREPROCESS_TASK, WORKFLOW_ID};
use crate::config::WorkflowConfig;
use crate::error::WorkflowError;

/// `gcs_to_bq >> preprocess_text >> ml_predict`
pub fn sentiment_workflow(
    config: &WorkflowConfig,
    blob_store: Arc<dyn BlobStore>,
) -> Result<Workflow, WorkflowError> {
    let tables = &config.tables;
    let mut workflow = Workflow::new(WORKFLOW_ID);

    workflow.add_task(Box::new(IngestionStep::new(
        INGEST_TASK,
        blob_store,
        config.source.object_ref(),
        tables.raw.clone(),
        config.source.load_options(),
    )))?;
    workflow.add_task(Box::new(PreprocessStep::new(
        PREPROCESS_TASK,
        tables.raw.clone(),
        tables.processed.clone(),
        SchemaMapping::default(),
    )))?;
    workflow.add_task(Box::new(PredictStep::new(
        PREDICT_TASK,
        tables.processed.clone(),
        tables.predictions.clone(),
        config.model,
    )))?;

    workflow.chain(&[INGEST_TASK, PREPROCESS_TASK, PREDICT_TASK])?;
    workflow.validate()?;
    Ok(workflow)
}
