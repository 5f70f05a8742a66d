//! Identifiers shared across the workflow. Config values default to these.

// Workflow and task ids
pub const WORKFLOW_ID: &str = "financial_news_sentiment_dag";
pub const INGEST_TASK: &str = "gcs_to_bq";
pub const PREPROCESS_TASK: &str = "preprocess_text";
pub const PREDICT_TASK: &str = "ml_predict";

// Source object
pub const SOURCE_BUCKET: &str = "asia-southeast1-financial-s-93184d44-bucket";
pub const SOURCE_OBJECT: &str = "all-data.csv";

// Warehouse tables
pub const RAW_TABLE: &str = "sentiment_demo.raw_news";
pub const PROCESSED_TABLE: &str = "sentiment_demo.processed_news";
pub const PREDICTIONS_TABLE: &str = "sentiment_demo.predictions";

// Columns
pub const TITLE_COLUMN: &str = "title";
pub const SENTIMENT_COLUMN: &str = "sentiment";
pub const CLEAN_HEADLINE_COLUMN: &str = "clean_headline";
pub const PREDICTED_SENTIMENT_COLUMN: &str = "predicted_sentiment";

// Classifier defaults
pub const DEFAULT_MAX_ITER: usize = 200;
pub const DEFAULT_TOLERANCE: f64 = 1e-4;
pub const DEFAULT_INVERSE_REGULARIZATION: f64 = 1.0;
