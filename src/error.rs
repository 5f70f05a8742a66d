use thiserror::Error;

use crate::domain::TableId;

#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error("Table not found: {0}")]
    NotFound(TableId),

    #[error("Invalid table identifier '{0}': expected dataset.table")]
    InvalidTableId(String),

    #[error("Schema mismatch for {table}: {message}")]
    SchemaMismatch { table: TableId, message: String },

    #[error("Column '{column}' has {found} values for {expected} rows")]
    ColumnLength {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("Table {0} already contains rows and write disposition is WRITE_EMPTY")]
    NotEmpty(TableId),

    #[error("Load produced no rows for {0}")]
    EmptyLoad(TableId),

    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV row {row} has {found} fields, expected {expected}")]
    JaggedRow { row: usize, expected: usize, found: usize },

    #[error("Field delimiter {0:?} is not a single-byte ASCII character")]
    InvalidDelimiter(char),

    #[error("Source is not valid UTF-8 at byte {0}")]
    Encoding(usize),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Object not found: gs://{bucket}/{object}")]
    NotFound { bucket: String, object: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} fetching {url}")]
    Status { status: u16, url: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Cannot fit on an empty dataset")]
    EmptyDataset,

    #[error("Vocabulary is empty; no document contains a token of two or more word characters")]
    EmptyVocabulary,

    #[error("Classifier needs samples of at least 2 classes, got {0}")]
    SingleClass(usize),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Label at row {0} is NULL")]
    NullLabel(usize),

    #[error("Model has not been fitted yet")]
    NotFitted,
}

#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Missing required column '{column}' in {table}")]
    MissingColumn { table: TableId, column: String },
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Duplicate task id: {0}")]
    DuplicateTask(String),

    #[error("Dependency cycle detected through tasks: {0}")]
    Cycle(String),

    #[error("Task '{task_id}' failed: {source}")]
    TaskFailed {
        task_id: String,
        #[source]
        source: StageError,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Invalid(String),
}

pub type Result<T, E = StageError> = std::result::Result<T, E>;
