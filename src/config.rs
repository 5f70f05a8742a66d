use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::common::constants::{
    PREDICTIONS_TABLE, PROCESSED_TABLE, RAW_TABLE, SOURCE_BUCKET, SOURCE_OBJECT,
};
use crate::domain::TableId;
use crate::error::{ConfigError, WarehouseError};
use crate::model::LogisticRegressionConfig;
use crate::pipeline::ingestion::blob::{BlobStore, FsBlobStore, HttpBlobStore, ObjectRef};
use crate::pipeline::storage::{CsvLoadOptions, InMemoryWarehouse, SourceEncoding, SqliteWarehouse, Warehouse};

/// Workflow configuration. Every field has a default, so an absent file or an
/// empty section means the fixed identifiers the workflow was built around.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkflowConfig {
    pub source: SourceConfig,
    pub warehouse: WarehouseConfig,
    pub tables: TablesConfig,
    pub model: LogisticRegressionConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub bucket: String,
    pub object: String,
    /// Directory whose subdirectories act as buckets.
    pub blob_root: Option<PathBuf>,
    /// Base URL serving objects as `{base}/{bucket}/{object}`.
    pub http_base_url: Option<String>,
    pub encoding: SourceEncoding,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            bucket: SOURCE_BUCKET.to_string(),
            object: SOURCE_OBJECT.to_string(),
            blob_root: None,
            http_base_url: None,
            encoding: SourceEncoding::Utf8,
        }
    }
}

impl SourceConfig {
    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(&self.bucket, &self.object)
    }

    /// Headerless CSV, autodetected types, truncating the destination.
    pub fn load_options(&self) -> CsvLoadOptions {
        CsvLoadOptions {
            encoding: self.encoding,
            ..CsvLoadOptions::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarehouseBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WarehouseConfig {
    pub backend: WarehouseBackend,
    pub path: PathBuf,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            backend: WarehouseBackend::Sqlite,
            path: PathBuf::from("data/warehouse.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TablesConfig {
    pub raw: TableId,
    pub processed: TableId,
    pub predictions: TableId,
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            raw: TableId::from_static(RAW_TABLE),
            processed: TableId::from_static(PROCESSED_TABLE),
            predictions: TableId::from_static(PREDICTIONS_TABLE),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    pub pushgateway_url: Option<String>,
    pub job: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            pushgateway_url: None,
            job: "sentiment_workflow".to_string(),
        }
    }
}

impl WorkflowConfig {
    /// Load from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_toml(&content)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: WorkflowConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.bucket.is_empty() || self.source.object.is_empty() {
            return Err(ConfigError::Invalid(
                "source.bucket and source.object must be non-empty".to_string(),
            ));
        }
        if self.source.blob_root.is_some() && self.source.http_base_url.is_some() {
            return Err(ConfigError::Invalid(
                "set at most one of source.blob_root and source.http_base_url".to_string(),
            ));
        }
        if self.model.max_iter == 0 {
            return Err(ConfigError::Invalid("model.max_iter must be at least 1".to_string()));
        }
        if self.model.tolerance <= 0.0 || self.model.c <= 0.0 {
            return Err(ConfigError::Invalid(
                "model.tolerance and model.c must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Blob store for the configured source. Defaults to a filesystem store
    /// rooted at `data/buckets`.
    pub fn blob_store(&self) -> Arc<dyn BlobStore> {
        match (&self.source.http_base_url, &self.source.blob_root) {
            (Some(url), _) => Arc::new(HttpBlobStore::new(url.clone())),
            (None, Some(root)) => Arc::new(FsBlobStore::new(root.clone())),
            (None, None) => Arc::new(FsBlobStore::new("data/buckets")),
        }
    }

    pub fn open_warehouse(&self) -> Result<Arc<dyn Warehouse>, WarehouseError> {
        Ok(match self.warehouse.backend {
            WarehouseBackend::Sqlite => Arc::new(SqliteWarehouse::open(&self.warehouse.path)?),
            WarehouseBackend::Memory => Arc::new(InMemoryWarehouse::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_use_fixed_identifiers() {
        let config = WorkflowConfig::load(None).unwrap();
        assert_eq!(config.source.bucket, SOURCE_BUCKET);
        assert_eq!(config.source.object, "all-data.csv");
        assert_eq!(config.tables.raw.to_string(), "sentiment_demo.raw_news");
        assert_eq!(config.tables.predictions.to_string(), "sentiment_demo.predictions");
        assert_eq!(config.warehouse.backend, WarehouseBackend::Sqlite);
        assert_eq!(config.model.max_iter, 200);
        assert!(config.metrics.pushgateway_url.is_none());
    }

    #[test]
    fn test_partial_file_overrides() {
        let config = WorkflowConfig::from_toml(
            r#"
            [source]
            blob_root = "/tmp/buckets"
            encoding = "ISO-8859-1"

            [warehouse]
            backend = "memory"

            [tables]
            raw = "demo.raw"

            [model]
            max_iter = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.source.bucket, SOURCE_BUCKET);
        assert_eq!(config.source.encoding, SourceEncoding::Iso88591);
        assert_eq!(config.source.load_options().encoding, SourceEncoding::Iso88591);
        assert_eq!(config.warehouse.backend, WarehouseBackend::Memory);
        assert_eq!(config.tables.raw.to_string(), "demo.raw");
        assert_eq!(config.tables.processed.to_string(), "sentiment_demo.processed_news");
        assert_eq!(config.model.max_iter, 50);
        assert_eq!(config.model.tolerance, 1e-4);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            WorkflowConfig::from_toml("[tables]\nraw = \"no_dot\"\n"),
            Err(ConfigError::Toml(_))
        ));
        assert!(matches!(
            WorkflowConfig::from_toml(
                "[source]\nblob_root = \"a\"\nhttp_base_url = \"http://b\"\n"
            ),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            WorkflowConfig::from_toml("[model]\nc = 0.0\n"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = WorkflowConfig::load(Some(Path::new("/nonexistent/workflow.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
