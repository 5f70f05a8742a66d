//! Stage metrics recorded through the `metrics` facade.
//!
//! Names follow `sentiment_{stage}_{metric}` (counters get a `_total` suffix).
//! [`init`] installs an in-process Prometheus recorder; a snapshot can be
//! rendered at the end of a run and pushed to a Pushgateway. Without a recorder
//! every call here is a no-op.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::{info, warn};

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

macro_rules! stage_metric {
    (counter, $stage:literal, $name:literal) => {
        concat!("sentiment_", $stage, "_", $name, "_total")
    };
    (histogram, $stage:literal, $name:literal) => {
        concat!("sentiment_", $stage, "_", $name)
    };
    (gauge, $stage:literal, $name:literal) => {
        concat!("sentiment_", $stage, "_", $name)
    };
}

/// Install the Prometheus recorder. Idempotent.
pub fn init() {
    if HANDLE.get().is_some() {
        return;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if HANDLE.set(handle).is_ok() {
                register_all();
                info!("Prometheus recorder installed");
            }
        }
        Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
    }
}

/// Render the current snapshot in Prometheus text format.
pub fn render() -> Option<String> {
    HANDLE.get().map(PrometheusHandle::render)
}

/// Pre-register every metric so a snapshot lists them even when unused.
fn register_all() {
    let _ = ::metrics::counter!(stage_metric!(counter, "ingest", "rows_loaded"));
    let _ = ::metrics::counter!(stage_metric!(counter, "ingest", "bytes_read"));
    let _ = ::metrics::histogram!(stage_metric!(histogram, "ingest", "duration_seconds"));
    let _ = ::metrics::counter!(stage_metric!(counter, "preprocess", "rows_cleaned"));
    let _ = ::metrics::counter!(stage_metric!(counter, "preprocess", "columns_renamed"));
    let _ = ::metrics::histogram!(stage_metric!(histogram, "preprocess", "duration_seconds"));
    let _ = ::metrics::counter!(stage_metric!(counter, "model", "rows_predicted"));
    let _ = ::metrics::gauge!(stage_metric!(gauge, "model", "vocabulary_size"));
    let _ = ::metrics::gauge!(stage_metric!(gauge, "model", "training_accuracy"));
    let _ = ::metrics::histogram!(stage_metric!(histogram, "model", "solver_iterations"));
    let _ = ::metrics::histogram!(stage_metric!(histogram, "model", "duration_seconds"));
    let _ = ::metrics::counter!(stage_metric!(counter, "workflow", "runs"));
    let _ = ::metrics::counter!(stage_metric!(counter, "workflow", "tasks_succeeded"));
    let _ = ::metrics::counter!(stage_metric!(counter, "workflow", "tasks_failed"));
}

pub mod ingest {
    pub fn load_completed(rows: usize, bytes: usize, duration_secs: f64) {
        ::metrics::counter!(stage_metric!(counter, "ingest", "rows_loaded")).increment(rows as u64);
        ::metrics::counter!(stage_metric!(counter, "ingest", "bytes_read")).increment(bytes as u64);
        ::metrics::histogram!(stage_metric!(histogram, "ingest", "duration_seconds"))
            .record(duration_secs);
    }
}

pub mod preprocess {
    pub fn batch_cleaned(rows: usize, columns_renamed: usize, duration_secs: f64) {
        ::metrics::counter!(stage_metric!(counter, "preprocess", "rows_cleaned"))
            .increment(rows as u64);
        ::metrics::counter!(stage_metric!(counter, "preprocess", "columns_renamed"))
            .increment(columns_renamed as u64);
        ::metrics::histogram!(stage_metric!(histogram, "preprocess", "duration_seconds"))
            .record(duration_secs);
    }
}

pub mod model {
    use crate::model::TrainingSummary;

    pub fn training_completed(summary: &TrainingSummary, duration_secs: f64) {
        ::metrics::counter!(stage_metric!(counter, "model", "rows_predicted"))
            .increment(summary.rows as u64);
        ::metrics::gauge!(stage_metric!(gauge, "model", "vocabulary_size"))
            .set(summary.vocabulary_size as f64);
        ::metrics::gauge!(stage_metric!(gauge, "model", "training_accuracy"))
            .set(summary.training_accuracy);
        ::metrics::histogram!(stage_metric!(histogram, "model", "solver_iterations"))
            .record(summary.iterations as f64);
        ::metrics::histogram!(stage_metric!(histogram, "model", "duration_seconds"))
            .record(duration_secs);
    }
}

pub mod workflow {
    pub fn run_started() {
        ::metrics::counter!(stage_metric!(counter, "workflow", "runs")).increment(1);
    }

    pub fn task_succeeded(task_id: &str) {
        ::metrics::counter!(
            stage_metric!(counter, "workflow", "tasks_succeeded"),
            "task" => task_id.to_string()
        )
        .increment(1);
    }

    pub fn task_failed(task_id: &str) {
        ::metrics::counter!(
            stage_metric!(counter, "workflow", "tasks_failed"),
            "task" => task_id.to_string()
        )
        .increment(1);
    }
}
