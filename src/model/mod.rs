//! Bag-of-words sentiment classifier.
//!
//! A model lives only for the duration of one [`fit_predict`] call: the
//! vocabulary and weights are derived from the rows passed in and dropped
//! afterwards.

pub mod logistic;
pub mod vectorizer;

pub use logistic::{accuracy, FitReport, LogisticRegression, LogisticRegressionConfig};
pub use vectorizer::{tokenize, CountMatrix, CountVectorizer};

use serde::Serialize;

use crate::error::ModelError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingSummary {
    pub rows: usize,
    pub vocabulary_size: usize,
    pub classes: Vec<String>,
    pub iterations: usize,
    pub converged: bool,
    pub final_loss: f64,
    /// Accuracy on the training rows themselves; there is no held-out split.
    pub training_accuracy: f64,
}

#[derive(Debug, Clone)]
pub struct FitPredictOutcome {
    pub predictions: Vec<String>,
    pub summary: TrainingSummary,
}

/// Vectorize `documents`, fit against `labels`, and predict the same rows.
pub fn fit_predict<S: AsRef<str>>(
    documents: &[S],
    labels: &[String],
    config: LogisticRegressionConfig,
) -> Result<FitPredictOutcome, ModelError> {
    let mut vectorizer = CountVectorizer::new();
    let x = vectorizer.fit_transform(documents)?;

    let mut model = LogisticRegression::new(config);
    let report = model.fit(&x, labels)?;
    let predictions = model.predict(&x)?;

    let summary = TrainingSummary {
        rows: x.n_rows(),
        vocabulary_size: vectorizer.n_features(),
        classes: model.classes().to_vec(),
        iterations: report.iterations,
        converged: report.converged,
        final_loss: report.final_loss,
        training_accuracy: accuracy(&predictions, labels),
    };

    Ok(FitPredictOutcome {
        predictions,
        summary,
    })
}
