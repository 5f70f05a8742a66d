//! Logistic regression over sparse count features
//!
//! Two classes fit a single sigmoid output; three or more fit a multinomial
//! (softmax) model. The objective is mean log-loss plus an L2 penalty of
//! `||W||^2 / (2 C n)` on the weights (intercepts are not penalized), minimized
//! by full-batch gradient descent with a backtracking line search.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use super::vectorizer::{CountMatrix, SparseRow};
use crate::common::constants::{DEFAULT_INVERSE_REGULARIZATION, DEFAULT_MAX_ITER, DEFAULT_TOLERANCE};
use crate::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticRegressionConfig {
    /// Maximum solver iterations
    pub max_iter: usize,
    /// Stop once the largest gradient component is at or below this
    pub tolerance: f64,
    /// Inverse regularization strength
    pub c: f64,
}

impl Default for LogisticRegressionConfig {
    fn default() -> Self {
        Self {
            max_iter: DEFAULT_MAX_ITER,
            tolerance: DEFAULT_TOLERANCE,
            c: DEFAULT_INVERSE_REGULARIZATION,
        }
    }
}

/// Diagnostics from the last `fit`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitReport {
    pub iterations: usize,
    pub converged: bool,
    pub final_loss: f64,
}

#[derive(Debug, Clone)]
pub struct LogisticRegression {
    config: LogisticRegressionConfig,
    /// Sorted distinct labels
    classes: Vec<String>,
    /// One row per output: 1 for binary, n_classes for multinomial
    pub coefficients: Option<Array2<f64>>,
    pub intercepts: Option<Array1<f64>>,
    /// Objective value after each iteration
    pub loss_history: Vec<f64>,
}

/// Encoded training labels.
enum Targets {
    Binary(Vec<f64>),
    Multinomial(Vec<usize>),
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new(LogisticRegressionConfig::default())
    }
}

impl LogisticRegression {
    pub fn new(config: LogisticRegressionConfig) -> Self {
        Self {
            config,
            classes: Vec::new(),
            coefficients: None,
            intercepts: None,
            loss_history: Vec::new(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn is_multinomial(&self) -> bool {
        self.classes.len() > 2
    }

    fn sigmoid(z: f64) -> f64 {
        if z >= 0.0 {
            1.0 / (1.0 + (-z).exp())
        } else {
            let exp_z = z.exp();
            exp_z / (1.0 + exp_z)
        }
    }

    /// `ln(1 + e^z)` without overflow
    fn softplus(z: f64) -> f64 {
        if z > 0.0 {
            z + (-z).exp().ln_1p()
        } else {
            z.exp().ln_1p()
        }
    }

    fn log_sum_exp(z: &[f64]) -> f64 {
        let max_z = z.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        max_z + z.iter().map(|&v| (v - max_z).exp()).sum::<f64>().ln()
    }

    fn linear(weights: &Array2<f64>, biases: &Array1<f64>, row: &SparseRow) -> Vec<f64> {
        let mut z = biases.to_vec();
        for &(j, v) in row {
            for (k, zk) in z.iter_mut().enumerate() {
                *zk += weights[[k, j]] * v;
            }
        }
        z
    }

    fn penalty(&self, weights: &Array2<f64>, n_samples: f64) -> f64 {
        weights.iter().map(|w| w * w).sum::<f64>() / (2.0 * self.config.c * n_samples)
    }

    /// Objective value only (used by the line search).
    fn loss(&self, x: &CountMatrix, targets: &Targets, weights: &Array2<f64>, biases: &Array1<f64>) -> f64 {
        let n = x.n_rows() as f64;
        let data_loss: f64 = x
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let z = Self::linear(weights, biases, row);
                match targets {
                    Targets::Binary(y) => Self::softplus(z[0]) - y[i] * z[0],
                    Targets::Multinomial(y) => Self::log_sum_exp(&z) - z[y[i]],
                }
            })
            .sum();
        data_loss / n + self.penalty(weights, n)
    }

    /// Objective value and its gradient.
    fn loss_and_gradient(
        &self,
        x: &CountMatrix,
        targets: &Targets,
        weights: &Array2<f64>,
        biases: &Array1<f64>,
    ) -> (f64, Array2<f64>, Array1<f64>) {
        let n = x.n_rows() as f64;
        let mut grad_w = Array2::<f64>::zeros(weights.raw_dim());
        let mut grad_b = Array1::<f64>::zeros(biases.raw_dim());
        let mut data_loss = 0.0;

        for (i, row) in x.rows.iter().enumerate() {
            let z = Self::linear(weights, biases, row);
            let residual: Vec<f64> = match targets {
                Targets::Binary(y) => {
                    data_loss += Self::softplus(z[0]) - y[i] * z[0];
                    vec![Self::sigmoid(z[0]) - y[i]]
                }
                Targets::Multinomial(y) => {
                    let lse = Self::log_sum_exp(&z);
                    data_loss += lse - z[y[i]];
                    z.iter()
                        .enumerate()
                        .map(|(k, &zk)| (zk - lse).exp() - if k == y[i] { 1.0 } else { 0.0 })
                        .collect()
                }
            };

            for (k, &r) in residual.iter().enumerate() {
                grad_b[k] += r;
                for &(j, v) in row {
                    grad_w[[k, j]] += r * v;
                }
            }
        }

        grad_w /= n;
        grad_b /= n;
        grad_w.scaled_add(1.0 / (self.config.c * n), weights);

        (data_loss / n + self.penalty(weights, n), grad_w, grad_b)
    }

    fn encode_targets(&self, labels: &[String]) -> Targets {
        if self.classes.len() == 2 {
            Targets::Binary(
                labels
                    .iter()
                    .map(|l| if *l == self.classes[1] { 1.0 } else { 0.0 })
                    .collect(),
            )
        } else {
            Targets::Multinomial(
                labels
                    .iter()
                    .map(|l| self.classes.binary_search(l).unwrap_or(0))
                    .collect(),
            )
        }
    }

    /// Fit against string labels, one per row of `x`.
    pub fn fit(&mut self, x: &CountMatrix, labels: &[String]) -> Result<FitReport, ModelError> {
        if x.n_rows() == 0 {
            return Err(ModelError::EmptyDataset);
        }
        if labels.len() != x.n_rows() {
            return Err(ModelError::DimensionMismatch {
                expected: x.n_rows(),
                got: labels.len(),
            });
        }

        let classes: BTreeSet<&String> = labels.iter().collect();
        if classes.len() < 2 {
            return Err(ModelError::SingleClass(classes.len()));
        }
        self.classes = classes.into_iter().cloned().collect();
        let targets = self.encode_targets(labels);

        let n_outputs = if self.is_multinomial() { self.classes.len() } else { 1 };
        let mut weights = Array2::<f64>::zeros((n_outputs, x.n_features));
        let mut biases = Array1::<f64>::zeros(n_outputs);
        self.loss_history.clear();

        let mut step = 1.0;
        let mut converged = false;
        let mut iterations = 0;
        let mut loss = f64::INFINITY;

        for iter in 0..self.config.max_iter {
            let (current, grad_w, grad_b) = self.loss_and_gradient(x, &targets, &weights, &biases);
            loss = current;

            let max_grad = grad_w
                .iter()
                .chain(grad_b.iter())
                .fold(0.0_f64, |m, g| m.max(g.abs()));
            if max_grad <= self.config.tolerance {
                debug!("Converged at iteration {}", iter);
                converged = true;
                break;
            }

            let grad_sq: f64 = grad_w.iter().chain(grad_b.iter()).map(|g| g * g).sum();

            // Backtracking (Armijo) line search
            let (next_w, next_b, next_loss) = loop {
                let candidate_w = &weights - &(&grad_w * step);
                let candidate_b = &biases - &(&grad_b * step);
                let candidate = self.loss(x, &targets, &candidate_w, &candidate_b);
                if candidate <= current - 0.5 * step * grad_sq || step < 1e-12 {
                    break (candidate_w, candidate_b, candidate);
                }
                step *= 0.5;
            };

            weights = next_w;
            biases = next_b;
            loss = next_loss;
            self.loss_history.push(loss);
            iterations = iter + 1;
            step = (step * 2.0).min(1e6);
        }

        if !converged {
            warn!(
                max_iter = self.config.max_iter,
                final_loss = loss,
                "Solver reached the iteration limit before converging"
            );
        }

        self.coefficients = Some(weights);
        self.intercepts = Some(biases);

        Ok(FitReport {
            iterations,
            converged,
            final_loss: loss,
        })
    }

    /// Class probabilities, one row per sample, columns in [`classes`](Self::classes) order.
    pub fn predict_proba(&self, x: &CountMatrix) -> Result<Array2<f64>, ModelError> {
        let weights = self.coefficients.as_ref().ok_or(ModelError::NotFitted)?;
        let biases = self.intercepts.as_ref().ok_or(ModelError::NotFitted)?;
        if x.n_features != weights.ncols() {
            return Err(ModelError::DimensionMismatch {
                expected: weights.ncols(),
                got: x.n_features,
            });
        }

        let mut proba = Array2::<f64>::zeros((x.n_rows(), self.classes.len()));
        for (i, row) in x.rows.iter().enumerate() {
            let z = Self::linear(weights, biases, row);
            if self.is_multinomial() {
                let lse = Self::log_sum_exp(&z);
                for (k, zk) in z.iter().enumerate() {
                    proba[[i, k]] = (zk - lse).exp();
                }
            } else {
                let p = Self::sigmoid(z[0]);
                proba[[i, 0]] = 1.0 - p;
                proba[[i, 1]] = p;
            }
        }
        Ok(proba)
    }

    /// Most probable label per row; ties go to the earlier class.
    pub fn predict(&self, x: &CountMatrix) -> Result<Vec<String>, ModelError> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| {
                let best = row
                    .iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (k, &p)| {
                        if p > best.1 {
                            (k, p)
                        } else {
                            best
                        }
                    })
                    .0;
                self.classes[best].clone()
            })
            .collect())
    }
}

/// Fraction of positions where `predicted` equals `actual`.
pub fn accuracy(predicted: &[String], actual: &[String]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let hits = predicted
        .iter()
        .zip(actual.iter())
        .filter(|(p, a)| p == a)
        .count();
    hits as f64 / actual.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::vectorizer::CountVectorizer;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sigmoid_and_softplus_are_stable() {
        assert!((LogisticRegression::sigmoid(0.0) - 0.5).abs() < 1e-10);
        assert!(LogisticRegression::sigmoid(800.0) <= 1.0);
        assert!(LogisticRegression::sigmoid(-800.0) >= 0.0);
        assert!(LogisticRegression::softplus(800.0).is_finite());
        assert!((LogisticRegression::softplus(0.0) - 2f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_binary_fit_separates_signature_words() {
        let docs = [
            "gain in quarterly sales",
            "gain on strong orders",
            "gain after new contract",
            "loss in quarterly sales",
            "loss on weak orders",
            "loss after lost contract",
        ];
        let y = labels(&["positive", "positive", "positive", "negative", "negative", "negative"]);

        let mut vectorizer = CountVectorizer::new();
        let x = vectorizer.fit_transform(&docs).unwrap();
        let mut model = LogisticRegression::default();
        let report = model.fit(&x, &y).unwrap();

        assert!(!model.is_multinomial());
        assert_eq!(model.classes(), &["negative", "positive"]);
        assert!(report.iterations >= 1);
        assert!(report.final_loss < 2f64.ln());
        assert_eq!(model.predict(&x).unwrap(), y);

        let proba = model.predict_proba(&x).unwrap();
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_multinomial_fit() {
        let docs = [
            "shares surge",
            "shares surge higher",
            "shares slump",
            "shares slump lower",
            "shares steady",
            "shares steady today",
        ];
        let y = labels(&[
            "positive", "positive", "negative", "negative", "neutral", "neutral",
        ]);

        let mut vectorizer = CountVectorizer::new();
        let x = vectorizer.fit_transform(&docs).unwrap();
        let mut model = LogisticRegression::default();
        model.fit(&x, &y).unwrap();

        assert!(model.is_multinomial());
        assert_eq!(model.coefficients.as_ref().unwrap().nrows(), 3);
        let predicted = model.predict(&x).unwrap();
        assert_eq!(predicted, y);
        assert_eq!(accuracy(&predicted, &y), 1.0);
    }

    #[test]
    fn test_loss_decreases() {
        let docs = ["up up", "down", "up", "down down"];
        let y = labels(&["pos", "neg", "pos", "neg"]);
        let mut vectorizer = CountVectorizer::new();
        let x = vectorizer.fit_transform(&docs).unwrap();

        let mut model = LogisticRegression::new(LogisticRegressionConfig {
            max_iter: 20,
            tolerance: 0.0,
            c: 1.0,
        });
        let report = model.fit(&x, &y).unwrap();
        assert_eq!(report.iterations, 20);
        assert!(!report.converged);
        for pair in model.loss_history.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-12);
        }
    }

    #[test]
    fn test_fit_errors() {
        let mut vectorizer = CountVectorizer::new();
        let x = vectorizer.fit_transform(&["profit rose", "profit fell"]).unwrap();
        let mut model = LogisticRegression::default();

        assert!(matches!(
            model.fit(&x, &labels(&["positive", "positive"])),
            Err(ModelError::SingleClass(1))
        ));
        assert!(matches!(
            model.fit(&x, &labels(&["positive"])),
            Err(ModelError::DimensionMismatch { expected: 2, got: 1 })
        ));
        let empty = CountMatrix {
            rows: Vec::new(),
            n_features: 2,
        };
        assert!(matches!(model.fit(&empty, &[]), Err(ModelError::EmptyDataset)));
    }

    #[test]
    fn test_predict_before_fit() {
        let model = LogisticRegression::default();
        let x = CountMatrix {
            rows: vec![vec![(0, 1.0)]],
            n_features: 1,
        };
        assert!(matches!(model.predict(&x), Err(ModelError::NotFitted)));
    }
}
