//! Result types and summary tables for hyperparameter fits.

use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use faer::Mat;
use serde::{Deserialize, Serialize};

use super::diagnostics::ChainDiagnostics;
use super::types::SpreadParameterization;
use crate::utils::{column_means, column_std};

/// One row of a fit summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperparameterEstimate {
    /// `mean_<param>`, `std_<param>` or `log_std_<param>`.
    pub name: String,
    pub truth: f64,
    pub fit: f64,
    pub fit_unc: f64,
}

/// Result of `GaussianInference::frequentist_asymptotic`.
#[derive(Debug, Clone)]
pub struct FrequentistFit {
    pub summary: Vec<HyperparameterEstimate>,
    /// Inverse Hessian of `-2 log posterior` at the optimum.
    pub covariance: Mat<f64>,
    pub optimum: Vec<f64>,
    /// `-2 log posterior` at the optimum.
    pub objective: f64,
    pub iterations: u64,
    pub converged: bool,
}

/// Result of `GaussianInference::bayesian_mcmc`.
#[derive(Debug, Clone)]
pub struct McmcFit {
    pub summary: Vec<HyperparameterEstimate>,
    /// Retained draws, `n_walkers * n_samples` rows, walker-major.
    pub chain: Mat<f64>,
    /// Log posterior of every retained draw, in chain order.
    pub log_probs: Vec<f64>,
    pub diagnostics: ChainDiagnostics,
}

/// Summary labels for the hyperparameters of `params`.
#[must_use]
pub fn hyperparameter_labels(params: &[String], spread: SpreadParameterization) -> Vec<String> {
    let prefix = spread.label_prefix();
    params
        .iter()
        .map(|p| format!("mean_{p}"))
        .chain(params.iter().map(|p| format!("{prefix}_{p}")))
        .collect()
}

/// Zip labels, truths, point estimates and uncertainties into summary rows.
#[must_use]
pub fn build_summary(
    labels: &[String],
    truth: &[f64],
    fit: &[f64],
    fit_unc: &[f64],
) -> Vec<HyperparameterEstimate> {
    labels
        .iter()
        .zip(truth)
        .zip(fit)
        .zip(fit_unc)
        .map(|(((name, &truth), &fit), &fit_unc)| HyperparameterEstimate {
            name: name.clone(),
            truth,
            fit,
            fit_unc,
        })
        .collect()
}

/// Posterior mean and standard deviation (denominator `n`) of every column
/// of a chain.
#[must_use]
pub fn summarize_chain(
    labels: &[String],
    truth: &[f64],
    chain: &Mat<f64>,
) -> Vec<HyperparameterEstimate> {
    let means = column_means(chain);
    let std = column_std(chain, &means);
    build_summary(labels, truth, &means, &std)
}

/// Render a fit summary as a text table using `comfy_table`.
#[must_use]
pub fn render_summary_table(summary: &[HyperparameterEstimate]) -> String {
    let mut table = make_table(&["param", "truth", "fit", "fit_unc"]);
    for row in summary {
        table.add_row(vec![
            Cell::new(&row.name),
            Cell::new(format!("{:.5}", row.truth)),
            Cell::new(format!("{:.5}", row.fit)),
            Cell::new(format!("{:.5}", row.fit_unc)),
        ]);
    }
    table.to_string()
}

fn make_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().map(|h| Cell::new(*h)).collect::<Vec<_>>());
    table
}
