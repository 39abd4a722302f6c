//! Per-image evidence under a Gaussian population model.
//!
//! Each network prediction `(mu_i, P_i)` is a posterior over the latent
//! parameters of image `i` obtained under the training (interim) population
//! `N(mu_int, P_int^-1)`. Reweighting to a candidate population
//! `N(mu_omega, P_omega^-1)` and marginalizing the latent values gives a
//! closed-form evidence per image:
//!
//! ```text
//! P_c   = P_i + P_omega - P_int
//! eta_c = P_i mu_i + P_omega mu_omega - P_int mu_int
//! log Z = 1/2 [log|P_i| + log|P_omega| - log|P_int| - log|P_c|]
//!       - 1/2 [mu_i' P_i mu_i + mu_omega' P_omega mu_omega - mu_int' P_int mu_int]
//!       + 1/2 eta_c' P_c^-1 eta_c
//! ```

use faer::Mat;

use super::priors::FlatHyperprior;
use super::types::HierarchicalError;
use crate::models::population::GaussianMoments;
use crate::utils::{
    cholesky, inverse_quadratic_form, log_det_from_cholesky, mat_vec, matrix_inverse,
};

/// Log posterior over population hyperparameters given per-image predictions.
///
/// Hyperparameters are always `[means; log_sigmas]`. Implementations must be
/// pure so that walkers can be evaluated concurrently.
pub trait ProbabilityModel: Send + Sync {
    /// Replace the per-image predictions.
    ///
    /// # Errors
    ///
    /// Returns `HierarchicalError` if the predictions are inconsistent with
    /// the model dimension or a precision matrix is not positive definite.
    fn set_predictions(
        &mut self,
        means: &Mat<f64>,
        precisions: &[Mat<f64>],
    ) -> Result<(), HierarchicalError>;

    fn log_posterior(&self, hyperparameters: &[f64], hyperprior: &FlatHyperprior) -> f64;
}

#[derive(Debug, Clone)]
struct ImageTerms {
    precision: Mat<f64>,
    /// `P_i mu_i`.
    eta: Vec<f64>,
    /// `mu_i' P_i mu_i`.
    quad: f64,
    log_det: f64,
}

/// Closed-form hierarchical Gaussian model.
#[derive(Debug, Clone)]
pub struct AnalyticalProbabilityModel {
    interim_precision: Mat<f64>,
    interim_eta: Vec<f64>,
    interim_quad: f64,
    interim_log_det: f64,
    images: Vec<ImageTerms>,
}

impl AnalyticalProbabilityModel {
    /// # Errors
    ///
    /// Returns `HierarchicalError::InterimPriorNotPositiveDefinite` if the
    /// training covariance cannot be inverted into a positive-definite
    /// precision.
    pub fn new(interim: &GaussianMoments) -> Result<Self, HierarchicalError> {
        let dim = interim.dim();
        if interim.covariance.nrows() != dim || interim.covariance.ncols() != dim {
            return Err(HierarchicalError::MomentDimensionMismatch {
                label: "training",
                expected: dim,
                found: interim.covariance.nrows(),
            });
        }
        let precision = matrix_inverse(&interim.covariance)
            .map_err(|_| HierarchicalError::InterimPriorNotPositiveDefinite)?;
        let precision = crate::models::matrix_ops::symmetrize_matrix(&precision);
        let factor =
            cholesky(&precision).ok_or(HierarchicalError::InterimPriorNotPositiveDefinite)?;
        let eta = mat_vec(&precision, &interim.mean);
        let quad = dot(&eta, &interim.mean);
        Ok(Self {
            interim_log_det: log_det_from_cholesky(&factor),
            interim_precision: precision,
            interim_eta: eta,
            interim_quad: quad,
            images: Vec::new(),
        })
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.interim_eta.len()
    }

    #[must_use]
    pub fn n_images(&self) -> usize {
        self.images.len()
    }

    /// Sum of per-image log evidences, without the hyperprior.
    #[must_use]
    pub fn log_likelihood(&self, hyperparameters: &[f64]) -> f64 {
        let dim = self.dim();
        if hyperparameters.len() != 2 * dim {
            return f64::NEG_INFINITY;
        }
        let (mu_omega, log_sigma) = hyperparameters.split_at(dim);
        let p_omega: Vec<f64> = log_sigma.iter().map(|ls| (-2.0 * ls).exp()).collect();
        let omega_log_det: f64 = p_omega.iter().map(|p| p.ln()).sum();
        let omega_quad: f64 = mu_omega
            .iter()
            .zip(&p_omega)
            .map(|(mu, p)| mu * mu * p)
            .sum();
        let omega_eta: Vec<f64> = mu_omega.iter().zip(&p_omega).map(|(mu, p)| mu * p).collect();

        let mut total = 0.0;
        for image in &self.images {
            let combined = Mat::from_fn(dim, dim, |i, j| {
                let omega = if i == j { p_omega[i] } else { 0.0 };
                image.precision[(i, j)] + omega - self.interim_precision[(i, j)]
            });
            let Some(factor) = cholesky(&combined) else {
                return f64::NEG_INFINITY;
            };
            let eta: Vec<f64> = (0..dim)
                .map(|k| image.eta[k] + omega_eta[k] - self.interim_eta[k])
                .collect();
            let eta_quad = inverse_quadratic_form(&factor, &eta);

            let log_dets = image.log_det + omega_log_det
                - self.interim_log_det
                - log_det_from_cholesky(&factor);
            let quads = image.quad + omega_quad - self.interim_quad;
            total += 0.5 * (log_dets - quads + eta_quad);
        }
        if total.is_nan() {
            return f64::NEG_INFINITY;
        }
        total
    }
}

impl ProbabilityModel for AnalyticalProbabilityModel {
    fn set_predictions(
        &mut self,
        means: &Mat<f64>,
        precisions: &[Mat<f64>],
    ) -> Result<(), HierarchicalError> {
        let dim = self.dim();
        if means.ncols() != dim {
            return Err(HierarchicalError::MomentDimensionMismatch {
                label: "prediction",
                expected: dim,
                found: means.ncols(),
            });
        }
        if precisions.len() != means.nrows() {
            return Err(HierarchicalError::PredictionCountMismatch {
                precisions: precisions.len(),
                images: means.nrows(),
            });
        }
        self.images = precisions
            .iter()
            .enumerate()
            .map(|(image, precision)| {
                let factor = cholesky(precision)
                    .ok_or(HierarchicalError::PrecisionNotPositiveDefinite { image })?;
                let mean: Vec<f64> = (0..dim).map(|k| means[(image, k)]).collect();
                let eta = mat_vec(precision, &mean);
                Ok(ImageTerms {
                    quad: dot(&eta, &mean),
                    eta,
                    log_det: log_det_from_cholesky(&factor),
                    precision: precision.clone(),
                })
            })
            .collect::<Result<Vec<_>, HierarchicalError>>()?;
        Ok(())
    }

    fn log_posterior(&self, hyperparameters: &[f64], hyperprior: &FlatHyperprior) -> f64 {
        let prior = hyperprior.log_density(hyperparameters);
        if prior == f64::NEG_INFINITY {
            return prior;
        }
        prior + self.log_likelihood(hyperparameters)
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
