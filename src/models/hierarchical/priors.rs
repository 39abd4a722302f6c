//! Flat hyperprior over population means and log spreads.

use serde::{Deserialize, Serialize};

/// Uniform hyperprior restricted to an admissible region.
///
/// The hyperparameter vector is `[means; log_sigmas]`. The density is zero
/// (log density `-inf`) when a masked mean is negative or a log sigma falls
/// below `log_sigma_floor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatHyperprior {
    pub positive_indices: Vec<usize>,
    pub n_params: usize,
    pub log_sigma_floor: f64,
}

impl FlatHyperprior {
    #[must_use]
    pub const fn new(positive_indices: Vec<usize>, n_params: usize, log_sigma_floor: f64) -> Self {
        Self {
            positive_indices,
            n_params,
            log_sigma_floor,
        }
    }

    /// Number of hyperparameters this prior is defined over.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        2 * self.n_params
    }

    #[must_use]
    pub fn log_density(&self, hyperparameters: &[f64]) -> f64 {
        if hyperparameters.len() != self.dimension() {
            return f64::NEG_INFINITY;
        }
        if self
            .positive_indices
            .iter()
            .any(|&idx| hyperparameters[idx] < 0.0)
        {
            return f64::NEG_INFINITY;
        }
        if hyperparameters[self.n_params..]
            .iter()
            .any(|&log_sigma| log_sigma < self.log_sigma_floor)
        {
            return f64::NEG_INFINITY;
        }
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prior() -> FlatHyperprior {
        FlatHyperprior::new(vec![0], 2, -15.0)
    }

    #[test]
    fn admissible_point_has_zero_log_density() {
        assert_eq!(prior().log_density(&[1.0, -3.0, -2.0, -2.0]), 0.0);
    }

    #[test]
    fn negative_masked_mean_is_excluded() {
        assert_eq!(
            prior().log_density(&[-1e-9, 0.0, 0.0, 0.0]),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn unmasked_mean_may_be_negative() {
        assert_eq!(prior().log_density(&[0.0, -5.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn log_sigma_below_floor_is_excluded() {
        assert_eq!(
            prior().log_density(&[1.0, 1.0, -15.5, 0.0]),
            f64::NEG_INFINITY
        );
        assert_eq!(prior().log_density(&[1.0, 1.0, -15.0, 0.0]), 0.0);
    }

    #[test]
    fn wrong_length_is_excluded() {
        assert_eq!(prior().log_density(&[1.0, 1.0]), f64::NEG_INFINITY);
    }
}
