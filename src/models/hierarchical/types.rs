//! Core public types for hierarchical Gaussian inference.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::names::{DEFAULT_PARAMETERS, MARCH_2022_PARAMETERS, long_name};
use crate::inference::{EnsembleSchedule, InferenceError};
use crate::input::InputError;
use crate::models::population::PopulationError;

/// Errors returned by hierarchical inference construction and fitting.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HierarchicalError {
    #[error(transparent)]
    InvalidInput(#[from] InputError),
    #[error(transparent)]
    Population(#[from] PopulationError),
    #[error(transparent)]
    InvalidSchedule(#[from] InferenceError),
    #[error("at least one parameter must be selected")]
    EmptySelection,
    #[error("parameter `{0}` is not among the known parameters")]
    UnknownParameter(String),
    #[error("parameter `{0}` is selected more than once")]
    DuplicateParameter(String),
    #[error("{label} moments have {found} entries; expected {expected}")]
    MomentDimensionMismatch {
        label: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("n_images must be positive")]
    InvalidImageCount,
    #[error("log-sigma floor must be finite; found {0}")]
    InvalidLogFloor(f64),
    #[error("training prior variance of `{0}` must be positive")]
    DegenerateTrainingPrior(String),
    #[error("training prior covariance is not positive definite")]
    InterimPriorNotPositiveDefinite,
    #[error("precision matrix of image {image} is not positive definite")]
    PrecisionNotPositiveDefinite { image: usize },
    #[error("{precisions} precision matrices given for {images} images")]
    PredictionCountMismatch { precisions: usize, images: usize },
    #[error("hyperparameter vector has {found} entries; expected {expected}")]
    HyperparameterDimension { expected: usize, found: usize },
    #[error("hessian step must be finite and positive; found {0}")]
    InvalidHessianStep(f64),
    #[error("invalid Nelder-Mead settings")]
    InvalidOptimizerOptions,
    #[error("optimizer failed: {0}")]
    OptimizerFailed(String),
    #[error("hessian of the objective is singular at the optimum")]
    SingularHessian,
}

/// How population spreads are represented in the hyperparameter vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpreadParameterization {
    /// Raw standard deviations; the hyperprior is uniform in sigma.
    #[default]
    LinearStd,
    /// Natural log of the standard deviations; the hyperprior is uniform in log sigma.
    LogStd,
}

impl SpreadParameterization {
    /// Summary label prefix for spread hyperparameters.
    #[must_use]
    pub const fn label_prefix(self) -> &'static str {
        match self {
            Self::LinearStd => "std",
            Self::LogStd => "log_std",
        }
    }
}

/// Parameter bookkeeping for a `GaussianInference`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianInferenceConfig {
    /// Parameter ordering of the training and population moments.
    pub all_parameters: Vec<String>,
    /// Parameters to infer, in the order hyperparameters are reported.
    pub select_parameters: Vec<String>,
    /// Parameters whose population mean must stay non-negative. Names absent
    /// from the selection are ignored.
    pub positive_parameters: Vec<String>,
    pub spread: SpreadParameterization,
    /// Use only the first `n_images` images.
    pub n_images: Option<usize>,
    /// Lower bound on log sigma accepted by the hyperprior.
    pub log_sigma_floor: f64,
}

impl Default for GaussianInferenceConfig {
    fn default() -> Self {
        Self {
            all_parameters: MARCH_2022_PARAMETERS.iter().map(ToString::to_string).collect(),
            select_parameters: DEFAULT_PARAMETERS.iter().map(ToString::to_string).collect(),
            positive_parameters: ["theta_E", "gamma"]
                .iter()
                .filter_map(|short| long_name(short))
                .map(ToString::to_string)
                .collect(),
            spread: SpreadParameterization::LinearStd,
            n_images: None,
            log_sigma_floor: -15.0,
        }
    }
}

impl GaussianInferenceConfig {
    /// # Errors
    ///
    /// Returns `HierarchicalError` if the selection is empty, contains
    /// duplicates or unknown names, or numeric settings are invalid.
    pub fn validate(&self) -> Result<(), HierarchicalError> {
        if self.select_parameters.is_empty() {
            return Err(HierarchicalError::EmptySelection);
        }
        for (idx, name) in self.select_parameters.iter().enumerate() {
            if self.select_parameters[..idx].contains(name) {
                return Err(HierarchicalError::DuplicateParameter(name.clone()));
            }
            if !self.all_parameters.contains(name) {
                return Err(HierarchicalError::UnknownParameter(name.clone()));
            }
        }
        if self.n_images == Some(0) {
            return Err(HierarchicalError::InvalidImageCount);
        }
        if !self.log_sigma_floor.is_finite() {
            return Err(HierarchicalError::InvalidLogFloor(self.log_sigma_floor));
        }
        Ok(())
    }
}

/// Finite-difference stencil used for the Hessian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HessianMethod {
    #[default]
    Central,
    Forward,
    Backward,
}

/// Settings for the Nelder-Mead simplex search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NelderMeadOptions {
    pub max_iters: u64,
    /// Stop once the standard deviation of simplex costs drops below this.
    pub sd_tolerance: f64,
    /// Relative size of the initial simplex around the starting point.
    pub initial_step: f64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            max_iters: 20_000,
            sd_tolerance: 1e-10,
            initial_step: 0.05,
        }
    }
}

impl NelderMeadOptions {
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.max_iters > 0
            && self.sd_tolerance.is_finite()
            && self.sd_tolerance >= 0.0
            && self.initial_step.is_finite()
            && self.initial_step > 0.0
    }
}

/// Configuration for `GaussianInference::frequentist_asymptotic`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequentistOptions {
    /// Keep positive means at or above zero and spreads at or above
    /// `exp(-14)` during the search.
    pub use_bounds: bool,
    pub hessian_step: f64,
    pub hessian_method: HessianMethod,
    pub optimizer: NelderMeadOptions,
}

impl Default for FrequentistOptions {
    fn default() -> Self {
        Self {
            use_bounds: false,
            hessian_step: 1e-4,
            hessian_method: HessianMethod::Central,
            optimizer: NelderMeadOptions::default(),
        }
    }
}

impl FrequentistOptions {
    /// # Errors
    ///
    /// Returns `HierarchicalError` if the Hessian step or optimizer settings
    /// are invalid.
    pub fn validate(&self) -> Result<(), HierarchicalError> {
        if !(self.hessian_step > 0.0) || !self.hessian_step.is_finite() {
            return Err(HierarchicalError::InvalidHessianStep(self.hessian_step));
        }
        if !self.optimizer.is_valid() {
            return Err(HierarchicalError::InvalidOptimizerOptions);
        }
        Ok(())
    }
}

/// Configuration for `GaussianInference::bayesian_mcmc`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct McmcOptions {
    /// Standard deviation of the Gaussian jitter around the true
    /// hyperparameters used to start the walkers.
    pub initial_walker_scatter: f64,
    pub n_samples: usize,
    pub n_burnin: usize,
    pub n_walkers: usize,
    pub stretch_scale: f64,
    pub seed: u64,
}

impl Default for McmcOptions {
    fn default() -> Self {
        let schedule = EnsembleSchedule::default();
        Self {
            initial_walker_scatter: 1e-3,
            n_samples: schedule.n_samples,
            n_burnin: schedule.n_burnin,
            n_walkers: schedule.n_walkers,
            stretch_scale: schedule.stretch_scale,
            seed: schedule.seed,
        }
    }
}

impl McmcOptions {
    #[must_use]
    pub const fn schedule(&self) -> EnsembleSchedule {
        EnsembleSchedule {
            n_walkers: self.n_walkers,
            n_burnin: self.n_burnin,
            n_samples: self.n_samples,
            stretch_scale: self.stretch_scale,
            seed: self.seed,
        }
    }

    /// # Errors
    ///
    /// Returns `HierarchicalError::InvalidSchedule` if the schedule does not
    /// suit a `dimension`-dimensional target or the scatter is invalid.
    pub fn validate(&self, dimension: usize) -> Result<(), HierarchicalError> {
        if !(self.initial_walker_scatter >= 0.0) || !self.initial_walker_scatter.is_finite() {
            return Err(InferenceError::InvalidWalkerScatter(self.initial_walker_scatter).into());
        }
        self.schedule().validate(dimension)?;
        Ok(())
    }
}
