//! # Network predictions
//!
//! Defines a light-weight container for per-image network outputs: the
//! ordered parameter names, a mean vector per image, and either precision or
//! covariance matrices per image.
//!
//! # Examples
//!
//! ```
//! use faer::Mat;
//! use lensing_population::PredictionInput;
//!
//! let names = vec!["theta_E".to_string(), "gamma".to_string()];
//! let means = Mat::from_fn(3, 2, |_, j| if j == 0 { 1.0 } else { 2.0 });
//! let precisions = vec![Mat::from_fn(2, 2, |i, j| if i == j { 100.0 } else { 0.0 }); 3];
//! let input = PredictionInput::new(names, means).with_precisions(precisions);
//!
//! assert!(input.validate().is_ok());
//! assert_eq!(input.n_images(), 3);
//! ```
//!
//! ```
//! use faer::Mat;
//! use lensing_population::{InputError, PredictionInput};
//!
//! let names = vec!["theta_E".to_string()];
//! let means = Mat::from_fn(3, 1, |_, _| 1.0);
//! let input = PredictionInput::new(names, means);
//!
//! assert_eq!(input.validate(), Err(InputError::MissingUncertainty));
//! ```

use faer::Mat;
use thiserror::Error;

use crate::models::matrix_ops::symmetrize;
use crate::utils::{matrix_inverse, matrix_is_finite};

/// Errors returned when validating network predictions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("prediction means must have at least one image and one parameter")]
    EmptyPredictions,
    #[error("{names} parameter names given for {columns} mean columns")]
    ParameterCountMismatch { names: usize, columns: usize },
    #[error("duplicate parameter name `{0}`")]
    DuplicateParameter(String),
    #[error("provide per-image precision or covariance matrices")]
    MissingUncertainty,
    #[error("{matrices} uncertainty matrices given for {images} images")]
    ImageCountMismatch { matrices: usize, images: usize },
    #[error("uncertainty matrix of image {image} must be {dim}x{dim}")]
    InvalidMatrixShape { image: usize, dim: usize },
    #[error("prediction means contain non-finite values")]
    NonFiniteMeans,
    #[error("uncertainty matrix of image {image} contains non-finite values")]
    NonFiniteMatrix { image: usize },
    #[error("covariance matrix of image {image} is singular")]
    SingularCovariance { image: usize },
}

#[derive(Debug, Clone)]
pub struct PredictionInput {
    pub parameter_names: Vec<String>,
    /// `(n_images, n_params)` predicted means.
    pub means: Mat<f64>,
    pub precisions: Option<Vec<Mat<f64>>>,
    pub covariances: Option<Vec<Mat<f64>>>,
}

impl PredictionInput {
    #[must_use]
    pub const fn new(parameter_names: Vec<String>, means: Mat<f64>) -> Self {
        Self {
            parameter_names,
            means,
            precisions: None,
            covariances: None,
        }
    }

    #[must_use]
    pub fn with_precisions(mut self, precisions: Vec<Mat<f64>>) -> Self {
        self.precisions = Some(precisions);
        self
    }

    #[must_use]
    pub fn with_covariances(self, covariances: Vec<Mat<f64>>) -> Self {
        Self {
            covariances: Some(covariances),
            ..self
        }
    }

    #[must_use]
    pub fn n_images(&self) -> usize {
        self.means.nrows()
    }

    #[must_use]
    pub fn n_params(&self) -> usize {
        self.means.ncols()
    }

    /// Position of `name` in the parameter ordering.
    #[must_use]
    pub fn parameter_index(&self, name: &str) -> Option<usize> {
        self.parameter_names.iter().position(|p| p == name)
    }

    /// Validate shapes and values of the means and whichever uncertainty
    /// matrices are present.
    ///
    /// # Errors
    ///
    /// Returns `InputError` if inputs are malformed.
    pub fn validate(&self) -> Result<(), InputError> {
        if self.n_images() == 0 || self.n_params() == 0 {
            return Err(InputError::EmptyPredictions);
        }
        if self.parameter_names.len() != self.n_params() {
            return Err(InputError::ParameterCountMismatch {
                names: self.parameter_names.len(),
                columns: self.n_params(),
            });
        }
        for (idx, name) in self.parameter_names.iter().enumerate() {
            if self.parameter_names[..idx].contains(name) {
                return Err(InputError::DuplicateParameter(name.clone()));
            }
        }
        if !matrix_is_finite(&self.means) {
            return Err(InputError::NonFiniteMeans);
        }
        let stack = match (&self.precisions, &self.covariances) {
            (Some(stack), _) | (None, Some(stack)) => stack,
            (None, None) => return Err(InputError::MissingUncertainty),
        };
        self.validate_stack(stack)
    }

    fn validate_stack(&self, stack: &[Mat<f64>]) -> Result<(), InputError> {
        if stack.len() != self.n_images() {
            return Err(InputError::ImageCountMismatch {
                matrices: stack.len(),
                images: self.n_images(),
            });
        }
        let dim = self.n_params();
        for (image, matrix) in stack.iter().enumerate() {
            if matrix.nrows() != dim || matrix.ncols() != dim {
                return Err(InputError::InvalidMatrixShape { image, dim });
            }
            if !matrix_is_finite(matrix) {
                return Err(InputError::NonFiniteMatrix { image });
            }
        }
        Ok(())
    }

    /// Symmetrized precision matrices, inverting covariances when no
    /// precisions were supplied.
    ///
    /// # Errors
    ///
    /// Returns `InputError` if inputs are malformed or a covariance matrix
    /// cannot be inverted.
    pub fn resolve_precisions(&self) -> Result<Vec<Mat<f64>>, InputError> {
        self.validate()?;
        if let Some(precisions) = &self.precisions {
            return Ok(symmetrize(precisions));
        }
        let covariances = self
            .covariances
            .as_ref()
            .ok_or(InputError::MissingUncertainty)?;
        let precisions = covariances
            .iter()
            .enumerate()
            .map(|(image, cov)| {
                matrix_inverse(cov).map_err(|_| InputError::SingularCovariance { image })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(symmetrize(&precisions))
    }
}
