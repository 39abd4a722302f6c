//! `GaussianInference`: population hyperparameters from per-image predictions.

use faer::Mat;
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use rand_distr::StandardNormal;

use super::diagnostics::summarize_ensemble;
use super::likelihood::{AnalyticalProbabilityModel, ProbabilityModel};
use super::optimizer::{finite_difference_hessian, minimize_nelder_mead};
use super::posterior::{
    FrequentistFit, McmcFit, build_summary, hyperparameter_labels, summarize_chain,
};
use super::priors::FlatHyperprior;
use super::sampler::run_stretch_ensemble;
use super::types::{
    FrequentistOptions, GaussianInferenceConfig, HierarchicalError, McmcOptions,
    SpreadParameterization,
};
use crate::input::PredictionInput;
use crate::models::matrix_ops::{
    cov_to_std, select_columns, select_rows, select_square, select_submatrix, select_values,
};
use crate::models::population::{GaussianMoments, PopulationSpec, extract_moments};
use crate::utils::{matrix_inverse, matrix_is_finite};

/// Lower bound on raw spreads when the frequentist fit is bounded.
const MIN_BOUNDED_SPREAD_LOG: f64 = -14.0;

/// Predictions and moments restricted to the selected parameters.
struct Selection {
    params: Vec<String>,
    means: Mat<f64>,
    precisions: Vec<Mat<f64>>,
    population: GaussianMoments,
    /// Indices of the selected parameters in `all_parameters`.
    moment_indices: Vec<usize>,
}

impl Selection {
    fn build(
        input: &PredictionInput,
        population: &GaussianMoments,
        config: &GaussianInferenceConfig,
    ) -> Result<Self, HierarchicalError> {
        config.validate()?;
        check_moments("population", population, config.all_parameters.len())?;
        let precisions = input.resolve_precisions()?;

        let n_images = config
            .n_images
            .map_or(input.n_images(), |n| n.min(input.n_images()));
        let image_rows: Vec<usize> = (0..n_images).collect();

        let mut moment_indices = Vec::with_capacity(config.select_parameters.len());
        let mut input_indices = Vec::with_capacity(config.select_parameters.len());
        for name in &config.select_parameters {
            let unknown = || HierarchicalError::UnknownParameter(name.clone());
            moment_indices.push(
                config
                    .all_parameters
                    .iter()
                    .position(|p| p == name)
                    .ok_or_else(unknown)?,
            );
            input_indices.push(input.parameter_index(name).ok_or_else(unknown)?);
        }

        let means = select_columns(&select_rows(&input.means, &image_rows), &input_indices);
        let precisions = select_submatrix(&precisions[..n_images], &input_indices);
        let population = GaussianMoments {
            mean: select_values(&population.mean, &moment_indices),
            covariance: select_square(&population.covariance, &moment_indices),
        };

        Ok(Self {
            params: config.select_parameters.clone(),
            means,
            precisions,
            population,
            moment_indices,
        })
    }

    fn select_training(
        &self,
        training: &GaussianMoments,
        n_all: usize,
    ) -> Result<GaussianMoments, HierarchicalError> {
        check_moments("training", training, n_all)?;
        let selected = GaussianMoments {
            mean: select_values(&training.mean, &self.moment_indices),
            covariance: select_square(&training.covariance, &self.moment_indices),
        };
        for (idx, name) in self.params.iter().enumerate() {
            if !(selected.covariance[(idx, idx)] > 0.0) {
                return Err(HierarchicalError::DegenerateTrainingPrior(name.clone()));
            }
        }
        Ok(selected)
    }
}

fn check_moments(
    label: &'static str,
    moments: &GaussianMoments,
    expected: usize,
) -> Result<(), HierarchicalError> {
    let found = moments.dim();
    if found != expected {
        return Err(HierarchicalError::MomentDimensionMismatch {
            label,
            expected,
            found,
        });
    }
    if moments.covariance.nrows() != expected || moments.covariance.ncols() != expected {
        return Err(HierarchicalError::MomentDimensionMismatch {
            label,
            expected,
            found: moments.covariance.nrows(),
        });
    }
    Ok(())
}

/// Hierarchical Gaussian inference of population means and spreads.
///
/// Hyperparameters are `[means; spreads]` over the selected parameters, with
/// spreads given as raw standard deviations or their logarithm according to
/// the configured `SpreadParameterization`.
#[derive(Debug, Clone)]
pub struct GaussianInference<M = AnalyticalProbabilityModel> {
    model: M,
    hyperprior: FlatHyperprior,
    params: Vec<String>,
    spread: SpreadParameterization,
    true_hyperparameters: Vec<f64>,
    n_images: usize,
}

impl GaussianInference<AnalyticalProbabilityModel> {
    /// Build the closed-form model from explicit moments ordered like
    /// `config.all_parameters`.
    ///
    /// `training` is the population the network was trained on. `population`
    /// describes the evaluated images and only sets the reference truth and
    /// starting point.
    ///
    /// # Errors
    ///
    /// Returns `HierarchicalError` for missing or inconsistent inputs, unknown
    /// parameter names or a degenerate training prior.
    pub fn new(
        input: &PredictionInput,
        training: &GaussianMoments,
        population: &GaussianMoments,
        config: &GaussianInferenceConfig,
    ) -> Result<Self, HierarchicalError> {
        let selection = Selection::build(input, population, config)?;
        let interim = selection.select_training(training, config.all_parameters.len())?;
        let model = AnalyticalProbabilityModel::new(&interim)?;
        Self::from_selection(model, selection, config)
    }

    /// Derive training and population moments from population
    /// specifications.
    ///
    /// # Errors
    ///
    /// Returns `HierarchicalError::Population` if a parameter of
    /// `config.all_parameters` is missing from a specification, and the
    /// errors of [`GaussianInference::new`].
    pub fn from_population_specs(
        input: &PredictionInput,
        training_spec: &PopulationSpec,
        population_spec: &PopulationSpec,
        config: &GaussianInferenceConfig,
    ) -> Result<Self, HierarchicalError> {
        let training = extract_moments(training_spec, &config.all_parameters)?;
        let population = extract_moments(population_spec, &config.all_parameters)?;
        Self::new(input, &training.moments, &population.moments, config)
    }
}

impl<M: ProbabilityModel> GaussianInference<M> {
    /// Use a custom probability model. The model must already describe the
    /// selected parameters; it receives the selected predictions.
    ///
    /// # Errors
    ///
    /// Returns `HierarchicalError` for missing or inconsistent inputs, unknown
    /// parameter names, or predictions the model rejects.
    pub fn with_model(
        model: M,
        input: &PredictionInput,
        population: &GaussianMoments,
        config: &GaussianInferenceConfig,
    ) -> Result<Self, HierarchicalError> {
        let selection = Selection::build(input, population, config)?;
        Self::from_selection(model, selection, config)
    }

    fn from_selection(
        mut model: M,
        selection: Selection,
        config: &GaussianInferenceConfig,
    ) -> Result<Self, HierarchicalError> {
        model.set_predictions(&selection.means, &selection.precisions)?;
        let n_params = selection.params.len();

        let (population_std, _) = cov_to_std(&selection.population.covariance);
        let spreads = population_std.into_iter().map(|s| match config.spread {
            SpreadParameterization::LinearStd => s,
            SpreadParameterization::LogStd => s.ln(),
        });
        let true_hyperparameters = selection
            .population
            .mean
            .iter()
            .copied()
            .chain(spreads)
            .collect();

        let positive_indices = config
            .positive_parameters
            .iter()
            .filter_map(|name| selection.params.iter().position(|p| p == name))
            .collect();

        Ok(Self {
            model,
            hyperprior: FlatHyperprior::new(positive_indices, n_params, config.log_sigma_floor),
            n_images: selection.means.nrows(),
            params: selection.params,
            spread: config.spread,
            true_hyperparameters,
        })
    }

    #[must_use]
    pub fn params(&self) -> &[String] {
        &self.params
    }

    #[must_use]
    pub fn n_params(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub const fn n_images(&self) -> usize {
        self.n_images
    }

    #[must_use]
    pub const fn spread(&self) -> SpreadParameterization {
        self.spread
    }

    /// Population moments of the evaluated images as hyperparameters.
    #[must_use]
    pub fn true_hyperparameters(&self) -> &[f64] {
        &self.true_hyperparameters
    }

    #[must_use]
    pub const fn hyperprior(&self) -> &FlatHyperprior {
        &self.hyperprior
    }

    #[must_use]
    pub const fn model(&self) -> &M {
        &self.model
    }

    #[must_use]
    pub fn hyperparameter_labels(&self) -> Vec<String> {
        hyperparameter_labels(&self.params, self.spread)
    }

    /// Log posterior of `hyperparameters`; `-inf` outside the admissible
    /// region.
    #[must_use]
    pub fn log_posterior(&self, hyperparameters: &[f64]) -> f64 {
        let n_params = self.n_params();
        if hyperparameters.len() != 2 * n_params {
            return f64::NEG_INFINITY;
        }
        match self.spread {
            SpreadParameterization::LogStd => {
                self.model.log_posterior(hyperparameters, &self.hyperprior)
            }
            SpreadParameterization::LinearStd => {
                let (means, sigmas) = hyperparameters.split_at(n_params);
                if sigmas.iter().any(|s| !(*s > 0.0)) {
                    return f64::NEG_INFINITY;
                }
                let log_space: Vec<f64> = means
                    .iter()
                    .copied()
                    .chain(sigmas.iter().map(|s| s.ln()))
                    .collect();
                self.model.log_posterior(&log_space, &self.hyperprior)
            }
        }
    }

    fn bounds(&self) -> Vec<(f64, f64)> {
        let free = (f64::NEG_INFINITY, f64::INFINITY);
        let means = (0..self.n_params()).map(|idx| {
            if self.hyperprior.positive_indices.contains(&idx) {
                (0.0, f64::INFINITY)
            } else {
                free
            }
        });
        let spread = match self.spread {
            SpreadParameterization::LinearStd => (MIN_BOUNDED_SPREAD_LOG.exp(), f64::INFINITY),
            SpreadParameterization::LogStd => free,
        };
        means
            .chain(std::iter::repeat_n(spread, self.n_params()))
            .collect()
    }

    /// Maximum a posteriori estimate with asymptotic uncertainties.
    ///
    /// Minimizes `-2 log posterior` from the true hyperparameters, then
    /// inverts a finite-difference Hessian of the same objective at the
    /// optimum.
    ///
    /// # Errors
    ///
    /// Returns `HierarchicalError` if options are invalid, the optimizer
    /// fails, or the Hessian cannot be inverted.
    pub fn frequentist_asymptotic(
        &self,
        options: &FrequentistOptions,
    ) -> Result<FrequentistFit, HierarchicalError> {
        options.validate()?;
        if self.spread == SpreadParameterization::LogStd {
            log::warn!("hyperprior is uniform in log sigma, not in sigma");
        }
        let objective = |x: &[f64]| -2.0 * self.log_posterior(x);
        let bounds = options.use_bounds.then(|| self.bounds());

        let minimum = minimize_nelder_mead(
            &objective,
            &self.true_hyperparameters,
            bounds.as_deref(),
            &options.optimizer,
        )?;
        if !minimum.converged {
            log::warn!(
                "Nelder-Mead stopped after {} iterations without converging",
                minimum.iterations
            );
        }

        let hessian = finite_difference_hessian(
            &objective,
            &minimum.point,
            options.hessian_step,
            options.hessian_method,
        );
        let covariance = matrix_inverse(&hessian)
            .ok()
            .filter(matrix_is_finite)
            .ok_or_else(|| {
                log::warn!("finite-difference hessian at the optimum is singular");
                HierarchicalError::SingularHessian
            })?;
        let (fit_unc, _) = cov_to_std(&covariance);

        Ok(FrequentistFit {
            summary: build_summary(
                &self.hyperparameter_labels(),
                &self.true_hyperparameters,
                &minimum.point,
                &fit_unc,
            ),
            covariance,
            optimum: minimum.point,
            objective: minimum.value,
            iterations: minimum.iterations,
            converged: minimum.converged,
        })
    }

    /// Initial walker positions: Gaussian jitter around the true
    /// hyperparameters, raw spreads reflected into the positive half-line.
    fn initial_walkers(&self, options: &McmcOptions, rng: &mut StdRng) -> Mat<f64> {
        let n_params = self.n_params();
        let mut walkers = Mat::<f64>::zeros(options.n_walkers, 2 * n_params);
        for walker in 0..options.n_walkers {
            for (col, truth) in self.true_hyperparameters.iter().enumerate() {
                let noise: f64 = rng.sample(StandardNormal);
                let mut value = options.initial_walker_scatter.mul_add(noise, *truth);
                if self.spread == SpreadParameterization::LinearStd && col >= n_params {
                    value = value.abs();
                }
                walkers[(walker, col)] = value;
            }
        }
        walkers
    }

    /// Posterior samples of the hyperparameters from an affine-invariant
    /// ensemble sampler.
    ///
    /// # Errors
    ///
    /// Returns `HierarchicalError::InvalidSchedule` if the sampler options are
    /// invalid for the number of hyperparameters.
    pub fn bayesian_mcmc(&self, options: &McmcOptions) -> Result<McmcFit, HierarchicalError> {
        let ndim = 2 * self.n_params();
        options.validate(ndim)?;
        let mut rng = StdRng::seed_from_u64(options.seed);
        let initial = self.initial_walkers(options, &mut rng);

        let run = run_stretch_ensemble(
            &|h: &[f64]| self.log_posterior(h),
            &initial,
            &options.schedule(),
            &mut rng,
        )?;
        let diagnostics = summarize_ensemble(&run);
        log::debug!(
            "ensemble finished with mean acceptance fraction {:.3}",
            diagnostics.mean_acceptance_fraction
        );

        Ok(McmcFit {
            summary: summarize_chain(
                &self.hyperparameter_labels(),
                &self.true_hyperparameters,
                &run.chain,
            ),
            chain: run.chain,
            log_probs: run.log_probs,
            diagnostics,
        })
    }
}
