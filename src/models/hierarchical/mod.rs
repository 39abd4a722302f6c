//! Hierarchical Gaussian inference of lens-population hyperparameters.
//!
//! A neural network returns, for every image, a Gaussian posterior
//! `(mean, precision)` over the lens parameters. Those posteriors were
//! obtained under the training population; this module reweights them to a
//! Gaussian population with free means and spreads and estimates those
//! hyperparameters either by a local MAP fit with asymptotic errors or by
//! ensemble MCMC.

pub mod diagnostics;
pub mod engine;
pub mod likelihood;
pub mod names;
pub mod optimizer;
pub mod posterior;
pub mod priors;
pub mod sampler;
pub mod types;

pub use diagnostics::{ChainDiagnostics, integrated_autocorrelation_time, summarize_ensemble};
pub use engine::GaussianInference;
pub use likelihood::{AnalyticalProbabilityModel, ProbabilityModel};
pub use names::{DEFAULT_PARAMETERS, MARCH_2022_PARAMETERS, long_name, short_name};
pub use optimizer::{Minimum, finite_difference_hessian, minimize_nelder_mead};
pub use posterior::{
    FrequentistFit, HyperparameterEstimate, McmcFit, build_summary, hyperparameter_labels,
    render_summary_table, summarize_chain,
};
pub use priors::FlatHyperprior;
pub use sampler::{EnsembleRun, run_stretch_ensemble};
pub use types::{
    FrequentistOptions, GaussianInferenceConfig, HessianMethod, HierarchicalError, McmcOptions,
    NelderMeadOptions, SpreadParameterization,
};
