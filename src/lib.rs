#![forbid(unsafe_code)]

//! # `lensing_population`
//!
//! Population-level inference and simulation for strong-lensing surveys:
//! hierarchical Gaussian inference of lens-population hyperparameters from
//! per-image network predictions, and DG19 subhalo populations rendered as
//! truncated NFW lens profiles.
//!
//! The crate has no I/O and no cosmology of its own. Predictions arrive as
//! `faer` matrices, distances come from an injected
//! [`substructure::Cosmology`], and drawn profiles are appended to a
//! caller-owned [`substructure::LensModelSink`].

pub mod inference;
pub mod input;
pub mod models;
pub mod substructure;
pub mod utils;

pub use inference::{EnsembleSchedule, InferenceError, ProposalStats};
pub use input::{InputError, PredictionInput};
pub mod matrix_ops {
    pub use crate::models::matrix_ops::*;
}

pub use models::population::{
    DistributionFamily, DistributionSpec, GaussianMoments, MomentWarning, ParameterSampler,
    PopulationError, PopulationMoments, PopulationSpec, ScalarDistribution, extract_moments,
};

pub use models::hierarchical::{
    AnalyticalProbabilityModel, ChainDiagnostics, FlatHyperprior, FrequentistFit,
    FrequentistOptions, GaussianInference, GaussianInferenceConfig, HessianMethod,
    HierarchicalError, HyperparameterEstimate, McmcFit, McmcOptions, NelderMeadOptions,
    ProbabilityModel, SpreadParameterization, render_summary_table,
};

pub use substructure::{
    Cosmology, GalaxyHaloConnection, HostDeflector, LensModelSink, LensingInputs,
    ProfileKwargs, SourceParameters, SubhaloParameters, SubhalosDg19, SubstructureError,
};
