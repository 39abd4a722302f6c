//! # Models
//!
//! Statistical models for lens populations: matrix helpers shared by the
//! inference code, analytic moments of population specifications, and the
//! hierarchical Gaussian inference engine.

pub mod hierarchical;
pub mod matrix_ops;
pub mod population;
