/////////////////////////////////////////////////////////////////////////////////////////////\
//
// Subhalo populations of a main deflector following the DG19 parameterization.
//
// Created on: 19 Oct 2026
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # Substructure
//!
//! Draws NFW subhalos of a host halo: masses from a host-scaled power-law
//! mass function, positions by rejection sampling a cored NFW inside the
//! cylinder `R < 3 theta_E`, `|z| < r_200`, and concentrations from a
//! peak-height relation. The result is written as truncated NFW profiles in
//! angular units to a [`LensModelSink`], optionally together with Sersic
//! light profiles painted onto the heavier subhalos.
//!
//! Distances and densities come from an injected [`Cosmology`].

pub mod concentration;
pub mod cosmology;
pub mod dg19;
pub mod galaxies;
pub mod nfw;
pub mod output;
pub mod power_law;

use thiserror::Error;

pub use concentration::ConcentrationRelation;
pub use cosmology::{
    Cosmology, absolute_to_apparent, distance_modulus, kpc_per_arcsecond, sigma_crit,
};
pub use dg19::{
    HostDeflector, HostGeometry, SourceParameters, SubhaloParameters, SubhaloProperties,
    SubhalosDg19,
};
pub use galaxies::{GalaxyHaloConnection, add_galaxies_in_subhalos, sersic_amplitude};
pub use nfw::{
    TnfwAngular, convert_to_tnfw, cored_nfw_draws, cored_nfw_integral, r_200_from_m,
    rho_nfw_from_m_c, truncation_radius,
};
pub use output::{LensModelSink, LensingInputs, ProfileKwargs};
pub use power_law::{power_law_draw, power_law_integrate};

/// Errors raised while configuring or drawing a subhalo population.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SubstructureError {
    #[error("parameter {name} is invalid: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("mass range must satisfy 0 < m_min < m_max; found [{m_min}, {m_max}]")]
    InvalidMassRange { m_min: f64, m_max: f64 },
    #[error("source redshift {z_source} must exceed lens redshift {z_lens}")]
    InvalidRedshiftOrdering { z_lens: f64, z_source: f64 },
    #[error("expected subhalo count is not a valid Poisson mean: {0}")]
    InvalidPoissonMean(f64),
    #[error("{masses} masses but {positions} positions")]
    PositionCountMismatch { masses: usize, positions: usize },
    #[error(
        "rejection sampling accepted {accepted} of {requested} positions after {rounds} rounds"
    )]
    RejectionSamplingExhausted {
        requested: usize,
        accepted: usize,
        rounds: usize,
    },
}

/// Fail with `InvalidParameter` unless `value` is finite and strictly positive.
pub(crate) fn ensure_positive(name: &'static str, value: f64) -> Result<(), SubstructureError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SubstructureError::InvalidParameter { name, value })
    }
}

/// Fail with `InvalidParameter` unless `value` is finite.
pub(crate) fn ensure_finite(name: &'static str, value: f64) -> Result<(), SubstructureError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SubstructureError::InvalidParameter { name, value })
    }
}
