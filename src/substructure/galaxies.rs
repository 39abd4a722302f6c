//! Sersic light profiles painted onto subhalos through a chain of empirical
//! scaling relations: halo mass, stellar mass, luminosity, absolute
//! magnitude, half-light radius and finally the Sersic amplitude.

use std::f64::consts::PI;

use rand::RngExt;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use statrs::function::gamma::gamma;

use super::cosmology::{ARCSEC_PER_RADIAN, Cosmology, absolute_to_apparent};
use super::dg19::SourceParameters;
use super::output::{LensModelSink, ProfileKwargs, SERSIC};

/// Scaling relations and scatters of the galaxy–halo connection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalaxyHaloConnection {
    /// Subhalos lighter than this mass (solar masses) stay dark.
    pub m_min: f64,
    pub sersic_index: f64,
    /// Halo mass whose stellar mass is one solar mass.
    pub reference_mass: f64,
    pub plaw_index: f64,
    pub scatter_dex: f64,
    /// `log10` mass-to-light ratio and its scatter.
    pub gamma_star: f64,
    pub gamma_star_scatter: f64,
    pub mabs_sun: f64,
    /// `r_half [pc] = rhalf_mag_c * exp(rhalf_mag_a * M_abs)`.
    pub rhalf_mag_c: f64,
    pub rhalf_mag_a: f64,
    pub rhalf_scatter_dex: f64,
    pub luminosity_multiplier: f64,
    /// Recover the peak mass from the stripped `m200` before painting.
    pub tidal_stripping: bool,
}

impl Default for GalaxyHaloConnection {
    fn default() -> Self {
        Self {
            m_min: f64::INFINITY,
            sersic_index: 1.0,
            reference_mass: 6e6,
            plaw_index: 2.0,
            scatter_dex: 0.5,
            gamma_star: 0.4,
            gamma_star_scatter: 0.2,
            mabs_sun: 4.74,
            rhalf_mag_c: 15.886,
            rhalf_mag_a: -0.312,
            rhalf_scatter_dex: 0.4,
            luminosity_multiplier: 1.0,
            tidal_stripping: true,
        }
    }
}

/// Sersic amplitude (surface brightness at the half-light radius) of a
/// profile with apparent magnitude `mag_apparent`, half-light radius
/// `r_sersic` in arcseconds and index `n_sersic`.
#[must_use]
pub fn sersic_amplitude(mag_apparent: f64, ab_zeropoint: f64, r_sersic: f64, n_sersic: f64) -> f64 {
    let flux = 10f64.powf(-0.4 * (mag_apparent - ab_zeropoint));
    let b_n = 1.9992f64.mul_add(n_sersic, -0.3271);
    let flux_per_amplitude =
        2.0 * PI * n_sersic * r_sersic.powi(2) * b_n.exp() * gamma(2.0 * n_sersic)
            / b_n.powf(2.0 * n_sersic);
    flux / flux_per_amplitude
}

/// Paint a Sersic light profile, centred on its subhalo, onto every subhalo
/// at least as heavy as `connection.m_min`, and append the profiles to
/// `sink` as light models.
///
/// `subhalo_kwargs` must carry `center_x` and `center_y`; subhalos without
/// a center are skipped.
#[allow(clippy::too_many_arguments)]
pub fn add_galaxies_in_subhalos<S, C>(
    sink: &mut S,
    masses: &[f64],
    subhalo_kwargs: &[ProfileKwargs],
    redshifts: &[f64],
    connection: &GalaxyHaloConnection,
    source: &SourceParameters,
    cosmology: &C,
    rng: &mut StdRng,
) where
    S: LensModelSink + ?Sized,
    C: Cosmology + ?Sized,
{
    let heaviest = masses
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(idx, _)| idx);

    let mut models = Vec::new();
    let mut kwargs = Vec::new();
    let subhalos = masses.iter().zip(subhalo_kwargs).zip(redshifts);
    for (idx, ((&mass, lens), &redshift)) in subhalos.enumerate() {
        if mass < connection.m_min {
            continue;
        }
        let (Some(&center_x), Some(&center_y)) = (lens.get("center_x"), lens.get("center_y")) else {
            continue;
        };

        let mut normal = || -> f64 { rng.sample(StandardNormal) };

        let mut peak_mass = mass;
        if connection.tidal_stripping {
            peak_mass *= 2.0 * 10f64.powf(0.2 * normal());
        }

        let mass_stars = (peak_mass / connection.reference_mass).powf(connection.plaw_index)
            * 10f64.powf(connection.scatter_dex * normal());
        let luminosity = mass_stars
            / 10f64.powf(connection.gamma_star_scatter.mul_add(normal(), connection.gamma_star));
        let mag_absolute = 2.5f64.mul_add(-luminosity.log10(), connection.mabs_sun);

        let rhalf_parsec = connection.rhalf_mag_c
            * (connection.rhalf_mag_a * mag_absolute).exp()
            * 10f64.powf(connection.rhalf_scatter_dex * normal());
        let distance_parsec = cosmology.angular_diameter_distance(redshift) * 1e6;
        let r_sersic = ARCSEC_PER_RADIAN * rhalf_parsec / distance_parsec;

        let mag_apparent = absolute_to_apparent(mag_absolute, redshift, cosmology);
        let amp = sersic_amplitude(
            mag_apparent,
            source.output_ab_zeropoint,
            r_sersic,
            connection.sersic_index,
        ) * connection.luminosity_multiplier;

        if heaviest == Some(idx) {
            log::debug!(
                "Heaviest painted subhalo: mass {peak_mass:.3e}, mstar {mass_stars:.3e}, \
                 Mabs {mag_absolute:.3}, rhalf {rhalf_parsec:.3} pc, mapp {mag_apparent:.3}, \
                 center ({center_x:.2}, {center_y:.2})"
            );
        }

        models.push(SERSIC.to_string());
        kwargs.push(ProfileKwargs::from([
            ("amp".to_string(), amp),
            ("R_sersic".to_string(), r_sersic),
            ("n_sersic".to_string(), connection.sersic_index),
            ("center_x".to_string(), center_x),
            ("center_y".to_string(), center_y),
        ]));
    }

    sink.add_lens_light(models, kwargs);
}
