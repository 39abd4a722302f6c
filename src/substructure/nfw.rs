//! NFW profile helpers: sizes, normalizations, cored radial draws and the
//! conversion of physical truncated-NFW parameters to angular units.

use std::f64::consts::PI;

use rand::RngExt;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use super::cosmology::{Cosmology, kpc_per_arcsecond, sigma_crit};
use crate::utils::usize_to_f64;

/// Grid points of the tabulated cored-NFW CDF.
const CDF_GRID_POINTS: usize = 1_000;

/// Pivot mass of the truncation-radius relation in solar masses.
pub const TRUNCATION_MASS_PIVOT: f64 = 1e7;
/// Pivot radius of the truncation-radius relation in kpc.
pub const TRUNCATION_RADIUS_PIVOT: f64 = 50.0;

/// `r_200` in kpc of a halo with mass `m200` (solar masses) at `z`.
#[must_use]
pub fn r_200_from_m<C: Cosmology + ?Sized>(m200: f64, z: f64, cosmology: &C) -> f64 {
    let rho_200 = 200.0 * cosmology.critical_density(z);
    (3.0 * m200 / (4.0 * PI * rho_200)).cbrt()
}

/// Characteristic NFW density in solar masses per kpc^3 for a halo of mass
/// `m200`, concentration `c` and scale radius `r_scale` (kpc).
#[must_use]
pub fn rho_nfw_from_m_c(m200: f64, c: f64, r_scale: f64) -> f64 {
    m200 / (4.0 * PI * r_scale.powi(3) * (c.ln_1p() - c / (1.0 + c)))
}

/// Enclosed-mass integral `int_0^r rho(r') r'^2 dr'` of an NFW profile whose
/// density is held constant at its `r_tidal` value inside `r_tidal`.
#[must_use]
pub fn cored_nfw_integral(r_tidal: f64, rho_nfw: f64, r_scale: f64, r_upper: &[f64]) -> Vec<f64> {
    let x_tidal = r_tidal / r_scale;
    let core_density = rho_nfw / (x_tidal * (1.0 + x_tidal).powi(2));
    let nfw_primitive = |x: f64| (x + 1.0).recip() + x.ln_1p();

    r_upper
        .iter()
        .map(|&r| {
            let core = core_density * r.min(r_tidal).powi(3) / 3.0;
            if r > r_tidal {
                let x = r / r_scale;
                core + rho_nfw * r_scale.powi(3) * (nfw_primitive(x) - nfw_primitive(x_tidal))
            } else {
                core
            }
        })
        .collect()
}

/// Radial draws from a cored NFW truncated at `r_max`.
///
/// The CDF is tabulated on an even grid over `[0, r_max]` and inverted by
/// linear interpolation.
#[must_use]
pub fn cored_nfw_draws(
    r_tidal: f64,
    rho_nfw: f64,
    r_scale: f64,
    r_max: f64,
    n_draws: usize,
    rng: &mut StdRng,
) -> Vec<f64> {
    let step = r_max / usize_to_f64(CDF_GRID_POINTS - 1);
    let grid: Vec<f64> = (0..CDF_GRID_POINTS)
        .map(|idx| usize_to_f64(idx) * step)
        .collect();
    let mut cdf = cored_nfw_integral(r_tidal, rho_nfw, r_scale, &grid);
    let total = cdf[CDF_GRID_POINTS - 1];
    for value in &mut cdf {
        *value /= total;
    }

    (0..n_draws)
        .map(|_| invert_tabulated_cdf(&grid, &cdf, rng.random::<f64>()).min(r_max))
        .collect()
}

fn invert_tabulated_cdf(grid: &[f64], cdf: &[f64], u: f64) -> f64 {
    let upper = cdf.partition_point(|&p| p < u).clamp(1, cdf.len() - 1);
    let lower = upper - 1;
    let width = cdf[upper] - cdf[lower];
    if width <= 0.0 {
        return grid[upper];
    }
    let t = (u - cdf[lower]) / width;
    t.mul_add(grid[upper] - grid[lower], grid[lower])
}

/// Truncation radius in kpc of a subhalo of mass `m200` at radius `r` (kpc)
/// inside its host.
#[must_use]
pub fn truncation_radius(m200: f64, r: f64, m_pivot: f64, r_pivot: f64) -> f64 {
    1.4 * (m200 / m_pivot).cbrt() * (r / r_pivot).powf(2.0 / 3.0)
}

/// Truncated-NFW parameters in angular units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TnfwAngular {
    /// Scale radius in arcseconds.
    pub rs_angle: f64,
    /// Deflection at the scale radius in arcseconds.
    pub alpha_rs: f64,
    /// Truncation radius in arcseconds.
    pub r_trunc_angle: f64,
}

/// Convert a physical truncated NFW (`r_scale`, `r_trunc` in kpc, `rho_nfw`
/// in solar masses per kpc^3) at `z_lens` to angular units for a source at
/// `z_source`.
#[must_use]
pub fn convert_to_tnfw<C: Cosmology + ?Sized>(
    r_scale: f64,
    z_lens: f64,
    rho_nfw: f64,
    r_trunc: f64,
    z_source: f64,
    cosmology: &C,
) -> TnfwAngular {
    let kpc_per_arcsec = kpc_per_arcsecond(z_lens, cosmology);
    let sigma_crit = sigma_crit(z_lens, z_source, cosmology);
    let alpha_rs = rho_nfw * (4.0 * r_scale.powi(2) * (1.0 + 0.5f64.ln()));
    TnfwAngular {
        rs_angle: r_scale / kpc_per_arcsec,
        alpha_rs: alpha_rs / sigma_crit / kpc_per_arcsec,
        r_trunc_angle: r_trunc / kpc_per_arcsec,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substructure::cosmology::ARCSEC_PER_RADIAN;
    use crate::substructure::cosmology::tests::StaticCosmology;
    use approx::assert_relative_eq;
    use rand::SeedableRng;

    #[test]
    fn r_200_encloses_two_hundred_times_critical_density() {
        let cosmology = StaticCosmology::default();
        let r200 = r_200_from_m(1e12, 0.5, &cosmology);
        let mean_density = 1e12 / (4.0 / 3.0 * PI * r200.powi(3));
        assert_relative_eq!(mean_density, 200.0 * 200.0, max_relative = 1e-10);
    }

    #[test]
    fn nfw_density_integrates_to_m200() {
        let (m200, c, rs) = (1e12, 8.0, 25.0);
        let rho = rho_nfw_from_m_c(m200, c, rs);
        // Tidal radius far inside the profile: the core holds negligible mass.
        let tiny = 1e-9;
        let enclosed = cored_nfw_integral(tiny, rho, rs, &[c * rs])[0];
        assert_relative_eq!(4.0 * PI * enclosed, m200, max_relative = 1e-6);
    }

    #[test]
    fn cored_integral_is_continuous_at_tidal_radius() {
        let below = cored_nfw_integral(10.0, 1e6, 20.0, &[10.0 - 1e-9])[0];
        let above = cored_nfw_integral(10.0, 1e6, 20.0, &[10.0 + 1e-9])[0];
        assert_relative_eq!(below, above, max_relative = 1e-6);
        let values = cored_nfw_integral(10.0, 1e6, 20.0, &[0.0, 5.0, 10.0, 50.0, 100.0]);
        assert_eq!(values[0], 0.0);
        assert!(values.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn cored_draws_stay_below_r_max() {
        let mut rng = StdRng::seed_from_u64(17);
        let draws = cored_nfw_draws(150.0, 1e6, 40.0, 320.0, 5_000, &mut rng);
        assert_eq!(draws.len(), 5_000);
        assert!(draws.iter().all(|r| (0.0..=320.0).contains(r)));
        // The r^2 weighting pushes most of the mass outside the core.
        let inner = draws.iter().filter(|&&r| r < 50.0).count();
        assert!(inner < 500);
    }

    #[test]
    fn truncation_radius_at_pivot() {
        assert_relative_eq!(
            truncation_radius(
                TRUNCATION_MASS_PIVOT,
                TRUNCATION_RADIUS_PIVOT,
                TRUNCATION_MASS_PIVOT,
                TRUNCATION_RADIUS_PIVOT
            ),
            1.4
        );
        assert_relative_eq!(truncation_radius(8e7, 50.0, 1e7, 50.0), 2.8, max_relative = 1e-12);
    }

    #[test]
    fn tnfw_conversion_uses_angular_scale() {
        let cosmology = StaticCosmology::default();
        let kpc_per_arcsec = 1e6 / ARCSEC_PER_RADIAN;
        let angular = convert_to_tnfw(2.0, 0.5, 1e7, 10.0, 2.0, &cosmology);
        assert_relative_eq!(angular.rs_angle, 2.0 / kpc_per_arcsec, max_relative = 1e-12);
        assert_relative_eq!(angular.r_trunc_angle, 10.0 / kpc_per_arcsec, max_relative = 1e-12);
        assert!(angular.alpha_rs > 0.0);
    }
}
