//! Peak-height mass–concentration relation.

use rand::RngExt;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use super::cosmology::Cosmology;

/// `c = c_0 (1 + z)^zeta (nu(M, z) / nu(M_ref, 0))^(-beta)` with optional
/// log-normal scatter of `dex_scatter` dex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationRelation {
    pub c_0: f64,
    pub zeta: f64,
    pub beta: f64,
    /// Pivot mass of the peak-height ratio in solar masses.
    pub m_ref: f64,
    pub dex_scatter: f64,
}

impl ConcentrationRelation {
    /// Concentration without scatter.
    #[must_use]
    pub fn median<C: Cosmology + ?Sized>(&self, z: f64, m200: f64, cosmology: &C) -> f64 {
        let nu = cosmology.peak_height(m200, z);
        let nu_ref = cosmology.peak_height(self.m_ref, 0.0);
        self.c_0 * (1.0 + z).powf(self.zeta) * (nu / nu_ref).powf(-self.beta)
    }

    /// One concentration draw for a halo of mass `m200` at `z`.
    pub fn mass_concentration<C: Cosmology + ?Sized>(
        &self,
        z: f64,
        m200: f64,
        cosmology: &C,
        rng: &mut StdRng,
    ) -> f64 {
        let median = self.median(z, m200, cosmology);
        if self.dex_scatter > 0.0 {
            let scatter: f64 = rng.sample(StandardNormal);
            10f64.powf(self.dex_scatter.mul_add(scatter, median.log10()))
        } else {
            median
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substructure::cosmology::tests::StaticCosmology;
    use approx::assert_relative_eq;
    use rand::SeedableRng;

    fn relation(dex_scatter: f64) -> ConcentrationRelation {
        ConcentrationRelation {
            c_0: 18.0,
            zeta: -0.2,
            beta: 0.8,
            m_ref: 1e8,
            dex_scatter,
        }
    }

    #[test]
    fn reference_mass_at_zero_redshift_gives_c0() {
        let cosmology = StaticCosmology::default();
        assert_relative_eq!(relation(0.0).median(0.0, 1e8, &cosmology), 18.0);
    }

    #[test]
    fn heavier_halos_are_less_concentrated() {
        let cosmology = StaticCosmology::default();
        let light = relation(0.0).median(0.5, 1e7, &cosmology);
        let heavy = relation(0.0).median(0.5, 1e10, &cosmology);
        assert!(heavy < light);
    }

    #[test]
    fn scatter_is_log_normal_around_median() {
        let cosmology = StaticCosmology::default();
        let mut rng = StdRng::seed_from_u64(21);
        let scattered = relation(0.1);
        let median = scattered.median(0.5, 1e9, &cosmology);
        let n = 4_000;
        let mean_log: f64 = (0..n)
            .map(|_| {
                scattered
                    .mass_concentration(0.5, 1e9, &cosmology, &mut rng)
                    .log10()
            })
            .sum::<f64>()
            / f64::from(n);
        assert!((mean_log - median.log10()).abs() < 0.01);

        let mut rng = StdRng::seed_from_u64(21);
        assert_relative_eq!(
            relation(0.0).mass_concentration(0.5, 1e9, &cosmology, &mut rng),
            median
        );
    }
}
