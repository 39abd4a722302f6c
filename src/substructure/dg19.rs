//! DG19 subhalo populations: a host-scaled power-law mass function, cored
//! NFW positions inside the lensing cylinder and truncated NFW profiles.

use std::f64::consts::{PI, TAU};

use num_traits::ToPrimitive;
use rand::RngExt;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use super::concentration::ConcentrationRelation;
use super::cosmology::{Cosmology, kpc_per_arcsecond};
use super::galaxies::{GalaxyHaloConnection, add_galaxies_in_subhalos};
use super::nfw::{
    TRUNCATION_MASS_PIVOT, TRUNCATION_RADIUS_PIVOT, convert_to_tnfw, cored_nfw_draws,
    r_200_from_m, rho_nfw_from_m_c, truncation_radius,
};
use super::output::{LensModelSink, LensingInputs, ProfileKwargs, TNFW};
use super::power_law::power_law_draw;
use super::{SubstructureError, ensure_finite, ensure_positive};
use crate::utils::usize_to_f64;

/// Floor on the acceptance rate used to size retry batches.
const MIN_ACCEPTANCE: f64 = 0.1;

/// Parameters of the DG19 subhalo mass function and concentration relation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubhaloParameters {
    /// SHMF normalization in kpc^-2. Negative values mean no subhalos.
    pub sigma_sub: f64,
    pub shmf_plaw_index: f64,
    /// Pivot mass of the SHMF in solar masses.
    pub m_pivot: f64,
    pub m_min: f64,
    pub m_max: f64,
    pub c_0: f64,
    pub conc_zeta: f64,
    pub conc_beta: f64,
    pub conc_m_ref: f64,
    pub dex_scatter: f64,
    /// Host-mass slope of the SHMF normalization.
    pub k1: f64,
    /// Host-redshift slope of the SHMF normalization.
    pub k2: f64,
    /// Cap on rejection-sampling batches; `None` retries until done.
    #[serde(default)]
    pub max_rejection_rounds: Option<usize>,
    #[serde(default)]
    pub galaxies: GalaxyHaloConnection,
}

impl Default for SubhaloParameters {
    fn default() -> Self {
        Self {
            sigma_sub: 2e-3,
            shmf_plaw_index: -1.83,
            m_pivot: 1e10,
            m_min: 1e7,
            m_max: 1e10,
            c_0: 18.0,
            conc_zeta: -0.2,
            conc_beta: 0.8,
            conc_m_ref: 1e8,
            dex_scatter: 0.1,
            k1: 0.88,
            k2: 1.7,
            max_rejection_rounds: None,
            galaxies: GalaxyHaloConnection::default(),
        }
    }
}

impl SubhaloParameters {
    /// # Errors
    ///
    /// Returns `SubstructureError` when a mass scale is not positive, the
    /// mass range is empty, a slope or scatter is not finite, or
    /// `max_rejection_rounds` is zero.
    pub fn validate(&self) -> Result<(), SubstructureError> {
        ensure_finite("sigma_sub", self.sigma_sub)?;
        ensure_finite("shmf_plaw_index", self.shmf_plaw_index)?;
        ensure_positive("m_pivot", self.m_pivot)?;
        if !(self.m_min > 0.0 && self.m_max > self.m_min && self.m_max.is_finite()) {
            return Err(SubstructureError::InvalidMassRange {
                m_min: self.m_min,
                m_max: self.m_max,
            });
        }
        ensure_positive("c_0", self.c_0)?;
        ensure_finite("conc_zeta", self.conc_zeta)?;
        ensure_finite("conc_beta", self.conc_beta)?;
        ensure_positive("conc_m_ref", self.conc_m_ref)?;
        ensure_finite("dex_scatter", self.dex_scatter)?;
        if self.dex_scatter < 0.0 {
            return Err(SubstructureError::InvalidParameter {
                name: "dex_scatter",
                value: self.dex_scatter,
            });
        }
        ensure_finite("k1", self.k1)?;
        ensure_finite("k2", self.k2)?;
        if self.max_rejection_rounds == Some(0) {
            return Err(SubstructureError::InvalidParameter {
                name: "max_rejection_rounds",
                value: 0.0,
            });
        }
        Ok(())
    }

    #[must_use]
    pub const fn concentration_relation(&self) -> ConcentrationRelation {
        ConcentrationRelation {
            c_0: self.c_0,
            zeta: self.conc_zeta,
            beta: self.conc_beta,
            m_ref: self.conc_m_ref,
            dex_scatter: self.dex_scatter,
        }
    }
}

/// Main deflector hosting the subhalos.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HostDeflector {
    /// Host `M_200` in solar masses.
    pub m200: f64,
    pub z_lens: f64,
    /// Einstein radius in arcseconds.
    pub theta_e: f64,
    pub center_x: f64,
    pub center_y: f64,
    pub e1: f64,
    pub e2: f64,
}

impl Default for HostDeflector {
    fn default() -> Self {
        Self {
            m200: 1e13,
            z_lens: 0.5,
            theta_e: 1.1,
            center_x: 0.0,
            center_y: 0.0,
            e1: 0.0,
            e2: 0.0,
        }
    }
}

impl HostDeflector {
    /// # Errors
    ///
    /// Returns `SubstructureError::InvalidParameter` for a non-positive mass,
    /// redshift or Einstein radius, or a non-finite center or ellipticity.
    pub fn validate(&self) -> Result<(), SubstructureError> {
        ensure_positive("m200", self.m200)?;
        ensure_positive("z_lens", self.z_lens)?;
        ensure_positive("theta_e", self.theta_e)?;
        ensure_finite("center_x", self.center_x)?;
        ensure_finite("center_y", self.center_y)?;
        ensure_finite("e1", self.e1)?;
        ensure_finite("e2", self.e2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceParameters {
    pub z_source: f64,
    /// AB magnitude of one count per second.
    pub output_ab_zeropoint: f64,
}

impl Default for SourceParameters {
    fn default() -> Self {
        Self {
            z_source: 1.5,
            output_ab_zeropoint: 25.127,
        }
    }
}

/// Host halo scales used to place subhalos, all in kpc and solar masses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HostGeometry {
    pub concentration: f64,
    pub r_200: f64,
    pub r_scale: f64,
    /// Core radius of the subhalo distribution, `r_200 / 2`.
    pub r_tidal: f64,
    pub rho_nfw: f64,
    /// Three Einstein radii: the radius of the rendering cylinder.
    pub r_3e: f64,
    /// Half-diagonal of the cylinder, the largest radius worth drawing.
    pub r_max: f64,
}

/// Physical description of one drawn subhalo.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubhaloProperties {
    pub mass: f64,
    /// Host-centred position in kpc.
    pub position: [f64; 3],
    pub r_in_host: f64,
    pub concentration: f64,
    pub r_200: f64,
    pub r_scale: f64,
    pub rho_nfw: f64,
    pub r_trunc: f64,
}

/// DG19 subhalo sampler for one main deflector.
#[derive(Debug, Clone)]
pub struct SubhalosDg19<C> {
    subhalo: SubhaloParameters,
    host: HostDeflector,
    source: SourceParameters,
    cosmology: C,
}

impl<C: Cosmology> SubhalosDg19<C> {
    /// # Errors
    ///
    /// Returns `SubstructureError` when any parameter block is invalid or the
    /// source does not lie behind the lens.
    pub fn new(
        subhalo: SubhaloParameters,
        host: HostDeflector,
        source: SourceParameters,
        cosmology: C,
    ) -> Result<Self, SubstructureError> {
        subhalo.validate()?;
        host.validate()?;
        ensure_finite("output_ab_zeropoint", source.output_ab_zeropoint)?;
        if !(source.z_source > host.z_lens && source.z_source.is_finite()) {
            return Err(SubstructureError::InvalidRedshiftOrdering {
                z_lens: host.z_lens,
                z_source: source.z_source,
            });
        }
        Ok(Self {
            subhalo,
            host,
            source,
            cosmology,
        })
    }

    #[must_use]
    pub const fn subhalo_parameters(&self) -> &SubhaloParameters {
        &self.subhalo
    }

    #[must_use]
    pub const fn host(&self) -> &HostDeflector {
        &self.host
    }

    #[must_use]
    pub const fn source(&self) -> &SourceParameters {
        &self.source
    }

    #[must_use]
    pub const fn cosmology(&self) -> &C {
        &self.cosmology
    }

    /// Scaling of the SHMF normalization with host mass and redshift.
    #[must_use]
    pub fn host_scaling_function(host_m200: f64, z_lens: f64, k1: f64, k2: f64) -> f64 {
        let log_f = k1.mul_add((host_m200 / 1e13).log10(), k2 * (z_lens + 0.5).log10());
        10f64.powf(log_f)
    }

    fn kpc_per_arcsecond(&self) -> f64 {
        kpc_per_arcsecond(self.host.z_lens, &self.cosmology)
    }

    /// Three Einstein radii in kpc.
    fn r_3e(&self) -> f64 {
        3.0 * self.host.theta_e * self.kpc_per_arcsecond()
    }

    /// Subhalo masses inside the cylinder of radius `3 theta_E`.
    ///
    /// # Errors
    ///
    /// Returns `SubstructureError::InvalidPoissonMean` when the expected count
    /// overflows the Poisson sampler.
    pub fn draw_nfw_masses(&self, rng: &mut StdRng) -> Result<Vec<f64>, SubstructureError> {
        let p = &self.subhalo;
        let sigma_sub = p.sigma_sub.max(0.0);
        let f_host = Self::host_scaling_function(self.host.m200, self.host.z_lens, p.k1, p.k2);
        let area = PI * self.r_3e().powi(2);
        let norm = f_host * area * sigma_sub * p.m_pivot.powf(-p.shmf_plaw_index - 1.0);
        power_law_draw(p.m_min, p.m_max, p.shmf_plaw_index, norm, rng)
    }

    /// Isotropic directions for `r_samples` and the mask of points inside the
    /// cylinder `sqrt(x^2 + y^2) < r_3e`, `|z| < r_200`.
    pub fn rejection_sampling(
        r_samples: &[f64],
        r_200: f64,
        r_3e: f64,
        rng: &mut StdRng,
    ) -> (Vec<bool>, Vec<[f64; 3]>) {
        r_samples
            .iter()
            .map(|&r| {
                let theta = rng.random::<f64>() * TAU;
                let phi = 2.0f64.mul_add(-rng.random::<f64>(), 1.0).acos();
                let position = [
                    r * phi.sin() * theta.cos(),
                    r * phi.sin() * theta.sin(),
                    r * phi.cos(),
                ];
                let inside = position[0].hypot(position[1]) < r_3e && position[2].abs() < r_200;
                (inside, position)
            })
            .unzip()
    }

    /// Scales of the host halo. The host concentration carries the relation's
    /// scatter, so this consumes random numbers.
    pub fn host_geometry(&self, rng: &mut StdRng) -> HostGeometry {
        let m200 = self.host.m200;
        let z_lens = self.host.z_lens;
        let concentration = self.subhalo.concentration_relation().mass_concentration(
            z_lens,
            m200,
            &self.cosmology,
            rng,
        );
        let r_200 = r_200_from_m(m200, z_lens, &self.cosmology);
        let r_scale = r_200 / concentration;
        let r_3e = self.r_3e();
        HostGeometry {
            concentration,
            r_200,
            r_scale,
            r_tidal: r_200 / 2.0,
            rho_nfw: rho_nfw_from_m_c(m200, concentration, r_scale),
            r_3e,
            r_max: r_3e.hypot(r_200),
        }
    }

    /// Exactly `n_subs` host-centred positions in kpc drawn from a cored NFW
    /// and restricted to the rendering cylinder.
    ///
    /// Batches are redrawn until enough points survive, each sized by the
    /// acceptance seen so far (floored at 10%).
    ///
    /// # Errors
    ///
    /// Returns `SubstructureError::RejectionSamplingExhausted` when
    /// `max_rejection_rounds` batches leave the request unfilled.
    pub fn sample_cored_nfw(
        &self,
        n_subs: usize,
        rng: &mut StdRng,
    ) -> Result<Vec<[f64; 3]>, SubstructureError> {
        if n_subs == 0 {
            return Ok(Vec::new());
        }
        let host = self.host_geometry(rng);

        let mut positions = Vec::with_capacity(n_subs);
        let mut drawn = 0usize;
        let mut accepted = 0usize;
        let mut rounds = 0usize;
        let mut batch = n_subs;
        while positions.len() < n_subs {
            if self
                .subhalo
                .max_rejection_rounds
                .is_some_and(|max_rounds| rounds >= max_rounds)
            {
                return Err(SubstructureError::RejectionSamplingExhausted {
                    requested: n_subs,
                    accepted: positions.len(),
                    rounds,
                });
            }
            let radii = cored_nfw_draws(
                host.r_tidal,
                host.rho_nfw,
                host.r_scale,
                host.r_max,
                batch,
                rng,
            );
            let (keep, candidates) = Self::rejection_sampling(&radii, host.r_200, host.r_3e, rng);
            drawn += batch;
            accepted += keep.iter().filter(|&&inside| inside).count();
            rounds += 1;

            let remaining = n_subs - positions.len();
            positions.extend(
                candidates
                    .into_iter()
                    .zip(keep)
                    .filter_map(|(position, inside)| inside.then_some(position))
                    .take(remaining),
            );

            let acceptance = (usize_to_f64(accepted) / usize_to_f64(drawn)).max(MIN_ACCEPTANCE);
            batch = (usize_to_f64(n_subs - positions.len()) / acceptance)
                .ceil()
                .to_usize()
                .unwrap_or(n_subs);
        }
        log::debug!(
            "Placed {n_subs} subhalos in {rounds} rounds ({accepted} of {drawn} draws accepted)"
        );
        Ok(positions)
    }

    /// Concentrations, sizes, densities and truncation radii of subhalos at
    /// the host redshift.
    ///
    /// # Errors
    ///
    /// Returns `SubstructureError::PositionCountMismatch` when `masses` and
    /// `positions` differ in length.
    pub fn subhalo_properties(
        &self,
        masses: &[f64],
        positions: &[[f64; 3]],
        rng: &mut StdRng,
    ) -> Result<Vec<SubhaloProperties>, SubstructureError> {
        if masses.len() != positions.len() {
            return Err(SubstructureError::PositionCountMismatch {
                masses: masses.len(),
                positions: positions.len(),
            });
        }
        let z = self.host.z_lens;
        let relation = self.subhalo.concentration_relation();
        Ok(masses
            .iter()
            .zip(positions)
            .map(|(&mass, &position)| {
                let concentration = relation.mass_concentration(z, mass, &self.cosmology, rng);
                let r_200 = r_200_from_m(mass, z, &self.cosmology);
                let r_scale = r_200 / concentration;
                let r_in_host = position.iter().map(|v| v * v).sum::<f64>().sqrt();
                SubhaloProperties {
                    mass,
                    position,
                    r_in_host,
                    concentration,
                    r_200,
                    r_scale,
                    rho_nfw: rho_nfw_from_m_c(mass, concentration, r_scale),
                    r_trunc: truncation_radius(
                        mass,
                        r_in_host,
                        TRUNCATION_MASS_PIVOT,
                        TRUNCATION_RADIUS_PIVOT,
                    ),
                }
            })
            .collect())
    }

    /// `TNFW` lens records in angular units, offset by the host center.
    #[must_use]
    pub fn convert_to_tnfw_profiles(
        &self,
        subhalos: &[SubhaloProperties],
    ) -> (Vec<String>, Vec<ProfileKwargs>) {
        let kpc_per_arcsec = self.kpc_per_arcsecond();
        subhalos
            .iter()
            .map(|subhalo| {
                let angular = convert_to_tnfw(
                    subhalo.r_scale,
                    self.host.z_lens,
                    subhalo.rho_nfw,
                    subhalo.r_trunc,
                    self.source.z_source,
                    &self.cosmology,
                );
                let kwargs = ProfileKwargs::from([
                    ("alpha_Rs".to_string(), angular.alpha_rs),
                    ("Rs".to_string(), angular.rs_angle),
                    (
                        "center_x".to_string(),
                        subhalo.position[0] / kpc_per_arcsec + self.host.center_x,
                    ),
                    (
                        "center_y".to_string(),
                        subhalo.position[1] / kpc_per_arcsec + self.host.center_y,
                    ),
                    ("r_trunc".to_string(), angular.r_trunc_angle),
                ]);
                (TNFW.to_string(), kwargs)
            })
            .unzip()
    }

    /// Draw a full subhalo population and append it to `sink`: light
    /// profiles first (when any subhalo qualifies), then the lenses.
    ///
    /// # Errors
    ///
    /// Propagates errors from the mass draw and the position sampler.
    pub fn draw<S: LensModelSink + ?Sized>(
        &self,
        sink: &mut S,
        rng: &mut StdRng,
    ) -> Result<(), SubstructureError> {
        let masses = self.draw_nfw_masses(rng)?;
        if masses.is_empty() {
            return Ok(());
        }
        let positions = self.sample_cored_nfw(masses.len(), rng)?;
        let subhalos = self.subhalo_properties(&masses, &positions, rng)?;
        let (models, kwargs) = self.convert_to_tnfw_profiles(&subhalos);
        let redshifts = vec![self.host.z_lens; masses.len()];

        add_galaxies_in_subhalos(
            sink,
            &masses,
            &kwargs,
            &redshifts,
            &self.subhalo.galaxies,
            &self.source,
            &self.cosmology,
            rng,
        );
        sink.add_lenses(models, kwargs, redshifts);
        Ok(())
    }

    /// [`Self::draw`] into a fresh [`LensingInputs`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::draw`].
    pub fn draw_subhalos(&self, rng: &mut StdRng) -> Result<LensingInputs, SubstructureError> {
        let mut inputs = LensingInputs::default();
        self.draw(&mut inputs, rng)?;
        Ok(inputs)
    }
}
