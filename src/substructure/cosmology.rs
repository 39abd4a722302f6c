//! Cosmological quantities used by the subhalo sampler.
//!
//! The crate does not implement a cosmology. Callers inject one through the
//! [`Cosmology`] trait; the helpers here derive lensing scales from it.

/// Arcseconds per radian.
pub const ARCSEC_PER_RADIAN: f64 = 206_264.806_247_096_36;

/// `c^2 / (4 pi G)` in solar masses per Mpc.
pub const C2_OVER_4PI_G: f64 = 1.662_93e18;

const KPC_PER_MPC: f64 = 1e3;

/// Distance and density scales of a background cosmology.
pub trait Cosmology: Send + Sync {
    /// Angular diameter distance to redshift `z` in Mpc.
    fn angular_diameter_distance(&self, z: f64) -> f64;

    /// Angular diameter distance between `z1 < z2` in Mpc.
    fn angular_diameter_distance_z1z2(&self, z1: f64, z2: f64) -> f64;

    /// Critical density of the universe at `z` in solar masses per kpc^3.
    fn critical_density(&self, z: f64) -> f64;

    /// Peak height `delta_c / sigma(M, z)` of a halo of mass `m200` (solar
    /// masses) at redshift `z`.
    fn peak_height(&self, m200: f64, z: f64) -> f64;
}

/// Physical kpc subtended by one arcsecond at redshift `z`.
#[must_use]
pub fn kpc_per_arcsecond<C: Cosmology + ?Sized>(z: f64, cosmology: &C) -> f64 {
    cosmology.angular_diameter_distance(z) * KPC_PER_MPC / ARCSEC_PER_RADIAN
}

/// Critical surface density for lensing in solar masses per kpc^2.
#[must_use]
pub fn sigma_crit<C: Cosmology + ?Sized>(z_lens: f64, z_source: f64, cosmology: &C) -> f64 {
    let d_l = cosmology.angular_diameter_distance(z_lens);
    let d_s = cosmology.angular_diameter_distance(z_source);
    let d_ls = cosmology.angular_diameter_distance_z1z2(z_lens, z_source);
    // Solar masses per Mpc^2 to per kpc^2.
    C2_OVER_4PI_G * d_s / (d_l * d_ls) / (KPC_PER_MPC * KPC_PER_MPC)
}

/// Distance modulus `5 log10(D_L / 10 pc)` with `D_L = (1 + z)^2 D_A`.
#[must_use]
pub fn distance_modulus<C: Cosmology + ?Sized>(z: f64, cosmology: &C) -> f64 {
    let luminosity_distance_pc = cosmology.angular_diameter_distance(z) * (1.0 + z).powi(2) * 1e6;
    5.0 * (luminosity_distance_pc / 10.0).log10()
}

/// Apparent magnitude of a source with absolute magnitude `mag_absolute`
/// at redshift `z`. No K-correction is applied.
#[must_use]
pub fn absolute_to_apparent<C: Cosmology + ?Sized>(
    mag_absolute: f64,
    z: f64,
    cosmology: &C,
) -> f64 {
    mag_absolute + distance_modulus(z, cosmology)
}
