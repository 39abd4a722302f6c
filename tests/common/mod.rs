#![allow(dead_code)]

use faer::Mat;
use lensing_population::models::hierarchical::names::{GAMMA, SIGMA_SUB, THETA_E};
use lensing_population::substructure::Cosmology;
use lensing_population::{GaussianMoments, PredictionInput};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use rand_distr::StandardNormal;

pub fn parameter_names() -> Vec<String> {
    [THETA_E, SIGMA_SUB, GAMMA]
        .iter()
        .map(ToString::to_string)
        .collect()
}

/// Population the evaluated lenses are drawn from.
pub fn evaluation_population() -> GaussianMoments {
    GaussianMoments::from_mean_std(vec![1.0, 0.05, 2.0], &[0.05, 0.02, 0.1])
}

/// Broader population the network was trained on.
pub fn training_population() -> GaussianMoments {
    GaussianMoments::from_mean_std(vec![1.1, 0.1, 2.0], &[0.15, 0.08, 0.2])
}

/// Per-parameter measurement noise of the synthetic network.
pub const NOISE_STD: [f64; 3] = [0.01, 0.01, 0.03];

/// Synthetic network outputs for `n_images` lenses.
///
/// Each image draws a latent value from `population`, observes it with
/// `NOISE_STD` Gaussian noise and reports the posterior under the
/// `training` prior, the way a network trained on that population would.
pub fn synthetic_predictions(
    n_images: usize,
    population: &GaussianMoments,
    training: &GaussianMoments,
    seed: u64,
) -> PredictionInput {
    let dim = population.dim();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut means = Mat::<f64>::zeros(n_images, dim);
    let mut precisions = Vec::with_capacity(n_images);

    for image in 0..n_images {
        let precision = Mat::from_fn(dim, dim, |i, j| {
            if i == j {
                NOISE_STD[i].powi(-2) + training.covariance[(i, i)].recip()
            } else {
                0.0
            }
        });
        for param in 0..dim {
            let z_latent: f64 = rng.sample(StandardNormal);
            let z_noise: f64 = rng.sample(StandardNormal);
            let latent = population.covariance[(param, param)]
                .sqrt()
                .mul_add(z_latent, population.mean[param]);
            let observed = NOISE_STD[param].mul_add(z_noise, latent);
            let noise_precision = NOISE_STD[param].powi(-2);
            let training_precision = training.covariance[(param, param)].recip();
            means[(image, param)] = noise_precision.mul_add(
                observed,
                training_precision * training.mean[param],
            ) / precision[(param, param)];
        }
        precisions.push(precision);
    }

    PredictionInput::new(parameter_names(), means).with_precisions(precisions)
}

/// Flat Lambda-CDM background with Simpson-rule comoving distances.
#[derive(Debug, Clone, Copy)]
pub struct FlatLambdaCdm {
    pub h0: f64,
    pub om0: f64,
}

impl Default for FlatLambdaCdm {
    fn default() -> Self {
        Self { h0: 70.0, om0: 0.3 }
    }
}

const SPEED_OF_LIGHT_KM_S: f64 = 299_792.458;
/// `3 H^2 / (8 pi G)` for `H = 100 km/s/Mpc`, in solar masses per kpc^3.
const CRITICAL_DENSITY_H100: f64 = 277.536_627;

impl FlatLambdaCdm {
    fn e_of_z(&self, z: f64) -> f64 {
        self.om0
            .mul_add((1.0 + z).powi(3), 1.0 - self.om0)
            .sqrt()
    }

    fn comoving_distance(&self, z: f64) -> f64 {
        let n = 512;
        let h = z / f64::from(n);
        let integrand = |x: f64| self.e_of_z(x).recip();
        let interior: f64 = (1..n)
            .map(|k| {
                let weight = if k % 2 == 1 { 4.0 } else { 2.0 };
                weight * integrand(f64::from(k) * h)
            })
            .sum();
        let integral = h / 3.0 * (integrand(0.0) + interior + integrand(z));
        SPEED_OF_LIGHT_KM_S / self.h0 * integral
    }
}

impl Cosmology for FlatLambdaCdm {
    fn angular_diameter_distance(&self, z: f64) -> f64 {
        self.comoving_distance(z) / (1.0 + z)
    }

    fn angular_diameter_distance_z1z2(&self, z1: f64, z2: f64) -> f64 {
        (self.comoving_distance(z2) - self.comoving_distance(z1)) / (1.0 + z2)
    }

    fn critical_density(&self, z: f64) -> f64 {
        let h = self.h0 / 100.0;
        CRITICAL_DENSITY_H100 * h * h * self.e_of_z(z).powi(2)
    }

    fn peak_height(&self, m200: f64, z: f64) -> f64 {
        let sigma = 0.8 * (m200 / 2e14).powf(-0.15) / (1.0 + z);
        1.686 / sigma
    }
}
