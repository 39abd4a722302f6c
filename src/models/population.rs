//! Analytic moments of a lens population specification.
//!
//! A population specification maps each parameter name to a sampling rule,
//! either a fixed value or a scalar distribution. Only the first two moments
//! of every rule are used; correlations between parameters are discarded and
//! the returned covariance is diagonal.

use std::collections::BTreeMap;
use std::fmt;

use faer::Mat;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, ContinuousCDF, LogNormal, Normal, Uniform};
use statrs::statistics::Distribution;
use thiserror::Error;

/// Errors returned by the moment extractor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PopulationError {
    #[error("parameter `{0}` is not part of the population specification")]
    UnknownParameter(String),
}

/// Family tag of a scalar distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionFamily {
    Normal,
    Uniform,
    LogNormal,
    TruncatedNormal,
    Other,
}

impl fmt::Display for DistributionFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "norm",
            Self::Uniform => "uniform",
            Self::LogNormal => "lognorm",
            Self::TruncatedNormal => "truncnorm",
            Self::Other => "unknown",
        };
        f.write_str(name)
    }
}

/// A scalar distribution that exposes its first two moments.
pub trait ScalarDistribution: fmt::Debug + Send + Sync {
    fn mean(&self) -> f64;
    fn std(&self) -> f64;
    fn family(&self) -> DistributionFamily;
}

impl ScalarDistribution for Normal {
    fn mean(&self) -> f64 {
        Distribution::mean(self).unwrap_or(f64::NAN)
    }

    fn std(&self) -> f64 {
        Distribution::std_dev(self).unwrap_or(f64::NAN)
    }

    fn family(&self) -> DistributionFamily {
        DistributionFamily::Normal
    }
}

impl ScalarDistribution for Uniform {
    fn mean(&self) -> f64 {
        Distribution::mean(self).unwrap_or(f64::NAN)
    }

    fn std(&self) -> f64 {
        Distribution::std_dev(self).unwrap_or(f64::NAN)
    }

    fn family(&self) -> DistributionFamily {
        DistributionFamily::Uniform
    }
}

impl ScalarDistribution for LogNormal {
    fn mean(&self) -> f64 {
        Distribution::mean(self).unwrap_or(f64::NAN)
    }

    fn std(&self) -> f64 {
        Distribution::std_dev(self).unwrap_or(f64::NAN)
    }

    fn family(&self) -> DistributionFamily {
        DistributionFamily::LogNormal
    }
}

/// Serializable distribution description for configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum DistributionSpec {
    Normal { mean: f64, std: f64 },
    Uniform { low: f64, high: f64 },
    /// `mu` and `sigma` of the underlying normal in natural log.
    LogNormal { mu: f64, sigma: f64 },
    /// Normal(`mean`, `std`) restricted to `[low, high]`; bounds may be infinite.
    TruncatedNormal {
        mean: f64,
        std: f64,
        low: f64,
        high: f64,
    },
}

impl DistributionSpec {
    /// `(mean, std)`; invalid parameters give `NaN` moments.
    fn moments(&self) -> (f64, f64) {
        match *self {
            Self::Normal { mean, std } => (mean, std),
            Self::Uniform { low, high } => Uniform::new(low, high)
                .map_or((f64::NAN, f64::NAN), |dist| moments_of(&dist)),
            Self::LogNormal { mu, sigma } => LogNormal::new(mu, sigma)
                .map_or((f64::NAN, f64::NAN), |dist| moments_of(&dist)),
            Self::TruncatedNormal {
                mean,
                std,
                low,
                high,
            } => {
                let (mean, variance) = truncated_normal_moments(mean, std, low, high);
                (mean, variance.sqrt())
            }
        }
    }
}

impl ScalarDistribution for DistributionSpec {
    fn mean(&self) -> f64 {
        self.moments().0
    }

    fn std(&self) -> f64 {
        self.moments().1
    }

    fn family(&self) -> DistributionFamily {
        match self {
            Self::Normal { .. } => DistributionFamily::Normal,
            Self::Uniform { .. } => DistributionFamily::Uniform,
            Self::LogNormal { .. } => DistributionFamily::LogNormal,
            Self::TruncatedNormal { .. } => DistributionFamily::TruncatedNormal,
        }
    }
}

fn moments_of(dist: &impl ScalarDistribution) -> (f64, f64) {
    (dist.mean(), dist.std())
}

/// Mean and variance of a truncated normal distribution.
fn truncated_normal_moments(mean: f64, std: f64, low: f64, high: f64) -> (f64, f64) {
    let Ok(standard) = Normal::new(0.0, 1.0) else {
        return (f64::NAN, f64::NAN);
    };
    let alpha = (low - mean) / std;
    let beta = (high - mean) / std;
    let z = standard.cdf(beta) - standard.cdf(alpha);
    let (pdf_a, pdf_b) = (standard.pdf(alpha), standard.pdf(beta));
    // x·φ(x) vanishes at infinite bounds.
    let weighted = |x: f64, pdf: f64| if x.is_finite() { x * pdf } else { 0.0 };
    let shift = (pdf_a - pdf_b) / z;
    let variance = std
        * std
        * (1.0 + (weighted(alpha, pdf_a) - weighted(beta, pdf_b)) / z - shift * shift);
    (std.mul_add(shift, mean), variance)
}

/// Sampling rule of one population parameter.
#[derive(Debug)]
pub enum ParameterSampler {
    Constant(f64),
    Distribution(Box<dyn ScalarDistribution>),
}

impl ParameterSampler {
    #[must_use]
    pub fn distribution(dist: impl ScalarDistribution + 'static) -> Self {
        Self::Distribution(Box::new(dist))
    }
}

impl From<f64> for ParameterSampler {
    fn from(value: f64) -> Self {
        Self::Constant(value)
    }
}

impl From<DistributionSpec> for ParameterSampler {
    fn from(spec: DistributionSpec) -> Self {
        Self::distribution(spec)
    }
}

/// Parameter name to sampling rule.
pub type PopulationSpec = BTreeMap<String, ParameterSampler>;

/// Mean vector and covariance matrix of a Gaussian population model.
#[derive(Debug, Clone)]
pub struct GaussianMoments {
    pub mean: Vec<f64>,
    pub covariance: Mat<f64>,
}

impl GaussianMoments {
    /// Moments with a diagonal covariance built from per-parameter spreads.
    #[must_use]
    pub fn from_mean_std(mean: Vec<f64>, std: &[f64]) -> Self {
        let covariance = Mat::from_fn(std.len(), std.len(), |i, j| {
            if i == j { std[i] * std[i] } else { 0.0 }
        });
        Self { mean, covariance }
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.mean.len()
    }
}

/// A non-normal distribution that was approximated by its mean and std.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MomentWarning {
    pub parameter: String,
    pub family: DistributionFamily,
}

impl fmt::Display for MomentWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Approximating {} for {} with a normal distribution",
            self.family, self.parameter
        )
    }
}

#[derive(Debug, Clone)]
pub struct PopulationMoments {
    pub moments: GaussianMoments,
    pub warnings: Vec<MomentWarning>,
}

/// Mean vector and diagonal covariance of `params`, in the given order.
///
/// # Errors
///
/// Returns `PopulationError::UnknownParameter` if a requested parameter is
/// not in `spec`.
pub fn extract_moments(
    spec: &PopulationSpec,
    params: &[impl AsRef<str>],
) -> Result<PopulationMoments, PopulationError> {
    let mut mean = Vec::with_capacity(params.len());
    let mut std = Vec::with_capacity(params.len());
    let mut warnings = Vec::new();

    for param in params {
        let name = param.as_ref();
        let sampler = spec
            .get(name)
            .ok_or_else(|| PopulationError::UnknownParameter(name.to_string()))?;
        match sampler {
            ParameterSampler::Constant(value) => {
                mean.push(*value);
                std.push(0.0);
            }
            ParameterSampler::Distribution(dist) => {
                let family = dist.family();
                if family != DistributionFamily::Normal {
                    let warning = MomentWarning {
                        parameter: name.to_string(),
                        family,
                    };
                    log::warn!("{warning}");
                    warnings.push(warning);
                }
                mean.push(dist.mean());
                std.push(dist.std());
            }
        }
    }

    Ok(PopulationMoments {
        moments: GaussianMoments::from_mean_std(mean, &std),
        warnings,
    })
}
