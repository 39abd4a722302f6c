//! Poisson draws from a truncated power law `norm * p^slope` on
//! `[p_min, p_max]`.

use num_traits::ToPrimitive;
use rand::RngExt;
use rand::rngs::StdRng;
use rand_distr::Poisson;

use super::SubstructureError;

fn is_log_slope(slope: f64) -> bool {
    (slope + 1.0).abs() < f64::EPSILON
}

/// `int_{p_min}^{p_max} p^slope dp`.
#[must_use]
pub fn power_law_integrate(p_min: f64, p_max: f64, slope: f64) -> f64 {
    if is_log_slope(slope) {
        return (p_max / p_min).ln();
    }
    let exponent = slope + 1.0;
    (p_max.powf(exponent) - p_min.powf(exponent)) / exponent
}

/// Draw a Poisson number of samples with mean `norm * int p^slope dp` and
/// place each one by inverting the power-law CDF.
///
/// A non-positive expectation yields no samples.
///
/// # Errors
///
/// Returns `SubstructureError::InvalidPoissonMean` when the expectation is
/// not finite or too large for the Poisson sampler.
pub fn power_law_draw(
    p_min: f64,
    p_max: f64,
    slope: f64,
    norm: f64,
    rng: &mut StdRng,
) -> Result<Vec<f64>, SubstructureError> {
    let expected = norm * power_law_integrate(p_min, p_max, slope);
    if expected.is_nan() || expected == f64::INFINITY {
        return Err(SubstructureError::InvalidPoissonMean(expected));
    }
    if expected <= 0.0 {
        return Ok(Vec::new());
    }
    let poisson =
        Poisson::new(expected).map_err(|_| SubstructureError::InvalidPoissonMean(expected))?;
    let count: f64 = rng.sample(poisson);
    let n_draws = count.round().to_usize().unwrap_or(0);

    let draws = if is_log_slope(slope) {
        let log_ratio = (p_max / p_min).ln();
        (0..n_draws)
            .map(|_| p_min * (log_ratio * rng.random::<f64>()).exp())
            .collect()
    } else {
        let exponent = slope + 1.0;
        let lower = p_min.powf(exponent);
        let upper = p_max.powf(exponent);
        (0..n_draws)
            .map(|_| {
                let u: f64 = rng.random();
                (upper - lower)
                    .mul_add(u, lower)
                    .powf(exponent.recip())
                    .clamp(p_min, p_max)
            })
            .collect()
    };
    Ok(draws)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;

    #[test]
    fn integral_matches_closed_forms() {
        assert_relative_eq!(power_law_integrate(1.0, 2.0, 1.0), 1.5);
        assert_relative_eq!(power_law_integrate(1.0, 10.0, -1.0), 10f64.ln());
        assert_relative_eq!(power_law_integrate(1.0, 4.0, -2.0), 0.75);
    }

    #[test]
    fn draws_stay_inside_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        let draws = power_law_draw(1e7, 1e10, -1.9, 5e7, &mut rng).unwrap();
        assert!(!draws.is_empty());
        assert!(draws.iter().all(|m| (1e7..=1e10).contains(m)));

        let log_draws = power_law_draw(1.0, 100.0, -1.0, 50.0, &mut rng).unwrap();
        assert!(log_draws.iter().all(|m| (1.0..=100.0).contains(m)));
    }

    #[test]
    fn count_follows_expectation() {
        let mut rng = StdRng::seed_from_u64(5);
        // Expected count 2000: the Poisson draw lies well within 5 sigma.
        let draws = power_law_draw(1.0, 2.0, 0.0, 2_000.0, &mut rng).unwrap();
        let count = draws.len();
        assert!((1_775..=2_225).contains(&count), "count {count}");
        let mean = draws.iter().sum::<f64>() / crate::utils::usize_to_f64(count);
        assert!((mean - 1.5).abs() < 0.1);
    }

    #[test]
    fn non_positive_norm_gives_nothing() {
        let mut rng = StdRng::seed_from_u64(9);
        assert!(power_law_draw(1.0, 2.0, -1.5, 0.0, &mut rng).unwrap().is_empty());
        assert!(power_law_draw(1.0, 2.0, -1.5, -3.0, &mut rng).unwrap().is_empty());
        assert!(matches!(
            power_law_draw(1.0, 2.0, -1.5, f64::NAN, &mut rng),
            Err(SubstructureError::InvalidPoissonMean(_))
        ));
    }
}
