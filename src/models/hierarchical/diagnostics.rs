//! Ensemble chain diagnostics.

use serde::{Deserialize, Serialize};

use super::sampler::EnsembleRun;
use crate::inference::ProposalStats;
use crate::utils::usize_to_f64;

/// Window constant for automatic truncation of the autocorrelation sum.
const AUTOCORR_WINDOW: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainDiagnostics {
    pub mean_acceptance_fraction: f64,
    pub acceptance_fractions: Vec<f64>,
    /// Integrated autocorrelation time per hyperparameter, in steps.
    pub autocorrelation_time: Vec<f64>,
    /// Retained draws divided by the autocorrelation time.
    pub effective_sample_size: Vec<f64>,
}

fn lagged_sum(series: &[f64], mean: f64, lag: usize) -> f64 {
    (0..series.len() - lag)
        .map(|idx| (series[idx] - mean) * (series[idx + lag] - mean))
        .sum()
}

/// Integrated autocorrelation time of a set of parallel traces.
///
/// The autocorrelation function is averaged over traces and summed up to the
/// first window `M` with `M >= 5 tau(M)`. Constant traces give `1`.
#[must_use]
pub fn integrated_autocorrelation_time(traces: &[Vec<f64>]) -> f64 {
    let prepared: Vec<(&[f64], f64, f64)> = traces
        .iter()
        .filter(|t| t.len() > 1)
        .filter_map(|trace| {
            let mean = trace.iter().sum::<f64>() / usize_to_f64(trace.len());
            let denominator: f64 = trace.iter().map(|v| (v - mean) * (v - mean)).sum();
            (denominator > 0.0).then_some((trace.as_slice(), mean, denominator))
        })
        .collect();
    if prepared.is_empty() {
        return 1.0;
    }
    let max_lag = prepared.iter().map(|(t, _, _)| t.len()).min().unwrap_or(0) / 2;
    let n_traces = usize_to_f64(prepared.len());

    let mut tau = 1.0;
    for lag in 1..max_lag {
        let rho = prepared
            .iter()
            .map(|(trace, mean, denominator)| lagged_sum(trace, *mean, lag) / denominator)
            .sum::<f64>()
            / n_traces;
        tau = 2.0f64.mul_add(rho, tau);
        if usize_to_f64(lag) >= AUTOCORR_WINDOW * tau {
            break;
        }
    }
    tau.max(1.0)
}

/// Acceptance and mixing diagnostics of an ensemble run.
#[must_use]
pub fn summarize_ensemble(run: &EnsembleRun) -> ChainDiagnostics {
    let dim = run.chain.ncols();
    let autocorrelation_time: Vec<f64> = (0..dim)
        .map(|coordinate| {
            let traces: Vec<Vec<f64>> = (0..run.n_walkers)
                .map(|walker| run.walker_trace(walker, coordinate))
                .collect();
            integrated_autocorrelation_time(&traces)
        })
        .collect();
    let draws = usize_to_f64(run.chain.nrows());
    ChainDiagnostics {
        mean_acceptance_fraction: run.mean_acceptance_fraction(),
        acceptance_fractions: run
            .walker_stats
            .iter()
            .map(|s| ProposalStats::acceptance_rate(*s))
            .collect(),
        effective_sample_size: autocorrelation_time.iter().map(|tau| draws / tau).collect(),
        autocorrelation_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{RngExt, SeedableRng};

    fn ar1(n: usize, phi: f64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(11);
        let mut state = 0.0;
        (0..n)
            .map(|_| {
                state = phi.mul_add(state, rng.random::<f64>() - 0.5);
                state
            })
            .collect()
    }

    #[test]
    fn constant_traces_have_unit_autocorrelation_time() {
        let traces = vec![vec![2.0; 50], vec![-1.0; 50]];
        assert_relative_eq!(integrated_autocorrelation_time(&traces), 1.0);
        assert_relative_eq!(integrated_autocorrelation_time(&[]), 1.0);
    }

    #[test]
    fn correlated_series_has_longer_autocorrelation_time() {
        let white = integrated_autocorrelation_time(&[ar1(20_000, 0.0)]);
        let sticky = integrated_autocorrelation_time(&[ar1(20_000, 0.9)]);
        assert!(white < 2.0);
        // tau = (1 + phi) / (1 - phi) = 19 for an AR(1) process.
        assert!(sticky > 10.0 && sticky < 30.0);
    }

    #[test]
    fn parallel_traces_share_one_autocorrelation_estimate() {
        let single = integrated_autocorrelation_time(&[ar1(5_000, 0.5)]);
        let pooled = integrated_autocorrelation_time(&[ar1(5_000, 0.5), ar1(5_000, 0.5)]);
        // Identical traces average to the same autocorrelation function.
        assert_relative_eq!(single, pooled, epsilon = 1e-12);
        assert!(single > 1.5 && single < 5.0);
    }
}
