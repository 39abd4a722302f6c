//! Reusable MCMC schedule and acceptance bookkeeping.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors for generic MCMC configuration.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum InferenceError {
    #[error("retained sample count must be positive")]
    InvalidSampleCount,
    #[error("ensemble needs an even number of at least {min} walkers; found {found}")]
    InvalidWalkerCount { min: usize, found: usize },
    #[error("stretch scale must exceed 1; found {0}")]
    InvalidStretchScale(f64),
    #[error("initial walker scatter must be finite and non-negative; found {0}")]
    InvalidWalkerScatter(f64),
    #[error("initial walker matrix has {found} rows, expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// Ensemble MCMC schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsembleSchedule {
    pub n_walkers: usize,
    pub n_burnin: usize,
    pub n_samples: usize,
    pub stretch_scale: f64,
    pub seed: u64,
}

impl Default for EnsembleSchedule {
    fn default() -> Self {
        Self {
            n_walkers: 40,
            n_burnin: 1_000,
            n_samples: 10_000,
            stretch_scale: 2.0,
            seed: 42,
        }
    }
}

impl EnsembleSchedule {
    /// # Errors
    ///
    /// Returns `InferenceError` if schedule values are invalid for a
    /// `dimension`-dimensional target.
    pub fn validate(self, dimension: usize) -> Result<(), InferenceError> {
        if self.n_samples == 0 {
            return Err(InferenceError::InvalidSampleCount);
        }
        let min = (2 * dimension).max(2);
        if self.n_walkers < min || self.n_walkers % 2 != 0 {
            return Err(InferenceError::InvalidWalkerCount {
                min,
                found: self.n_walkers,
            });
        }
        if !(self.stretch_scale > 1.0) || !self.stretch_scale.is_finite() {
            return Err(InferenceError::InvalidStretchScale(self.stretch_scale));
        }
        Ok(())
    }

    /// Total number of ensemble steps, burn-in included.
    #[must_use]
    pub const fn total_steps(self) -> usize {
        self.n_burnin + self.n_samples
    }

    /// Number of retained draws across all walkers.
    #[must_use]
    pub const fn retained_draws(self) -> usize {
        self.n_samples * self.n_walkers
    }
}

/// Proposal counters for a single walker or Metropolis-Hastings block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalStats {
    pub proposed: usize,
    pub accepted: usize,
}

impl ProposalStats {
    /// Record one proposal and whether it was accepted.
    pub const fn record(&mut self, accepted: bool) {
        self.proposed += 1;
        if accepted {
            self.accepted += 1;
        }
    }

    /// Acceptance rate in `[0, 1]`, or `0` if no proposals were made.
    #[must_use]
    pub fn acceptance_rate(self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            usize_to_f64(self.accepted) / usize_to_f64(self.proposed)
        }
    }
}

fn usize_to_f64(value: usize) -> f64 {
    f64::from(u32::try_from(value).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_rejects_zero_samples() {
        let schedule = EnsembleSchedule {
            n_samples: 0,
            ..EnsembleSchedule::default()
        };
        assert_eq!(
            schedule.validate(3),
            Err(InferenceError::InvalidSampleCount)
        );
    }

    #[test]
    fn schedule_requires_twice_dimension_walkers() {
        let schedule = EnsembleSchedule {
            n_walkers: 10,
            ..EnsembleSchedule::default()
        };
        assert_eq!(
            schedule.validate(6),
            Err(InferenceError::InvalidWalkerCount { min: 12, found: 10 })
        );
        assert!(schedule.validate(5).is_ok());
    }

    #[test]
    fn schedule_rejects_odd_walker_count() {
        let schedule = EnsembleSchedule {
            n_walkers: 41,
            ..EnsembleSchedule::default()
        };
        assert!(schedule.validate(2).is_err());
    }

    #[test]
    fn schedule_rejects_small_stretch_scale() {
        let schedule = EnsembleSchedule {
            stretch_scale: 1.0,
            ..EnsembleSchedule::default()
        };
        assert_eq!(
            schedule.validate(2),
            Err(InferenceError::InvalidStretchScale(1.0))
        );
    }

    #[test]
    fn retained_draws_counts_every_walker() {
        let schedule = EnsembleSchedule {
            n_walkers: 8,
            n_samples: 25,
            ..EnsembleSchedule::default()
        };
        assert_eq!(schedule.retained_draws(), 200);
        assert_eq!(schedule.total_steps(), 1_025);
    }

    #[test]
    fn proposal_stats_tracks_acceptance() {
        let mut stats = ProposalStats::default();
        stats.record(true);
        stats.record(false);
        assert!((stats.acceptance_rate() - 0.5).abs() < 1.0e-12);
    }
}
