//! Affine-invariant ensemble sampler (Goodman and Weare stretch move).
//!
//! Each step splits the walkers into two random halves. Every walker of one
//! half proposes `y = c + z (x - c)` with `c` a random walker of the other
//! half and `z` drawn from `g(z) ∝ 1/sqrt(z)` on `[1/a, a]`. Proposals of a
//! half are evaluated in parallel and accepted in walker order, so a fixed
//! seed reproduces the chain exactly.

use faer::Mat;
use rand::RngExt;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;

use crate::inference::{EnsembleSchedule, InferenceError, ProposalStats};
use crate::utils::{row_to_vec, usize_to_f64};

/// Retained draws of an ensemble run.
#[derive(Debug, Clone)]
pub struct EnsembleRun {
    /// `(n_walkers * n_samples, dim)` draws, walker-major: the draws of
    /// walker `w` occupy rows `w * n_samples .. (w + 1) * n_samples`.
    pub chain: Mat<f64>,
    /// Log target of every retained draw, in chain order.
    pub log_probs: Vec<f64>,
    /// Proposal counters per walker over all steps, burn-in included.
    pub walker_stats: Vec<ProposalStats>,
    pub n_walkers: usize,
    pub n_samples: usize,
}

impl EnsembleRun {
    #[must_use]
    pub fn mean_acceptance_fraction(&self) -> f64 {
        let total = self
            .walker_stats
            .iter()
            .fold(ProposalStats::default(), |acc, s| ProposalStats {
                proposed: acc.proposed + s.proposed,
                accepted: acc.accepted + s.accepted,
            });
        total.acceptance_rate()
    }

    /// Draws of one walker for one coordinate, in step order.
    #[must_use]
    pub fn walker_trace(&self, walker: usize, coordinate: usize) -> Vec<f64> {
        let offset = walker * self.n_samples;
        (0..self.n_samples)
            .map(|step| self.chain[(offset + step, coordinate)])
            .collect()
    }
}

/// Stretch factor `z = ((a - 1) u + 1)^2 / a`.
fn sample_stretch(rng: &mut StdRng, scale: f64) -> f64 {
    let u = rng.random::<f64>();
    (scale - 1.0).mul_add(u, 1.0).powi(2) / scale
}

/// Run the stretch-move ensemble from `initial` walker positions
/// (`n_walkers x dim`).
///
/// # Errors
///
/// Returns `InferenceError` if the schedule does not fit the dimension or
/// the initial positions have the wrong shape.
pub fn run_stretch_ensemble<F>(
    log_prob: &F,
    initial: &Mat<f64>,
    schedule: &EnsembleSchedule,
    rng: &mut StdRng,
) -> Result<EnsembleRun, InferenceError>
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    let dim = initial.ncols();
    schedule.validate(dim)?;
    if initial.nrows() != schedule.n_walkers {
        return Err(InferenceError::DimensionMismatch {
            expected: schedule.n_walkers,
            found: initial.nrows(),
        });
    }

    let n_walkers = schedule.n_walkers;
    let half = n_walkers / 2;
    let mut positions: Vec<Vec<f64>> = (0..n_walkers).map(|w| row_to_vec(initial, w)).collect();
    let mut current_lp: Vec<f64> = positions.par_iter().map(|p| log_prob(p)).collect();
    let mut walker_stats = vec![ProposalStats::default(); n_walkers];

    let mut chain = Mat::<f64>::zeros(schedule.retained_draws(), dim);
    let mut log_probs = vec![0.0; schedule.retained_draws()];
    let ln_dim_factor = usize_to_f64(dim) - 1.0;

    for step in 0..schedule.total_steps() {
        let mut order: Vec<usize> = (0..n_walkers).collect();
        order.shuffle(rng);
        let (first, second) = order.split_at(half);
        for (active, complement) in [(first, second), (second, first)] {
            let proposals: Vec<(Vec<f64>, f64)> = active
                .iter()
                .map(|&walker| {
                    let z = sample_stretch(rng, schedule.stretch_scale);
                    let partner = &positions[complement[rng.random_range(0..complement.len())]];
                    let proposal = positions[walker]
                        .iter()
                        .zip(partner)
                        .map(|(x, c)| z.mul_add(x - c, *c))
                        .collect();
                    (proposal, z)
                })
                .collect();
            let proposed_lp: Vec<f64> = proposals.par_iter().map(|(p, _)| log_prob(p)).collect();

            for ((&walker, (proposal, z)), lp) in active.iter().zip(proposals).zip(proposed_lp) {
                let log_ratio = ln_dim_factor.mul_add(z.ln(), lp - current_lp[walker]);
                let accepted = rng.random::<f64>().ln() < log_ratio;
                walker_stats[walker].record(accepted);
                if accepted {
                    positions[walker] = proposal;
                    current_lp[walker] = lp;
                }
            }
        }

        if step >= schedule.n_burnin {
            let kept = step - schedule.n_burnin;
            for (walker, position) in positions.iter().enumerate() {
                let row = walker * schedule.n_samples + kept;
                for (col, value) in position.iter().enumerate() {
                    chain[(row, col)] = *value;
                }
                log_probs[row] = current_lp[walker];
            }
        }
    }

    Ok(EnsembleRun {
        chain,
        log_probs,
        walker_stats,
        n_walkers,
        n_samples: schedule.n_samples,
    })
}
