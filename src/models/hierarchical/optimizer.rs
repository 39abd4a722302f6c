//! Local minimization and finite-difference curvature of the objective.

use argmin::core::{CostFunction, Executor, State, TerminationReason, TerminationStatus};
use argmin::solver::neldermead::NelderMead;
use faer::Mat;

use super::types::{HessianMethod, HierarchicalError, NelderMeadOptions};
use crate::models::matrix_ops::symmetrize_matrix;

/// Step used for zero-valued coordinates when building the initial simplex.
const ZERO_COORDINATE_STEP: f64 = 0.000_25;

/// Outcome of a local minimization.
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: u64,
    pub converged: bool,
}

struct ArgminProblem<'a, F> {
    objective: &'a F,
    bounds: Option<&'a [(f64, f64)]>,
}

fn clamp_params(params: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    params
        .iter()
        .zip(bounds)
        .map(|(&v, &(lo, hi))| v.clamp(lo, hi))
        .collect()
}

impl<F> CostFunction for ArgminProblem<'_, F>
where
    F: Fn(&[f64]) -> f64,
{
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        let value = match self.bounds {
            Some(bounds) => (self.objective)(&clamp_params(params, bounds)),
            None => (self.objective)(params),
        };
        // The simplex ordering only needs comparisons; NaN would break it.
        Ok(if value.is_nan() { f64::INFINITY } else { value })
    }
}

fn initial_simplex(start: &[f64], relative_step: f64) -> Vec<Vec<f64>> {
    let mut simplex = Vec::with_capacity(start.len() + 1);
    simplex.push(start.to_vec());
    for idx in 0..start.len() {
        let mut vertex = start.to_vec();
        vertex[idx] = if vertex[idx] == 0.0 {
            ZERO_COORDINATE_STEP
        } else {
            relative_step.mul_add(vertex[idx], vertex[idx])
        };
        simplex.push(vertex);
    }
    simplex
}

/// Minimize `objective` with a Nelder-Mead simplex started at `start`.
///
/// With `bounds`, parameters are clamped into the box before every
/// evaluation and the reported minimum is clamped too.
///
/// # Errors
///
/// Returns `HierarchicalError` if the options are invalid or the solver
/// fails.
pub fn minimize_nelder_mead<F>(
    objective: &F,
    start: &[f64],
    bounds: Option<&[(f64, f64)]>,
    options: &NelderMeadOptions,
) -> Result<Minimum, HierarchicalError>
where
    F: Fn(&[f64]) -> f64,
{
    if !options.is_valid() {
        return Err(HierarchicalError::InvalidOptimizerOptions);
    }
    let start = match bounds {
        Some(bounds) => clamp_params(start, bounds),
        None => start.to_vec(),
    };
    let solver = NelderMead::new(initial_simplex(&start, options.initial_step))
        .with_sd_tolerance(options.sd_tolerance)
        .map_err(|_| HierarchicalError::InvalidOptimizerOptions)?;
    let problem = ArgminProblem { objective, bounds };

    let res = Executor::new(problem, solver)
        .configure(|state| state.max_iters(options.max_iters))
        .run()
        .map_err(|e| HierarchicalError::OptimizerFailed(e.to_string()))?;

    let state = res.state();
    let best = state
        .get_best_param()
        .ok_or_else(|| HierarchicalError::OptimizerFailed("no best parameters".to_string()))?;
    let point = match bounds {
        Some(bounds) => clamp_params(best, bounds),
        None => best.clone(),
    };
    let converged = matches!(
        state.get_termination_status(),
        TerminationStatus::Terminated(
            TerminationReason::SolverConverged | TerminationReason::TargetCostReached
        )
    );

    Ok(Minimum {
        point,
        value: state.get_best_cost(),
        iterations: state.get_iter(),
        converged,
    })
}

/// Hessian of `objective` at `point` by finite differences.
///
/// The step along coordinate `i` is `step * max(|x_i|, 1)`. The result is
/// symmetrized.
#[must_use]
pub fn finite_difference_hessian<F>(
    objective: &F,
    point: &[f64],
    step: f64,
    method: HessianMethod,
) -> Mat<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let dim = point.len();
    let steps: Vec<f64> = point.iter().map(|x| step * x.abs().max(1.0)).collect();
    let eval = |shifts: &[(usize, f64)]| {
        let mut shifted = point.to_vec();
        for &(idx, delta) in shifts {
            shifted[idx] += delta;
        }
        objective(&shifted)
    };

    let mut hessian = Mat::<f64>::zeros(dim, dim);
    match method {
        HessianMethod::Central => {
            let center = objective(point);
            for i in 0..dim {
                let hi = steps[i];
                hessian[(i, i)] = (eval(&[(i, hi)]) - 2.0 * center + eval(&[(i, -hi)])) / (hi * hi);
                for j in 0..i {
                    let hj = steps[j];
                    let value = (eval(&[(i, hi), (j, hj)]) - eval(&[(i, hi), (j, -hj)])
                        - eval(&[(i, -hi), (j, hj)])
                        + eval(&[(i, -hi), (j, -hj)]))
                        / (4.0 * hi * hj);
                    hessian[(i, j)] = value;
                    hessian[(j, i)] = value;
                }
            }
        }
        HessianMethod::Forward | HessianMethod::Backward => {
            let sign = if method == HessianMethod::Forward { 1.0 } else { -1.0 };
            let center = objective(point);
            let single: Vec<f64> = (0..dim).map(|i| eval(&[(i, sign * steps[i])])).collect();
            for i in 0..dim {
                let hi = sign * steps[i];
                hessian[(i, i)] =
                    (eval(&[(i, 2.0 * hi)]) - 2.0 * single[i] + center) / (hi * hi);
                for j in 0..i {
                    let hj = sign * steps[j];
                    let value =
                        (eval(&[(i, hi), (j, hj)]) - single[i] - single[j] + center) / (hi * hj);
                    hessian[(i, j)] = value;
                    hessian[(j, i)] = value;
                }
            }
        }
    }
    symmetrize_matrix(&hessian)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quadratic(x: &[f64]) -> f64 {
        // 1/2 x' A x + b' x with A = [[4, 1], [1, 3]], b = [-1, 2]
        0.5 * (4.0 * x[0] * x[0] + 2.0 * x[0] * x[1] + 3.0 * x[1] * x[1]) - x[0] + 2.0 * x[1]
    }

    #[test]
    fn finite_difference_hessian_matches_quadratic() {
        for method in [
            HessianMethod::Central,
            HessianMethod::Forward,
            HessianMethod::Backward,
        ] {
            let hessian = finite_difference_hessian(&quadratic, &[0.3, -1.2], 1e-4, method);
            assert_relative_eq!(hessian[(0, 0)], 4.0, epsilon = 1e-5);
            assert_relative_eq!(hessian[(1, 1)], 3.0, epsilon = 1e-5);
            assert_relative_eq!(hessian[(0, 1)], 1.0, epsilon = 1e-5);
            assert_relative_eq!(hessian[(1, 0)], 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn nelder_mead_finds_quadratic_minimum() {
        // Minimum solves A x = -b.
        let result = minimize_nelder_mead(
            &quadratic,
            &[1.0, 1.0],
            None,
            &NelderMeadOptions::default(),
        )
        .expect("optimizer runs");
        assert!(result.converged);
        assert_relative_eq!(result.point[0], 5.0 / 11.0, epsilon = 1e-4);
        assert_relative_eq!(result.point[1], -9.0 / 11.0, epsilon = 1e-4);
    }

    #[test]
    fn bounds_clamp_the_reported_minimum() {
        let bounds = [(0.0, f64::INFINITY), (f64::NEG_INFINITY, f64::INFINITY)];
        let shifted = |x: &[f64]| (x[0] + 1.0).powi(2) + (x[1] - 2.0).powi(2);
        let result = minimize_nelder_mead(
            &shifted,
            &[1.0, 1.0],
            Some(&bounds),
            &NelderMeadOptions::default(),
        )
        .expect("optimizer runs");
        assert!(result.point[0] >= 0.0);
        assert_relative_eq!(result.point[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(result.point[1], 2.0, epsilon = 1e-4);
    }

    #[test]
    fn infinite_regions_are_avoided() {
        let walled = |x: &[f64]| {
            if x[0] <= 0.0 {
                f64::INFINITY
            } else {
                (x[0] - 0.5).powi(2)
            }
        };
        let result = minimize_nelder_mead(&walled, &[2.0], None, &NelderMeadOptions::default())
            .expect("optimizer runs");
        assert_relative_eq!(result.point[0], 0.5, epsilon = 1e-4);
    }

    #[test]
    fn invalid_options_are_rejected() {
        let options = NelderMeadOptions {
            initial_step: 0.0,
            ..NelderMeadOptions::default()
        };
        assert_eq!(
            minimize_nelder_mead(&quadratic, &[0.0, 0.0], None, &options),
            Err(HierarchicalError::InvalidOptimizerOptions)
        );
    }
}
