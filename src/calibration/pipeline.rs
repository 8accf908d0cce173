//! Bounded minimisation of a single smile.
//!
//! The local stages work in solver coordinates: a parameter whose lower bound is strictly
//! positive (alpha and nu for SABR) is solved as its logarithm, everything else as is. Both
//! local stages minimise the sum of squared residuals; the reported objective stays the
//! model's residual norm.

use crate::calibration::config::OptimizationConfig;
use crate::calibration::error::CalibrationError;
use crate::calibration::types::{MarketSmile, ModelCalibrator};
use crate::models::sabr::sabr_calibrator::SABRParamBounds;
use crate::models::sabr::sabr_model::SABRParams;
use cmaes_lbfgsb::cmaes::{canonical_cmaes_optimize, CmaesCanonicalConfig};
use cmaes_lbfgsb::lbfgsb_optimize::lbfgsb_optimize;
use nalgebra::{DMatrix, DVector};
use tracing::{debug, trace};

/// Outcome of one bounded minimisation.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    /// Best point found, always inside the model's bounds
    pub params: SABRParams,
    /// Objective at `params`
    pub objective: f64,
    /// Objective at the (projected) starting point
    pub initial_objective: f64,
    pub converged: bool,
    /// Why the solve is not considered converged, if it is not
    pub failure_reason: Option<String>,
}

/// Bounded minimisation of one smile's objective starting from `initial_guess`.
///
/// An optional CMA-ES stage samples around the guess inside a capped box. L-BFGS-B then
/// refines from the best point seen so far and a bounded Levenberg-Marquardt pass polishes
/// the result on the per-quote residuals. The solve is converged when the projected
/// gradient of the squared residual norm is within `config.tolerance`; running out of
/// iterations or stalling above it is reported in `failure_reason`.
///
/// The returned point is projected into the model's bounds and is never worse than the
/// starting point: if the solver ends above the start, the start is returned and the solve
/// is reported as unconverged.
///
/// Fails only when the model's bounds do not describe the four SABR parameters.
pub fn calibrate_model(
    model: &dyn ModelCalibrator,
    smile: &MarketSmile,
    config: &OptimizationConfig,
    initial_guess: &SABRParams,
) -> Result<SolveOutcome, CalibrationError> {
    let bounds = model.param_bounds();
    let box_ = SABRParamBounds::try_from(bounds)?;
    let obj_fn = |x: &[f64]| model.evaluate_objective(x, smile);

    let start = box_.project(&initial_guess.to_array());
    let start_vec = start.to_array().to_vec();
    let start_obj = obj_fn(&start_vec);
    debug!(
        model = model.model_name(),
        initial_objective = start_obj,
        "starting smile calibration"
    );
    if !start_obj.is_finite() {
        return Ok(SolveOutcome {
            params: start,
            objective: start_obj,
            initial_objective: start_obj,
            converged: false,
            failure_reason: Some("objective is not finite at the starting point".to_string()),
        });
    }

    // 1) Optional global stage around the initial guess
    let (seed_obj, seed_sol) = if config.global_search.enabled {
        let gs = &config.global_search;
        let search_bounds = box_.capped(gs.alpha_cap, gs.nu_cap).to_vec();

        let cmaes_config = CmaesCanonicalConfig {
            population_size: gs.pop_size,
            max_generations: gs.max_gen,
            seed: gs.seed.unwrap_or(123456),
            c1: None,
            c_mu: None,
            c_sigma: None,
            d_sigma: None,
            parallel_eval: gs.parallel_eval,
            verbosity: 0,
            ipop_restarts: gs.ipop_restarts,
            ipop_increase_factor: gs.ipop_increase_factor,
            bipop_restarts: gs.bipop_restarts,
            total_evals_budget: gs.total_evals_budget,
            use_subrun_budgeting: false,
            alpha_mu: None,
            hsig_threshold_factor: None,
            bipop_small_population_factor: None,
            bipop_small_budget_factor: None,
            bipop_large_budget_factor: None,
            bipop_large_pop_increase_factor: None,
            max_bound_iterations: None,
            eig_precision_threshold: None,
            min_eig_value: None,
            matrix_op_threshold: None,
            stagnation_limit: None,
            min_sigma: None,
        };

        let cmaes_result = canonical_cmaes_optimize(
            obj_fn,
            &search_bounds,
            cmaes_config,
            Some(start_vec.clone()),
        );
        let (_, global_params) = cmaes_result.best_solution;
        let global_obj = obj_fn(&global_params);
        debug!(
            initial_objective = start_obj,
            global_objective = global_obj,
            "CMA-ES stage finished"
        );
        if global_obj < start_obj {
            (global_obj, global_params)
        } else {
            (start_obj, start_vec.clone())
        }
    } else {
        (start_obj, start_vec.clone())
    };

    let space = SolverSpace::new(bounds);
    let squared = |y: &[f64]| {
        let r = obj_fn(&space.to_model(y));
        r * r
    };
    let residuals = |y: &[f64]| model.residuals(&space.to_model(y), smile);

    // 2) Local refinement with L-BFGS-B
    let seed_y = space.to_solver(&seed_sol);
    let seed_sq = squared(&seed_y);
    let mut refined = seed_y.clone();
    let refine_res = lbfgsb_optimize(
        &mut refined,
        space.bounds(),
        &squared,
        config.max_iterations,
        config.tolerance,
        if tracing::enabled!(tracing::Level::TRACE) {
            Some(|_current_x: &[f64], current_obj: f64| {
                trace!(objective = current_obj, "L-BFGS-B iteration");
            })
        } else {
            None
        },
        None, // Use default config
    );
    let polish_start = match refine_res {
        Ok((loc_sq, loc_y)) if loc_sq < seed_sq => loc_y,
        Ok((loc_sq, _)) => {
            debug!(
                seed_objective = seed_obj,
                local_objective = loc_sq.sqrt(),
                "L-BFGS-B did not improve objective, keeping seed"
            );
            seed_y
        }
        Err(e) => {
            debug!(error = %e, "L-BFGS-B failed, polishing from the seed");
            seed_y
        }
    };

    // 3) Least-squares polish on the residual vector
    let report = levenberg_marquardt(
        &residuals,
        polish_start,
        space.bounds(),
        &LmOptions {
            max_iterations: config.max_iterations,
            gradient_tolerance: config.tolerance,
            ..LmOptions::default()
        },
    );
    let gradient = projected_gradient(&residuals, &report.point, space.bounds());
    debug!(
        iterations = report.iterations,
        stop = ?report.stop,
        projected_gradient = gradient,
        "least-squares polish finished"
    );

    let failure_reason = if gradient <= config.tolerance {
        None
    } else {
        Some(match report.stop {
            LmStop::BudgetExhausted => format!(
                "iteration budget of {} exhausted (projected gradient {:.3e})",
                config.max_iterations, gradient
            ),
            LmStop::Stalled | LmStop::Converged => format!(
                "stalled after {} iterations (projected gradient {:.3e})",
                report.iterations, gradient
            ),
        })
    };

    let params = box_.project(&space.to_model(&report.point));
    let objective = obj_fn(&params.to_array());

    if !objective.is_finite() || objective > start_obj {
        let reason = format!(
            "solver ended at objective {:.6e}, above the starting value {:.6e}",
            objective, start_obj
        );
        return Ok(SolveOutcome {
            params: start,
            objective: start_obj,
            initial_objective: start_obj,
            converged: false,
            failure_reason: failure_reason.or(Some(reason)),
        });
    }

    Ok(SolveOutcome {
        params,
        objective,
        initial_objective: start_obj,
        converged: failure_reason.is_none(),
        failure_reason,
    })
}

/// Map between model parameters and the coordinates the local solvers move in.
#[derive(Debug, Clone)]
struct SolverSpace {
    model_bounds: Vec<(f64, f64)>,
    solver_bounds: Vec<(f64, f64)>,
    log_scaled: Vec<bool>,
}

impl SolverSpace {
    fn new(model_bounds: &[(f64, f64)]) -> Self {
        let log_scaled: Vec<bool> = model_bounds
            .iter()
            .map(|&(lo, _)| lo.is_finite() && lo > 0.0)
            .collect();
        let solver_bounds = model_bounds
            .iter()
            .zip(&log_scaled)
            .map(|(&(lo, hi), &log)| if log { (lo.ln(), hi.ln()) } else { (lo, hi) })
            .collect();
        Self {
            model_bounds: model_bounds.to_vec(),
            solver_bounds,
            log_scaled,
        }
    }

    fn bounds(&self) -> &[(f64, f64)] {
        &self.solver_bounds
    }

    fn to_solver(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(&self.log_scaled)
            .zip(&self.solver_bounds)
            .map(|((&v, &log), &b)| clamp(if log { v.ln() } else { v }, b))
            .collect()
    }

    /// Inverse of [`SolverSpace::to_solver`], clamped into the model box so rounding in
    /// `exp(ln(lo))` never leaves it.
    fn to_model(&self, y: &[f64]) -> Vec<f64> {
        y.iter()
            .zip(&self.log_scaled)
            .zip(&self.model_bounds)
            .map(|((&v, &log), &b)| clamp(if log { v.exp() } else { v }, b))
            .collect()
    }
}

fn clamp(v: f64, (lo, hi): (f64, f64)) -> f64 {
    if v.is_nan() {
        lo
    } else {
        v.max(lo).min(hi)
    }
}

/// Sum of squares, infinite when any residual is not finite.
fn sum_of_squares(residuals: &[f64]) -> f64 {
    let s: f64 = residuals.iter().map(|r| r * r).sum();
    if s.is_finite() {
        s
    } else {
        f64::INFINITY
    }
}

/// Max-norm of the gradient `2 Jᵀr` of the sum of squares at `y`, with `J` taken by
/// central differences. Components that point out of the box at an active bound are
/// dropped.
fn projected_gradient<R>(residuals: &R, y: &[f64], bounds: &[(f64, f64)]) -> f64
where
    R: Fn(&[f64]) -> Vec<f64>,
{
    let r = residuals(y);
    if !sum_of_squares(&r).is_finite() {
        return f64::INFINITY;
    }
    let mut worst = 0.0_f64;
    for (i, &(lo, hi)) in bounds.iter().enumerate() {
        let h = 1e-5 * y[i].abs().max(1.0);
        let mut up = y.to_vec();
        let mut down = y.to_vec();
        up[i] = (y[i] + h).min(hi);
        down[i] = (y[i] - h).max(lo);
        let span = up[i] - down[i];
        if span <= 0.0 {
            continue;
        }
        let g: f64 = residuals(&up)
            .iter()
            .zip(residuals(&down))
            .zip(&r)
            .map(|((ru, rd), r0)| 2.0 * (ru - rd) / span * r0)
            .sum();
        if !g.is_finite() {
            return f64::INFINITY;
        }
        let blocked = (y[i] <= lo && g > 0.0) || (y[i] >= hi && g < 0.0);
        if !blocked {
            worst = worst.max(g.abs());
        }
    }
    worst
}

#[derive(Debug, Clone, Copy)]
struct LmOptions {
    max_iterations: usize,
    /// Stop once the projected gradient of the sum of squares is at or below this
    gradient_tolerance: f64,
    initial_lambda: f64,
    lambda_up: f64,
    lambda_down: f64,
    max_stagnation: usize,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            gradient_tolerance: 1e-10,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
            max_stagnation: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LmStop {
    Converged,
    BudgetExhausted,
    /// Too many rejected steps in a row
    Stalled,
}

#[derive(Debug, Clone)]
struct LmReport {
    point: Vec<f64>,
    iterations: usize,
    stop: LmStop,
}

/// Box-constrained Levenberg-Marquardt on `residuals`, with Marquardt diagonal scaling
/// and candidates clamped into `bounds`. Only steps that lower the sum of squares are
/// taken, so the returned point is never worse than `start`.
fn levenberg_marquardt<R>(
    residuals: &R,
    start: Vec<f64>,
    bounds: &[(f64, f64)],
    options: &LmOptions,
) -> LmReport
where
    R: Fn(&[f64]) -> Vec<f64>,
{
    let mut x = start;
    let mut r = residuals(&x);
    let mut objective = sum_of_squares(&r);

    if !objective.is_finite() {
        return LmReport {
            point: x,
            iterations: 0,
            stop: LmStop::Stalled,
        };
    }
    if projected_gradient(residuals, &x, bounds) <= options.gradient_tolerance {
        return LmReport {
            point: x,
            iterations: 0,
            stop: LmStop::Converged,
        };
    }

    let mut lambda = options.initial_lambda;
    let mut stagnation = 0;
    let mut iterations = 0;
    let mut stop = LmStop::BudgetExhausted;

    while iterations < options.max_iterations {
        iterations += 1;

        let jacobian = forward_jacobian(residuals, &x, &r, bounds);
        let r_vec = DVector::from_column_slice(&r);
        let jt = jacobian.transpose();
        let mut a = &jt * &jacobian;
        let g = &jt * r_vec;
        for i in 0..a.nrows() {
            a[(i, i)] += lambda * (a[(i, i)].abs() + 1e-12);
        }

        let step = a
            .lu()
            .solve(&(-g))
            .filter(|delta| delta.iter().all(|d| d.is_finite()));
        let accepted = match step {
            Some(delta) => {
                let candidate: Vec<f64> = x
                    .iter()
                    .zip(delta.iter())
                    .zip(bounds)
                    .map(|((&xi, &di), &b)| clamp(xi + di, b))
                    .collect();
                let candidate_r = residuals(&candidate);
                let candidate_obj = sum_of_squares(&candidate_r);
                if candidate_obj < objective {
                    x = candidate;
                    r = candidate_r;
                    objective = candidate_obj;
                    true
                } else {
                    false
                }
            }
            None => false,
        };

        if accepted {
            lambda = (lambda * options.lambda_down).max(1e-12);
            stagnation = 0;
            if projected_gradient(residuals, &x, bounds) <= options.gradient_tolerance {
                stop = LmStop::Converged;
                break;
            }
        } else {
            lambda = (lambda * options.lambda_up).min(1e12);
            stagnation += 1;
            if stagnation >= options.max_stagnation {
                stop = LmStop::Stalled;
                break;
            }
        }
    }

    LmReport {
        point: x,
        iterations,
        stop,
    }
}

/// Forward-difference Jacobian of `residuals` at `x`, stepping backwards on a
/// coordinate sitting at its upper bound.
fn forward_jacobian<R>(residuals: &R, x: &[f64], r: &[f64], bounds: &[(f64, f64)]) -> DMatrix<f64>
where
    R: Fn(&[f64]) -> Vec<f64>,
{
    let mut jacobian = DMatrix::zeros(r.len(), x.len());
    for (j, &(lo, hi)) in bounds.iter().enumerate() {
        let h = 1e-7 * x[j].abs().max(1.0);
        let mut shifted = x.to_vec();
        shifted[j] = if x[j] + h <= hi { x[j] + h } else { (x[j] - h).max(lo) };
        let step = shifted[j] - x[j];
        if step == 0.0 {
            continue;
        }
        let r_shifted = residuals(&shifted);
        for (i, (&rs, &r0)) in r_shifted.iter().zip(r).enumerate() {
            jacobian[(i, j)] = (rs - r0) / step;
        }
    }
    jacobian
}
