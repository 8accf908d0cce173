//! Grid-level calibration driver.
//!
//! Every smile is validated and solved on its own, from the same initial guess, with no
//! state shared between solves. With the `parallel` feature the smiles are mapped over
//! the rayon pool; results are collected by index so the output order always matches the
//! input order.

use crate::calibration::config::{ConvergencePolicy, OptimizationConfig};
use crate::calibration::error::{CalibrationError, SmileFailure};
use crate::calibration::pipeline::calibrate_model;
use crate::calibration::types::{
    CalibrationResult, FitStatus, MarketSmile, ModelCalibrator, SmileFit,
};
use crate::models::sabr::sabr_calibrator::SABRSmileCalibrator;
use crate::models::sabr::sabr_model::SABRParams;
use tracing::{debug, info, warn};

pub struct CalibrationEngine {
    model: Box<dyn ModelCalibrator>,
    config: OptimizationConfig,
}

impl CalibrationEngine {
    pub fn new(config: OptimizationConfig) -> Self {
        Self {
            model: Box::new(SABRSmileCalibrator::new(config.bounds)),
            config,
        }
    }

    /// Engine driving a custom objective instead of the plain SABR residual.
    pub fn with_model(model: Box<dyn ModelCalibrator>, config: OptimizationConfig) -> Self {
        Self { model, config }
    }

    pub fn config(&self) -> &OptimizationConfig {
        &self.config
    }

    /// Calibrates every smile from `x0`.
    ///
    /// Fails only when the request itself is unusable (no smiles, non-finite `x0`).
    /// Problems with individual smiles are reported in [`CalibrationResult::failures`]
    /// and leave the other smiles unaffected.
    pub fn calibrate(
        &self,
        x0: &SABRParams,
        smiles: &[MarketSmile],
    ) -> Result<CalibrationResult, CalibrationError> {
        if smiles.is_empty() {
            return Err(CalibrationError::degenerate("no smiles to calibrate"));
        }
        if x0.to_array().iter().any(|v| !v.is_finite()) {
            return Err(CalibrationError::degenerate(format!(
                "initial guess must be finite ({:?})",
                x0
            )));
        }

        let outcomes = self.solve_all(x0, smiles);

        let mut fits = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(fit) => fits.push(Some(fit)),
                Err(error) => {
                    warn!(smile = index, %error, "smile calibration failed");
                    fits.push(None);
                    failures.push(SmileFailure { index, error });
                }
            }
        }

        let unconverged = fits
            .iter()
            .flatten()
            .filter(|fit| !fit.is_converged())
            .count();
        info!(
            smiles = smiles.len(),
            failed = failures.len(),
            unconverged,
            "SABR calibration finished"
        );
        Ok(CalibrationResult::new(fits, failures))
    }

    #[cfg(feature = "parallel")]
    fn solve_all(
        &self,
        x0: &SABRParams,
        smiles: &[MarketSmile],
    ) -> Vec<Result<SmileFit, CalibrationError>> {
        use rayon::prelude::*;

        if self.config.parallel {
            smiles
                .par_iter()
                .enumerate()
                .map(|(i, smile)| self.calibrate_smile(i, x0, smile))
                .collect()
        } else {
            self.solve_sequential(x0, smiles)
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn solve_all(
        &self,
        x0: &SABRParams,
        smiles: &[MarketSmile],
    ) -> Vec<Result<SmileFit, CalibrationError>> {
        self.solve_sequential(x0, smiles)
    }

    fn solve_sequential(
        &self,
        x0: &SABRParams,
        smiles: &[MarketSmile],
    ) -> Vec<Result<SmileFit, CalibrationError>> {
        smiles
            .iter()
            .enumerate()
            .map(|(i, smile)| self.calibrate_smile(i, x0, smile))
            .collect()
    }

    /// Validates and calibrates a single smile.
    pub fn calibrate_smile(
        &self,
        index: usize,
        x0: &SABRParams,
        smile: &MarketSmile,
    ) -> Result<SmileFit, CalibrationError> {
        smile.validate()?;

        let outcome = calibrate_model(&*self.model, smile, &self.config, x0)?;
        let named: Vec<(&str, f64)> = self
            .model
            .param_names()
            .into_iter()
            .zip(outcome.params.to_array())
            .collect();
        debug!(
            smile = index,
            params = ?named,
            residual = outcome.objective,
            converged = outcome.converged,
            "smile solved"
        );

        if !outcome.converged {
            let reason = outcome
                .failure_reason
                .clone()
                .unwrap_or_else(|| "minimiser did not report success".to_string());
            match self.config.convergence_policy {
                ConvergencePolicy::Reject => {
                    return Err(CalibrationError::NonConvergence {
                        residual: outcome.objective,
                        reason,
                    });
                }
                ConvergencePolicy::Flag => {
                    warn!(smile = index, residual = outcome.objective, %reason, "keeping unconverged fit");
                }
            }
        }

        Ok(SmileFit {
            params: outcome.params,
            residual: outcome.objective,
            initial_residual: outcome.initial_objective,
            status: if outcome.converged {
                FitStatus::Converged
            } else {
                FitStatus::Unconverged
            },
        })
    }
}
