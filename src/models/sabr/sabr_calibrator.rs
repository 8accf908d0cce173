// src/models/sabr/sabr_calibrator.rs

//! SABR smile calibrator
//!
//! One calibrator instance serves every smile of a grid: it carries nothing but the
//! parameter box, so the same instance can be shared across worker threads. The objective
//! for a candidate `[alpha, beta, rho, nu]` is the L2 norm of model-minus-market vols over
//! the whole smile, after strike shifting.

use crate::calibration::error::CalibrationError;
use crate::calibration::types::{MarketSmile, ModelCalibrator};
use crate::models::sabr::sabr_model::{hagan_vol, SABRParams};
use crate::models::sabr::shift::shift_strikes;
use serde::{Deserialize, Serialize};

/// Objective returned to the optimiser when the residual is not a finite number.
const INVALID_OBJECTIVE: f64 = 1.0e12;

/// Box constraints for the four SABR parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct SABRParamBounds {
    pub alpha: (f64, f64),
    pub beta: (f64, f64),
    pub rho: (f64, f64),
    pub nu: (f64, f64),
}

impl Default for SABRParamBounds {
    fn default() -> Self {
        Self {
            alpha: (0.001, f64::INFINITY),
            beta: (0.0, 1.0),
            rho: (-0.999, 0.999),
            nu: (0.001, f64::INFINITY),
        }
    }
}

impl TryFrom<&[(f64, f64)]> for SABRParamBounds {
    type Error = CalibrationError;

    fn try_from(bounds: &[(f64, f64)]) -> Result<Self, Self::Error> {
        match *bounds {
            [alpha, beta, rho, nu] => Ok(Self {
                alpha,
                beta,
                rho,
                nu,
            }),
            _ => Err(CalibrationError::degenerate(format!(
                "SABR needs 4 parameter bounds, got {}",
                bounds.len()
            ))),
        }
    }
}

impl SABRParamBounds {
    pub fn to_vec(&self) -> Vec<(f64, f64)> {
        vec![self.alpha, self.beta, self.rho, self.nu]
    }

    /// Same box with the alpha and nu upper edges lowered to at most `alpha_cap` and
    /// `nu_cap`. Sampling-based search needs a finite box.
    pub fn capped(&self, alpha_cap: f64, nu_cap: f64) -> Self {
        Self {
            alpha: (self.alpha.0, self.alpha.1.min(alpha_cap)),
            nu: (self.nu.0, self.nu.1.min(nu_cap)),
            ..*self
        }
    }

    /// Clamps `[alpha, beta, rho, nu]` into the box. NaN entries are sent to the lower edge.
    pub fn project(&self, x: &[f64]) -> SABRParams {
        let clamp = |v: f64, (lo, hi): (f64, f64)| {
            if v.is_nan() {
                lo
            } else {
                v.max(lo).min(hi)
            }
        };
        SABRParams {
            alpha: clamp(x[0], self.alpha),
            beta: clamp(x[1], self.beta),
            rho: clamp(x[2], self.rho),
            nu: clamp(x[3], self.nu),
        }
    }

    pub fn contains(&self, p: &SABRParams) -> bool {
        let inside = |v: f64, (lo, hi): (f64, f64)| v >= lo && v <= hi;
        inside(p.alpha, self.alpha)
            && inside(p.beta, self.beta)
            && inside(p.rho, self.rho)
            && inside(p.nu, self.nu)
    }
}

/// Model-minus-market vol differences `σ_model - σ_mkt`, one per strike.
///
/// Strikes are shifted first when the smile contains a non-positive strike.
pub fn smile_residuals(params: &SABRParams, smile: &MarketSmile) -> Vec<f64> {
    let (forward, strikes) = shift_strikes(smile.forward_rate(), smile.strikes());
    let expiry = smile.expiry();

    strikes
        .iter()
        .zip(smile.mkt_vols())
        .map(|(&strike, &mkt_vol)| hagan_vol(params, forward, strike, expiry) - mkt_vol)
        .collect()
}

/// L2 residual norm `sqrt(Σ (σ_model - σ_mkt)²)` of `params` against one smile.
///
/// The result is NaN if the candidate drives the formula outside its domain; callers that
/// feed an optimiser should go through [`SABRSmileCalibrator`], which maps that to a
/// penalty.
pub fn smile_residual(params: &SABRParams, smile: &MarketSmile) -> f64 {
    let sum_sq_diff: f64 = smile_residuals(params, smile)
        .iter()
        .map(|diff| diff * diff)
        .sum();
    sum_sq_diff.sqrt()
}

/// Calibrator for the SABR model with 4 parameters per smile:
/// [alpha, beta, rho, nu]
#[derive(Debug, Clone)]
pub struct SABRSmileCalibrator {
    param_bounds: Vec<(f64, f64)>,
}

impl SABRSmileCalibrator {
    pub fn new(bounds: SABRParamBounds) -> Self {
        Self {
            param_bounds: bounds.to_vec(),
        }
    }
}

impl Default for SABRSmileCalibrator {
    fn default() -> Self {
        Self::new(SABRParamBounds::default())
    }
}

impl ModelCalibrator for SABRSmileCalibrator {
    fn model_name(&self) -> &str {
        "sabr"
    }

    fn param_count(&self) -> usize {
        self.param_bounds.len()
    }

    fn param_bounds(&self) -> &[(f64, f64)] {
        &self.param_bounds
    }

    fn evaluate_objective(&self, x: &[f64], smile: &MarketSmile) -> f64 {
        assert_eq!(
            x.len(),
            4,
            "Input parameter vector length must be 4 for SABR model"
        );
        let residual = smile_residual(&SABRParams::from_slice(x), smile);
        if residual.is_finite() {
            residual
        } else {
            INVALID_OBJECTIVE
        }
    }

    fn residuals(&self, x: &[f64], smile: &MarketSmile) -> Vec<f64> {
        assert_eq!(
            x.len(),
            4,
            "Input parameter vector length must be 4 for SABR model"
        );
        smile_residuals(&SABRParams::from_slice(x), smile)
    }

    fn param_names(&self) -> Vec<&str> {
        vec!["alpha", "beta", "rho", "nu"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sabr::sabr_model::hagan_vols;
    use approx::assert_relative_eq;

    fn params() -> SABRParams {
        SABRParams::new(0.03, 0.5, -0.2, 0.35).unwrap()
    }

    #[test]
    fn residual_is_zero_on_model_generated_smile() {
        let p = params();
        let strikes = vec![0.01, 0.015, 0.02, 0.025, 0.03];
        let vols = hagan_vols(&p, 0.02, &strikes, 2.0);
        let smile = MarketSmile::new(0.02, strikes, 2.0, vols);
        assert!(smile_residual(&p, &smile) < 1e-15);
    }

    #[test]
    fn residual_is_l2_norm_of_differences() {
        let p = params();
        let strikes = vec![0.015, 0.02];
        let model = hagan_vols(&p, 0.02, &strikes, 1.0);
        let smile = MarketSmile::new(0.02, strikes, 1.0, vec![model[0] + 0.03, model[1] - 0.04]);
        assert_relative_eq!(smile_residual(&p, &smile), 0.05, max_relative = 1e-12);
    }

    #[test]
    fn residual_uses_shifted_strikes() {
        let p = params();
        let smile = MarketSmile::new(0.015, vec![-0.001, 0.01, 0.02], 0.5, vec![0.30, 0.22, 0.20]);
        let shifted = MarketSmile::new(0.017, vec![0.001, 0.012, 0.022], 0.5, vec![0.30, 0.22, 0.20]);
        let r = smile_residual(&p, &smile);
        assert!(r.is_finite());
        assert_relative_eq!(r, smile_residual(&p, &shifted), max_relative = 1e-12);
    }

    #[test]
    fn calibrator_maps_nan_to_penalty() {
        let calibrator = SABRSmileCalibrator::default();
        // non-positive forward with positive strikes: ln(F/K) is undefined
        let smile = MarketSmile::new(-0.01, vec![0.01, 0.02], 1.0, vec![0.2, 0.2]);
        let obj = calibrator.evaluate_objective(&[0.02, 0.5, 0.0, 0.3], &smile);
        assert_eq!(obj, INVALID_OBJECTIVE);
    }

    #[test]
    fn projection_clamps_into_box() {
        let bounds = SABRParamBounds::default();
        let p = bounds.project(&[-1.0, 1.5, -2.0, f64::NAN]);
        assert_eq!(p.alpha, 0.001);
        assert_eq!(p.beta, 1.0);
        assert_eq!(p.rho, -0.999);
        assert_eq!(p.nu, 0.001);
        assert!(bounds.contains(&p));

        let big = bounds.project(&[50.0, 0.5, 0.2, 80.0]);
        assert_eq!(big.alpha, 50.0);
        assert_eq!(big.nu, 80.0);
    }

    #[test]
    fn capped_box_is_finite() {
        let capped = SABRParamBounds::default().capped(5.0, 10.0);
        assert_eq!(capped.alpha, (0.001, 5.0));
        assert_eq!(capped.nu, (0.001, 10.0));
        assert_eq!(capped.rho, (-0.999, 0.999));
        assert_eq!(SABRParamBounds::try_from(capped.to_vec().as_slice()), Ok(capped));
    }

    #[test]
    fn wrong_bounds_length_is_rejected() {
        let three = [(0.001, 1.0), (0.0, 1.0), (-0.9, 0.9)];
        let err = SABRParamBounds::try_from(&three[..]).unwrap_err();
        assert_eq!(err.kind(), crate::calibration::error::ErrorKind::DegenerateInput);
        assert!(format!("{err}").contains("got 3"));

        let five = [(0.0, 1.0); 5];
        assert!(SABRParamBounds::try_from(&five[..]).is_err());
    }

    #[test]
    fn residuals_are_per_strike_differences() {
        let p = params();
        let strikes = vec![0.015, 0.02, 0.03];
        let model = hagan_vols(&p, 0.02, &strikes, 1.0);
        let smile = MarketSmile::new(0.02, strikes, 1.0, vec![model[0] + 0.01, model[1], model[2] - 0.02]);

        let calibrator = SABRSmileCalibrator::default();
        let r = calibrator.residuals(&p.to_array(), &smile);
        assert_eq!(r.len(), 3);
        assert_relative_eq!(r[0], -0.01, epsilon = 1e-15);
        assert_eq!(r[1], 0.0);
        assert_relative_eq!(r[2], 0.02, epsilon = 1e-15);

        let norm = r.iter().map(|d| d * d).sum::<f64>().sqrt();
        assert_relative_eq!(norm, calibrator.evaluate_objective(&p.to_array(), &smile), max_relative = 1e-14);
    }

    #[test]
    fn param_metadata() {
        let calibrator = SABRSmileCalibrator::default();
        assert_eq!(calibrator.model_name(), "sabr");
        assert_eq!(calibrator.param_count(), 4);
        assert_eq!(calibrator.param_names(), vec!["alpha", "beta", "rho", "nu"]);
    }
}
