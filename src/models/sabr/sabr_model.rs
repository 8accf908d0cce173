// src/models/sabr/sabr_model.rs

//! SABR (Stochastic Alpha Beta Rho) model and Hagan's implied volatility approximation
//!
//! The forward rate follows a CEV process whose volatility is itself lognormal:
//!
//! dF = α F^β dW₁,  dα = ν α dW₂,  dW₁·dW₂ = ρ dt
//!
//! Hagan et al. (2002) give a closed-form asymptotic expansion for the Black implied
//! volatility σ(F, K, T). With f₁ = α / (F K)^((1-β)/2) and
//!
//! c(T) = 1 + [ (1-β)²/24 · f₁² + β ν ρ / 4 · f₁ + ν² (2 - 3ρ²) / 24 ] · T
//!
//! the away-from-the-money approximation is
//!
//! σ = f₁ · 1 / (1 + (1-β)² ln²(F/K)/24 + (1-β)⁴ ln⁴(F/K)/1920) · z/x(z) · c(T)
//!
//! where z = ν/f₁ · ln(F/K) and x(z) = ln((sqrt(1 - 2ρz + z²) + z - ρ) / (1 - ρ)).
//! At the money z/x(z) has a removable singularity and the formula collapses to
//! σ = f₁ · c(T) with f₁ = α / F^(1-β).

use crate::calibration::error::CalibrationError;
use serde::{Deserialize, Serialize};

/// SABR parameters for a single smile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SABRParams {
    /// Initial volatility level (> 0)
    pub alpha: f64,
    /// CEV exponent in [0, 1]
    pub beta: f64,
    /// Forward/vol correlation in (-1, 1)
    pub rho: f64,
    /// Volatility of volatility (>= 0)
    pub nu: f64,
}

/// Checks the mathematical domain of the model. The calibration box is tighter and is
/// enforced by the optimiser, not here.
fn validate_sabr_params(alpha: f64, beta: f64, rho: f64, nu: f64) -> Result<(), CalibrationError> {
    if alpha <= 0.0 || !alpha.is_finite() {
        return Err(CalibrationError::degenerate(format!(
            "SABRParams validation: alpha (alpha={}) must be > 0 and finite",
            alpha
        )));
    }
    if !(0.0..=1.0).contains(&beta) {
        return Err(CalibrationError::degenerate(format!(
            "SABRParams validation: beta (beta={}) must be in [0, 1]",
            beta
        )));
    }
    if rho <= -1.0 || rho >= 1.0 || !rho.is_finite() {
        return Err(CalibrationError::degenerate(format!(
            "SABRParams validation: rho (rho={}) must be in (-1, 1)",
            rho
        )));
    }
    if nu < 0.0 || !nu.is_finite() {
        return Err(CalibrationError::degenerate(format!(
            "SABRParams validation: nu (nu={}) must be >= 0 and finite",
            nu
        )));
    }
    Ok(())
}

impl SABRParams {
    /// Creates new SABR parameters with validation.
    pub fn new(alpha: f64, beta: f64, rho: f64, nu: f64) -> Result<Self, CalibrationError> {
        validate_sabr_params(alpha, beta, rho, nu)?;
        Ok(Self {
            alpha,
            beta,
            rho,
            nu,
        })
    }

    /// Builds parameters from an optimisation vector `[alpha, beta, rho, nu]` without
    /// validation. Panics if `x` has fewer than four entries.
    pub fn from_slice(x: &[f64]) -> Self {
        Self {
            alpha: x[0],
            beta: x[1],
            rho: x[2],
            nu: x[3],
        }
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.alpha, self.beta, self.rho, self.nu]
    }

    pub fn validate(&self) -> Result<(), CalibrationError> {
        validate_sabr_params(self.alpha, self.beta, self.rho, self.nu)
    }
}

/// Time-dependent correction bracket shared by both branches of the formula.
#[inline]
fn expiry_correction(p: &SABRParams, factor1: f64, expiry: f64) -> f64 {
    let one_minus_beta = 1.0 - p.beta;
    1.0 + (one_minus_beta * one_minus_beta / 24.0 * factor1 * factor1
        + (p.beta * p.nu * p.rho) / 4.0 * factor1
        + p.nu * p.nu * (2.0 - 3.0 * p.rho * p.rho) / 24.0)
        * expiry
}

/// Hagan's implied volatility for a single strike.
///
/// The at-the-money branch is taken only when `forward == strike` exactly. For strikes
/// very close to (but not equal to) the forward, `z / x(z)` loses precision; callers that
/// need a smooth ATM neighbourhood should evaluate exactly at the forward.
pub fn hagan_vol(params: &SABRParams, forward: f64, strike: f64, expiry: f64) -> f64 {
    let one_minus_beta = 1.0 - params.beta;

    if forward == strike {
        let factor1 = params.alpha / forward.powf(one_minus_beta);
        let factor2 = expiry_correction(params, factor1, expiry);
        return factor1 * factor2;
    }

    let factor1 = params.alpha / (forward * strike).powf(one_minus_beta / 2.0);
    let log_fk = (forward / strike).ln();
    let z = params.nu / factor1 * log_fk;
    let x = (((1.0 - 2.0 * params.rho * z + z * z).sqrt() + z - params.rho)
        / (1.0 - params.rho))
        .ln();
    let scaled_log = one_minus_beta * log_fk;
    let factor2 = 1.0
        / (1.0 + scaled_log.powi(2) / 24.0 + scaled_log.powi(4) / 1920.0);
    let factor3 = z / x;
    let factor4 = expiry_correction(params, factor1, expiry);

    factor1 * factor2 * factor3 * factor4
}

/// Elementwise [`hagan_vol`] over a strike sequence with shared parameters.
pub fn hagan_vols(params: &SABRParams, forward: f64, strikes: &[f64], expiry: f64) -> Vec<f64> {
    strikes
        .iter()
        .map(|&k| hagan_vol(params, forward, k, expiry))
        .collect()
}

/// A calibrated SABR smile: parameters bound to a forward and expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct SABRSlice {
    pub params: SABRParams,
    pub forward: f64,
    pub expiry: f64,
}

impl SABRSlice {
    pub fn new(params: SABRParams, forward: f64, expiry: f64) -> Self {
        Self {
            params,
            forward,
            expiry,
        }
    }

    /// Model implied volatility at `strike`.
    pub fn implied_vol(&self, strike: f64) -> f64 {
        hagan_vol(&self.params, self.forward, strike, self.expiry)
    }

    /// Model implied volatilities for every strike in `strikes`.
    pub fn implied_vols(&self, strikes: &[f64]) -> Vec<f64> {
        hagan_vols(&self.params, self.forward, strikes, self.expiry)
    }
}
