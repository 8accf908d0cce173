//! # sabr-surface: SABR Calibration of Swaption Volatility Grids
//!
//! `sabr-surface` fits the SABR stochastic-volatility model to a grid of interest-rate
//! option smiles, one parameter set `{alpha, beta, rho, nu}` per expiry/tenor pair, and
//! rebuilds a model-implied volatility surface from the fit.
//!
//! ## Core Features
//!
//! - **Hagan formula**: closed-form SABR implied volatility with an exact ATM branch
//! - **Negative rates**: smiles with non-positive strikes are shifted before evaluation
//! - **Bounded calibration**: L-BFGS-B per smile inside the SABR parameter box followed
//!   by a Levenberg-Marquardt polish, with an optional CMA-ES global stage
//! - **Convergence status**: every fit carries a projected-gradient convergence check,
//!   and unconverged smiles are flagged or rejected per `ConvergencePolicy`
//! - **Per-smile isolation**: smiles are solved independently (in parallel with the
//!   `parallel` feature); one bad smile never aborts the rest of the grid
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sabr_surface::{default_configs, GridRow, MarketGrid, SABRCalibrator, SABRParams};
//!
//! let grid = MarketGrid::new(
//!     vec![-100, -50, 0, 50, 100],
//!     vec![GridRow {
//!         tenor: 10.0,
//!         expiry: 1.0,
//!         forward: 0.025,
//!         vols: vec![0.31, 0.27, 0.25, 0.245, 0.248],
//!     }],
//! );
//!
//! let x0 = SABRParams::new(0.02, 0.5, 0.0, 0.2)?;
//! let calibrator = SABRCalibrator::from_grid(x0, &grid, default_configs::fast());
//!
//! let result = calibrator.calibrated_params()?;
//! for (i, fit) in result.fits().iter().enumerate() {
//!     println!("smile {i}: {:?}", fit.as_ref().map(|f| f.params));
//! }
//! let surface = calibrator.vol_matrix()?;
//! println!("{:?}", surface.row(0));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Configuration Presets
//!
//! - `production()`: tight tolerance, generous iteration budget
//! - `fast()`: balanced speed/accuracy for development
//! - `research()`: CMA-ES global search followed by L-BFGS-B refinement
//! - `minimal()`: quick sequential validation runs

// ================================================================================================
// MODULES
// ================================================================================================

pub mod calibration;
pub mod calibrator;
pub mod market;
pub mod models;

// ================================================================================================
// IMPORTS
// ================================================================================================

use anyhow::{Context, Result};

use calibration::engine::CalibrationEngine;
use models::sabr::sabr_calibrator::smile_residual;

// ================================================================================================
// PUBLIC RE-EXPORTS
// ================================================================================================

// Core types for market data and configuration
pub use calibration::{
    config::{ConvergencePolicy, GlobalSearchConfig, OptimizationConfig},
    error::{CalibrationError, ErrorKind, SmileFailure},
    types::{CalibrationResult, FitStatus, MarketSmile, SmileFit},
};

pub use calibrator::SABRCalibrator;
pub use market::{GridRow, MarketGrid};

// SABR model types and functions
pub use models::sabr::{
    reconstruction::{reconstruct, reconstruct_fits, reconstruct_smile, VolMatrix},
    sabr_calibrator::{smile_residuals, SABRParamBounds, SABRSmileCalibrator},
    sabr_model::{hagan_vol, hagan_vols, SABRParams, SABRSlice},
    shift::{shift_strikes, strike_shift, SHIFT_FLOOR},
};

// ================================================================================================
// DEFAULT CONFIGURATIONS
// ================================================================================================

/// Pre-configured optimization settings for common use cases.
pub mod default_configs {
    use crate::calibration::config::OptimizationConfig;

    /// Production-grade configuration.
    ///
    /// **Characteristics:**
    /// - Iteration budget per local stage: 1,000
    /// - Projected-gradient tolerance: 1e-10
    /// - Smiles solved in parallel
    pub fn production() -> OptimizationConfig {
        OptimizationConfig::production()
    }

    /// Fast configuration for development and testing.
    ///
    /// **Characteristics:**
    /// - Iteration budget per local stage: 300
    /// - Projected-gradient tolerance: 1e-9
    pub fn fast() -> OptimizationConfig {
        OptimizationConfig::fast()
    }

    /// Research configuration: CMA-ES around the initial guess, then L-BFGS-B.
    ///
    /// Noticeably slower; useful when the fit is sensitive to the initial guess.
    pub fn research() -> OptimizationConfig {
        OptimizationConfig::research()
    }

    /// Minimal configuration for quick validation and debugging.
    pub fn minimal() -> OptimizationConfig {
        OptimizationConfig::minimal()
    }
}

/// Calibrate one SABR parameter set per smile.
///
/// Each smile is minimised independently from `x0` inside `config.bounds`. The call fails
/// only if `smiles` is empty or `x0` is not finite; per-smile problems are listed in
/// [`CalibrationResult::failures`].
///
/// # Example
///
/// ```rust,no_run
/// use sabr_surface::{calibrate_sabr, default_configs, MarketSmile, SABRParams};
///
/// let smile = MarketSmile::new(0.02, vec![0.015, 0.02, 0.025], 1.0, vec![0.28, 0.25, 0.24]);
/// let x0 = SABRParams::new(0.02, 0.5, 0.0, 0.2)?;
///
/// let result = calibrate_sabr(&x0, &[smile], default_configs::fast())?;
/// if let Some(fit) = result.get(0) {
///     println!("{:?} residual={:.2e} {:?}", fit.params, fit.residual, fit.status);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn calibrate_sabr(
    x0: &SABRParams,
    smiles: &[MarketSmile],
    config: OptimizationConfig,
) -> Result<CalibrationResult> {
    let engine = CalibrationEngine::new(config);
    engine
        .calibrate(x0, smiles)
        .context("SABR calibration failed")
}

/// Evaluate the calibration objective for a fixed parameter set.
///
/// This is **exactly the residual norm** reported as `SmileFit::residual`, after
/// validating the smile. It lets callers measure fit quality without re-running the
/// optimiser.
pub fn evaluate_sabr(params: &SABRParams, smile: &MarketSmile) -> Result<f64> {
    smile.validate().context("cannot evaluate SABR fit")?;
    Ok(smile_residual(params, smile))
}
