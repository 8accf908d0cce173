//! Calibrator that computes its results once and keeps them.

use std::sync::OnceLock;

use crate::calibration::config::OptimizationConfig;
use crate::calibration::engine::CalibrationEngine;
use crate::calibration::error::CalibrationError;
use crate::calibration::types::{CalibrationResult, MarketSmile};
use crate::market::MarketGrid;
use crate::models::sabr::reconstruction::{reconstruct_fits, VolMatrix};
use crate::models::sabr::sabr_model::SABRParams;

/// Calibrates a fixed set of smiles from a fixed starting point.
///
/// Both the calibration result and the reconstructed vol matrix are computed lazily on
/// first access and cached for the lifetime of the instance. Concurrent first accesses
/// block on a single computation. Build a new instance to recalibrate.
pub struct SABRCalibrator {
    x0: SABRParams,
    smiles: Vec<MarketSmile>,
    engine: CalibrationEngine,
    calibrated: OnceLock<Result<CalibrationResult, CalibrationError>>,
    vol_matrix: OnceLock<Result<VolMatrix, CalibrationError>>,
}

impl SABRCalibrator {
    pub fn new(x0: SABRParams, smiles: Vec<MarketSmile>, config: OptimizationConfig) -> Self {
        Self {
            x0,
            smiles,
            engine: CalibrationEngine::new(config),
            calibrated: OnceLock::new(),
            vol_matrix: OnceLock::new(),
        }
    }

    pub fn from_grid(x0: SABRParams, grid: &MarketGrid, config: OptimizationConfig) -> Self {
        Self::new(x0, grid.to_smiles(), config)
    }

    pub fn initial_guess(&self) -> &SABRParams {
        &self.x0
    }

    pub fn smiles(&self) -> &[MarketSmile] {
        &self.smiles
    }

    /// Per-smile calibrated parameters; runs the calibration on first call.
    pub fn calibrated_params(&self) -> Result<&CalibrationResult, CalibrationError> {
        self.calibrated
            .get_or_init(|| self.engine.calibrate(&self.x0, &self.smiles))
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Model vols at every market strike; calibrates first if needed.
    pub fn vol_matrix(&self) -> Result<&VolMatrix, CalibrationError> {
        self.vol_matrix
            .get_or_init(|| {
                let result = self.calibrated_params()?;
                reconstruct_fits(result, &self.smiles)
            })
            .as_ref()
            .map_err(Clone::clone)
    }
}
