//! Rebuilding a model volatility surface from calibrated parameters.
//!
//! Each row is produced independently from its own smile: strikes are shifted again with
//! the same rule used during calibration (nothing from the calibration run is reused) and
//! Hagan's formula is applied elementwise.

use crate::calibration::error::CalibrationError;
use crate::calibration::types::{CalibrationResult, MarketSmile};
use crate::models::sabr::sabr_model::{SABRParams, SABRSlice};
use crate::models::sabr::shift::shift_strikes;

/// Model-implied vols, one row per smile in input order.
///
/// A row is `None` when the corresponding smile has no calibrated parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct VolMatrix {
    rows: Vec<Option<Vec<f64>>>,
}

impl VolMatrix {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        self.rows.get(index).and_then(|r| r.as_deref())
    }

    pub fn rows(&self) -> &[Option<Vec<f64>>] {
        &self.rows
    }

    /// Dense copy with missing rows filled by `fill`. Missing rows take the width of the
    /// widest row.
    pub fn to_dense(&self, fill: f64) -> Vec<Vec<f64>> {
        let width = self
            .rows
            .iter()
            .flatten()
            .map(Vec::len)
            .max()
            .unwrap_or(0);
        self.rows
            .iter()
            .map(|r| r.clone().unwrap_or_else(|| vec![fill; width]))
            .collect()
    }
}

/// Model vols for one smile at its own strikes.
pub fn reconstruct_smile(params: &SABRParams, smile: &MarketSmile) -> Vec<f64> {
    let (forward, strikes) = shift_strikes(smile.forward_rate(), smile.strikes());
    SABRSlice::new(*params, forward, smile.expiry()).implied_vols(&strikes)
}

/// Rebuilds every smile from an index-aligned parameter list.
pub fn reconstruct(
    params: &[SABRParams],
    smiles: &[MarketSmile],
) -> Result<VolMatrix, CalibrationError> {
    if params.len() != smiles.len() {
        return Err(CalibrationError::degenerate(format!(
            "{} parameter sets for {} smiles",
            params.len(),
            smiles.len()
        )));
    }
    let rows = params
        .iter()
        .zip(smiles)
        .map(|(p, smile)| Some(reconstruct_smile(p, smile)))
        .collect();
    Ok(VolMatrix { rows })
}

/// Rebuilds every smile that has a fit in `result`; failed smiles give empty rows.
pub fn reconstruct_fits(
    result: &CalibrationResult,
    smiles: &[MarketSmile],
) -> Result<VolMatrix, CalibrationError> {
    if result.len() != smiles.len() {
        return Err(CalibrationError::degenerate(format!(
            "calibration result covers {} smiles, got {}",
            result.len(),
            smiles.len()
        )));
    }
    let rows = result
        .fits()
        .iter()
        .zip(smiles)
        .map(|(fit, smile)| fit.as_ref().map(|f| reconstruct_smile(&f.params, smile)))
        .collect();
    Ok(VolMatrix { rows })
}
