use crate::calibration::error::{CalibrationError, SmileFailure};
use crate::models::sabr::sabr_model::SABRParams;
use crate::models::sabr::shift::strike_shift;

/// One market smile: a single expiry/tenor pair quoted across strikes.
///
/// Fields are private so a smile cannot be edited after construction. Construction
/// never fails; shape and finiteness checks live in [`MarketSmile::validate`] so a bad
/// smile can be rejected on its own without preventing the rest of a grid from loading.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSmile {
    forward_rate: f64,
    strikes: Vec<f64>,
    /// Time to expiry in years
    expiry: f64,
    /// Market implied vols, index-aligned with `strikes`
    mkt_vols: Vec<f64>,
}

impl MarketSmile {
    pub fn new(forward_rate: f64, strikes: Vec<f64>, expiry: f64, mkt_vols: Vec<f64>) -> Self {
        Self {
            forward_rate,
            strikes,
            expiry,
            mkt_vols,
        }
    }

    pub fn forward_rate(&self) -> f64 {
        self.forward_rate
    }

    pub fn strikes(&self) -> &[f64] {
        &self.strikes
    }

    pub fn expiry(&self) -> f64 {
        self.expiry
    }

    pub fn mkt_vols(&self) -> &[f64] {
        &self.mkt_vols
    }

    pub fn len(&self) -> usize {
        self.strikes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strikes.is_empty()
    }

    /// Fail-fast checks run before any solve is attempted.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        if self.strikes.len() != self.mkt_vols.len() {
            return Err(CalibrationError::InvalidSmileShape {
                strikes: self.strikes.len(),
                vols: self.mkt_vols.len(),
            });
        }
        if self.strikes.is_empty() {
            return Err(CalibrationError::degenerate("smile has no strikes"));
        }
        if !self.expiry.is_finite() || self.expiry <= 0.0 {
            return Err(CalibrationError::degenerate(format!(
                "expiry must be > 0 and finite (expiry={})",
                self.expiry
            )));
        }
        if !self.forward_rate.is_finite() {
            return Err(CalibrationError::degenerate(format!(
                "forward rate must be finite (forward={})",
                self.forward_rate
            )));
        }
        if let Some(pos) = self.strikes.iter().position(|k| !k.is_finite()) {
            return Err(CalibrationError::degenerate(format!(
                "strike {} is not finite ({})",
                pos, self.strikes[pos]
            )));
        }
        if let Some(pos) = self.mkt_vols.iter().position(|v| !v.is_finite()) {
            return Err(CalibrationError::degenerate(format!(
                "market vol {} is not finite ({})",
                pos, self.mkt_vols[pos]
            )));
        }
        let shifted_forward =
            self.forward_rate + strike_shift(&self.strikes).unwrap_or(0.0);
        if shifted_forward <= 0.0 {
            return Err(CalibrationError::degenerate(format!(
                "forward rate {} is non-positive after strike shifting",
                self.forward_rate
            )));
        }
        Ok(())
    }
}

/// Model calibrator trait for parameter optimization
pub trait ModelCalibrator: Send + Sync {
    /// Returns the name of the model (e.g., "sabr")
    fn model_name(&self) -> &str;

    /// How many parameters are in the model's optimization vector
    fn param_count(&self) -> usize;

    /// Returns the vector of (min, max) bounds for each parameter
    fn param_bounds(&self) -> &[(f64, f64)];

    /// Given a parameter vector `x` and one smile, returns the objective value
    fn evaluate_objective(&self, x: &[f64], smile: &MarketSmile) -> f64;

    /// Per-quote residuals whose L2 norm is the objective. Used by the least-squares
    /// polish; the default is the objective itself as a single residual.
    fn residuals(&self, x: &[f64], smile: &MarketSmile) -> Vec<f64> {
        vec![self.evaluate_objective(x, smile)]
    }

    /// Returns parameter names in the order they appear in the optimization vector
    fn param_names(&self) -> Vec<&str>;
}

/// Whether the minimiser reported success for a smile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStatus {
    Converged,
    /// Kept under [`ConvergencePolicy::Flag`](crate::calibration::config::ConvergencePolicy);
    /// treat as low-confidence.
    Unconverged,
}

/// Calibrated parameters for one smile together with fit diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct SmileFit {
    pub params: SABRParams,
    /// Residual norm at `params`
    pub residual: f64,
    /// Residual norm at the starting point
    pub initial_residual: f64,
    pub status: FitStatus,
}

impl SmileFit {
    pub fn is_converged(&self) -> bool {
        self.status == FitStatus::Converged
    }
}

/// Per-smile results in input order plus the list of smiles that failed.
///
/// Slot `i` always refers to input smile `i`; a failed smile leaves its slot empty and
/// shows up in [`CalibrationResult::failures`] instead.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationResult {
    fits: Vec<Option<SmileFit>>,
    failures: Vec<SmileFailure>,
}

impl CalibrationResult {
    pub(crate) fn new(fits: Vec<Option<SmileFit>>, failures: Vec<SmileFailure>) -> Self {
        Self { fits, failures }
    }

    /// Number of input smiles (including failed ones).
    pub fn len(&self) -> usize {
        self.fits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fits.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SmileFit> {
        self.fits.get(index).and_then(Option::as_ref)
    }

    pub fn fits(&self) -> &[Option<SmileFit>] {
        &self.fits
    }

    /// Calibrated parameters per smile, `None` where calibration failed.
    pub fn params(&self) -> Vec<Option<SABRParams>> {
        self.fits
            .iter()
            .map(|fit| fit.as_ref().map(|f| f.params))
            .collect()
    }

    pub fn failures(&self) -> &[SmileFailure] {
        &self.failures
    }

    /// True when every smile produced a parameter set.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.fits.iter().all(Option::is_some)
    }

    /// Indices of smiles whose fit was kept but flagged as unconverged.
    pub fn unconverged(&self) -> Vec<usize> {
        self.fits
            .iter()
            .enumerate()
            .filter_map(|(i, fit)| match fit {
                Some(f) if !f.is_converged() => Some(i),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::error::ErrorKind;

    fn smile() -> MarketSmile {
        MarketSmile::new(0.02, vec![0.01, 0.02, 0.03], 1.0, vec![0.3, 0.25, 0.27])
    }

    #[test]
    fn valid_smile_passes() {
        assert!(smile().validate().is_ok());
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let s = MarketSmile::new(0.02, vec![0.01, 0.02], 1.0, vec![0.3]);
        let err = s.validate().unwrap_err();
        assert_eq!(
            err,
            CalibrationError::InvalidSmileShape {
                strikes: 2,
                vols: 1
            }
        );
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        let empty = MarketSmile::new(0.02, vec![], 1.0, vec![]);
        assert_eq!(
            empty.validate().unwrap_err().kind(),
            ErrorKind::DegenerateInput
        );

        let zero_expiry = MarketSmile::new(0.02, vec![0.02], 0.0, vec![0.2]);
        assert_eq!(
            zero_expiry.validate().unwrap_err().kind(),
            ErrorKind::DegenerateInput
        );

        let nan_vol = MarketSmile::new(0.02, vec![0.01, 0.02], 1.0, vec![0.2, f64::NAN]);
        let err = nan_vol.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DegenerateInput);
        assert!(format!("{err}").contains("market vol 1"));

        let inf_strike = MarketSmile::new(0.02, vec![f64::INFINITY], 1.0, vec![0.2]);
        assert_eq!(
            inf_strike.validate().unwrap_err().kind(),
            ErrorKind::DegenerateInput
        );

        let negative_forward = MarketSmile::new(-0.01, vec![0.01, 0.02], 1.0, vec![0.2, 0.2]);
        assert_eq!(
            negative_forward.validate().unwrap_err().kind(),
            ErrorKind::DegenerateInput
        );

        // negative forward is fine once the strike shift lifts it above zero
        let shifted = MarketSmile::new(-0.001, vec![-0.002, 0.0], 1.0, vec![0.2, 0.2]);
        assert!(shifted.validate().is_ok());
    }

    #[test]
    fn result_accessors_follow_slots() {
        let fit = SmileFit {
            params: SABRParams::new(0.02, 0.5, 0.0, 0.3).unwrap(),
            residual: 1e-4,
            initial_residual: 1e-1,
            status: FitStatus::Unconverged,
        };
        let result = CalibrationResult::new(
            vec![Some(fit.clone()), None],
            vec![SmileFailure {
                index: 1,
                error: CalibrationError::degenerate("bad"),
            }],
        );
        assert_eq!(result.len(), 2);
        assert_eq!(result.get(0), Some(&fit));
        assert!(result.get(1).is_none());
        assert!(result.get(5).is_none());
        assert!(!result.is_complete());
        assert_eq!(result.unconverged(), vec![0]);
        assert_eq!(result.params()[1], None);
    }
}
