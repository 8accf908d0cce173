//! Error types for per-smile calibration.
//!
//! Every failure is attributed to a single smile. The engine never aborts a whole grid
//! because one smile is malformed or refuses to converge; it records a [`SmileFailure`]
//! and carries on with the rest.

use thiserror::Error;

/// Errors that can occur while validating or calibrating one smile.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibrationError {
    /// Number of strikes differs from the number of market vols.
    #[error("invalid smile shape: {strikes} strikes but {vols} market vols")]
    InvalidSmileShape { strikes: usize, vols: usize },

    /// Input that would feed NaN into the residual (empty data, non-positive expiry,
    /// non-finite values).
    #[error("degenerate input: {reason}")]
    DegenerateInput { reason: String },

    /// The minimiser stopped without reporting success.
    #[error("calibration did not converge (residual = {residual:.3e}): {reason}")]
    NonConvergence { residual: f64, reason: String },
}

/// Discriminant of [`CalibrationError`] without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidSmileShape,
    DegenerateInput,
    NonConvergence,
}

impl CalibrationError {
    pub fn degenerate(reason: impl Into<String>) -> Self {
        Self::DegenerateInput {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSmileShape { .. } => ErrorKind::InvalidSmileShape,
            Self::DegenerateInput { .. } => ErrorKind::DegenerateInput,
            Self::NonConvergence { .. } => ErrorKind::NonConvergence,
        }
    }
}

/// A failed smile: its position in the input sequence and what went wrong.
#[derive(Debug, Clone, PartialEq)]
pub struct SmileFailure {
    pub index: usize,
    pub error: CalibrationError,
}

impl SmileFailure {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}
