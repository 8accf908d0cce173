//! Strike shifting for smiles quoted at non-positive strikes.
//!
//! Hagan's formula takes `ln(F/K)` and `(F K)^((1-β)/2)`, both of which break down for
//! `K <= 0`. When the lowest strike is non-positive every strike and the forward are
//! moved up by the same amount so that the lowest strike lands on [`SHIFT_FLOOR`].
//! Relative strike spacing is unchanged.
//!
//! The shift is a pure function of one smile's own strikes. It is recomputed at every
//! call site and never stored.

use std::borrow::Cow;

/// Level the lowest strike is moved to when shifting is required.
pub const SHIFT_FLOOR: f64 = 0.001;

/// Amount to add to the forward and strikes, or `None` when all strikes are positive.
pub fn strike_shift(strikes: &[f64]) -> Option<f64> {
    let min_strike = strikes.iter().copied().fold(f64::INFINITY, f64::min);
    if min_strike <= 0.0 {
        Some(SHIFT_FLOOR - min_strike)
    } else {
        None
    }
}

/// Returns `(forward', strikes')`, shifted when the minimum strike is `<= 0` and
/// borrowed unchanged otherwise.
pub fn shift_strikes(forward: f64, strikes: &[f64]) -> (f64, Cow<'_, [f64]>) {
    match strike_shift(strikes) {
        Some(shift) => (
            forward + shift,
            Cow::Owned(strikes.iter().map(|k| k + shift).collect()),
        ),
        None => (forward, Cow::Borrowed(strikes)),
    }
}
