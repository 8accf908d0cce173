//! Swaption volatility grid as delivered by a market-data provider.
//!
//! A grid shares one list of strike offsets (in basis points from the forward) across all
//! rows; each row is one expiry/tenor pair with its forward rate and one quoted vol per
//! offset. Strikes are rebuilt per row as `forward + 0.0001 * spread`.

use crate::calibration::types::MarketSmile;
use serde::{Deserialize, Serialize};

/// Basis point in rate units.
pub const BASIS_POINT: f64 = 0.0001;

/// One expiry/tenor row of the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRow {
    /// Underlying swap length in years
    pub tenor: f64,
    /// Option expiry in years
    pub expiry: f64,
    pub forward: f64,
    /// One vol per strike offset of the grid
    pub vols: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketGrid {
    /// Strike offsets from ATM in basis points
    pub strike_spreads: Vec<i32>,
    pub rows: Vec<GridRow>,
}

impl MarketGrid {
    pub fn new(strike_spreads: Vec<i32>, rows: Vec<GridRow>) -> Self {
        Self {
            strike_spreads,
            rows,
        }
    }

    pub fn num_strikes(&self) -> usize {
        self.strike_spreads.len()
    }

    /// Number of smiles (rows).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn forwards(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.forward).collect()
    }

    pub fn expiries(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.expiry).collect()
    }

    pub fn tenors(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.tenor).collect()
    }

    /// Strike offsets converted to rate units.
    pub fn spread_offsets(&self) -> Vec<f64> {
        self.strike_spreads
            .iter()
            .map(|&bp| BASIS_POINT * f64::from(bp))
            .collect()
    }

    /// `[row][spread]` absolute strikes.
    pub fn strike_grid(&self) -> Vec<Vec<f64>> {
        let offsets = self.spread_offsets();
        self.rows
            .iter()
            .map(|r| offsets.iter().map(|o| r.forward + o).collect())
            .collect()
    }

    /// `[row][spread]` quoted vols.
    pub fn market_vols(&self) -> Vec<Vec<f64>> {
        self.rows.iter().map(|r| r.vols.clone()).collect()
    }

    /// One smile per row, in row order.
    ///
    /// Rows with the wrong number of vols are passed through as-is; the engine reports
    /// them as `InvalidSmileShape` for that smile only.
    pub fn to_smiles(&self) -> Vec<MarketSmile> {
        self.strike_grid()
            .into_iter()
            .zip(&self.rows)
            .map(|(strikes, r)| MarketSmile::new(r.forward, strikes, r.expiry, r.vols.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid() -> MarketGrid {
        MarketGrid::new(
            vec![-200, -100, 0, 100, 200],
            vec![
                GridRow {
                    tenor: 2.0,
                    expiry: 1.0,
                    forward: 0.015,
                    vols: vec![0.45, 0.35, 0.3, 0.28, 0.27],
                },
                GridRow {
                    tenor: 10.0,
                    expiry: 5.0,
                    forward: 0.025,
                    vols: vec![0.32, 0.27, 0.24, 0.22, 0.215],
                },
            ],
        )
    }

    #[test]
    fn aligned_sequences() {
        let g = grid();
        assert_eq!(g.len(), 2);
        assert_eq!(g.num_strikes(), 5);
        assert_eq!(g.forwards(), vec![0.015, 0.025]);
        assert_eq!(g.expiries(), vec![1.0, 5.0]);
        assert_eq!(g.tenors(), vec![2.0, 10.0]);
        assert_eq!(g.market_vols()[1][4], 0.215);
    }

    #[test]
    fn strikes_are_forward_plus_spread() {
        let strikes = grid().strike_grid();
        assert_relative_eq!(strikes[0][0], -0.005, epsilon = 1e-15);
        assert_relative_eq!(strikes[0][2], 0.015, epsilon = 1e-15);
        assert_relative_eq!(strikes[1][4], 0.045, epsilon = 1e-15);
    }

    #[test]
    fn smiles_follow_rows() {
        let smiles = grid().to_smiles();
        assert_eq!(smiles.len(), 2);
        assert_eq!(smiles[1].forward_rate(), 0.025);
        assert_eq!(smiles[1].expiry(), 5.0);
        assert_eq!(smiles[1].mkt_vols(), &[0.32, 0.27, 0.24, 0.22, 0.215]);
        // zero spread lands exactly on the forward, so that point is priced ATM
        assert_eq!(smiles[0].strikes()[2], smiles[0].forward_rate());
    }

    #[test]
    fn short_row_becomes_invalid_smile() {
        let mut g = grid();
        g.rows[0].vols.pop();
        let smiles = g.to_smiles();
        assert!(smiles[0].validate().is_err());
        assert!(smiles[1].validate().is_ok());
    }
}
