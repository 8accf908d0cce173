use sabr_surface::{GridRow, MarketGrid, MarketSmile, OptimizationConfig, SABRParams};

/// Load a swaption vol grid from CSV.
///
/// Layout: `tenor,expiry,forward,<spread_bp>...` header, then one row per expiry/tenor
/// pair with one vol per spread column.
pub fn load_test_grid(file_path: &str) -> Result<MarketGrid, Box<dyn std::error::Error>> {
    let mut reader = csv::Reader::from_path(file_path)?;

    let strike_spreads = reader
        .headers()?
        .iter()
        .skip(3)
        .map(|h| h.trim().parse::<i32>())
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let values = record
            .iter()
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()?;
        if values.len() < 3 {
            return Err(format!("short row: {:?}", record).into());
        }
        rows.push(GridRow {
            tenor: values[0],
            expiry: values[1],
            forward: values[2],
            vols: values[3..].to_vec(),
        });
    }

    Ok(MarketGrid::new(strike_spreads, rows))
}

/// Starting values used by the desk script for every smile
#[allow(dead_code)]
pub fn desk_initial_guess() -> SABRParams {
    SABRParams::new(0.0011, 0.5, 0.0, 0.0011).expect("valid initial guess")
}

#[allow(dead_code)]
pub fn synthetic_smile(truth: &SABRParams, forward: f64, spreads_bp: &[f64], expiry: f64) -> MarketSmile {
    let strikes: Vec<f64> = spreads_bp.iter().map(|bp| forward + 1e-4 * bp).collect();
    let (f, k) = sabr_surface::shift_strikes(forward, &strikes);
    let vols = sabr_surface::hagan_vols(truth, f, &k, expiry);
    MarketSmile::new(forward, strikes, expiry, vols)
}

/// Create default test configuration
#[allow(dead_code)]
pub fn create_test_config() -> OptimizationConfig {
    OptimizationConfig::fast()
}
