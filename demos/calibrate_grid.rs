//! Calibrate a small swaption grid and print the model surface next to the market.
//!
//! Run with `RUST_LOG=sabr_surface=debug` to see per-smile solver output.

use anyhow::Result;
use sabr_surface::{default_configs, GridRow, MarketGrid, SABRCalibrator, SABRParams};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("SABR Swaption Grid Calibration Demo");
    println!("===================================");

    let grid = demo_grid();
    println!(
        "Grid: {} smiles x {} strikes (spreads {:?} bp)",
        grid.len(),
        grid.num_strikes(),
        grid.strike_spreads
    );

    let x0 = SABRParams::new(0.01, 0.5, 0.0, 0.3)?;
    let calibrator = SABRCalibrator::from_grid(x0, &grid, default_configs::production());

    println!("\nStep 1: Calibrating one SABR parameter set per smile...");
    let result = calibrator.calibrated_params()?;
    for ((row, fit), smile) in grid.rows.iter().zip(result.fits()).zip(calibrator.smiles()) {
        match fit {
            Some(fit) => println!(
                "  {:>4}y x {:>4}y  alpha={:.5} beta={:.3} rho={:+.3} nu={:.3}  residual={:.2e} {:?}",
                row.expiry,
                row.tenor,
                fit.params.alpha,
                fit.params.beta,
                fit.params.rho,
                fit.params.nu,
                fit.residual,
                fit.status
            ),
            None => println!("  {:>4}y x {:>4}y  no fit ({} quotes)", row.expiry, row.tenor, smile.len()),
        }
    }
    for failure in result.failures() {
        println!("  smile {} failed: {}", failure.index, failure.error);
    }

    println!("\nStep 2: Rebuilding the surface from the fitted parameters...");
    let surface = calibrator.vol_matrix()?;
    for (i, row) in grid.rows.iter().enumerate() {
        let Some(model_vols) = surface.row(i) else {
            continue;
        };
        println!("  {}y x {}y", row.expiry, row.tenor);
        println!("    {:>6} {:>9} {:>9} {:>9}", "bp", "market", "model", "diff");
        for ((bp, mkt), model) in grid.strike_spreads.iter().zip(&row.vols).zip(model_vols) {
            println!(
                "    {:>6} {:>9.5} {:>9.5} {:>+9.5}",
                bp,
                mkt,
                model,
                model - mkt
            );
        }
    }

    Ok(())
}

fn demo_grid() -> MarketGrid {
    MarketGrid::new(
        vec![-100, -50, -25, 0, 25, 50, 100],
        vec![
            GridRow {
                tenor: 2.0,
                expiry: 0.5,
                forward: 0.0045,
                vols: vec![0.612, 0.301, 0.214, 0.168, 0.175, 0.201, 0.248],
            },
            GridRow {
                tenor: 5.0,
                expiry: 1.0,
                forward: 0.012,
                vols: vec![0.341, 0.238, 0.205, 0.184, 0.176, 0.178, 0.192],
            },
            GridRow {
                tenor: 10.0,
                expiry: 5.0,
                forward: 0.021,
                vols: vec![0.288, 0.236, 0.219, 0.205, 0.196, 0.191, 0.190],
            },
        ],
    )
}
