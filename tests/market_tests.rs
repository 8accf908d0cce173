mod test_utils;

use approx::assert_relative_eq;
use sabr_surface::{
    calibrate_sabr, evaluate_sabr, reconstruct_fits, shift_strikes, strike_shift,
    OptimizationConfig, SABRCalibrator,
};
use test_utils::{create_test_config, desk_initial_guess, load_test_grid};

const GRID_PATH: &str = "tests/data/swaption_vols.csv";

#[test]
fn grid_fixture_loads() {
    let grid = load_test_grid(GRID_PATH).expect("Failed to load grid fixture");
    assert_eq!(grid.len(), 6);
    assert_eq!(grid.num_strikes(), 9);
    assert_eq!(grid.strike_spreads, vec![-150, -100, -50, -25, 0, 25, 50, 100, 150]);
    assert!(grid.rows.iter().all(|r| r.vols.len() == 9));
    assert_eq!(grid.tenors()[..4], [1.0, 2.0, 5.0, 10.0]);
}

#[test]
fn strike_grid_matches_forward_plus_spread() {
    let grid = load_test_grid(GRID_PATH).unwrap();
    let strikes = grid.strike_grid();
    for (row, ks) in grid.rows.iter().zip(&strikes) {
        assert_relative_eq!(ks[0], row.forward - 0.015, epsilon = 1e-12);
        assert_eq!(ks[4], row.forward);
        assert_relative_eq!(ks[8], row.forward + 0.015, epsilon = 1e-12);
    }
}

#[test]
fn low_forward_rows_are_shifted() {
    let grid = load_test_grid(GRID_PATH).unwrap();
    for smile in grid.to_smiles() {
        let min = smile.strikes().iter().copied().fold(f64::INFINITY, f64::min);
        match strike_shift(smile.strikes()) {
            Some(shift) => {
                assert!(min <= 0.0);
                assert_relative_eq!(shift, 0.001 - min, epsilon = 1e-15);
                let (f, k) = shift_strikes(smile.forward_rate(), smile.strikes());
                assert_relative_eq!(f, smile.forward_rate() + shift, epsilon = 1e-15);
                assert!(k.iter().all(|&s| s >= 0.001 - 1e-15));
            }
            None => assert!(min > 0.0),
        }
    }
    let shifted = grid
        .to_smiles()
        .iter()
        .filter(|s| strike_shift(s.strikes()).is_some())
        .count();
    assert_eq!(shifted, 3);
}

#[test]
fn full_grid_calibrates_and_reconstructs() {
    let grid = load_test_grid(GRID_PATH).unwrap();
    let smiles = grid.to_smiles();
    let x0 = desk_initial_guess();

    let result = calibrate_sabr(&x0, &smiles, create_test_config()).unwrap();
    assert_eq!(result.len(), grid.len());
    assert!(result.failures().is_empty(), "{:?}", result.failures());

    for (i, (fit, smile)) in result.fits().iter().zip(&smiles).enumerate() {
        let fit = fit.as_ref().unwrap();
        println!("row {i}: {:?} residual={:.3e}", fit.params, fit.residual);
        assert!(fit.residual <= evaluate_sabr(&x0, smile).unwrap());
        assert_relative_eq!(
            evaluate_sabr(&fit.params, smile).unwrap(),
            fit.residual,
            max_relative = 1e-12
        );
    }

    let surface = reconstruct_fits(&result, &smiles).unwrap();
    assert_eq!(surface.len(), 6);
    let dense = surface.to_dense(f64::NAN);
    assert!(dense.iter().flatten().all(|v| v.is_finite()));
}

#[test]
fn calibrator_on_grid_keeps_row_order() {
    let grid = load_test_grid(GRID_PATH).unwrap();
    let calibrator = SABRCalibrator::from_grid(desk_initial_guess(), &grid, create_test_config());

    let sequential = calibrate_sabr(
        &desk_initial_guess(),
        &grid.to_smiles(),
        OptimizationConfig {
            parallel: false,
            ..create_test_config()
        },
    )
    .unwrap();
    assert_eq!(calibrator.calibrated_params().unwrap(), &sequential);
    assert_eq!(calibrator.vol_matrix().unwrap().len(), grid.len());
}

#[test]
fn broken_row_is_isolated() {
    let mut grid = load_test_grid(GRID_PATH).unwrap();
    grid.rows[2].vols.truncate(5);
    grid.rows[4].expiry = 0.0;

    let result =
        calibrate_sabr(&desk_initial_guess(), &grid.to_smiles(), create_test_config()).unwrap();

    let failed: Vec<usize> = result.failures().iter().map(|f| f.index).collect();
    assert_eq!(failed, vec![2, 4]);
    assert!(result.get(2).is_none());
    assert!(result.get(4).is_none());
    assert!(result.get(0).is_some());

    let surface = reconstruct_fits(&result, &grid.to_smiles()).unwrap();
    assert!(surface.row(2).is_none());
    assert!(surface.row(5).is_some());
}

#[test]
fn toml_config_drives_calibration() {
    let config = OptimizationConfig::from_toml_str(
        r#"
        max_iterations = 200
        tolerance = 1e-9
        parallel = false
        convergence_policy = "flag"

        [bounds]
        alpha = [0.001, 1.0]
        beta = [0.5, 0.5]
        rho = [-0.999, 0.999]
        nu = [0.001, 5.0]
        "#,
    )
    .unwrap();
    assert_eq!(config.max_iterations, 200);

    let grid = load_test_grid(GRID_PATH).unwrap();
    let result = calibrate_sabr(&desk_initial_guess(), &grid.to_smiles()[..2], config).unwrap();
    for fit in result.fits().iter().flatten() {
        assert_eq!(fit.params.beta, 0.5);
        assert!(fit.params.alpha <= 1.0);
    }
}
