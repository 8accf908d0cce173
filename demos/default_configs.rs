use sabr_surface::{calibrate_sabr, default_configs, MarketSmile, SABRParams};

fn main() {
    // Example smile (minimal example)
    let smile = MarketSmile::new(
        0.02,
        vec![0.01, 0.015, 0.02, 0.025, 0.03],
        1.0,
        vec![0.34, 0.28, 0.25, 0.24, 0.245],
    );

    println!("sabr-surface Default Configuration Examples\n");

    // 1. Fast configuration for development
    println!("1. Fast Configuration (good for development):");
    let fast_config = default_configs::fast();
    println!("   Max iterations: {}", fast_config.max_iterations);
    println!("   Tolerance: {:.1e}", fast_config.tolerance);
    println!("   Parallel smiles: {}", fast_config.parallel);
    println!("   Use case: Development, quick prototyping\n");

    // 2. Production configuration
    println!("2. Production Configuration (daily surface builds):");
    let prod_config = default_configs::production();
    println!("   Max iterations: {}", prod_config.max_iterations);
    println!("   Tolerance: {:.1e}", prod_config.tolerance);
    println!("   Convergence policy: {:?}", prod_config.convergence_policy);
    println!("   Use case: Scheduled calibration of the full grid\n");

    // 3. Research configuration
    println!("3. Research Configuration (global search first):");
    let research_config = default_configs::research();
    println!("   Max iterations: {}", research_config.max_iterations);
    println!("   Tolerance: {:.1e}", research_config.tolerance);
    let gs = &research_config.global_search;
    println!("   CMA-ES population size: {}", gs.pop_size);
    println!("   CMA-ES max generations: {}", gs.max_gen);
    println!("   BIPOP restarts: {}", gs.bipop_restarts);
    println!("   Total evaluations budget: {}", gs.total_evals_budget);
    println!("   Use case: Hard smiles, sensitivity to the initial guess\n");

    // 4. Minimal configuration
    println!("4. Minimal Configuration (quick validation):");
    let minimal_config = default_configs::minimal();
    println!("   Max iterations: {}", minimal_config.max_iterations);
    println!("   Tolerance: {:.1e}", minimal_config.tolerance);
    println!("   Use case: Quick checks, debugging\n");

    println!("Running example calibration with fast config...");
    let x0 = SABRParams {
        alpha: 0.02,
        beta: 0.5,
        rho: 0.0,
        nu: 0.2,
    };
    match calibrate_sabr(&x0, &[smile], fast_config) {
        Ok(result) => match result.get(0) {
            Some(fit) => {
                println!("Calibration finished ({:?})", fit.status);
                println!("   Residual: {:.6e}", fit.residual);
                println!("   Parameters: {:?}", fit.params);
            }
            None => println!("Smile rejected: {:?}", result.failures()),
        },
        Err(e) => {
            println!("Calibration failed: {:#}", e);
        }
    }
}
