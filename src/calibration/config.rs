use crate::models::sabr::sabr_calibrator::SABRParamBounds;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What to do with a smile whose minimiser did not report success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergencePolicy {
    /// Drop the fit and record a `NonConvergence` failure for the smile.
    Reject,
    /// Keep the fit but mark it as unconverged.
    #[default]
    Flag,
}

/// Optional CMA-ES stage run around the initial guess before L-BFGS-B.
///
/// CMA-ES samples from the box, so the open upper edges of alpha and nu are capped at
/// `alpha_cap` / `nu_cap` for this stage only.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalSearchConfig {
    pub enabled: bool,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
    /// Whether to evaluate the population in parallel
    pub parallel_eval: bool,
    pub pop_size: usize,
    pub max_gen: usize,
    /// Number of IPOP restarts (0 = no IPOP)
    pub ipop_restarts: usize,
    /// Factor to increase population size in IPOP restarts
    pub ipop_increase_factor: f64,
    /// Number of BIPOP restarts (0 = no BIPOP)
    pub bipop_restarts: usize,
    /// Total function evaluations budget
    pub total_evals_budget: usize,
    pub alpha_cap: f64,
    pub nu_cap: f64,
}

impl Default for GlobalSearchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            seed: Some(123456),
            // smiles are already solved in parallel by the engine
            parallel_eval: false,
            pop_size: 20,
            max_gen: 50,
            ipop_restarts: 0,
            ipop_increase_factor: 2.0,
            bipop_restarts: 2,
            total_evals_budget: 20000,
            alpha_cap: 5.0,
            nu_cap: 10.0,
        }
    }
}

/// Main configuration struct for optimization
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OptimizationConfig {
    /// Iteration budget per smile for each local stage (L-BFGS-B, then the
    /// least-squares polish)
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// A smile is converged once the projected gradient of its squared residual norm
    /// (alpha and nu in log space) is at or below this
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Solve smiles on the rayon pool (requires the `parallel` feature)
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    #[serde(default)]
    pub convergence_policy: ConvergencePolicy,

    /// Parameter box applied to every smile
    #[serde(default)]
    pub bounds: SABRParamBounds,

    #[serde(default)]
    pub global_search: GlobalSearchConfig,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            parallel: default_parallel(),
            convergence_policy: ConvergencePolicy::default(),
            bounds: SABRParamBounds::default(),
            global_search: GlobalSearchConfig::default(),
        }
    }
}

impl OptimizationConfig {
    /// Default configuration for production calibration with high accuracy
    pub fn production() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-10,
            ..Self::default()
        }
    }

    /// Fast configuration for development and testing
    pub fn fast() -> Self {
        Self {
            max_iterations: 300,
            tolerance: 1e-9,
            ..Self::default()
        }
    }

    /// Configuration for research: global CMA-ES search, then the local stages with a
    /// large budget
    pub fn research() -> Self {
        Self {
            max_iterations: 5000,
            tolerance: 1e-10,
            global_search: GlobalSearchConfig {
                enabled: true,
                pop_size: 40,
                max_gen: 200,
                bipop_restarts: 5,
                ipop_restarts: 3,
                total_evals_budget: 200000,
                ..GlobalSearchConfig::default()
            },
            ..Self::default()
        }
    }

    /// Minimal configuration for quick validation and debugging
    pub fn minimal() -> Self {
        Self {
            max_iterations: 50,
            tolerance: 1e-6,
            parallel: false,
            ..Self::default()
        }
    }

    /// Parses a TOML document. Missing keys take their default values.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("invalid optimization config")
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}

fn default_max_iterations() -> usize {
    500
}

fn default_tolerance() -> f64 {
    1e-10
}

fn default_parallel() -> bool {
    true
}
