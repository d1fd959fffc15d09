use serde::{Deserialize, Serialize};

/// Tuning knobs for the analytics engines.
///
/// Loaded from JSON when a config file is provided; tests and the CLI
/// use the defaults, which match the original model parameters
/// (k = 3, seed 42, 5000-term vocabulary, top-5 recommendations).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightConfig {
    #[serde(default = "default_cluster_count")]
    pub cluster_count: usize,
    #[serde(default = "default_cluster_seed")]
    pub cluster_seed: u64,
    #[serde(default = "default_kmeans_max_iter")]
    pub kmeans_max_iter: usize,
    #[serde(default = "default_kmeans_tol")]
    pub kmeans_tol: f64,
    #[serde(default = "default_max_features")]
    pub max_features: usize,
    #[serde(default = "default_top_n")]
    pub default_top_n: usize,
}

fn default_cluster_count() -> usize { 3 }
fn default_cluster_seed() -> u64 { 42 }
fn default_kmeans_max_iter() -> usize { 300 }
fn default_kmeans_tol() -> f64 { 1e-4 }
fn default_max_features() -> usize { 5000 }
fn default_top_n() -> usize { 5 }

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            cluster_count:   default_cluster_count(),
            cluster_seed:    default_cluster_seed(),
            kmeans_max_iter: default_kmeans_max_iter(),
            kmeans_tol:      default_kmeans_tol(),
            max_features:    default_max_features(),
            default_top_n:   default_top_n(),
        }
    }
}

impl InsightConfig {
    /// Load from a JSON file. Missing fields fall back to defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }
}
