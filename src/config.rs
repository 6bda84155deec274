//! Run configuration for the algorithm wrapper.
use serde::{Deserialize, Serialize};

use bnpmix_consts::{DEFAULT_INIT_CLUSTERS, DEFAULT_N_AUX};

/// Everything needed to assemble a run, minus the priors (which travel
/// as separate serialized payloads keyed by message-type name).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    /// Sampler type identifier, e.g. `"Neal2"` or `"N8"`.
    pub algorithm: String,
    /// Hierarchy type identifier, e.g. `"NNIG"` or `"PluginHier"`.
    pub hierarchy: String,
    /// Mixing type identifier, e.g. `"DP"` or `"PluginMix"`.
    pub mixing: String,
    /// Plugin module implementing the hierarchy, when the hierarchy type
    /// is plugin-backed.
    #[serde(default)]
    pub hierarchy_module: Option<String>,
    /// Plugin module implementing the mixing, when the mixing type is
    /// plugin-backed.
    #[serde(default)]
    pub mixing_module: Option<String>,
    #[serde(default = "default_init_clusters")]
    pub init_n_clust: usize,
    /// Auxiliary cluster count, used by Neal8 only.
    #[serde(default = "default_n_aux")]
    pub n_aux: usize,
}

fn default_init_clusters() -> usize {
    DEFAULT_INIT_CLUSTERS
}

fn default_n_aux() -> usize {
    DEFAULT_N_AUX
}

impl RunConfig {
    pub fn new(algorithm: &str, hierarchy: &str, mixing: &str) -> Self {
        Self {
            algorithm: algorithm.to_owned(),
            hierarchy: hierarchy.to_owned(),
            mixing: mixing.to_owned(),
            hierarchy_module: None,
            mixing_module: None,
            init_n_clust: DEFAULT_INIT_CLUSTERS,
            n_aux: DEFAULT_N_AUX,
        }
    }

    pub fn hierarchy_module(mut self, module: &str) -> Self {
        self.hierarchy_module = Some(module.to_owned());
        self
    }

    pub fn mixing_module(mut self, module: &str) -> Self {
        self.mixing_module = Some(module.to_owned());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_fields_take_defaults() {
        let config: RunConfig = serde_json::from_str(
            r#"{"algorithm": "Neal2", "hierarchy": "NNIG", "mixing": "DP"}"#,
        )
        .unwrap();
        assert_eq!(config.init_n_clust, DEFAULT_INIT_CLUSTERS);
        assert_eq!(config.n_aux, DEFAULT_N_AUX);
        assert!(config.hierarchy_module.is_none());
    }

    #[test]
    fn builder_attaches_modules() {
        let config = RunConfig::new("N8", "PluginHier", "DP")
            .hierarchy_module("my_model");
        assert_eq!(config.hierarchy_module.as_deref(), Some("my_model"));
        assert!(config.mixing_module.is_none());
    }
}
