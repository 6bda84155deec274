//! Serialized message contracts.
//!
//! Host environments exchange priors and chain states with this crate as
//! opaque byte strings. The payloads are bincode-encoded serde structs;
//! prior payloads are decoded by string message-type name so that a host
//! can name the prior format without linking against these types.
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, MarshalError};

/// The free parameters of one mixture component.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterState {
    pub generic_state: Vec<f64>,
    pub cardinality: usize,
}

/// The hyperparameters of the centering distribution shared by all
/// clusters of a hierarchy type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HierarchyHypers {
    pub generic_hypers: Vec<f64>,
}

/// The mixing component's state vector.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MixingState {
    pub generic_state: Vec<f64>,
}

/// One retained sweep of the chain.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmState {
    pub iteration: usize,
    /// Cluster label per data point.
    pub allocations: Vec<usize>,
    /// One entry per instantiated cluster.
    pub cluster_states: Vec<ClusterState>,
    pub mixing_state: MixingState,
    pub hierarchy_hypers: HierarchyHypers,
}

/// Fixed prior values for the NNIG hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NnigPrior {
    pub mean: f64,
    pub var_scaling: f64,
    pub shape: f64,
    pub scale: f64,
}

/// Prior message for plugin-backed components. When `values` is present
/// the component copies them as its fixed hyperparameters; otherwise the
/// plugin's own initializer is consulted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GenericPrior {
    pub values: Option<Vec<f64>>,
}

/// Prior on the Dirichlet-process total mass.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum TotalMass {
    Fixed(f64),
    GammaPrior { shape: f64, rate: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DpPrior {
    pub total_mass: TotalMass,
}

impl Default for DpPrior {
    fn default() -> Self {
        let gamma = bnpmix_consts::default_total_mass_prior();
        Self {
            total_mass: TotalMass::GammaPrior {
                shape: gamma.shape(),
                rate: gamma.rate(),
            },
        }
    }
}

/// A decoded hierarchy prior payload.
#[derive(Clone, Debug, PartialEq)]
pub enum HierarchyPrior {
    Nnig(NnigPrior),
    Generic(GenericPrior),
}

impl HierarchyPrior {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nnig(_) => "NnigPrior",
            Self::Generic(_) => "GenericPrior",
        }
    }
}

/// A decoded mixing prior payload.
#[derive(Clone, Debug, PartialEq)]
pub enum MixingPrior {
    Dp(DpPrior),
    Generic(GenericPrior),
}

impl MixingPrior {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Dp(_) => "DpPrior",
            Self::Generic(_) => "GenericPrior",
        }
    }
}

/// Encode any message payload.
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, MarshalError> {
    bincode::serialize(msg).map_err(MarshalError::ChainEncode)
}

/// Decode a chain state.
pub fn decode_state(bytes: &[u8]) -> Result<AlgorithmState, MarshalError> {
    bincode::deserialize(bytes).map_err(MarshalError::ChainDecode)
}

fn malformed(type_name: &str) -> impl FnOnce(bincode::Error) -> ConfigError + '_ {
    move |source| ConfigError::MalformedPrior {
        type_name: type_name.to_owned(),
        source,
    }
}

/// Decode a hierarchy prior payload by message-type name.
pub fn decode_hierarchy_prior(
    type_name: &str,
    bytes: &[u8],
) -> Result<HierarchyPrior, ConfigError> {
    match type_name {
        "NnigPrior" => bincode::deserialize(bytes)
            .map(HierarchyPrior::Nnig)
            .map_err(malformed(type_name)),
        "GenericPrior" => bincode::deserialize(bytes)
            .map(HierarchyPrior::Generic)
            .map_err(malformed(type_name)),
        _ => Err(ConfigError::UnknownMessageType {
            name: type_name.to_owned(),
        }),
    }
}

/// Decode a mixing prior payload by message-type name.
pub fn decode_mixing_prior(
    type_name: &str,
    bytes: &[u8],
) -> Result<MixingPrior, ConfigError> {
    match type_name {
        "DpPrior" => bincode::deserialize(bytes)
            .map(MixingPrior::Dp)
            .map_err(malformed(type_name)),
        "GenericPrior" => bincode::deserialize(bytes)
            .map(MixingPrior::Generic)
            .map_err(malformed(type_name)),
        _ => Err(ConfigError::UnknownMessageType {
            name: type_name.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy_prior_round_trips_by_name() {
        let prior = NnigPrior {
            mean: 5.0,
            var_scaling: 0.1,
            shape: 2.0,
            scale: 2.0,
        };
        let bytes = encode(&prior).unwrap();
        let decoded = decode_hierarchy_prior("NnigPrior", &bytes).unwrap();
        assert_eq!(decoded, HierarchyPrior::Nnig(prior));
    }

    #[test]
    fn unknown_message_type_names_the_offender() {
        let err = decode_hierarchy_prior("NoSuchPrior", &[]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("NoSuchPrior"));
    }

    #[test]
    fn malformed_payload_is_a_config_error() {
        let err =
            decode_mixing_prior("DpPrior", &[0xff, 0x01]).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedPrior { .. }));
    }

    #[test]
    fn chain_state_round_trips() {
        let state = AlgorithmState {
            iteration: 7,
            allocations: vec![0, 1, 0],
            cluster_states: vec![ClusterState {
                generic_state: vec![0.5, 1.5],
                cardinality: 2,
            }],
            mixing_state: MixingState {
                generic_state: vec![5.0],
            },
            hierarchy_hypers: HierarchyHypers {
                generic_hypers: vec![5.0, 0.1, 2.0, 2.0],
            },
        };
        let bytes = encode(&state).unwrap();
        assert_eq!(decode_state(&bytes).unwrap(), state);
    }
}
