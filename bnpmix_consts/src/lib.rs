//! Default constants for bnpmix
pub use rv;

use rv::dist::Gamma;

/// The number of clusters the data are spread across before the first sweep.
pub const DEFAULT_INIT_CLUSTERS: usize = 5;

/// The number of auxiliary clusters Neal's Algorithm 8 instantiates per
/// reassignment when none is configured.
pub const DEFAULT_N_AUX: usize = 3;

/// Default Gamma hyperprior on the Dirichlet-process total mass.
pub fn default_total_mass_prior() -> Gamma {
    Gamma::new_unchecked(2.0, 0.5)
}
