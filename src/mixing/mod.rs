//! Cluster-weight processes.
//!
//! A `Mixing` scores partitions for the sampler. Marginal mixings expose
//! the existing/new cluster mass functions that drive Neal's algorithms;
//! conditional mixings instead expose explicit weights. Each
//! implementation is one or the other, and calling across the split is a
//! precondition error.
pub mod dirichlet;
pub mod plugin;

pub use dirichlet::DirichletMixing;
pub use plugin::PluginMixing;

use std::sync::Arc;

use bnpmix_stats::Mt19937;

use crate::error::Error;
use crate::hierarchy::Hierarchy;
use crate::messages::{MixingPrior, MixingState};
use crate::runtime::PluginRuntime;

pub trait Mixing: Send {
    /// Whether this process exposes explicit weights instead of the
    /// marginal mass functions.
    fn is_conditional(&self) -> bool;

    /// Attach the prior. Must happen before [`Mixing::initialize_state`].
    fn set_prior(&mut self, prior: &MixingPrior) -> Result<(), Error>;

    /// Draw the initial state from the prior alone.
    fn initialize_state(&mut self, rng: &mut Mt19937) -> Result<(), Error>;

    /// Resample the state given the instantiated components and the
    /// current allocation vector.
    fn update_state(
        &mut self,
        components: &[Box<dyn Hierarchy>],
        allocations: &[usize],
        rng: &mut Mt19937,
    ) -> Result<(), Error>;

    /// Predictive mass of joining `hier` among the existing clusters.
    /// Marginal only. `log` and `propto` toggle independently.
    fn mass_existing_cluster(
        &self,
        n: usize,
        n_clust: usize,
        log: bool,
        propto: bool,
        hier: &dyn Hierarchy,
    ) -> Result<f64, Error>;

    /// Predictive mass of opening a new cluster. Marginal only.
    fn mass_new_cluster(
        &self,
        n: usize,
        n_clust: usize,
        log: bool,
        propto: bool,
    ) -> Result<f64, Error>;

    /// Explicit component weights. Conditional only.
    fn mixing_weights(&self, log: bool, propto: bool) -> Result<Vec<f64>, Error>;

    fn state(&self) -> MixingState;
    fn set_state(&mut self, state: &MixingState) -> Result<(), Error>;

    fn clone_boxed(&self) -> Box<dyn Mixing>;

    /// Attach a plugin module. Native implementations ignore this.
    fn bind_module(
        &mut self,
        _runtime: Arc<PluginRuntime>,
        _module: &str,
    ) -> Result<(), Error> {
        Ok(())
    }
}
