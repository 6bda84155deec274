//! The assembled run driver.
//!
//! `AlgorithmWrapper` glues the registries, the message contracts, the
//! plugin runtime, and the sampler into one object: build it from a
//! `RunConfig` plus serialized priors, call `run`, then query the chain
//! or evaluate densities.
use rayon::prelude::*;
use std::sync::Arc;

use bnpmix_stats::Mt19937;
use bnpmix_utils::{logsumexp, Matrix};

use crate::collector::{Collector, MemoryCollector};
use crate::config::RunConfig;
use crate::error::{ConfigError, Error, PreconditionError};
use crate::hierarchy::Hierarchy;
use crate::messages::{self, AlgorithmState};
use crate::mixing::Mixing;
use crate::registry::{hierarchy_registry, mixing_registry, sampler_registry};
use crate::runtime::PluginRuntime;

const DEFAULT_CHUNK_SIZE: usize = 64;

pub struct AlgorithmWrapper {
    config: RunConfig,
    sampler: Box<dyn crate::algorithm::Sampler>,
    hierarchy: Box<dyn Hierarchy>,
    mixing: Box<dyn Mixing>,
    collector: MemoryCollector,
    rng: Mt19937,
    low_memory: bool,
    chunk_size: usize,
}

impl AlgorithmWrapper {
    /// Assemble a run from type identifiers and serialized priors.
    ///
    /// The prior payloads are decoded by their message-type names;
    /// plugin-backed components are bound to their configured modules
    /// here, so every missing entry point surfaces before sampling.
    pub fn new(
        config: RunConfig,
        hier_prior_type: &str,
        hier_prior_bytes: &[u8],
        mix_prior_type: &str,
        mix_prior_bytes: &[u8],
        runtime: Option<Arc<PluginRuntime>>,
    ) -> Result<Self, Error> {
        let mut sampler = sampler_registry().create(&config.algorithm)?;
        let mut hierarchy = hierarchy_registry().create(&config.hierarchy)?;
        let mut mixing = mixing_registry().create(&config.mixing)?;

        if let Some(module) = &config.hierarchy_module {
            let runtime = runtime.clone().ok_or(ConfigError::ModuleNotBound {
                component: "hierarchy",
            })?;
            hierarchy.bind_module(runtime, module)?;
        }
        if let Some(module) = &config.mixing_module {
            let runtime = runtime.clone().ok_or(ConfigError::ModuleNotBound {
                component: "mixing",
            })?;
            mixing.bind_module(runtime, module)?;
        }

        let hier_prior =
            messages::decode_hierarchy_prior(hier_prior_type, hier_prior_bytes)?;
        hierarchy.set_prior(&hier_prior)?;
        let mix_prior =
            messages::decode_mixing_prior(mix_prior_type, mix_prior_bytes)?;
        mixing.set_prior(&mix_prior)?;

        if sampler.requires_conjugate() && !hierarchy.is_conjugate() {
            return Err(PreconditionError::ConjugateOnly {
                op: "marginal sampling",
            }
            .into());
        }
        sampler.set_init_clusters(config.init_n_clust);
        sampler.set_n_aux(config.n_aux);

        Ok(Self {
            config,
            sampler,
            hierarchy,
            mixing,
            collector: MemoryCollector::new(),
            rng: Mt19937::default(),
            low_memory: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Trade peak memory for throughput during density evaluation.
    pub fn set_low_memory(&mut self, low_memory: bool) {
        self.low_memory = low_memory;
    }

    /// Run the chain over `data`.
    ///
    /// A positive `rng_seed` reseeds the native generator; zero or a
    /// negative value keeps the current stream, letting callers continue
    /// an earlier stream deliberately.
    pub fn run(
        &mut self,
        data: &Matrix,
        niter: usize,
        burnin: usize,
        rng_seed: i64,
    ) -> Result<(), Error> {
        if rng_seed > 0 {
            self.rng = Mt19937::new(rng_seed as u32);
        }
        log::info!(
            "running {} / {} / {} over {} data",
            self.config.algorithm,
            self.config.hierarchy,
            self.config.mixing,
            data.n_rows(),
        );
        let mut hierarchy = self.hierarchy.deep_clone();
        hierarchy.initialize(&mut self.rng)?;
        self.sampler.set_data(data.clone());
        self.sampler.set_hierarchy(hierarchy);
        self.sampler.set_mixing(self.mixing.clone_boxed());
        self.sampler.set_iterations(niter, burnin);
        self.sampler.run(&mut self.collector, &mut self.rng)
    }

    /// The decoded chain, in collection order.
    pub fn chain(&self) -> Result<Vec<AlgorithmState>, Error> {
        self.collector.chain()
    }

    pub fn n_states(&self) -> usize {
        self.collector.len()
    }

    /// Mixture density of every stored chain state over `grid`.
    ///
    /// Returns a chain-by-grid matrix of densities (not logs). Chain
    /// entries are evaluated in parallel, each against its own
    /// reconstruction of the stored state.
    pub fn eval_density(&self, grid: &Matrix) -> Result<Matrix, Error> {
        let chain = self.collector.chain()?;
        let mut rows = Vec::with_capacity(chain.len());
        if self.low_memory {
            for chunk in chain.chunks(self.chunk_size) {
                let units = self.reconstruct(chunk)?;
                rows.extend(eval_units(units, grid)?);
            }
        } else {
            let units = self.reconstruct(&chain)?;
            rows.extend(eval_units(units, grid)?);
        }
        Ok(Matrix::from_rows(&rows))
    }

    fn reconstruct(&self, states: &[AlgorithmState]) -> Result<Vec<EvalUnit>, Error> {
        states
            .iter()
            .map(|state| {
                let mut clusters = Vec::with_capacity(state.cluster_states.len());
                for cs in &state.cluster_states {
                    let mut cluster = self.hierarchy.clone_empty()?;
                    cluster.set_hypers(&state.hierarchy_hypers)?;
                    cluster.set_state(cs)?;
                    clusters.push(cluster);
                }
                let mut prototype = self.hierarchy.clone_empty()?;
                prototype.set_hypers(&state.hierarchy_hypers)?;
                let mut mixing = self.mixing.clone_boxed();
                mixing.set_state(&state.mixing_state)?;
                Ok(EvalUnit {
                    clusters,
                    prototype,
                    mixing,
                    n: state.allocations.len(),
                })
            })
            .collect()
    }
}

/// One chain state reconstructed for evaluation, owned by one worker.
struct EvalUnit {
    clusters: Vec<Box<dyn Hierarchy>>,
    prototype: Box<dyn Hierarchy>,
    mixing: Box<dyn Mixing>,
    n: usize,
}

impl EvalUnit {
    /// Mixture log density at one grid point.
    ///
    /// Conjugate hierarchies include the new-cluster term (prior
    /// predictive weighted by the new-cluster mass); without a
    /// closed-form marginal the weights renormalize over the
    /// instantiated clusters instead.
    fn lpdf(&self, point: &[f64]) -> Result<f64, Error> {
        let n_clust = self.clusters.len();
        let conjugate = self.prototype.is_conjugate();
        let mut terms = Vec::with_capacity(n_clust + 1);
        if conjugate {
            for cluster in &self.clusters {
                let mass = self.mixing.mass_existing_cluster(
                    self.n,
                    n_clust,
                    true,
                    false,
                    cluster.as_ref(),
                )?;
                terms.push(mass + cluster.like_lpdf(point, None)?);
            }
            let new_mass =
                self.mixing.mass_new_cluster(self.n, n_clust, true, false)?;
            terms.push(new_mass + self.prototype.prior_pred_lpdf(point, None)?);
        } else {
            let mut masses = Vec::with_capacity(n_clust);
            for cluster in &self.clusters {
                masses.push(self.mixing.mass_existing_cluster(
                    self.n,
                    n_clust,
                    true,
                    true,
                    cluster.as_ref(),
                )?);
            }
            let norm = logsumexp(&masses);
            for (cluster, mass) in self.clusters.iter().zip(&masses) {
                terms.push(mass - norm + cluster.like_lpdf(point, None)?);
            }
        }
        Ok(logsumexp(&terms))
    }
}

fn eval_units(units: Vec<EvalUnit>, grid: &Matrix) -> Result<Vec<Vec<f64>>, Error> {
    units
        .into_par_iter()
        .map(|unit| {
            grid.rows()
                .map(|point| unit.lpdf(point).map(f64::exp))
                .collect::<Result<Vec<f64>, Error>>()
        })
        .collect()
}
