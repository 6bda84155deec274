//! MCMC samplers over the mixture posterior.
//!
//! Both shipped samplers are marginal Gibbs schemes in the Neal family:
//! `Neal2` for conjugate hierarchies and `Neal8` for the general case.
//! They share everything except the per-datum reallocation move.
mod neal2;
mod neal8;

pub use neal2::Neal2;
pub use neal8::Neal8;

use bnpmix_consts::DEFAULT_INIT_CLUSTERS;
use bnpmix_stats::Mt19937;
use bnpmix_utils::Matrix;

use crate::collector::Collector;
use crate::error::{ConfigError, Error};
use crate::hierarchy::Hierarchy;
use crate::messages::{self, AlgorithmState, ClusterState};
use crate::mixing::Mixing;

pub trait Sampler: Send {
    fn set_data(&mut self, data: Matrix);

    /// Install the component template. Every cluster is cloned from it.
    fn set_hierarchy(&mut self, hierarchy: Box<dyn Hierarchy>);

    fn set_mixing(&mut self, mixing: Box<dyn Mixing>);

    fn set_iterations(&mut self, niter: usize, burnin: usize);

    /// Number of clusters the initial round-robin allocation spreads the
    /// data over.
    fn set_init_clusters(&mut self, n_clust: usize);

    /// Auxiliary cluster count. Schemes without auxiliary clusters
    /// ignore it.
    fn set_n_aux(&mut self, _n_aux: usize) {}

    /// Whether the scheme needs closed-form marginals from the hierarchy.
    fn requires_conjugate(&self) -> bool;

    /// Run the chain, appending every post-burn-in sweep to `collector`.
    fn run(
        &mut self,
        collector: &mut dyn Collector,
        rng: &mut Mt19937,
    ) -> Result<(), Error>;
}

/// State and sweep plumbing shared by the Neal samplers.
pub(crate) struct GibbsCore {
    pub data: Matrix,
    pub prototype: Option<Box<dyn Hierarchy>>,
    pub mixing: Option<Box<dyn Mixing>>,
    pub clusters: Vec<Box<dyn Hierarchy>>,
    pub allocations: Vec<usize>,
    pub niter: usize,
    pub burnin: usize,
    pub init_n_clust: usize,
}

impl GibbsCore {
    pub fn new() -> Self {
        Self {
            data: Matrix::empty(),
            prototype: None,
            mixing: None,
            clusters: Vec::new(),
            allocations: Vec::new(),
            niter: 1000,
            burnin: 100,
            init_n_clust: DEFAULT_INIT_CLUSTERS,
        }
    }

    pub fn prototype(&self) -> Result<&dyn Hierarchy, Error> {
        self.prototype
            .as_deref()
            .ok_or_else(|| missing("hierarchy"))
    }

    pub fn mixing_mut(&mut self) -> Result<&mut Box<dyn Mixing>, Error> {
        self.mixing.as_mut().ok_or_else(|| missing("mixing"))
    }

    pub fn mixing(&self) -> Result<&dyn Mixing, Error> {
        self.mixing.as_deref().ok_or_else(|| missing("mixing"))
    }

    /// Round-robin the data over `init_n_clust` fresh clusters and draw
    /// the opening states.
    pub fn initialize(&mut self, rng: &mut Mt19937) -> Result<(), Error> {
        let n = self.data.n_rows();
        let n_clust = self.init_n_clust.max(1).min(n.max(1));
        let prototype = self
            .prototype
            .as_deref()
            .ok_or_else(|| missing("hierarchy"))?;
        let mut clusters: Vec<Box<dyn Hierarchy>> = (0..n_clust)
            .map(|_| prototype.clone_empty())
            .collect::<Result<_, _>>()?;
        self.allocations = (0..n).map(|i| i % n_clust).collect();
        for (i, &k) in self.allocations.iter().enumerate() {
            clusters[k].add_datum(i, self.data.row(i), false, None)?;
        }
        for cluster in &mut clusters {
            cluster.sample_full_cond(true, rng)?;
        }
        self.clusters = clusters;
        self.mixing_mut()?.initialize_state(rng)?;
        Ok(())
    }

    /// Resample every cluster's parameters from its full conditional.
    pub fn sample_unique_values(&mut self, rng: &mut Mt19937) -> Result<(), Error> {
        for cluster in &mut self.clusters {
            cluster.sample_full_cond(true, rng)?;
        }
        Ok(())
    }

    /// Resample the shared hyperparameters and push them to every
    /// cluster.
    pub fn update_hypers(&mut self, rng: &mut Mt19937) -> Result<(), Error> {
        let states: Vec<ClusterState> =
            self.clusters.iter().map(|c| c.state()).collect();
        let prototype = self
            .prototype
            .as_mut()
            .ok_or_else(|| missing("hierarchy"))?;
        prototype.update_hypers(&states, rng)?;
        let hypers = prototype.hypers();
        for cluster in &mut self.clusters {
            cluster.set_hypers(&hypers)?;
        }
        Ok(())
    }

    pub fn update_mixing_state(&mut self, rng: &mut Mt19937) -> Result<(), Error> {
        let mixing = self.mixing.as_mut().ok_or_else(|| missing("mixing"))?;
        mixing.update_state(&self.clusters, &self.allocations, rng)
    }

    /// Drop cluster `k`, relabeling the allocations above it.
    pub fn drop_cluster(&mut self, k: usize) {
        debug_assert_eq!(self.clusters[k].card(), 0);
        self.clusters.remove(k);
        for a in &mut self.allocations {
            if *a > k {
                *a -= 1;
            }
        }
    }

    pub fn snapshot(&self, iteration: usize) -> Result<Vec<u8>, Error> {
        let state = AlgorithmState {
            iteration,
            allocations: self.allocations.clone(),
            cluster_states: self.clusters.iter().map(|c| c.state()).collect(),
            mixing_state: self.mixing()?.state(),
            hierarchy_hypers: self.prototype()?.hypers(),
        };
        Ok(messages::encode(&state)?)
    }
}

fn missing(component: &'static str) -> Error {
    Error::Config(ConfigError::MissingComponent { component })
}

/// The outer chain loop shared by both samplers.
pub(crate) fn run_chain<F>(
    core: &mut GibbsCore,
    collector: &mut dyn Collector,
    rng: &mut Mt19937,
    mut step_allocations: F,
) -> Result<(), Error>
where
    F: FnMut(&mut GibbsCore, &mut Mt19937) -> Result<(), Error>,
{
    core.initialize(rng)?;
    collector.start();
    log::info!(
        "starting chain: {} iterations, {} burn-in, {} data",
        core.niter,
        core.burnin,
        core.data.n_rows(),
    );
    for iteration in 0..core.niter {
        step_allocations(core, rng)?;
        core.sample_unique_values(rng)?;
        core.update_hypers(rng)?;
        core.update_mixing_state(rng)?;
        if iteration >= core.burnin {
            collector.collect(core.snapshot(iteration)?);
        }
    }
    collector.finish();
    log::info!(
        "chain finished with {} clusters, {} collected states",
        core.clusters.len(),
        collector.len(),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{HierarchyPrior, NnigPrior};

    fn prototype() -> Box<dyn Hierarchy> {
        let mut hier = crate::hierarchy::NnigHierarchy::new();
        hier.set_prior(&HierarchyPrior::Nnig(NnigPrior {
            mean: 0.0,
            var_scaling: 0.1,
            shape: 2.0,
            scale: 2.0,
        }))
        .unwrap();
        hier.initialize(&mut Mt19937::new(0)).unwrap();
        Box::new(hier)
    }

    fn mixing() -> Box<dyn Mixing> {
        use crate::messages::{DpPrior, MixingPrior, TotalMass};
        let mut mix = crate::mixing::DirichletMixing::new();
        mix.set_prior(&MixingPrior::Dp(DpPrior {
            total_mass: TotalMass::Fixed(1.0),
        }))
        .unwrap();
        Box::new(mix)
    }

    #[test]
    fn initialize_round_robins_the_data() {
        let mut core = GibbsCore::new();
        core.data = Matrix::from_column(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        core.prototype = Some(prototype());
        core.mixing = Some(mixing());
        core.init_n_clust = 3;
        core.initialize(&mut Mt19937::new(4)).unwrap();
        assert_eq!(core.clusters.len(), 3);
        assert_eq!(core.allocations, vec![0, 1, 2, 0, 1, 2, 0]);
        let total: usize = core.clusters.iter().map(|c| c.card()).sum();
        assert_eq!(total, 7);
    }

    #[test]
    fn initial_cluster_count_is_capped_by_the_data() {
        let mut core = GibbsCore::new();
        core.data = Matrix::from_column(&[0.0, 1.0]);
        core.prototype = Some(prototype());
        core.mixing = Some(mixing());
        core.init_n_clust = 5;
        core.initialize(&mut Mt19937::new(4)).unwrap();
        assert_eq!(core.clusters.len(), 2);
    }

    #[test]
    fn drop_cluster_relabels_allocations() {
        let mut core = GibbsCore::new();
        core.data = Matrix::from_column(&[0.0, 1.0, 2.0]);
        core.prototype = Some(prototype());
        core.mixing = Some(mixing());
        core.init_n_clust = 3;
        core.initialize(&mut Mt19937::new(4)).unwrap();
        // Empty the middle cluster by hand.
        core.clusters[1]
            .remove_datum(1, &[1.0], false, None)
            .unwrap();
        core.allocations[1] = 0;
        core.clusters[0].add_datum(1, &[1.0], false, None).unwrap();
        core.drop_cluster(1);
        assert_eq!(core.clusters.len(), 2);
        assert_eq!(core.allocations, vec![0, 0, 1]);
    }
}
