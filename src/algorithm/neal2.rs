//! Neal's algorithm 2: marginal Gibbs for conjugate hierarchies.
use bnpmix_consts::rv::misc::ln_pflip;
use bnpmix_stats::Mt19937;
use bnpmix_utils::Matrix;

use crate::algorithm::{run_chain, GibbsCore, Sampler};
use crate::collector::Collector;
use crate::error::Error;
use crate::hierarchy::Hierarchy;
use crate::mixing::Mixing;

/// Conjugate marginal Gibbs sampler.
///
/// Reallocation integrates the component parameters out, so each datum is
/// scored with the predictive densities instead of the likelihood. The
/// hierarchy must be conjugate.
pub struct Neal2 {
    core: GibbsCore,
}

impl Neal2 {
    pub fn new() -> Self {
        Self {
            core: GibbsCore::new(),
        }
    }

    fn step_allocations(
        core: &mut GibbsCore,
        rng: &mut Mt19937,
    ) -> Result<(), Error> {
        let n = core.data.n_rows();
        for i in 0..n {
            let datum = core.data.row(i).to_vec();
            let old = core.allocations[i];
            core.clusters[old].remove_datum(i, &datum, true, None)?;

            let n_clust = core.clusters.len();
            let mut logps = Vec::with_capacity(n_clust + 1);
            for cluster in &core.clusters {
                let mass = core.mixing()?.mass_existing_cluster(
                    n - 1,
                    n_clust,
                    true,
                    true,
                    cluster.as_ref(),
                )?;
                logps.push(mass + cluster.conditional_pred_lpdf(&datum, None)?);
            }
            let new_mass =
                core.mixing()?.mass_new_cluster(n - 1, n_clust, true, true)?;
            logps.push(new_mass + core.prototype()?.prior_pred_lpdf(&datum, None)?);

            let k_new = ln_pflip(&logps, 1, false, rng)[0];
            if k_new == n_clust {
                let mut fresh = core.prototype()?.clone_empty()?;
                fresh.add_datum(i, &datum, true, None)?;
                fresh.sample_full_cond(true, rng)?;
                core.clusters.push(fresh);
            } else {
                core.clusters[k_new].add_datum(i, &datum, true, None)?;
            }
            core.allocations[i] = k_new;
            if core.clusters[old].card() == 0 && old != k_new {
                core.drop_cluster(old);
            }
        }
        Ok(())
    }
}

impl Default for Neal2 {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for Neal2 {
    fn set_data(&mut self, data: Matrix) {
        self.core.data = data;
    }

    fn set_hierarchy(&mut self, hierarchy: Box<dyn Hierarchy>) {
        self.core.prototype = Some(hierarchy);
    }

    fn set_mixing(&mut self, mixing: Box<dyn Mixing>) {
        self.core.mixing = Some(mixing);
    }

    fn set_iterations(&mut self, niter: usize, burnin: usize) {
        self.core.niter = niter;
        self.core.burnin = burnin;
    }

    fn set_init_clusters(&mut self, n_clust: usize) {
        self.core.init_n_clust = n_clust;
    }

    fn requires_conjugate(&self) -> bool {
        true
    }

    fn run(
        &mut self,
        collector: &mut dyn Collector,
        rng: &mut Mt19937,
    ) -> Result<(), Error> {
        run_chain(&mut self.core, collector, rng, Self::step_allocations)
    }
}
