//! Neal's algorithm 8: auxiliary-parameter Gibbs for arbitrary
//! hierarchies.
use bnpmix_consts::rv::misc::ln_pflip;
use bnpmix_consts::DEFAULT_N_AUX;
use bnpmix_stats::Mt19937;
use bnpmix_utils::Matrix;

use crate::algorithm::{run_chain, GibbsCore, Sampler};
use crate::collector::Collector;
use crate::error::Error;
use crate::hierarchy::Hierarchy;
use crate::mixing::Mixing;

/// Marginal Gibbs sampler with auxiliary clusters.
///
/// Instead of predictive densities it scores each datum against the
/// likelihood at instantiated parameter values, with `n_aux` freshly
/// drawn auxiliary clusters standing in for the infinitely many empty
/// ones. Works for conjugate and non-conjugate hierarchies alike.
pub struct Neal8 {
    core: GibbsCore,
    n_aux: usize,
}

impl Neal8 {
    pub fn new() -> Self {
        Self {
            core: GibbsCore::new(),
            n_aux: DEFAULT_N_AUX,
        }
    }

    fn step_allocations(
        core: &mut GibbsCore,
        n_aux: usize,
        rng: &mut Mt19937,
    ) -> Result<(), Error> {
        let n = core.data.n_rows();
        let ln_n_aux = (n_aux as f64).ln();
        // Posterior hyperparameters only exist for conjugate components,
        // so the refresh is requested only there.
        let refresh = core.prototype()?.is_conjugate();
        for i in 0..n {
            let datum = core.data.row(i).to_vec();
            let old = core.allocations[i];
            core.clusters[old].remove_datum(i, &datum, refresh, None)?;

            // Draw the auxiliary block. A datum leaving a singleton
            // donates its parameters to the first auxiliary cluster, so
            // the move can keep them.
            let singleton = core.clusters[old].card() == 0;
            let mut aux: Vec<Box<dyn Hierarchy>> = Vec::with_capacity(n_aux);
            for j in 0..n_aux {
                let mut fresh = core.prototype()?.clone_empty()?;
                if j == 0 && singleton {
                    fresh.set_state(&core.clusters[old].state())?;
                } else {
                    fresh.sample_prior(rng)?;
                }
                aux.push(fresh);
            }
            if singleton {
                core.drop_cluster(old);
            }

            let n_clust = core.clusters.len();
            let mut logps = Vec::with_capacity(n_clust + n_aux);
            for cluster in &core.clusters {
                let mass = core.mixing()?.mass_existing_cluster(
                    n - 1,
                    n_clust,
                    true,
                    true,
                    cluster.as_ref(),
                )?;
                logps.push(mass + cluster.like_lpdf(&datum, None)?);
            }
            let new_mass =
                core.mixing()?.mass_new_cluster(n - 1, n_clust, true, true)?;
            for fresh in &aux {
                logps.push(new_mass - ln_n_aux + fresh.like_lpdf(&datum, None)?);
            }

            let k_new = ln_pflip(&logps, 1, false, rng)[0];
            if k_new < n_clust {
                core.clusters[k_new].add_datum(i, &datum, refresh, None)?;
                core.allocations[i] = k_new;
            } else {
                let mut chosen = aux.swap_remove(k_new - n_clust);
                chosen.add_datum(i, &datum, refresh, None)?;
                core.allocations[i] = core.clusters.len();
                core.clusters.push(chosen);
            }
        }
        Ok(())
    }
}

impl Default for Neal8 {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for Neal8 {
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

    fn set_n_aux(&mut self, n_aux: usize) {
        self.n_aux = n_aux.max(1);
    }

    fn requires_conjugate(&self) -> bool {
        false
    }

    fn run(
        &mut self,
        collector: &mut dyn Collector,
        rng: &mut Mt19937,
    ) -> Result<(), Error> {
        let n_aux = self.n_aux;
        run_chain(&mut self.core, collector, rng, |core, rng| {
            Self::step_allocations(core, n_aux, rng)
        })
    }
}
