//! Conjugate Normal-Normal-InverseGamma component.
use std::collections::BTreeSet;
use std::sync::Arc;

use bnpmix_stats::nig::{self, NigParams};
use bnpmix_stats::Mt19937;

use crate::error::{ConfigError, Error, PreconditionError};
use crate::hierarchy::Hierarchy;
use crate::messages::{ClusterState, HierarchyHypers, HierarchyPrior};

/// Univariate Gaussian component with the conjugate NIG prior on
/// `(mean, var)`.
#[derive(Clone, Debug)]
pub struct NnigHierarchy {
    prior: Option<NigParams>,
    hypers: NigParams,
    posterior_hypers: NigParams,
    mean: f64,
    var: f64,
    data_sum: f64,
    data_sum_sq: f64,
    members: BTreeSet<usize>,
}

impl NnigHierarchy {
    pub fn new() -> Self {
        let hypers = NigParams {
            mean: 0.0,
            var_scaling: 1.0,
            shape: 2.0,
            scale: 2.0,
        };
        Self {
            prior: None,
            hypers,
            posterior_hypers: hypers,
            mean: 0.0,
            var: 1.0,
            data_sum: 0.0,
            data_sum_sq: 0.0,
            members: BTreeSet::new(),
        }
    }

    fn prior(&self) -> Result<&NigParams, Error> {
        self.prior
            .as_ref()
            .ok_or(Error::Config(ConfigError::MissingPrior {
                component: "hierarchy",
            }))
    }

    fn posterior(&self) -> NigParams {
        self.hypers
            .posterior(self.members.len(), self.data_sum, self.data_sum_sq)
    }
}

impl Default for NnigHierarchy {
    fn default() -> Self {
        Self::new()
    }
}

impl Hierarchy for NnigHierarchy {
    fn set_prior(&mut self, prior: &HierarchyPrior) -> Result<(), Error> {
        match prior {
            HierarchyPrior::Nnig(p) => {
                let params = NigParams {
                    mean: p.mean,
                    var_scaling: p.var_scaling,
                    shape: p.shape,
                    scale: p.scale,
                };
                self.prior = Some(params);
                self.hypers = params;
                self.posterior_hypers = params;
                Ok(())
            }
            other => Err(Error::Config(ConfigError::PriorTypeMismatch {
                expected: "NnigPrior",
                found: other.type_name(),
            })),
        }
    }

    fn initialize(&mut self, rng: &mut Mt19937) -> Result<(), Error> {
        self.prior()?;
        self.clear_data()?;
        self.sample_prior(rng)
    }

    fn is_conjugate(&self) -> bool {
        true
    }

    fn card(&self) -> usize {
        self.members.len()
    }

    fn add_datum(
        &mut self,
        id: usize,
        datum: &[f64],
        update_params: bool,
        _covariate: Option<&[f64]>,
    ) -> Result<(), Error> {
        if !self.members.insert(id) {
            return Err(PreconditionError::DuplicateDatum { id }.into());
        }
        self.data_sum += datum[0];
        self.data_sum_sq += datum[0] * datum[0];
        if update_params {
            self.save_posterior_hypers()?;
        }
        Ok(())
    }

    fn remove_datum(
        &mut self,
        id: usize,
        datum: &[f64],
        update_params: bool,
        _covariate: Option<&[f64]>,
    ) -> Result<(), Error> {
        if !self.members.remove(&id) {
            return Err(PreconditionError::UnknownDatum { id }.into());
        }
        self.data_sum -= datum[0];
        self.data_sum_sq -= datum[0] * datum[0];
        if update_params {
            self.save_posterior_hypers()?;
        }
        Ok(())
    }

    fn like_lpdf(&self, datum: &[f64], _covariate: Option<&[f64]>) -> Result<f64, Error> {
        Ok(nig::like_lpdf(datum[0], self.mean, self.var))
    }

    fn prior_pred_lpdf(
        &self,
        datum: &[f64],
        _covariate: Option<&[f64]>,
    ) -> Result<f64, Error> {
        Ok(self.hypers.marg_lpdf(datum[0]))
    }

    fn conditional_pred_lpdf(
        &self,
        datum: &[f64],
        _covariate: Option<&[f64]>,
    ) -> Result<f64, Error> {
        Ok(self.posterior().marg_lpdf(datum[0]))
    }

    fn sample_prior(&mut self, rng: &mut Mt19937) -> Result<(), Error> {
        let (mean, var) = self.hypers.draw(rng);
        self.mean = mean;
        self.var = var;
        Ok(())
    }

    fn sample_full_cond(
        &mut self,
        update_params: bool,
        rng: &mut Mt19937,
    ) -> Result<(), Error> {
        if self.members.is_empty() {
            return self.sample_prior(rng);
        }
        if update_params {
            self.save_posterior_hypers()?;
        }
        let (mean, var) = self.posterior_hypers.draw(rng);
        self.mean = mean;
        self.var = var;
        Ok(())
    }

    fn compute_posterior_hypers(&self) -> Result<Vec<f64>, Error> {
        Ok(self.posterior().to_vec())
    }

    fn save_posterior_hypers(&mut self) -> Result<(), Error> {
        self.posterior_hypers = self.posterior();
        Ok(())
    }

    fn update_hypers(
        &mut self,
        _states: &[ClusterState],
        _rng: &mut Mt19937,
    ) -> Result<(), Error> {
        // Fixed NIG prior: nothing to resample.
        Ok(())
    }

    fn state(&self) -> ClusterState {
        ClusterState {
            generic_state: vec![self.mean, self.var],
            cardinality: self.members.len(),
        }
    }

    /// Restores parameters and cardinality for read-only evaluation of a
    /// stored chain state. Memberships and summaries are not
    /// reconstructed.
    fn set_state(&mut self, state: &ClusterState) -> Result<(), Error> {
        match state.generic_state.as_slice() {
            [mean, var] => {
                self.mean = *mean;
                self.var = *var;
                self.members = (0..state.cardinality).collect();
                Ok(())
            }
            other => Err(Error::Marshal(crate::error::MarshalError::ShapeMismatch {
                len: other.len(),
                n_rows: 1,
                n_cols: 2,
            })),
        }
    }

    fn hypers(&self) -> HierarchyHypers {
        HierarchyHypers {
            generic_hypers: self.hypers.to_vec(),
        }
    }

    fn set_hypers(&mut self, hypers: &HierarchyHypers) -> Result<(), Error> {
        self.hypers = NigParams::from_slice(&hypers.generic_hypers).map_err(|_| {
            Error::Marshal(crate::error::MarshalError::ShapeMismatch {
                len: hypers.generic_hypers.len(),
                n_rows: 1,
                n_cols: 4,
            })
        })?;
        self.posterior_hypers = self.posterior();
        Ok(())
    }

    fn clear_data(&mut self) -> Result<(), Error> {
        self.members.clear();
        self.clear_summary_statistics()
    }

    fn clear_summary_statistics(&mut self) -> Result<(), Error> {
        self.data_sum = 0.0;
        self.data_sum_sq = 0.0;
        Ok(())
    }

    fn clone_empty(&self) -> Result<Box<dyn Hierarchy>, Error> {
        let mut fresh = self.clone();
        fresh.clear_data()?;
        fresh.posterior_hypers = fresh.hypers;
        Ok(Box::new(fresh))
    }

    fn deep_clone(&self) -> Box<dyn Hierarchy> {
        Box::new(self.clone())
    }

    fn bind_module(
        &mut self,
        _runtime: Arc<crate::runtime::PluginRuntime>,
        _module: &str,
    ) -> Result<(), Error> {
        Ok(())
    }
}
