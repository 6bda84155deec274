//! Cluster-level likelihood components.
//!
//! A `Hierarchy` owns the parameters of one mixture component together
//! with the summary statistics of the data currently allocated to it.
//! The sampler holds one per active cluster plus a prototype it clones
//! when a datum opens a new cluster.
pub mod nnig;
pub mod plugin;

pub use nnig::NnigHierarchy;
pub use plugin::PluginHierarchy;

use std::sync::Arc;

use bnpmix_stats::Mt19937;
use bnpmix_utils::Matrix;

use crate::error::Error;
use crate::messages::{ClusterState, HierarchyHypers, HierarchyPrior};
use crate::runtime::PluginRuntime;

/// One mixture component: parameters, hyperparameters, and the summary
/// statistics of its allocated data.
///
/// `covariate` arguments are `None` for exchangeable models; dependent
/// models receive the row matching the datum.
pub trait Hierarchy: Send {
    /// Attach the prior. Must happen before [`Hierarchy::initialize`].
    fn set_prior(&mut self, prior: &HierarchyPrior) -> Result<(), Error>;

    /// Draw initial parameters and reset all summaries. Requires a prior.
    fn initialize(&mut self, rng: &mut Mt19937) -> Result<(), Error>;

    /// Whether marginal (prior-predictive) evaluations are available.
    fn is_conjugate(&self) -> bool;

    /// Number of data currently allocated to this component.
    fn card(&self) -> usize;

    /// `ln(card)`, negative infinity when empty.
    fn log_card(&self) -> f64 {
        if self.card() == 0 {
            f64::NEG_INFINITY
        } else {
            (self.card() as f64).ln()
        }
    }

    /// Allocate a datum to this component.
    ///
    /// Fails without mutating anything if `id` is already a member. When
    /// `update_params` is set, conjugate components refresh their saved
    /// posterior hyperparameters afterwards.
    fn add_datum(
        &mut self,
        id: usize,
        datum: &[f64],
        update_params: bool,
        covariate: Option<&[f64]>,
    ) -> Result<(), Error>;

    /// Remove a datum from this component. Fails without mutating
    /// anything if `id` is not a member.
    fn remove_datum(
        &mut self,
        id: usize,
        datum: &[f64],
        update_params: bool,
        covariate: Option<&[f64]>,
    ) -> Result<(), Error>;

    /// Log likelihood of `datum` under the current parameters.
    fn like_lpdf(&self, datum: &[f64], covariate: Option<&[f64]>) -> Result<f64, Error>;

    /// Log marginal of `datum` under the prior. Conjugate only.
    fn prior_pred_lpdf(
        &self,
        datum: &[f64],
        covariate: Option<&[f64]>,
    ) -> Result<f64, Error>;

    /// Log marginal of `datum` given this component's data. Conjugate
    /// only.
    fn conditional_pred_lpdf(
        &self,
        datum: &[f64],
        covariate: Option<&[f64]>,
    ) -> Result<f64, Error>;

    /// Replace the parameters with a draw from the prior.
    fn sample_prior(&mut self, rng: &mut Mt19937) -> Result<(), Error>;

    /// Replace the parameters with a draw from the full conditional given
    /// the allocated data.
    fn sample_full_cond(
        &mut self,
        update_params: bool,
        rng: &mut Mt19937,
    ) -> Result<(), Error>;

    /// Posterior hyperparameters given the current summaries. Conjugate
    /// only.
    fn compute_posterior_hypers(&self) -> Result<Vec<f64>, Error>;

    /// Recompute and cache the posterior hyperparameters. Conjugate only.
    fn save_posterior_hypers(&mut self) -> Result<(), Error>;

    /// Resample the shared hyperparameters given every component's state.
    fn update_hypers(
        &mut self,
        states: &[ClusterState],
        rng: &mut Mt19937,
    ) -> Result<(), Error>;

    fn state(&self) -> ClusterState;
    fn set_state(&mut self, state: &ClusterState) -> Result<(), Error>;

    fn hypers(&self) -> HierarchyHypers;
    fn set_hypers(&mut self, hypers: &HierarchyHypers) -> Result<(), Error>;

    /// Forget all allocated data and reset summaries.
    fn clear_data(&mut self) -> Result<(), Error>;

    /// Reset summaries only, keeping memberships.
    fn clear_summary_statistics(&mut self) -> Result<(), Error>;

    /// A fresh component sharing prior and hyperparameters but holding no
    /// data.
    fn clone_empty(&self) -> Result<Box<dyn Hierarchy>, Error>;

    /// A full copy, data and all. Used by the parallel density evaluator.
    fn deep_clone(&self) -> Box<dyn Hierarchy>;

    /// Attach a plugin module. Native implementations ignore this.
    fn bind_module(
        &mut self,
        _runtime: Arc<PluginRuntime>,
        _module: &str,
    ) -> Result<(), Error> {
        Ok(())
    }
}

/// Dispatch over the three legal covariate shapes for a grid evaluation:
/// no covariates, one shared row, or one row per grid point.
fn covariate_for<'a>(
    covariates: Option<&'a Matrix>,
    ix: usize,
) -> Option<&'a [f64]> {
    match covariates {
        None => None,
        Some(m) if m.is_empty() => None,
        Some(m) if m.n_rows() == 1 => Some(m.row(0)),
        Some(m) => Some(m.row(ix)),
    }
}

/// Evaluate [`Hierarchy::like_lpdf`] over every row of `grid`.
pub fn like_lpdf_grid(
    hier: &dyn Hierarchy,
    grid: &Matrix,
    covariates: Option<&Matrix>,
) -> Result<Vec<f64>, Error> {
    grid.rows()
        .enumerate()
        .map(|(ix, row)| hier.like_lpdf(row, covariate_for(covariates, ix)))
        .collect()
}

/// Evaluate [`Hierarchy::prior_pred_lpdf`] over every row of `grid`.
pub fn prior_pred_lpdf_grid(
    hier: &dyn Hierarchy,
    grid: &Matrix,
    covariates: Option<&Matrix>,
) -> Result<Vec<f64>, Error> {
    grid.rows()
        .enumerate()
        .map(|(ix, row)| hier.prior_pred_lpdf(row, covariate_for(covariates, ix)))
        .collect()
}

/// Evaluate [`Hierarchy::conditional_pred_lpdf`] over every row of `grid`.
pub fn conditional_pred_lpdf_grid(
    hier: &dyn Hierarchy,
    grid: &Matrix,
    covariates: Option<&Matrix>,
) -> Result<Vec<f64>, Error> {
    grid.rows()
        .enumerate()
        .map(|(ix, row)| {
            hier.conditional_pred_lpdf(row, covariate_for(covariates, ix))
        })
        .collect()
}
