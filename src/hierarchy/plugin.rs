//! Hierarchy whose behavior lives in a plugin module.
//!
//! The component keeps generic `Vec<f64>` state, hyperparameter, and
//! summary-statistic blocks whose meaning only the plugin knows. Every
//! model-specific operation dispatches through an entry-point table
//! resolved once, at bind time, so a missing entry point fails before any
//! sampling starts. Entry points that consume randomness run inside a
//! bridge bracket and therefore advance the native generator.
use std::collections::BTreeSet;
use std::sync::Arc;

use bnpmix_stats::Mt19937;
use bnpmix_utils::Matrix;
use serde_json::Value;

use crate::error::{ConfigError, Error, MarshalError, PreconditionError};
use crate::hierarchy::Hierarchy;
use crate::messages::{ClusterState, GenericPrior, HierarchyHypers, HierarchyPrior};
use crate::runtime::{marshal, synchronized, EntryPoint, PluginRuntime};

/// Entry points resolved from the bound module.
///
/// Which optional slots are filled depends on the conjugacy the plugin
/// declares; the split is decided once when the table is built.
struct HierarchyVtable {
    conjugate: bool,
    initialize_state: EntryPoint,
    initialize_hypers: EntryPoint,
    like_lpdf: EntryPoint,
    update_summary_statistics: EntryPoint,
    clear_summary_statistics: EntryPoint,
    draw: EntryPoint,
    update_hypers: EntryPoint,
    // Conjugate plugins only.
    marg_lpdf: Option<EntryPoint>,
    compute_posterior_hypers: Option<EntryPoint>,
    // Non-conjugate plugins only.
    sample_full_cond: Option<EntryPoint>,
}

impl HierarchyVtable {
    fn resolve(runtime: &PluginRuntime, module: &str) -> Result<Self, Error> {
        let conjugate_fn = runtime.resolve(module, "is_conjugate")?;
        let conjugate = marshal::boolean(&runtime.call(&conjugate_fn, &[])?)
            .map_err(|_| MarshalError::BadReturn {
                entry_point: "is_conjugate",
                expected: "boolean",
            })?;
        let mut vtable = Self {
            conjugate,
            initialize_state: runtime.resolve(module, "initialize_state")?,
            initialize_hypers: runtime.resolve(module, "initialize_hypers")?,
            like_lpdf: runtime.resolve(module, "like_lpdf")?,
            update_summary_statistics: runtime
                .resolve(module, "update_summary_statistics")?,
            clear_summary_statistics: runtime
                .resolve(module, "clear_summary_statistics")?,
            draw: runtime.resolve(module, "draw")?,
            update_hypers: runtime.resolve(module, "update_hypers")?,
            marg_lpdf: None,
            compute_posterior_hypers: None,
            sample_full_cond: None,
        };
        if conjugate {
            vtable.marg_lpdf = Some(runtime.resolve(module, "marg_lpdf")?);
            vtable.compute_posterior_hypers =
                Some(runtime.resolve(module, "compute_posterior_hypers")?);
        } else {
            vtable.sample_full_cond =
                Some(runtime.resolve(module, "sample_full_cond")?);
        }
        Ok(vtable)
    }
}

/// A mixture component implemented by a plugin module.
pub struct PluginHierarchy {
    runtime: Option<Arc<PluginRuntime>>,
    vtable: Option<Arc<HierarchyVtable>>,
    module: String,
    prior: Option<GenericPrior>,
    state: Vec<f64>,
    hypers: Vec<f64>,
    posterior_hypers: Vec<f64>,
    sum_stats: Vec<f64>,
    /// Raw data of the allocated points, one row per datum, in
    /// allocation order. Non-conjugate full-conditional moves need it.
    cluster_data: Vec<Vec<f64>>,
    members: BTreeSet<usize>,
}

impl PluginHierarchy {
    pub fn new() -> Self {
        Self {
            runtime: None,
            vtable: None,
            module: String::new(),
            prior: None,
            state: Vec::new(),
            hypers: Vec::new(),
            posterior_hypers: Vec::new(),
            sum_stats: Vec::new(),
            cluster_data: Vec::new(),
            members: BTreeSet::new(),
        }
    }

    fn bound(&self) -> Result<(&Arc<PluginRuntime>, &Arc<HierarchyVtable>), Error> {
        match (&self.runtime, &self.vtable) {
            (Some(runtime), Some(vtable)) => Ok((runtime, vtable)),
            _ => Err(ConfigError::ModuleNotBound {
                component: "hierarchy",
            }
            .into()),
        }
    }

    fn data_matrix(&self) -> Matrix {
        if self.cluster_data.is_empty() {
            Matrix::empty()
        } else {
            Matrix::from_rows(&self.cluster_data)
        }
    }

    /// Run `update_summary_statistics` for one datum entering or leaving.
    fn update_summaries(&mut self, datum: &[f64], add: bool) -> Result<(), Error> {
        let (runtime, vtable) = self.bound()?;
        let out = runtime.call(
            &vtable.update_summary_statistics,
            &[
                marshal::to_sequence(datum),
                Value::Bool(add),
                marshal::to_sequence(&self.sum_stats),
                marshal::to_sequence(&self.state),
                marshal::matrix_to_sequence(&self.data_matrix()),
            ],
        )?;
        let parts = out.as_array().ok_or(MarshalError::BadReturn {
            entry_point: "update_summary_statistics",
            expected: "[sum_stats, cluster_data] pair",
        })?;
        match parts.as_slice() {
            [stats, data] => {
                self.sum_stats = marshal::from_sequence(stats)?;
                let data = marshal::matrix_from_sequence(data)?;
                self.cluster_data =
                    data.rows().map(<[f64]>::to_vec).collect();
                Ok(())
            }
            _ => Err(MarshalError::BadReturn {
                entry_point: "update_summary_statistics",
                expected: "[sum_stats, cluster_data] pair",
            }
            .into()),
        }
    }

    fn posterior_hypers_now(&self) -> Result<Vec<f64>, Error> {
        let (runtime, vtable) = self.bound()?;
        let f = vtable.compute_posterior_hypers.as_ref().ok_or(
            PreconditionError::ConjugateOnly {
                op: "compute_posterior_hypers",
            },
        )?;
        let out = runtime.call(
            f,
            &[
                Value::from(self.members.len()),
                marshal::to_sequence(&self.hypers),
                marshal::to_sequence(&self.sum_stats),
            ],
        )?;
        Ok(marshal::from_sequence(&out)?)
    }
}

impl Default for PluginHierarchy {
    fn default() -> Self {
        Self::new()
    }
}

impl Hierarchy for PluginHierarchy {
    fn set_prior(&mut self, prior: &HierarchyPrior) -> Result<(), Error> {
        match prior {
            HierarchyPrior::Generic(p) => {
                self.prior = Some(p.clone());
                Ok(())
            }
            other => Err(Error::Config(ConfigError::PriorTypeMismatch {
                expected: "GenericPrior",
                found: other.type_name(),
            })),
        }
    }

    fn initialize(&mut self, rng: &mut Mt19937) -> Result<(), Error> {
        let prior = self
            .prior
            .clone()
            .ok_or(ConfigError::MissingPrior {
                component: "hierarchy",
            })?;
        let (runtime, vtable) = self.bound()?;
        let (runtime, vtable) = (Arc::clone(runtime), Arc::clone(vtable));
        self.hypers = match prior.values {
            Some(values) => values,
            None => {
                let out = runtime.call(&vtable.initialize_hypers, &[])?;
                marshal::from_sequence(&out)?
            }
        };
        let out = runtime.call(
            &vtable.initialize_state,
            &[marshal::to_sequence(&self.hypers)],
        )?;
        self.state = marshal::from_sequence(&out)?;
        self.posterior_hypers = self.hypers.clone();
        self.members.clear();
        self.cluster_data.clear();
        let out = runtime.call(
            &vtable.clear_summary_statistics,
            &[marshal::to_sequence(&self.sum_stats)],
        )?;
        self.sum_stats = marshal::from_sequence(&out)?;
        // The initial state draw routes through the bridge so plugin and
        // native components stay interchangeable mid-stream.
        let out = synchronized(rng, &runtime, |gen| {
            (vtable.draw)(
                &[
                    marshal::to_sequence(&self.state),
                    marshal::to_sequence(&self.hypers),
                ],
                gen,
            )
        })?;
        self.state = marshal::from_sequence(&out)?;
        Ok(())
    }

    fn is_conjugate(&self) -> bool {
        self.vtable.as_ref().map_or(false, |v| v.conjugate)
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
        if self.members.contains(&id) {
            return Err(PreconditionError::DuplicateDatum { id }.into());
        }
        self.update_summaries(datum, true)?;
        self.members.insert(id);
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
        if !self.members.contains(&id) {
            return Err(PreconditionError::UnknownDatum { id }.into());
        }
        self.update_summaries(datum, false)?;
        self.members.remove(&id);
        if update_params {
            self.save_posterior_hypers()?;
        }
        Ok(())
    }

    fn like_lpdf(&self, datum: &[f64], _covariate: Option<&[f64]>) -> Result<f64, Error> {
        let (runtime, vtable) = self.bound()?;
        let out = runtime.call(
            &vtable.like_lpdf,
            &[
                marshal::to_sequence(datum),
                marshal::to_sequence(&self.state),
            ],
        )?;
        Ok(marshal::scalar(&out)?)
    }

    fn prior_pred_lpdf(
        &self,
        datum: &[f64],
        _covariate: Option<&[f64]>,
    ) -> Result<f64, Error> {
        let (runtime, vtable) = self.bound()?;
        let f = vtable
            .marg_lpdf
            .as_ref()
            .ok_or(PreconditionError::ConjugateOnly {
                op: "prior_pred_lpdf",
            })?;
        let out = runtime.call(
            f,
            &[
                marshal::to_sequence(datum),
                marshal::to_sequence(&self.hypers),
            ],
        )?;
        Ok(marshal::scalar(&out)?)
    }

    fn conditional_pred_lpdf(
        &self,
        datum: &[f64],
        _covariate: Option<&[f64]>,
    ) -> Result<f64, Error> {
        let (runtime, vtable) = self.bound()?;
        let f = vtable
            .marg_lpdf
            .as_ref()
            .ok_or(PreconditionError::ConjugateOnly {
                op: "conditional_pred_lpdf",
            })?;
        let post = self.posterior_hypers_now()?;
        let out = runtime.call(
            f,
            &[marshal::to_sequence(datum), marshal::to_sequence(&post)],
        )?;
        Ok(marshal::scalar(&out)?)
    }

    fn sample_prior(&mut self, rng: &mut Mt19937) -> Result<(), Error> {
        let (runtime, vtable) = self.bound()?;
        let (runtime, vtable) = (Arc::clone(runtime), Arc::clone(vtable));
        let out = synchronized(rng, &runtime, |gen| {
            (vtable.draw)(
                &[
                    marshal::to_sequence(&self.state),
                    marshal::to_sequence(&self.hypers),
                ],
                gen,
            )
        })?;
        self.state = marshal::from_sequence(&out)?;
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
        let (runtime, vtable) = self.bound()?;
        let (runtime, vtable) = (Arc::clone(runtime), Arc::clone(vtable));
        if vtable.conjugate {
            if update_params {
                self.save_posterior_hypers()?;
            }
            let out = synchronized(rng, &runtime, |gen| {
                (vtable.draw)(
                    &[
                        marshal::to_sequence(&self.state),
                        marshal::to_sequence(&self.posterior_hypers),
                    ],
                    gen,
                )
            })?;
            self.state = marshal::from_sequence(&out)?;
            return Ok(());
        }
        // Non-conjugate: the whole move, MH step included, belongs to the
        // plugin and runs under a single bracket.
        let f = vtable
            .sample_full_cond
            .as_ref()
            .ok_or(ConfigError::MissingEntryPoint {
                module: self.module.clone(),
                entry_point: "sample_full_cond",
            })?;
        let out = synchronized(rng, &runtime, |gen| {
            f(
                &[
                    marshal::to_sequence(&self.state),
                    marshal::to_sequence(&self.sum_stats),
                    marshal::matrix_to_sequence(&self.data_matrix()),
                    marshal::to_sequence(&self.hypers),
                ],
                gen,
            )
        })?;
        let parts = out.as_array().ok_or(MarshalError::BadReturn {
            entry_point: "sample_full_cond",
            expected: "[state, sum_stats] pair",
        })?;
        match parts.as_slice() {
            [state, stats] => {
                self.state = marshal::from_sequence(state)?;
                self.sum_stats = marshal::from_sequence(stats)?;
                Ok(())
            }
            _ => Err(MarshalError::BadReturn {
                entry_point: "sample_full_cond",
                expected: "[state, sum_stats] pair",
            }
            .into()),
        }
    }

    fn compute_posterior_hypers(&self) -> Result<Vec<f64>, Error> {
        self.posterior_hypers_now()
    }

    fn save_posterior_hypers(&mut self) -> Result<(), Error> {
        self.posterior_hypers = self.posterior_hypers_now()?;
        Ok(())
    }

    fn update_hypers(
        &mut self,
        states: &[ClusterState],
        rng: &mut Mt19937,
    ) -> Result<(), Error> {
        let (runtime, vtable) = self.bound()?;
        let (runtime, vtable) = (Arc::clone(runtime), Arc::clone(vtable));
        let rows: Vec<Vec<f64>> =
            states.iter().map(|s| s.generic_state.clone()).collect();
        let state_matrix = if rows.is_empty() {
            Matrix::empty()
        } else {
            Matrix::from_rows(&rows)
        };
        let out = synchronized(rng, &runtime, |gen| {
            (vtable.update_hypers)(
                &[
                    marshal::matrix_to_sequence(&state_matrix),
                    marshal::to_sequence(&self.hypers),
                ],
                gen,
            )
        })?;
        self.hypers = marshal::from_sequence(&out)?;
        Ok(())
    }

    fn state(&self) -> ClusterState {
        ClusterState {
            generic_state: self.state.clone(),
            cardinality: self.members.len(),
        }
    }

    /// Restores parameters and cardinality for read-only evaluation of a
    /// stored chain state. Memberships and summaries are not
    /// reconstructed.
    fn set_state(&mut self, state: &ClusterState) -> Result<(), Error> {
        self.state = state.generic_state.clone();
        self.members = (0..state.cardinality).collect();
        Ok(())
    }

    fn hypers(&self) -> HierarchyHypers {
        HierarchyHypers {
            generic_hypers: self.hypers.clone(),
        }
    }

    fn set_hypers(&mut self, hypers: &HierarchyHypers) -> Result<(), Error> {
        self.hypers = hypers.generic_hypers.clone();
        self.posterior_hypers = self.hypers.clone();
        Ok(())
    }

    fn clear_data(&mut self) -> Result<(), Error> {
        self.members.clear();
        self.cluster_data.clear();
        self.clear_summary_statistics()
    }

    fn clear_summary_statistics(&mut self) -> Result<(), Error> {
        // The plugin knows the summary arity, so the reset belongs to
        // its hook.
        let (runtime, vtable) = self.bound()?;
        let out = runtime.call(
            &vtable.clear_summary_statistics,
            &[marshal::to_sequence(&self.sum_stats)],
        )?;
        self.sum_stats = marshal::from_sequence(&out)?;
        Ok(())
    }

    fn clone_empty(&self) -> Result<Box<dyn Hierarchy>, Error> {
        let mut fresh = PluginHierarchy::new();
        fresh.runtime = self.runtime.clone();
        fresh.vtable = self.vtable.clone();
        fresh.module = self.module.clone();
        fresh.prior = self.prior.clone();
        fresh.hypers = self.hypers.clone();
        fresh.posterior_hypers = self.hypers.clone();
        fresh.state = self.state.clone();
        fresh.clear_summary_statistics()?;
        Ok(Box::new(fresh))
    }

    fn deep_clone(&self) -> Box<dyn Hierarchy> {
        Box::new(PluginHierarchy {
            runtime: self.runtime.clone(),
            vtable: self.vtable.clone(),
            module: self.module.clone(),
            prior: self.prior.clone(),
            state: self.state.clone(),
            hypers: self.hypers.clone(),
            posterior_hypers: self.posterior_hypers.clone(),
            sum_stats: self.sum_stats.clone(),
            cluster_data: self.cluster_data.clone(),
            members: self.members.clone(),
        })
    }

    fn bind_module(
        &mut self,
        runtime: Arc<PluginRuntime>,
        module: &str,
    ) -> Result<(), Error> {
        let vtable = HierarchyVtable::resolve(&runtime, module)?;
        log::info!(
            "bound hierarchy to module '{module}' ({})",
            if vtable.conjugate {
                "conjugate"
            } else {
                "non-conjugate"
            }
        );
        self.module = module.to_owned();
        self.vtable = Some(Arc::new(vtable));
        self.runtime = Some(runtime);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::runtime::Module;

    // A conjugate toy model: state [m], hypers [m0], summaries [sum, n].
    fn toy_module() -> Module {
        Module::new()
            .entry_point("is_conjugate", |_args, _rng| Ok(json!(true)))
            .entry_point("initialize_hypers", |_args, _rng| Ok(json!([0.0])))
            .entry_point("initialize_state", |args, _rng| Ok(args[0].clone()))
            .entry_point("like_lpdf", |args, _rng| {
                let x = marshal::from_sequence(&args[0])?[0];
                let m = marshal::from_sequence(&args[1])?[0];
                Ok(json!(-0.5 * (x - m) * (x - m)))
            })
            .entry_point("marg_lpdf", |args, _rng| {
                let x = marshal::from_sequence(&args[0])?[0];
                let m0 = marshal::from_sequence(&args[1])?[0];
                Ok(json!(-0.5 * (x - m0) * (x - m0)))
            })
            .entry_point("update_summary_statistics", |args, _rng| {
                let x = marshal::from_sequence(&args[0])?[0];
                let add = args[1].as_bool().unwrap_or(false);
                let mut stats = marshal::from_sequence(&args[2])?;
                if stats.is_empty() {
                    stats = vec![0.0, 0.0];
                }
                let sign = if add { 1.0 } else { -1.0 };
                stats[0] += sign * x;
                stats[1] += sign;
                let mut data = marshal::matrix_from_sequence(&args[4])?
                    .rows()
                    .map(<[f64]>::to_vec)
                    .collect::<Vec<_>>();
                if add {
                    data.push(vec![x]);
                } else if let Some(ix) = data.iter().position(|row| row[0] == x) {
                    data.remove(ix);
                }
                let matrix = if data.is_empty() {
                    bnpmix_utils::Matrix::empty()
                } else {
                    bnpmix_utils::Matrix::from_rows(&data)
                };
                Ok(json!([
                    marshal::to_sequence(&stats),
                    marshal::matrix_to_sequence(&matrix)
                ]))
            })
            .entry_point("clear_summary_statistics", |_args, _rng| {
                Ok(json!([0.0, 0.0]))
            })
            .entry_point("compute_posterior_hypers", |args, _rng| {
                let card = args[0].as_f64().unwrap_or(0.0);
                let hypers = marshal::from_sequence(&args[1])?;
                let stats = marshal::from_sequence(&args[2])?;
                if card == 0.0 || stats.is_empty() {
                    return Ok(marshal::to_sequence(&hypers));
                }
                Ok(json!([stats[0] / stats[1]]))
            })
            .entry_point("draw", |args, rng| {
                use rand::RngCore;
                let hypers = marshal::from_sequence(&args[1])?;
                // One u32 so the stream visibly advances.
                let jitter = (rng.next_u32() % 3) as f64 * 1e-9;
                Ok(json!([hypers[0] + jitter]))
            })
            .entry_point("update_hypers", |args, _rng| Ok(args[1].clone()))
    }

    fn bound_component(runtime: &Arc<PluginRuntime>) -> PluginHierarchy {
        runtime.register_module("toy", toy_module());
        let mut hier = PluginHierarchy::new();
        hier.bind_module(Arc::clone(runtime), "toy").unwrap();
        hier.set_prior(&HierarchyPrior::Generic(GenericPrior {
            values: Some(vec![1.0]),
        }))
        .unwrap();
        hier.initialize(&mut Mt19937::new(11)).unwrap();
        hier
    }

    #[test]
    fn binding_fails_fast_on_a_missing_entry_point() {
        let runtime = Arc::new(PluginRuntime::new());
        runtime.register_module(
            "broken",
            Module::new().entry_point("is_conjugate", |_a, _r| Ok(json!(true))),
        );
        let mut hier = PluginHierarchy::new();
        assert!(matches!(
            hier.bind_module(Arc::clone(&runtime), "broken"),
            Err(Error::Config(ConfigError::MissingEntryPoint { .. }))
        ));
    }

    #[test]
    fn operations_before_binding_report_the_unbound_component() {
        let hier = PluginHierarchy::new();
        assert!(matches!(
            hier.like_lpdf(&[1.0], None),
            Err(Error::Config(ConfigError::ModuleNotBound { .. }))
        ));
    }

    #[test]
    fn fixed_prior_values_bypass_initialize_hypers() {
        let runtime = Arc::new(PluginRuntime::new());
        let hier = bound_component(&runtime);
        assert_eq!(hier.hypers().generic_hypers, vec![1.0]);
    }

    #[test]
    fn summaries_and_cardinality_track_add_and_remove() {
        let runtime = Arc::new(PluginRuntime::new());
        let mut hier = bound_component(&runtime);
        hier.add_datum(0, &[2.0], true, None).unwrap();
        hier.add_datum(1, &[4.0], true, None).unwrap();
        assert_eq!(hier.card(), 2);
        assert_eq!(hier.sum_stats, vec![6.0, 2.0]);
        assert_eq!(hier.compute_posterior_hypers().unwrap(), vec![3.0]);
        hier.remove_datum(0, &[2.0], true, None).unwrap();
        assert_eq!(hier.sum_stats, vec![4.0, 1.0]);
    }

    #[test]
    fn duplicate_add_leaves_summaries_alone() {
        let runtime = Arc::new(PluginRuntime::new());
        let mut hier = bound_component(&runtime);
        hier.add_datum(5, &[2.0], false, None).unwrap();
        let stats = hier.sum_stats.clone();
        assert!(hier.add_datum(5, &[2.0], false, None).is_err());
        assert_eq!(hier.sum_stats, stats);
    }

    // The toy model again, declared non-conjugate: the full-conditional
    // move lives in the plugin.
    fn toy_nonconjugate_module() -> Module {
        toy_module()
            .entry_point("is_conjugate", |_args, _rng| Ok(json!(false)))
            .entry_point("sample_full_cond", |args, _rng| {
                let stats = marshal::from_sequence(&args[1])?;
                let state = if stats.is_empty() || stats[1] == 0.0 {
                    marshal::from_sequence(&args[0])?
                } else {
                    vec![stats[0] / stats[1]]
                };
                Ok(json!([
                    marshal::to_sequence(&state),
                    marshal::to_sequence(&stats)
                ]))
            })
    }

    fn bound_nonconjugate(runtime: &Arc<PluginRuntime>) -> PluginHierarchy {
        runtime.register_module("toy_nc", toy_nonconjugate_module());
        let mut hier = PluginHierarchy::new();
        hier.bind_module(Arc::clone(runtime), "toy_nc").unwrap();
        hier.set_prior(&HierarchyPrior::Generic(GenericPrior {
            values: Some(vec![1.0]),
        }))
        .unwrap();
        hier.initialize(&mut Mt19937::new(11)).unwrap();
        hier
    }

    #[test]
    fn nonconjugate_add_with_update_params_is_an_error() {
        let runtime = Arc::new(PluginRuntime::new());
        let mut hier = bound_nonconjugate(&runtime);
        assert!(matches!(
            hier.add_datum(0, &[2.0], true, None),
            Err(Error::Precondition(PreconditionError::ConjugateOnly { .. }))
        ));
        let mut hier = bound_nonconjugate(&runtime);
        hier.add_datum(0, &[2.0], false, None).unwrap();
        assert!(matches!(
            hier.remove_datum(0, &[2.0], true, None),
            Err(Error::Precondition(PreconditionError::ConjugateOnly { .. }))
        ));
    }

    #[test]
    fn broken_clear_hook_is_a_fatal_error() {
        let runtime = Arc::new(PluginRuntime::new());
        runtime.register_module(
            "toy",
            toy_module().entry_point("clear_summary_statistics", |_a, _r| {
                Ok(json!("junk"))
            }),
        );
        let mut hier = PluginHierarchy::new();
        hier.bind_module(Arc::clone(&runtime), "toy").unwrap();
        assert!(matches!(
            hier.clear_summary_statistics(),
            Err(Error::Marshal(MarshalError::NotASequence))
        ));
        assert!(hier.clear_data().is_err());
    }

    #[test]
    fn draws_advance_the_native_generator() {
        let runtime = Arc::new(PluginRuntime::new());
        let mut hier = bound_component(&runtime);
        let mut rng = Mt19937::new(2);
        let before = rng.state();
        hier.sample_prior(&mut rng).unwrap();
        assert_ne!(rng.state(), before);
    }

    #[test]
    fn conjugate_component_rejects_sample_full_cond_entry_point_misuse() {
        let runtime = Arc::new(PluginRuntime::new());
        let hier = bound_component(&runtime);
        assert!(hier.is_conjugate());
        // Marginal evaluations are available instead.
        assert!(hier.prior_pred_lpdf(&[0.0], None).is_ok());
    }

    #[test]
    fn clone_empty_keeps_the_binding() {
        let runtime = Arc::new(PluginRuntime::new());
        let mut hier = bound_component(&runtime);
        hier.add_datum(0, &[2.0], true, None).unwrap();
        let fresh = hier.clone_empty().unwrap();
        assert_eq!(fresh.card(), 0);
        assert!(fresh.like_lpdf(&[1.0], None).is_ok());
    }
}
