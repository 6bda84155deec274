//! Mixing whose behavior lives in a plugin module.
//!
//! Same shape as the plugin hierarchy: generic `Vec<f64>` state, an
//! entry-point table resolved at bind time, and the marginal/conditional
//! split decided once from the plugin's own `is_conditional`. Mass and
//! weight entry points receive the state explicitly and must be pure;
//! only `update_state` draws randomness, under a bridge bracket.
use std::sync::Arc;

use bnpmix_stats::Mt19937;
use serde_json::Value;

use crate::error::{ConfigError, Error, MarshalError, PreconditionError};
use crate::hierarchy::Hierarchy;
use crate::messages::{GenericPrior, MixingPrior, MixingState};
use crate::mixing::Mixing;
use crate::runtime::{marshal, synchronized, EntryPoint, PluginRuntime};

struct MixingVtable {
    conditional: bool,
    initialize_state: EntryPoint,
    update_state: EntryPoint,
    // Marginal plugins only.
    mass_existing_cluster: Option<EntryPoint>,
    mass_new_cluster: Option<EntryPoint>,
    // Conditional plugins only.
    mixing_weights: Option<EntryPoint>,
}

impl MixingVtable {
    fn resolve(runtime: &PluginRuntime, module: &str) -> Result<Self, Error> {
        let conditional_fn = runtime.resolve(module, "is_conditional")?;
        let conditional = marshal::boolean(&runtime.call(&conditional_fn, &[])?)
            .map_err(|_| MarshalError::BadReturn {
                entry_point: "is_conditional",
                expected: "boolean",
            })?;
        let mut vtable = Self {
            conditional,
            initialize_state: runtime.resolve(module, "initialize_state")?,
            update_state: runtime.resolve(module, "update_state")?,
            mass_existing_cluster: None,
            mass_new_cluster: None,
            mixing_weights: None,
        };
        if conditional {
            vtable.mixing_weights = Some(runtime.resolve(module, "mixing_weights")?);
        } else {
            vtable.mass_existing_cluster =
                Some(runtime.resolve(module, "mass_existing_cluster")?);
            vtable.mass_new_cluster =
                Some(runtime.resolve(module, "mass_new_cluster")?);
        }
        Ok(vtable)
    }
}

pub struct PluginMixing {
    runtime: Option<Arc<PluginRuntime>>,
    vtable: Option<Arc<MixingVtable>>,
    module: String,
    prior: Option<GenericPrior>,
    state: Vec<f64>,
}

impl PluginMixing {
    pub fn new() -> Self {
        Self {
            runtime: None,
            vtable: None,
            module: String::new(),
            prior: None,
            state: Vec::new(),
        }
    }

    fn bound(&self) -> Result<(&Arc<PluginRuntime>, &Arc<MixingVtable>), Error> {
        match (&self.runtime, &self.vtable) {
            (Some(runtime), Some(vtable)) => Ok((runtime, vtable)),
            _ => Err(ConfigError::ModuleNotBound {
                component: "mixing",
            }
            .into()),
        }
    }

    fn prior_values(&self) -> Result<Vec<f64>, Error> {
        let prior = self.prior.as_ref().ok_or(ConfigError::MissingPrior {
            component: "mixing",
        })?;
        Ok(prior.values.clone().unwrap_or_default())
    }
}

impl Default for PluginMixing {
    fn default() -> Self {
        Self::new()
    }
}

impl Mixing for PluginMixing {
    fn is_conditional(&self) -> bool {
        self.vtable.as_ref().map_or(false, |v| v.conditional)
    }

    fn set_prior(&mut self, prior: &MixingPrior) -> Result<(), Error> {
        match prior {
            MixingPrior::Generic(p) => {
                self.prior = Some(p.clone());
                Ok(())
            }
            other => Err(Error::Config(ConfigError::PriorTypeMismatch {
                expected: "GenericPrior",
                found: other.type_name(),
            })),
        }
    }

    fn initialize_state(&mut self, _rng: &mut Mt19937) -> Result<(), Error> {
        let prior = self.prior_values()?;
        let (runtime, vtable) = self.bound()?;
        let out = runtime.call(
            &vtable.initialize_state,
            &[marshal::to_sequence(&prior)],
        )?;
        self.state = marshal::from_sequence(&out)?;
        Ok(())
    }

    fn update_state(
        &mut self,
        components: &[Box<dyn Hierarchy>],
        allocations: &[usize],
        rng: &mut Mt19937,
    ) -> Result<(), Error> {
        let prior = self.prior_values()?;
        let (runtime, vtable) = self.bound()?;
        let (runtime, vtable) = (Arc::clone(runtime), Arc::clone(vtable));
        let cardinalities: Vec<f64> =
            components.iter().map(|c| c.card() as f64).collect();
        let n = allocations.len();
        let out = synchronized(rng, &runtime, |gen| {
            (vtable.update_state)(
                &[
                    marshal::to_sequence(&self.state),
                    marshal::to_sequence(&prior),
                    marshal::to_sequence(&cardinalities),
                    Value::from(n),
                ],
                gen,
            )
        })?;
        self.state = marshal::from_sequence(&out)?;
        Ok(())
    }

    fn mass_existing_cluster(
        &self,
        n: usize,
        n_clust: usize,
        log: bool,
        propto: bool,
        hier: &dyn Hierarchy,
    ) -> Result<f64, Error> {
        let (runtime, vtable) = self.bound()?;
        let f = vtable.mass_existing_cluster.as_ref().ok_or(
            PreconditionError::MarginalOnly {
                op: "mass_existing_cluster",
            },
        )?;
        let out = runtime.call(
            f,
            &[
                Value::from(n),
                Value::from(n_clust),
                Value::Bool(log),
                Value::Bool(propto),
                Value::from(hier.card()),
                marshal::to_sequence(&self.state),
            ],
        )?;
        Ok(marshal::scalar(&out)?)
    }

    fn mass_new_cluster(
        &self,
        n: usize,
        n_clust: usize,
        log: bool,
        propto: bool,
    ) -> Result<f64, Error> {
        let (runtime, vtable) = self.bound()?;
        let f = vtable.mass_new_cluster.as_ref().ok_or(
            PreconditionError::MarginalOnly {
                op: "mass_new_cluster",
            },
        )?;
        let out = runtime.call(
            f,
            &[
                Value::from(n),
                Value::from(n_clust),
                Value::Bool(log),
                Value::Bool(propto),
                marshal::to_sequence(&self.state),
            ],
        )?;
        Ok(marshal::scalar(&out)?)
    }

    fn mixing_weights(&self, log: bool, propto: bool) -> Result<Vec<f64>, Error> {
        let (runtime, vtable) = self.bound()?;
        let f = vtable.mixing_weights.as_ref().ok_or(
            PreconditionError::ConditionalOnly {
                op: "mixing_weights",
            },
        )?;
        let out = runtime.call(
            f,
            &[
                Value::Bool(log),
                Value::Bool(propto),
                marshal::to_sequence(&self.state),
            ],
        )?;
        Ok(marshal::from_sequence(&out)?)
    }

    fn state(&self) -> MixingState {
        MixingState {
            generic_state: self.state.clone(),
        }
    }

    fn set_state(&mut self, state: &MixingState) -> Result<(), Error> {
        self.state = state.generic_state.clone();
        Ok(())
    }

    fn clone_boxed(&self) -> Box<dyn Mixing> {
        Box::new(PluginMixing {
            runtime: self.runtime.clone(),
            vtable: self.vtable.clone(),
            module: self.module.clone(),
            prior: self.prior.clone(),
            state: self.state.clone(),
        })
    }

    fn bind_module(
        &mut self,
        runtime: Arc<PluginRuntime>,
        module: &str,
    ) -> Result<(), Error> {
        let vtable = MixingVtable::resolve(&runtime, module)?;
        log::info!(
            "bound mixing to module '{module}' ({})",
            if vtable.conditional {
                "conditional"
            } else {
                "marginal"
            }
        );
        self.module = module.to_owned();
        self.vtable = Some(Arc::new(vtable));
        self.runtime = Some(runtime);
        Ok(())
    }
}
