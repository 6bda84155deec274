//! Native Dirichlet-process mixing.
use std::sync::Arc;

use bnpmix_consts::rv::dist::Gamma;
use bnpmix_consts::rv::traits::Rv;
use bnpmix_stats::crp::lcrp;
use bnpmix_stats::mh::mh_prior;
use bnpmix_stats::Mt19937;

use crate::error::{ConfigError, Error, MarshalError, PreconditionError};
use crate::hierarchy::Hierarchy;
use crate::messages::{MixingPrior, MixingState, TotalMass};
use crate::mixing::Mixing;

const N_MH_ITERS: usize = 50;

/// Marginal DP mixing with state `[total_mass]`.
///
/// The total mass is either fixed or given a Gamma hyperprior and
/// resampled by prior-proposal MH against the partition score.
#[derive(Clone, Debug)]
pub struct DirichletMixing {
    prior: Option<TotalMass>,
    total_mass: f64,
}

impl DirichletMixing {
    pub fn new() -> Self {
        Self {
            prior: None,
            total_mass: 1.0,
        }
    }

    fn prior(&self) -> Result<TotalMass, Error> {
        self.prior.ok_or_else(|| {
            Error::Config(ConfigError::MissingPrior {
                component: "mixing",
            })
        })
    }
}

impl Default for DirichletMixing {
    fn default() -> Self {
        Self::new()
    }
}

impl Mixing for DirichletMixing {
    fn is_conditional(&self) -> bool {
        false
    }

    fn set_prior(&mut self, prior: &MixingPrior) -> Result<(), Error> {
        match prior {
            MixingPrior::Dp(p) => {
                match p.total_mass {
                    TotalMass::Fixed(mass) if mass <= 0.0 => {
                        return Err(Error::Config(ConfigError::InvalidPrior {
                            component: "mixing",
                            reason: format!("total mass {mass} is not positive"),
                        }));
                    }
                    TotalMass::GammaPrior { shape, rate }
                        if shape <= 0.0 || rate <= 0.0 =>
                    {
                        return Err(Error::Config(ConfigError::InvalidPrior {
                            component: "mixing",
                            reason: format!(
                                "Gamma({shape}, {rate}) is not a distribution"
                            ),
                        }));
                    }
                    _ => {}
                }
                self.prior = Some(p.total_mass);
                Ok(())
            }
            other => Err(Error::Config(ConfigError::PriorTypeMismatch {
                expected: "DpPrior",
                found: other.type_name(),
            })),
        }
    }

    fn initialize_state(&mut self, _rng: &mut Mt19937) -> Result<(), Error> {
        self.total_mass = match self.prior()? {
            TotalMass::Fixed(mass) => mass,
            // Start a hyperprior chain at the prior mean.
            TotalMass::GammaPrior { shape, rate } => shape / rate,
        };
        Ok(())
    }

    fn update_state(
        &mut self,
        components: &[Box<dyn Hierarchy>],
        allocations: &[usize],
        rng: &mut Mt19937,
    ) -> Result<(), Error> {
        let (shape, rate) = match self.prior()? {
            TotalMass::Fixed(_) => return Ok(()),
            TotalMass::GammaPrior { shape, rate } => (shape, rate),
        };
        // Validated in set_prior.
        let gamma = Gamma::new_unchecked(shape, rate);
        let cts: Vec<usize> = components.iter().map(|c| c.card()).collect();
        let n = allocations.len();
        let loglike = |mass: &f64| lcrp(n, &cts, *mass);
        self.total_mass = mh_prior(
            self.total_mass,
            loglike,
            |r: &mut Mt19937| gamma.draw(r),
            N_MH_ITERS,
            rng,
        )
        .x;
        Ok(())
    }

    fn mass_existing_cluster(
        &self,
        n: usize,
        _n_clust: usize,
        log: bool,
        propto: bool,
        hier: &dyn Hierarchy,
    ) -> Result<f64, Error> {
        self.prior()?;
        let mass = if log {
            let top = hier.log_card();
            if propto {
                top
            } else {
                top - ((n as f64) + self.total_mass).ln()
            }
        } else {
            let top = hier.card() as f64;
            if propto {
                top
            } else {
                top / ((n as f64) + self.total_mass)
            }
        };
        Ok(mass)
    }

    fn mass_new_cluster(
        &self,
        n: usize,
        _n_clust: usize,
        log: bool,
        propto: bool,
    ) -> Result<f64, Error> {
        self.prior()?;
        let mass = if log {
            let top = self.total_mass.ln();
            if propto {
                top
            } else {
                top - ((n as f64) + self.total_mass).ln()
            }
        } else if propto {
            self.total_mass
        } else {
            self.total_mass / ((n as f64) + self.total_mass)
        };
        Ok(mass)
    }

    fn mixing_weights(&self, _log: bool, _propto: bool) -> Result<Vec<f64>, Error> {
        Err(PreconditionError::ConditionalOnly {
            op: "mixing_weights",
        }
        .into())
    }

    fn state(&self) -> MixingState {
        MixingState {
            generic_state: vec![self.total_mass],
        }
    }

    fn set_state(&mut self, state: &MixingState) -> Result<(), Error> {
        match state.generic_state.as_slice() {
            [mass] => {
                self.total_mass = *mass;
                Ok(())
            }
            other => Err(Error::Marshal(MarshalError::ShapeMismatch {
                len: other.len(),
                n_rows: 1,
                n_cols: 1,
            })),
        }
    }

    fn clone_boxed(&self) -> Box<dyn Mixing> {
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
