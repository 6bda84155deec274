//! An embeddable Bayesian nonparametric mixture engine with a plugin
//! protocol for user-defined components.
//!
//! The engine samples Dirichlet-process (and related) mixture posteriors
//! with marginal Gibbs schemes. Both kinds of model component can be
//! supplied in two ways:
//!
//! - natively, by implementing the [`hierarchy::Hierarchy`] or
//!   [`mixing::Mixing`] trait, or
//! - as a plugin: a named module of entry-point closures registered in a
//!   [`runtime::PluginRuntime`] and bound to the generic plugin
//!   components by string identifier.
//!
//! Plugin calls that consume randomness run against the runtime's own
//! Mersenne Twister generator, bracketed by a state bridge that keeps it
//! in lockstep with the native generator, so a chain is byte-for-byte
//! reproducible from its seed no matter how work is split between the
//! two sides.
//!
//! # Example
//!
//! Fit a conjugate Normal mixture and evaluate the posterior density:
//!
//! ```rust
//! use bnpmix::config::RunConfig;
//! use bnpmix::messages::{self, DpPrior, NnigPrior, TotalMass};
//! use bnpmix::wrapper::AlgorithmWrapper;
//! use bnpmix::Matrix;
//!
//! let hier_prior = messages::encode(&NnigPrior {
//!     mean: 0.0,
//!     var_scaling: 0.1,
//!     shape: 2.0,
//!     scale: 2.0,
//! }).unwrap();
//! let mix_prior = messages::encode(&DpPrior {
//!     total_mass: TotalMass::Fixed(1.0),
//! }).unwrap();
//!
//! let mut wrapper = AlgorithmWrapper::new(
//!     RunConfig::new("Neal2", "NNIG", "DP"),
//!     "NnigPrior", &hier_prior,
//!     "DpPrior", &mix_prior,
//!     None,
//! ).unwrap();
//!
//! let data = Matrix::from_column(&[-4.9, -5.1, -4.8, 5.2, 4.9, 5.1]);
//! wrapper.run(&data, 100, 50, 42).unwrap();
//!
//! let grid = Matrix::from_column(&[-5.0, 0.0, 5.0]);
//! let dens = wrapper.eval_density(&grid).unwrap();
//! assert_eq!(dens.n_rows(), 50);
//! ```
#![warn(unused_extern_crates)]
#![warn(
    clippy::all,
    clippy::imprecise_flops,
    clippy::suboptimal_flops,
    clippy::unseparated_literal_suffix,
    clippy::unreadable_literal,
    clippy::option_option,
    clippy::implicit_clone,
    clippy::perf
)]

pub mod algorithm;
pub mod collector;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod messages;
pub mod mixing;
pub mod registry;
pub mod runtime;
pub mod wrapper;

pub use bnpmix_consts::rv;
pub use bnpmix_stats::{GeneratorState, Mt19937};
pub use bnpmix_utils::Matrix;

pub use collector::{Collector, MemoryCollector};
pub use config::RunConfig;
pub use error::{ConfigError, Error, MarshalError, PreconditionError};
pub use runtime::{Module, PluginRuntime};
pub use wrapper::AlgorithmWrapper;
