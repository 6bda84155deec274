#![warn(
    clippy::all,
    clippy::imprecise_flops,
    clippy::suboptimal_flops,
    clippy::unseparated_literal_suffix,
    clippy::unreadable_literal,
    clippy::option_option,
    clippy::implicit_clone
)]
pub mod crp;
pub mod mh;
pub mod mt19937;
pub mod nig;

pub use bnpmix_consts::rv;
pub use mt19937::{GeneratorState, GeneratorStateError, Mt19937};
