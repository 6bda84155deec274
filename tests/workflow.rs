//! End-to-end runs through the public surface.
//!
//! The centerpiece re-implements the native NNIG component as a plugin
//! module and checks that the plugin-backed chain is byte-identical to
//! the native one under the same seed. That only holds if the generator
//! bridge, the marshaling layer, and the bind-time dispatch are all
//! exact.
use std::sync::Arc;

use serde_json::json;

use bnpmix::config::RunConfig;
use bnpmix::messages::{self, DpPrior, GenericPrior, NnigPrior, TotalMass};
use bnpmix::runtime::marshal;
use bnpmix::{AlgorithmWrapper, Matrix, Module, PluginRuntime};
use bnpmix_stats::nig::{self, NigParams};

const HYPERS: [f64; 4] = [0.0, 0.1, 2.0, 2.0];

fn nnig_prior_bytes() -> Vec<u8> {
    messages::encode(&NnigPrior {
        mean: HYPERS[0],
        var_scaling: HYPERS[1],
        shape: HYPERS[2],
        scale: HYPERS[3],
    })
    .unwrap()
}

fn generic_prior_bytes() -> Vec<u8> {
    messages::encode(&GenericPrior {
        values: Some(HYPERS.to_vec()),
    })
    .unwrap()
}

fn dp_prior_bytes() -> Vec<u8> {
    messages::encode(&DpPrior {
        total_mass: TotalMass::Fixed(1.0),
    })
    .unwrap()
}

fn two_bump_data() -> Matrix {
    let mut data = Vec::new();
    for i in 0..15 {
        data.push(-5.0 + 0.1 * i as f64);
        data.push(5.0 + 0.1 * i as f64);
    }
    Matrix::from_column(&data)
}

/// The NNIG model written as a plugin: state `[mean, var]`, hypers
/// `[mean, var_scaling, shape, scale]`, summaries `[sum, sum_sq]`.
fn nnig_module() -> Module {
    Module::new()
        .entry_point("is_conjugate", |_args, _rng| Ok(json!(true)))
        .entry_point("initialize_hypers", |_args, _rng| {
            Ok(marshal::to_sequence(&HYPERS))
        })
        .entry_point("initialize_state", |args, _rng| {
            let hypers = marshal::from_sequence(&args[0])?;
            Ok(json!([hypers[0], 1.0]))
        })
        .entry_point("like_lpdf", |args, _rng| {
            let x = marshal::from_sequence(&args[0])?[0];
            let state = marshal::from_sequence(&args[1])?;
            Ok(marshal::number(nig::like_lpdf(x, state[0], state[1])))
        })
        .entry_point("marg_lpdf", |args, _rng| {
            let x = marshal::from_sequence(&args[0])?[0];
            let hypers = marshal::from_sequence(&args[1])?;
            let params = NigParams::from_slice(&hypers)
                .map_err(|e| bnpmix::Error::Plugin {
                    entry_point: "marg_lpdf",
                    message: e.to_string(),
                })?;
            Ok(marshal::number(params.marg_lpdf(x)))
        })
        .entry_point("update_summary_statistics", |args, _rng| {
            let x = marshal::from_sequence(&args[0])?[0];
            let add = args[1].as_bool().unwrap_or(false);
            let mut stats = marshal::from_sequence(&args[2])?;
            if stats.len() != 2 {
                stats = vec![0.0, 0.0];
            }
            let sign = if add { 1.0 } else { -1.0 };
            stats[0] += sign * x;
            stats[1] += sign * x * x;
            // Conjugate model: the raw data block stays empty.
            Ok(json!([
                marshal::to_sequence(&stats),
                marshal::matrix_to_sequence(&Matrix::empty())
            ]))
        })
        .entry_point("clear_summary_statistics", |_args, _rng| {
            Ok(json!([0.0, 0.0]))
        })
        .entry_point("compute_posterior_hypers", |args, _rng| {
            let card = args[0].as_u64().unwrap_or(0) as usize;
            let hypers = marshal::from_sequence(&args[1])?;
            let stats = marshal::from_sequence(&args[2])?;
            let params = NigParams::from_slice(&hypers)
                .map_err(|e| bnpmix::Error::Plugin {
                    entry_point: "compute_posterior_hypers",
                    message: e.to_string(),
                })?;
            let (sum, sum_sq) = if stats.len() == 2 {
                (stats[0], stats[1])
            } else {
                (0.0, 0.0)
            };
            Ok(marshal::to_sequence(&params.posterior(card, sum, sum_sq).to_vec()))
        })
        .entry_point("draw", |args, rng| {
            let hypers = marshal::from_sequence(&args[1])?;
            let params = NigParams::from_slice(&hypers)
                .map_err(|e| bnpmix::Error::Plugin {
                    entry_point: "draw",
                    message: e.to_string(),
                })?;
            let (mean, var) = params.draw(rng);
            Ok(json!([mean, var]))
        })
        .entry_point("update_hypers", |args, _rng| Ok(args[1].clone()))
}

fn native_wrapper() -> AlgorithmWrapper {
    AlgorithmWrapper::new(
        RunConfig::new("Neal2", "NNIG", "DP"),
        "NnigPrior",
        &nnig_prior_bytes(),
        "DpPrior",
        &dp_prior_bytes(),
        None,
    )
    .unwrap()
}

fn plugin_wrapper() -> AlgorithmWrapper {
    let runtime = Arc::new(PluginRuntime::new());
    runtime.register_module("nnig", nnig_module());
    AlgorithmWrapper::new(
        RunConfig::new("Neal2", "PluginHier", "DP").hierarchy_module("nnig"),
        "GenericPrior",
        &generic_prior_bytes(),
        "DpPrior",
        &dp_prior_bytes(),
        Some(runtime),
    )
    .unwrap()
}

#[test]
fn plugin_chain_is_byte_identical_to_the_native_chain() {
    let data = two_bump_data();
    let mut native = native_wrapper();
    let mut plugin = plugin_wrapper();
    native.run(&data, 80, 30, 1234).unwrap();
    plugin.run(&data, 80, 30, 1234).unwrap();

    let native_chain = native.chain().unwrap();
    let plugin_chain = plugin.chain().unwrap();
    assert_eq!(native_chain.len(), plugin_chain.len());
    for (a, b) in native_chain.iter().zip(&plugin_chain) {
        assert_eq!(a.iteration, b.iteration);
        assert_eq!(a.allocations, b.allocations);
        assert_eq!(a.mixing_state, b.mixing_state);
        assert_eq!(a.cluster_states, b.cluster_states);
    }
}

#[test]
fn plugin_density_matches_the_native_density() {
    let data = two_bump_data();
    let mut native = native_wrapper();
    let mut plugin = plugin_wrapper();
    native.run(&data, 60, 30, 77).unwrap();
    plugin.run(&data, 60, 30, 77).unwrap();

    let grid = Matrix::from_column(&[-6.0, -5.0, 0.0, 5.0, 6.0]);
    let native_dens = native.eval_density(&grid).unwrap();
    let plugin_dens = plugin.eval_density(&grid).unwrap();
    assert_eq!(native_dens.n_rows(), plugin_dens.n_rows());
    for (a, b) in native_dens.values().iter().zip(plugin_dens.values()) {
        approx::assert_relative_eq!(a, b, epsilon = 1e-10);
    }
}

#[test]
fn neal8_runs_the_plugin_hierarchy_end_to_end() {
    let runtime = Arc::new(PluginRuntime::new());
    runtime.register_module("nnig", nnig_module());
    let mut wrapper = AlgorithmWrapper::new(
        RunConfig::new("Neal8", "PluginHier", "DP").hierarchy_module("nnig"),
        "GenericPrior",
        &generic_prior_bytes(),
        "DpPrior",
        &dp_prior_bytes(),
        Some(runtime),
    )
    .unwrap();
    let data = two_bump_data();
    wrapper.run(&data, 50, 20, 9).unwrap();
    assert_eq!(wrapper.n_states(), 30);
    for state in wrapper.chain().unwrap() {
        let total: usize =
            state.cluster_states.iter().map(|c| c.cardinality).sum();
        assert_eq!(total, data.n_rows());
    }
}

#[test]
fn plugin_mixing_composes_with_a_native_hierarchy() {
    let runtime = Arc::new(PluginRuntime::new());
    // DP written as a plugin, mass functions only.
    runtime.register_module(
        "dp",
        Module::new()
            .entry_point("is_conditional", |_a, _r| Ok(json!(false)))
            .entry_point("initialize_state", |args, _r| Ok(args[0].clone()))
            .entry_point("update_state", |args, _r| Ok(args[0].clone()))
            .entry_point("mass_existing_cluster", |args, _r| {
                let n = args[0].as_f64().unwrap_or(0.0);
                let log = args[2].as_bool().unwrap_or(false);
                let propto = args[3].as_bool().unwrap_or(false);
                let card = args[4].as_f64().unwrap_or(0.0);
                let mass = marshal::from_sequence(&args[5])?[0];
                let m = if propto { card } else { card / (n + mass) };
                Ok(marshal::number(if log { m.ln() } else { m }))
            })
            .entry_point("mass_new_cluster", |args, _r| {
                let n = args[0].as_f64().unwrap_or(0.0);
                let log = args[2].as_bool().unwrap_or(false);
                let propto = args[3].as_bool().unwrap_or(false);
                let mass = marshal::from_sequence(&args[4])?[0];
                let m = if propto { mass } else { mass / (n + mass) };
                Ok(marshal::number(if log { m.ln() } else { m }))
            }),
    );
    let mut with_plugin_mix = AlgorithmWrapper::new(
        RunConfig::new("Neal2", "NNIG", "PluginMix").mixing_module("dp"),
        "NnigPrior",
        &nnig_prior_bytes(),
        "GenericPrior",
        &messages::encode(&GenericPrior {
            values: Some(vec![1.0]),
        })
        .unwrap(),
        Some(runtime),
    )
    .unwrap();
    let mut with_native_mix = native_wrapper();

    let data = two_bump_data();
    with_plugin_mix.run(&data, 60, 30, 555).unwrap();
    with_native_mix.run(&data, 60, 30, 555).unwrap();
    // Identical model, identical seed, different mixing transport.
    let plugin_chain = with_plugin_mix.chain().unwrap();
    let native_chain = with_native_mix.chain().unwrap();
    assert_eq!(
        plugin_chain.last().map(|s| &s.allocations),
        native_chain.last().map(|s| &s.allocations),
    );
}

#[test]
fn seed_reproducibility_holds_across_wrapper_instances() {
    let data = two_bump_data();
    let mut a = native_wrapper();
    let mut b = native_wrapper();
    a.run(&data, 40, 10, 2024).unwrap();
    b.run(&data, 40, 10, 2024).unwrap();
    assert_eq!(a.chain().unwrap(), b.chain().unwrap());
}
