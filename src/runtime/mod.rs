//! The embedded plugin runtime.
//!
//! A [`PluginRuntime`] is an explicit context object holding named modules
//! of entry points and its own Mersenne Twister generator. Components that
//! delegate behavior to plugins resolve their entry points once, at bind
//! time, and call through the resolved handles afterwards. Nothing here is
//! global; two runtimes in one process never observe each other.
mod bridge;
pub mod marshal;

pub use bridge::synchronized;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use bnpmix_stats::Mt19937;
use serde_json::Value;

use crate::error::{ConfigError, Error};

/// A callable plugin entry point.
///
/// Entry points receive positional arguments and the generator they must
/// draw randomness from. Drawing from anywhere else breaks chain
/// reproducibility, which is the one hard rule of the protocol.
pub type EntryPoint =
    Arc<dyn Fn(&[Value], &mut Mt19937) -> Result<Value, Error> + Send + Sync>;

/// A named table of entry points, registered as a unit.
#[derive(Clone, Default)]
pub struct Module {
    entry_points: HashMap<&'static str, EntryPoint>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry point, replacing any previous one with the same name.
    pub fn entry_point<F>(mut self, name: &'static str, f: F) -> Self
    where
        F: Fn(&[Value], &mut Mt19937) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.entry_points.insert(name, Arc::new(f));
        self
    }

    fn get(&self, name: &str) -> Option<EntryPoint> {
        self.entry_points.get(name).cloned()
    }
}

/// The runtime context shared by all plugin-backed components of a run.
pub struct PluginRuntime {
    modules: RwLock<HashMap<String, Module>>,
    generator: Mutex<Mt19937>,
}

impl PluginRuntime {
    /// A runtime with the generator in its default-seeded state.
    pub fn new() -> Self {
        Self {
            modules: RwLock::new(HashMap::new()),
            generator: Mutex::new(Mt19937::default()),
        }
    }

    /// Register a module under `name`, replacing any existing module with
    /// that name.
    pub fn register_module(&self, name: &str, module: Module) {
        log::info!("registered plugin module '{name}'");
        self.modules
            .write()
            .unwrap_or_else(|err| err.into_inner())
            .insert(name.to_owned(), module);
    }

    /// Resolve one entry point of one module.
    ///
    /// Components call this once per entry point while binding, so a
    /// missing name surfaces before any sampling starts.
    pub fn resolve(
        &self,
        module: &str,
        entry_point: &'static str,
    ) -> Result<EntryPoint, ConfigError> {
        let modules = self.modules.read().unwrap_or_else(|err| err.into_inner());
        let table = modules
            .get(module)
            .ok_or_else(|| ConfigError::UnknownModule {
                name: module.to_owned(),
            })?;
        table
            .get(entry_point)
            .ok_or_else(|| ConfigError::MissingEntryPoint {
                module: module.to_owned(),
                entry_point,
            })
    }

    /// Call an entry point against the runtime's own generator.
    ///
    /// Deterministic entry points go through here; randomness-consuming
    /// ones must instead be wrapped in [`synchronized`] so the native
    /// generator observes the consumed draws.
    pub fn call(&self, f: &EntryPoint, args: &[Value]) -> Result<Value, Error> {
        let mut gen = self.generator.lock().unwrap_or_else(|err| err.into_inner());
        f(args, &mut gen)
    }

    fn with_generator<T>(&self, f: impl FnOnce(&mut Mt19937) -> T) -> T {
        let mut gen = self.generator.lock().unwrap_or_else(|err| err.into_inner());
        f(&mut gen)
    }
}

impl Default for PluginRuntime {
    fn default() -> Self {
        Self::new()
    }
}
