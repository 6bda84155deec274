//! String-keyed component factories.
//!
//! Components are chosen at run time by type identifier, so each kind of
//! component has a process-wide registry mapping identifiers to
//! zero-argument constructors. Built-ins are registered on first access;
//! callers may add or overwrite entries at any point before building a
//! wrapper.
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use crate::algorithm::{Neal2, Neal8, Sampler};
use crate::error::ConfigError;
use crate::hierarchy::{Hierarchy, NnigHierarchy, PluginHierarchy};
use crate::mixing::{DirichletMixing, Mixing, PluginMixing};

type Constructor<T> = Arc<dyn Fn() -> Box<T> + Send + Sync>;

/// Identifier-to-constructor table for one component kind.
pub struct Registry<T: ?Sized> {
    kind: &'static str,
    builders: RwLock<HashMap<String, Constructor<T>>>,
}

impl<T: ?Sized> Registry<T> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            builders: RwLock::new(HashMap::new()),
        }
    }

    /// Register a constructor under `id`, replacing any previous one.
    pub fn register<F>(&self, id: &str, builder: F)
    where
        F: Fn() -> Box<T> + Send + Sync + 'static,
    {
        log::debug!("registered {} type '{id}'", self.kind);
        self.builders
            .write()
            .unwrap_or_else(|err| err.into_inner())
            .insert(id.to_owned(), Arc::new(builder));
    }

    /// Build a fresh instance of the type registered under `id`.
    pub fn create(&self, id: &str) -> Result<Box<T>, ConfigError> {
        let builders = self.builders.read().unwrap_or_else(|err| err.into_inner());
        builders
            .get(id)
            .map(|build| build())
            .ok_or_else(|| ConfigError::UnknownTypeId {
                registry: self.kind,
                id: id.to_owned(),
            })
    }
}

/// The hierarchy registry, with built-ins `NNIG` and `PluginHier`.
pub fn hierarchy_registry() -> &'static Registry<dyn Hierarchy> {
    static REGISTRY: OnceLock<Registry<dyn Hierarchy>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let reg: Registry<dyn Hierarchy> = Registry::new("hierarchy");
        reg.register("NNIG", || Box::new(NnigHierarchy::new()));
        reg.register("PluginHier", || Box::new(PluginHierarchy::new()));
        reg
    })
}

/// The mixing registry, with built-ins `DP` and `PluginMix`.
pub fn mixing_registry() -> &'static Registry<dyn Mixing> {
    static REGISTRY: OnceLock<Registry<dyn Mixing>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let reg: Registry<dyn Mixing> = Registry::new("mixing");
        reg.register("DP", || Box::new(DirichletMixing::new()));
        reg.register("PluginMix", || Box::new(PluginMixing::new()));
        reg
    })
}

/// The sampler registry. Each built-in is registered under both its long
/// and short identifier.
pub fn sampler_registry() -> &'static Registry<dyn Sampler> {
    static REGISTRY: OnceLock<Registry<dyn Sampler>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let reg: Registry<dyn Sampler> = Registry::new("sampler");
        reg.register("Neal2", || Box::new(Neal2::new()));
        reg.register("N2", || Box::new(Neal2::new()));
        reg.register("Neal8", || Box::new(Neal8::new()));
        reg.register("N8", || Box::new(Neal8::new()));
        reg
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_ins_are_available() {
        assert!(hierarchy_registry().create("NNIG").is_ok());
        assert!(hierarchy_registry().create("PluginHier").is_ok());
        assert!(mixing_registry().create("DP").is_ok());
        assert!(sampler_registry().create("Neal2").is_ok());
        assert!(sampler_registry().create("N8").is_ok());
    }

    #[test]
    fn unknown_id_names_the_registry_and_the_id() {
        match hierarchy_registry().create("LapsedPareto") {
            Err(ConfigError::UnknownTypeId { registry, id }) => {
                assert_eq!(registry, "hierarchy");
                assert_eq!(id, "LapsedPareto");
            }
            Ok(_) => panic!("created an unregistered type"),
            Err(other) => panic!("unexpected error kind: {other}"),
        }
    }

    #[test]
    fn re_registration_overwrites_without_panicking() {
        let reg: Registry<dyn Hierarchy> = Registry::new("hierarchy");
        reg.register("X", || Box::new(NnigHierarchy::new()));
        reg.register("X", || Box::new(PluginHierarchy::new()));
        let built = reg.create("X").unwrap();
        assert!(!built.is_conjugate());
    }

    #[test]
    fn each_create_returns_a_fresh_instance() {
        let a = hierarchy_registry().create("NNIG").unwrap();
        let b = hierarchy_registry().create("NNIG").unwrap();
        assert_eq!(a.card(), 0);
        assert_eq!(b.card(), 0);
    }
}
