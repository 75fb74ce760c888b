//! Explicit model-name → entity constructor table.
//!
//! Models are registered by name at startup, either on a local
//! [`EntityRegistry`] or on the process-wide one behind
//! [`EntityRegistry::global`]. Stored data names its model in `_model`, so
//! [`EntityRegistry::load`] can rebuild the right entity from it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::debug;

use crate::entity::{Entity, EntityConfig, GENERIC_EDGE, GENERIC_VERTEX, LABEL, MODEL};
use crate::model::PropertyMap;
use crate::{Error, Result};

/// Builds an entity from optional initial data.
pub type EntityConstructor = Arc<dyn Fn(Option<PropertyMap>) -> Entity + Send + Sync>;

static GLOBAL_REGISTRY: Lazy<RwLock<EntityRegistry>> =
    Lazy::new(|| RwLock::new(EntityRegistry::with_generics()));

#[derive(Clone, Default)]
pub struct EntityRegistry {
    constructors: HashMap<String, EntityConstructor>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that already knows `generic_vertex` and `generic_edge`.
    pub fn with_generics() -> Self {
        let mut registry = Self::new();
        registry.register(GENERIC_VERTEX, Entity::generic_vertex);
        registry.register(GENERIC_EDGE, |data: Option<PropertyMap>| {
            let label = data
                .as_ref()
                .and_then(|d| d.get(LABEL))
                .and_then(|v| v.as_str())
                .map(str::to_string);
            Entity::generic_edge(label.as_deref(), data)
        });
        registry
    }

    /// The process-wide registry, pre-seeded with the generic models.
    pub fn global() -> &'static RwLock<EntityRegistry> {
        &GLOBAL_REGISTRY
    }

    /// Register a constructor, returning whether `name` was already taken
    /// (the new constructor replaces the old one).
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F) -> bool
    where
        F: Fn(Option<PropertyMap>) -> Entity + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(model = %name, "entity model registered");
        self.constructors.insert(name, Arc::new(constructor)).is_some()
    }

    /// Register a vertex model from its config.
    pub fn register_vertex(&mut self, config: EntityConfig) -> bool {
        let name = config.model.clone();
        self.register(name, move |data| Entity::vertex(&config, data))
    }

    /// Register an edge model from its config and default label.
    pub fn register_edge(&mut self, config: EntityConfig, label: impl Into<String>) -> bool {
        let name = config.model.clone();
        let label = label.into();
        self.register(name, move |data| Entity::edge(&config, Some(label.as_str()), data))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered model names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn build(&self, name: &str, data: Option<PropertyMap>) -> Result<Entity> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("entity model '{name}'")))?;
        Ok(constructor(data))
    }

    /// Build the entity named by `data["_model"]`.
    pub fn load(&self, data: PropertyMap) -> Result<Entity> {
        let model = data
            .get(MODEL)
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::NotFound(format!("'{MODEL}' in entity data")))?
            .to_string();
        self.build(&model, Some(data))
    }
}

impl fmt::Debug for EntityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRegistry").field("models", &self.names()).finish()
    }
}
