//! Stage registry: stage-type name to factory
//!
//! The registry is built once at startup, filled with every known stage type,
//! and then handed to [`crate::Pipeline::new`] read-only.

use crate::config::ConfigTree;
use crate::error::StageError;
use crate::stage::Stage;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builds a stage from its name and the settings document
///
/// Returning `None` declines construction; the assembler then leaves the stage
/// out of the pipeline.
pub trait StageFactory: Send + Sync {
    fn create(&self, name: &str, settings: &ConfigTree) -> Option<Box<dyn Stage>>;
}

impl<F> StageFactory for F
where
    F: Fn(&str, &ConfigTree) -> Option<Box<dyn Stage>> + Send + Sync,
{
    fn create(&self, name: &str, settings: &ConfigTree) -> Option<Box<dyn Stage>> {
        self(name, settings)
    }
}

/// A stage type that knows how to configure itself from the settings document
pub trait ConfigurableStage: Stage + Sized + 'static {
    fn from_settings(name: &str, settings: &ConfigTree) -> Result<Self, StageError>;
}

struct ConfigurableFactory<T>(std::marker::PhantomData<fn() -> T>);

impl<T: ConfigurableStage> StageFactory for ConfigurableFactory<T> {
    fn create(&self, name: &str, settings: &ConfigTree) -> Option<Box<dyn Stage>> {
        match T::from_settings(name, settings) {
            Ok(stage) => Some(Box::new(stage)),
            Err(e) => {
                warn!("Declining to create stage {}: {}", name, e);
                None
            }
        }
    }
}

/// Registry of stage factories keyed by stage-type name
#[derive(Default)]
pub struct StageRegistry {
    factories: HashMap<String, Arc<dyn StageFactory>>,
}

impl StageRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::with_capacity(16),
        }
    }

    /// Register a factory. A later registration under the same name replaces
    /// the earlier one.
    pub fn register(&mut self, name: impl Into<String>, factory: impl StageFactory + 'static) {
        let name = name.into();
        info!("Registering stage: {}", name);

        if self.factories.insert(name.clone(), Arc::new(factory)).is_some() {
            debug!("Stage {} was already registered, replaced", name);
        }
    }

    /// Register a stage type built through [`ConfigurableStage::from_settings`]
    pub fn register_stage<T: ConfigurableStage>(&mut self, name: impl Into<String>) {
        self.register(name, ConfigurableFactory::<T>(std::marker::PhantomData));
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn StageFactory>> {
        self.factories.get(name).cloned()
    }

    /// Instantiate the stage registered under `name`
    ///
    /// `None` when the name is unknown or the factory declines.
    pub fn create(&self, name: &str, settings: &ConfigTree) -> Option<Box<dyn Stage>> {
        self.factories
            .get(name)
            .and_then(|factory| factory.create(name, settings))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("stages", &self.names())
            .finish()
    }
}
