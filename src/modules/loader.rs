//! Module loader - instantiates configured modules and builds the listener index

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::application::errors::{panic_message, ModuleError};
use super::context::Context;
use super::contract::{AfterLoadHook, ModuleDescriptor};
use super::listeners::{ListenerEntry, ListenerIndex};
use super::registry::ModuleRegistry;

/// Result of a completed load: frozen context plus the listener index
pub struct LoadedModules {
    pub context: Arc<Context>,
    pub index: ListenerIndex,
}

/// Loads modules in configuration order.
///
/// Consumed by [`ModuleLoader::fire_after_load`], after which nothing can be registered.
pub struct ModuleLoader {
    registry: ModuleRegistry,
    context: Context,
    index: ListenerIndex,
    deferred: Vec<(String, AfterLoadHook)>,
}

impl ModuleLoader {
    pub fn new(registry: ModuleRegistry, context: Context) -> Self {
        Self {
            registry,
            context,
            index: ListenerIndex::new(),
            deferred: Vec::new(),
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn index(&self) -> &ListenerIndex {
        &self.index
    }

    /// Instantiate module `name` with `params` and merge what it declares.
    ///
    /// On failure nothing from the module is kept; the error is logged and returned.
    pub fn register(&mut self, name: &str, params: &serde_json::Value) -> Result<(), ModuleError> {
        match self.instantiate(name, params) {
            Ok(descriptor) => {
                self.merge(name, descriptor);
                Ok(())
            }
            Err(e) => {
                warn!("Unable to load module {}: {}", name, e);
                Err(e)
            }
        }
    }

    /// Register every module in `enabled`, skipping failures. Returns how many loaded.
    pub fn register_all<F>(&mut self, enabled: &[String], params_for: F) -> usize
    where
        F: Fn(&str) -> serde_json::Value,
    {
        enabled
            .iter()
            .filter(|name| self.register(name, &params_for(name)).is_ok())
            .count()
    }

    fn instantiate(&self, name: &str, params: &serde_json::Value) -> Result<ModuleDescriptor, ModuleError> {
        if self.context.is_loaded(name) {
            return Err(ModuleError::Duplicate(name.to_string()));
        }
        let factory = self
            .registry
            .get(name)
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))?;

        panic::catch_unwind(AssertUnwindSafe(|| factory(&self.context, params)))
            .map_err(|payload| ModuleError::Panicked(panic_message(payload.as_ref())))?
    }

    fn merge(&mut self, name: &str, descriptor: ModuleDescriptor) {
        let ModuleDescriptor { listeners, exports, after_load } = descriptor;

        for (key, handlers) in listeners {
            let handlers = handlers.into_vec();
            if handlers.is_empty() {
                warn!("Module {} declared no handlers for {}, ignoring", name, key);
                continue;
            }
            debug!("Module {} listens to {} ({} handlers)", name, key, handlers.len());
            self.index.push(key, ListenerEntry { module: name.to_string(), handlers });
        }

        self.context.publish(name, exports);

        if let Some(hook) = after_load {
            self.deferred.push((name.to_string(), hook));
        }

        info!("Loaded module: {}", name);
    }

    /// Run deferred after-load hooks once, in registration order, and close loading
    pub fn fire_after_load(self) -> LoadedModules {
        let ModuleLoader { context, index, deferred, .. } = self;

        for (name, hook) in deferred {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| hook(&context)))
                .unwrap_or_else(|payload| Err(ModuleError::Panicked(panic_message(payload.as_ref()))));
            if let Err(e) = outcome {
                warn!("After-load hook for module {} failed: {}", name, e);
            }
        }

        info!(
            "Module loading closed: {} modules, {} event keys",
            context.modules().len(),
            index.len()
        );

        LoadedModules {
            context: Arc::new(context),
            index,
        }
    }
}
