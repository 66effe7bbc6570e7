//! Module registry - symbolic name to factory lookup

use std::collections::HashMap;

use super::contract::ModuleFactory;
use super::{help, karma};

/// Factories the loader can instantiate by name
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    factories: HashMap<String, ModuleFactory>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every module shipped with the bot
    pub fn builtin() -> Self {
        Self::new()
            .with(karma::NAME, karma::factory)
            .with(help::NAME, help::factory)
    }

    pub fn with(mut self, name: impl Into<String>, factory: ModuleFactory) -> Self {
        self.insert(name, factory);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, factory: ModuleFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn get(&self, name: &str) -> Option<ModuleFactory> {
        self.factories.get(name).copied()
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
