//! Listener index - event key to the ordered chain of module handlers

use std::collections::BTreeMap;
use std::fmt;

use super::contract::Listener;

/// Handlers one module declared for one event key
#[derive(Clone)]
pub struct ListenerEntry {
    pub module: String,
    pub handlers: Vec<Listener>,
}

impl fmt::Debug for ListenerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerEntry")
            .field("module", &self.module)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Entries per key, in module registration order
#[derive(Debug, Clone, Default)]
pub struct ListenerIndex {
    entries: BTreeMap<String, Vec<ListenerEntry>>,
}

impl ListenerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, key: impl Into<String>, entry: ListenerEntry) {
        self.entries.entry(key.into()).or_default().push(entry);
    }

    /// Entries for `key`, empty when nobody listens
    pub fn get(&self, key: &str) -> &[ListenerEntry] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct event keys with at least one listener
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Module names listening on `key`, in dispatch order
    pub fn modules_for(&self, key: &str) -> Vec<&str> {
        self.get(key).iter().map(|e| e.module.as_str()).collect()
    }

    pub fn contains_module(&self, module: &str) -> bool {
        self.entries.values().flatten().any(|e| e.module == module)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
