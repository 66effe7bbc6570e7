//! Runtime context shared with every module

use std::collections::HashMap;

use crate::application::messaging::throttle::Say;
use super::contract::ModuleExports;

/// Identity, exports table and the shared send handle.
///
/// Filled in while modules load, then frozen behind an `Arc`.
pub struct Context {
    pub nick: String,
    pub owner: Option<String>,
    pub say: Say,
    exports: HashMap<String, ModuleExports>,
    load_order: Vec<String>,
}

impl Context {
    pub fn new(nick: impl Into<String>, owner: Option<String>, say: Say) -> Self {
        Self {
            nick: nick.into(),
            owner,
            say,
            exports: HashMap::new(),
            load_order: Vec::new(),
        }
    }

    /// Exports published by `module`
    pub fn exports(&self, module: &str) -> Option<&ModuleExports> {
        self.exports.get(module)
    }

    /// Loaded module names in registration order
    pub fn modules(&self) -> &[String] {
        &self.load_order
    }

    pub fn is_loaded(&self, module: &str) -> bool {
        self.exports.contains_key(module)
    }

    pub(crate) fn publish(&mut self, module: &str, exports: ModuleExports) {
        if self.exports.insert(module.to_string(), exports).is_none() {
            self.load_order.push(module.to_string());
        }
    }
}
