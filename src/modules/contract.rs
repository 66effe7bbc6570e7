//! Module contract - what a module factory hands back to the loader

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::application::errors::ModuleError;
use crate::application::messaging::throttle::Say;
use super::context::Context;

/// Control value returned by every listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Continue with the next handler
    CarryOn,
    /// Stop processing this event occurrence entirely
    Abort,
}

impl From<bool> for Flow {
    fn from(carry_on: bool) -> Self {
        if carry_on {
            Flow::CarryOn
        } else {
            Flow::Abort
        }
    }
}

impl From<()> for Flow {
    fn from(_: ()) -> Self {
        Flow::CarryOn
    }
}

pub type HandlerResult = Result<Flow, ModuleError>;

/// Event handler: `(say, event args) -> Flow`
pub type Listener = Arc<dyn Fn(&Say, &[String]) -> HandlerResult + Send + Sync>;

/// Hook run once after every configured module is loaded
pub type AfterLoadHook = Box<dyn FnOnce(&Context) -> Result<(), ModuleError> + Send>;

/// Function exported to sibling modules
pub type ExportFn = Arc<dyn Fn(serde_json::Value) -> Result<serde_json::Value, ModuleError> + Send + Sync>;

/// Wrap a closure as a [`Listener`]
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&Say, &[String]) -> HandlerResult + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Listener declaration: one handler or an ordered chain of them
pub enum Handlers {
    One(Listener),
    Chain(Vec<Listener>),
}

impl Handlers {
    /// Normalize to an ordered sequence
    pub fn into_vec(self) -> Vec<Listener> {
        match self {
            Handlers::One(listener) => vec![listener],
            Handlers::Chain(listeners) => listeners,
        }
    }
}

impl From<Listener> for Handlers {
    fn from(listener: Listener) -> Self {
        Handlers::One(listener)
    }
}

impl From<Vec<Listener>> for Handlers {
    fn from(listeners: Vec<Listener>) -> Self {
        Handlers::Chain(listeners)
    }
}

/// Value exported by a module
#[derive(Clone)]
pub enum ExportValue {
    Text(String),
    Json(serde_json::Value),
    Function(ExportFn),
}

impl fmt::Debug for ExportValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportValue::Text(s) => f.debug_tuple("Text").field(s).finish(),
            ExportValue::Json(v) => f.debug_tuple("Json").field(v).finish(),
            ExportValue::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// Named values a module exposes through `Context::exports`
#[derive(Debug, Clone, Default)]
pub struct ModuleExports {
    values: BTreeMap<String, ExportValue>,
}

impl ModuleExports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.values.insert(name.into(), ExportValue::Text(text.into()));
        self
    }

    pub fn with_json(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.values.insert(name.into(), ExportValue::Json(value));
        self
    }

    pub fn with_fn<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(serde_json::Value) -> Result<serde_json::Value, ModuleError> + Send + Sync + 'static,
    {
        self.values.insert(name.into(), ExportValue::Function(Arc::new(f)));
        self
    }

    pub fn get(&self, name: &str) -> Option<&ExportValue> {
        self.values.get(name)
    }

    /// Text export, if `name` holds one
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ExportValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Call a function export
    pub fn call(&self, name: &str, args: serde_json::Value) -> Result<serde_json::Value, ModuleError> {
        match self.values.get(name) {
            Some(ExportValue::Function(f)) => f(args),
            Some(_) => Err(ModuleError::Handler(format!("export '{}' is not callable", name))),
            None => Err(ModuleError::NotFound(name.to_string())),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// What a module factory returns
#[derive(Default)]
pub struct ModuleDescriptor {
    /// Event key -> handlers, in declaration order
    pub listeners: Vec<(String, Handlers)>,
    pub exports: ModuleExports,
    pub after_load: Option<AfterLoadHook>,
}

impl ModuleDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen(mut self, key: impl Into<String>, handlers: impl Into<Handlers>) -> Self {
        self.listeners.push((key.into(), handlers.into()));
        self
    }

    pub fn with_exports(mut self, exports: ModuleExports) -> Self {
        self.exports = exports;
        self
    }

    pub fn after_load<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&Context) -> Result<(), ModuleError> + Send + 'static,
    {
        self.after_load = Some(Box::new(hook));
        self
    }
}

/// Module factory: `(context, params) -> descriptor`
pub type ModuleFactory = fn(&Context, &serde_json::Value) -> Result<ModuleDescriptor, ModuleError>;
