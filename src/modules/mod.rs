//! Module system
//!
//! A module is a factory returning a [`ModuleDescriptor`]: listeners keyed by
//! event, exports for sibling modules and an optional after-load hook. The
//! loader instantiates configured modules in order and builds the
//! [`ListenerIndex`] the dispatcher walks.

pub mod context;
pub mod contract;
pub mod help;
pub mod karma;
pub mod listeners;
pub mod loader;
pub mod registry;

pub use context::Context;
pub use contract::{listener, ExportValue, Flow, Handlers, Listener, ModuleDescriptor, ModuleExports, ModuleFactory};
pub use listeners::{ListenerEntry, ListenerIndex};
pub use loader::{LoadedModules, ModuleLoader};
pub use registry::ModuleRegistry;
