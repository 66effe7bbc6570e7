//! relay-bot - a chat bot runtime that dispatches transport events across
//! independently loaded modules and shares one throttled outbound channel.

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod modules;

pub use application::errors::BotError;
pub use application::messaging::{ListenerDispatcher, ThrottleConfig, ThrottledChannel};
pub use application::services::RuntimeService;
pub use domain::entities::{Event, Outgoing};
pub use infrastructure::config::Config;
pub use modules::{Context, Flow, ModuleLoader, ModuleRegistry};
