//! Domain traits - Abstractions for infrastructure implementations

pub mod store;
pub mod transport;

pub use store::DocumentStore;
pub use transport::{RawSend, Transport};
