//! Domain layer - Core business objects with no runtime dependencies
//!
//! This layer contains:
//! - Entities: Events and outgoing messages
//! - Traits: Abstractions for infrastructure (Transport, DocumentStore)

pub mod entities;
pub mod traits;
