//! Application layer - Use cases and runtime orchestration
//!
//! This layer contains:
//! - Services: Bootstrap and the event loop
//! - Errors: Domain-specific errors
//! - Messaging: Dispatching and throttled sending

pub mod errors;
pub mod services;
pub mod messaging;
