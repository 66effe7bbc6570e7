//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: Configuration loading
//! - Storage: Data persistence
//! - Adapters: Transport integrations (console)

pub mod config;
pub mod storage;
pub mod adapters;
