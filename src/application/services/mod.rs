//! Application services - Business logic orchestration

pub mod runtime_service;

pub use runtime_service::RuntimeService;
