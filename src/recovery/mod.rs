//! # Auto-Recovery
//!
//! Dependency-ordered restart of stopped services with bounded retries.
//! Invoked after a health check reports Unhealthy, through the same
//! single-flight operation path as every other administrative action.

pub mod orchestrator;

pub use orchestrator::{RecoveryOrchestrator, RecoveryPolicy, RecoveryResult, ServiceDescriptor};
