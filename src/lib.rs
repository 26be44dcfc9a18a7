#![allow(clippy::doc_markdown)] // Allow technical terms like SQLEXPRESS, systemctl in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Admin Console Core
//!
//! Operation engine, health aggregation and auto-recovery for a server
//! administration console.
//!
//! ## Overview
//!
//! Administrative actions (starting services, running SQL, copying files)
//! are slow and blocking. This crate keeps the presentation layer responsive
//! while they run:
//!
//! - a bounded worker pool executes each action and hands back an owned handle
//! - a completion poller on the presentation thread detects completion and
//!   delivers the outcome exactly once
//! - a single-flight guard allows one administrative operation at a time and
//!   is released on every exit path
//!
//! On top of that engine, independent health probes are aggregated into one
//! status, and an Unhealthy system can be recovered by restarting services in
//! dependency order with bounded retries.
//!
//! ## Module Organization
//!
//! - [`execution`] - Worker pool, async handles, work context
//! - [`dispatch`] - Presentation thread, timers, completion poller
//! - [`orchestration`] - Single-flight guard and operation runner
//! - [`health`] - Probe interfaces, probe set, aggregator
//! - [`recovery`] - Dependency-ordered auto-recovery
//! - [`platform`] - Host implementations of the probe interfaces
//! - [`console`] - The facade GUI commands and the CLI use
//! - [`config`] - Layered configuration
//! - [`logging`] - Structured logging setup
//! - [`error`] - Console error taxonomy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use admin_console::config::ConsoleConfig;
//! use admin_console::console::{AdminConsole, Collaborators};
//! use admin_console::platform::SystemctlServiceControl;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConsoleConfig::load()?;
//! let console = AdminConsole::new(
//!     config,
//!     Collaborators::new(Arc::new(SystemctlServiceControl::new())),
//! )?;
//!
//! // The trigger stays disabled while `can_start()` is false
//! if console.can_start() {
//!     console.run_health_check(
//!         |report| println!("{}", report.summary()),
//!         |error| eprintln!("Health check failed: {error}"),
//!     )?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod console;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod execution;
pub mod health;
pub mod logging;
pub mod orchestration;
pub mod platform;
pub mod recovery;

pub use config::ConsoleConfig;
pub use console::{AdminConsole, AutoHealReport, Collaborators};
pub use dispatch::{CompletionPoller, DispatchError, DispatchMode, UiDispatcher};
pub use error::{ConsoleError, Result};
pub use execution::{AsyncHandle, WaitError, WorkContext, WorkError, WorkerPool};
pub use health::{HealthAggregator, HealthCheckResult, HealthProbeSet, HealthStatus, ProbeResult};
pub use orchestration::{OperationGuard, OperationPhase, OperationRunner, OperationTicket};
pub use recovery::{RecoveryOrchestrator, RecoveryPolicy, RecoveryResult, ServiceDescriptor};
