//! # Operation Orchestration
//!
//! The single-flight discipline for administrative operations.
//!
//! - [`OperationGuard`]: process-wide "an operation is running" state, held
//!   through an RAII [`GuardToken`]
//! - [`OperationRunner`]: guard acquire, submit, poll, deliver, release

pub mod operation_guard;
pub mod operation_runner;

pub use operation_guard::{GuardSnapshot, GuardToken, OperationGuard, OperationPhase};
pub use operation_runner::{OperationRunner, OperationTicket};
