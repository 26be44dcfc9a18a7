//! # Execution Module
//!
//! Bounded background execution for administrative work.
//!
//! ## Architecture
//!
//! ```text
//!   submit(label, work) ──► WorkerPool ──► AsyncHandle<T> (returned to caller)
//!                             │
//!                             ▼ (tokio task)
//!                  acquire semaphore permit   ◄── queued beyond max_concurrency
//!                             │
//!                             ▼
//!                  spawn_blocking(work(ctx))  ◄── WorkContext carries cancellation
//!                             │
//!                             ▼
//!                  release permit, publish outcome into the handle's completion slot
//! ```
//!
//! The handle is the single reader of the outcome: `wait`, `join` and
//! `cancel` all consume it, so a result can never be retrieved twice.

pub mod async_handle;
pub mod context;
pub mod errors;
pub mod worker_pool;

pub use async_handle::AsyncHandle;
pub use context::WorkContext;
pub use errors::{WaitError, WorkError, WorkerPoolError};
pub use worker_pool::{WorkerPool, WorkerPoolStats};

use std::any::Any;

/// Extract a readable message from a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_variants() {
        let static_payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(static_payload.as_ref()), "boom");

        let owned_payload: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(panic_message(owned_payload.as_ref()), "owned boom");

        let opaque_payload: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!(panic_message(opaque_payload.as_ref()), "unknown panic payload");
    }
}
