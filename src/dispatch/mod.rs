//! # Dispatch Module
//!
//! Bridge between background work and the single-threaded presentation layer.
//!
//! - [`UiDispatcher`] owns the presentation thread: an event loop that runs
//!   marshaled actions in order and drives fixed-interval timers.
//! - [`CompletionPoller`] watches an [`AsyncHandle`](crate::execution::AsyncHandle)
//!   from a presentation-thread timer and delivers its outcome exactly once.
//!
//! Presentation state must only be touched from actions run by the dispatcher.

pub mod completion_poller;
pub mod ui_dispatcher;

pub use completion_poller::CompletionPoller;
pub use ui_dispatcher::{DispatchMode, TimerHandle, TimerId, TimerTick, UiDispatcher};

use thiserror::Error;

/// Errors raised while marshaling work onto the presentation thread
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The presentation loop has stopped and cannot accept actions
    #[error("Presentation thread is not running")]
    Disconnected,

    /// The action panicked; the presentation loop survived
    #[error("UI action panicked: {0}")]
    ActionPanicked(String),

    /// A blocking wait was requested from the presentation thread itself
    #[error("Cannot block the presentation thread waiting for '{0}'")]
    WouldBlock(String),

    #[error("Failed to spawn presentation thread: {0}")]
    Spawn(#[from] std::io::Error),
}
