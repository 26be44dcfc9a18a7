//! # Completion Poller
//!
//! Timer-driven completion detection for an [`AsyncHandle`].
//!
//! Each tick runs on the presentation thread and performs only the
//! non-blocking `is_complete()` check. On completion the timer is stopped
//! first, then the outcome is retrieved and handed to the delivery callback
//! through the [`UiDispatcher`]. Because the handle is moved out of the tick
//! closure on delivery, a second delivery for the same handle is impossible.

use std::time::Duration;

use tracing::{debug, error};

use super::ui_dispatcher::{DispatchMode, TimerHandle, TimerTick, UiDispatcher};
use super::DispatchError;
use crate::execution::{AsyncHandle, WaitError, WorkError};

/// Starts presentation-thread polling for background handles
#[derive(Debug, Clone)]
pub struct CompletionPoller {
    dispatcher: UiDispatcher,
    interval: Duration,
}

impl CompletionPoller {
    pub fn new(dispatcher: UiDispatcher, interval: Duration) -> Self {
        Self {
            dispatcher,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll `handle` and deliver its outcome to exactly one of the callbacks
    pub fn start<T, S, E>(
        &self,
        handle: AsyncHandle<T>,
        on_success: S,
        on_error: E,
    ) -> Result<TimerHandle, DispatchError>
    where
        T: Send + 'static,
        S: FnOnce(T) + Send + 'static,
        E: FnOnce(WorkError) + Send + 'static,
    {
        self.watch(handle, move |outcome| match outcome {
            Ok(value) => on_success(value),
            Err(error) => on_error(error),
        })
    }

    /// Poll `handle` and deliver its outcome once to `deliver`
    ///
    /// If the presentation loop stops before completion, `deliver` is dropped
    /// without being called; anything it owns is released by that drop.
    pub fn watch<T, D>(&self, handle: AsyncHandle<T>, deliver: D) -> Result<TimerHandle, DispatchError>
    where
        T: Send + 'static,
        D: FnOnce(Result<T, WorkError>) + Send + 'static,
    {
        let bridge = self.dispatcher.downgrade();
        let operation_id = handle.id();
        let mut pending = Some((handle, deliver));

        let tick = move |tick: &mut TimerTick| {
            let complete = match &pending {
                Some((handle, _)) => handle.is_complete(),
                None => true,
            };
            if !complete {
                return;
            }

            // Stop before retrieval so no later tick can observe this handle
            tick.stop();
            let Some((handle, deliver)) = pending.take() else {
                return;
            };

            let outcome = match handle.wait(Duration::ZERO) {
                Ok(value) => Ok(value),
                Err(WaitError::Work(error)) => Err(error),
                Err(WaitError::Timeout { handle, .. }) => {
                    // Completion is monotonic; keep polling rather than drop the outcome
                    tick.resume();
                    pending = Some((handle, deliver));
                    return;
                }
            };

            debug!(
                operation_id = %operation_id,
                ticks = tick.count(),
                success = outcome.is_ok(),
                "Completion detected; delivering outcome"
            );

            let Some(bridge) = bridge.upgrade() else {
                // Every dispatcher handle is gone; the loop is stopping
                debug!(operation_id = %operation_id, "Presentation thread gone; outcome dropped");
                return;
            };
            if let Err(dispatch_error) =
                bridge.invoke(move || deliver(outcome), DispatchMode::Synchronous)
            {
                error!(
                    operation_id = %operation_id,
                    error = %dispatch_error,
                    "Completion callback failed"
                );
            }
        };

        self.dispatcher.start_timer(self.interval, tick)
    }
}
