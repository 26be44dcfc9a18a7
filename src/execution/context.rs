//! Per-unit-of-work execution context.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::errors::WorkError;

/// Slice used when sleeping without a runtime handle
const STANDALONE_SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Context handed to every unit of work
///
/// Cancellation is cooperative: work that never consults the context runs to
/// completion regardless of `cancel()` on its handle.
#[derive(Debug, Clone)]
pub struct WorkContext {
    id: Uuid,
    label: Arc<str>,
    token: CancellationToken,
    runtime: Option<Handle>,
}

impl WorkContext {
    pub(crate) fn new(id: Uuid, label: Arc<str>, token: CancellationToken, runtime: Handle) -> Self {
        Self {
            id,
            label,
            token,
            runtime: Some(runtime),
        }
    }

    /// Context for work executed outside the pool (CLI paths, tests)
    pub fn standalone(label: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: Arc::from(label),
            token: CancellationToken::new(),
            runtime: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Return `Err(WorkError::Cancelled)` once cancellation was requested
    pub fn check_cancelled(&self) -> Result<(), WorkError> {
        if self.token.is_cancelled() {
            Err(WorkError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, returning early with `Cancelled` if the work is cancelled
    ///
    /// Must be called from the blocking unit of work, never from async code.
    pub fn sleep(&self, duration: Duration) -> Result<(), WorkError> {
        self.check_cancelled()?;

        match &self.runtime {
            Some(runtime) => runtime.block_on(async {
                tokio::select! {
                    _ = self.token.cancelled() => Err(WorkError::Cancelled),
                    _ = tokio::time::sleep(duration) => Ok(()),
                }
            }),
            None => {
                let deadline = Instant::now() + duration;
                loop {
                    self.check_cancelled()?;
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(());
                    }
                    std::thread::sleep(STANDALONE_SLEEP_SLICE.min(deadline - now));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standalone_sleep_completes() {
        let ctx = WorkContext::standalone("sleep");
        let started = Instant::now();
        assert!(ctx.sleep(Duration::from_millis(20)).is_ok());
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_standalone_sleep_observes_cancellation() {
        let ctx = WorkContext::standalone("sleep");
        let token = ctx.cancellation_token().clone();

        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            token.cancel();
        });

        let started = Instant::now();
        let result = ctx.sleep(Duration::from_secs(5));
        canceller.join().unwrap();

        assert!(matches!(result, Err(WorkError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(ctx.is_cancelled());
    }
}
