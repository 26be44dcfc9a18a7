//! # Worker Pool
//!
//! Bounded pool executing administrative units of work off the presentation thread.
//!
//! Concurrency is bounded by a semaphore sized to `max_concurrency`; submissions
//! beyond capacity queue on the semaphore rather than fail. Each unit of work
//! runs on a blocking thread and owns its concurrency slot exclusively until it
//! completes or is cancelled, at which point the slot is returned before the
//! outcome is published to the handle.
//!
//! Cancellation is cooperative. A cancelled unit whose blocking call ignores
//! the token is detached: its slot is reused while the call keeps its OS
//! thread until it returns. `max_blocking_threads` bounds those threads, and
//! [`WorkerPoolStats::detached`] counts them.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::async_handle::{AsyncHandle, Completion, CompletionGuard};
use super::context::WorkContext;
use super::errors::{WorkError, WorkerPoolError};
use super::panic_message;
use crate::config::WorkerPoolConfig;

/// Point-in-time pool statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPoolStats {
    pub max_concurrency: usize,
    pub active: usize,
    pub queued: usize,
    /// Cancelled units whose blocking call is still running
    pub detached: usize,
    pub total_submitted: u64,
    pub total_completed: u64,
    pub total_failed: u64,
    pub total_cancelled: u64,
}

#[derive(Debug, Default)]
struct PoolCounters {
    queued: AtomicUsize,
    detached: AtomicUsize,
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

impl PoolCounters {
    fn record(&self, outcome: &Result<impl Sized, WorkError>) {
        let counter = match outcome {
            Ok(_) => &self.completed,
            Err(WorkError::Cancelled) => &self.cancelled,
            Err(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

struct PoolInner {
    runtime: Handle,
    /// Present when the pool built its own runtime
    owned_runtime: Mutex<Option<Runtime>>,
    semaphore: Arc<Semaphore>,
    max_concurrency: usize,
    counters: Arc<PoolCounters>,
    shutdown: CancellationToken,
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.semaphore.close();
        if let Some(runtime) = self.owned_runtime.get_mut().take() {
            runtime.shutdown_background();
        }
    }
}

/// Bounded worker pool returning an [`AsyncHandle`] per submission
///
/// # Examples
///
/// ```rust,no_run
/// use admin_console::config::WorkerPoolConfig;
/// use admin_console::execution::WorkerPool;
/// use std::time::Duration;
///
/// let pool = WorkerPool::new(&WorkerPoolConfig::default()).unwrap();
/// let handle = pool
///     .submit("count files", |_ctx| Ok(std::fs::read_dir(".")?.count()))
///     .unwrap();
///
/// let count = handle.wait(Duration::from_secs(5)).unwrap();
/// println!("{count} entries");
/// ```
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    /// Create a pool backed by its own multi-thread runtime
    pub fn new(config: &WorkerPoolConfig) -> Result<Self, WorkerPoolError> {
        Self::validate(config)?;

        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .max_blocking_threads(config.max_blocking_threads)
            .thread_name(config.thread_name.clone())
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();

        Ok(Self::build(config, handle, Some(runtime)))
    }

    /// Create a pool on an existing runtime
    pub fn with_handle(config: &WorkerPoolConfig, handle: Handle) -> Result<Self, WorkerPoolError> {
        Self::validate(config)?;
        Ok(Self::build(config, handle, None))
    }

    fn validate(config: &WorkerPoolConfig) -> Result<(), WorkerPoolError> {
        if config.max_concurrency == 0 {
            return Err(WorkerPoolError::InvalidConfiguration(
                "max_concurrency must be greater than 0".to_string(),
            ));
        }
        if config.max_blocking_threads < config.max_concurrency {
            return Err(WorkerPoolError::InvalidConfiguration(format!(
                "max_blocking_threads ({}) must be at least max_concurrency ({})",
                config.max_blocking_threads, config.max_concurrency
            )));
        }
        Ok(())
    }

    fn build(config: &WorkerPoolConfig, runtime: Handle, owned: Option<Runtime>) -> Self {
        info!(
            max_concurrency = config.max_concurrency,
            owns_runtime = owned.is_some(),
            "Worker pool initialized"
        );

        Self {
            inner: Arc::new(PoolInner {
                runtime,
                owned_runtime: Mutex::new(owned),
                semaphore: Arc::new(Semaphore::new(config.max_concurrency)),
                max_concurrency: config.max_concurrency,
                counters: Arc::new(PoolCounters::default()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Submit a unit of work; returns immediately with its handle
    ///
    /// Arguments for the work are captured by the closure. Errors returned by
    /// the work, and panics inside it, are delivered through the handle.
    pub fn submit<T, F>(&self, label: &str, work: F) -> Result<AsyncHandle<T>, WorkerPoolError>
    where
        T: Send + 'static,
        F: FnOnce(WorkContext) -> anyhow::Result<T> + Send + 'static,
    {
        if self.is_shut_down() {
            warn!(label = %label, "Submission rejected: worker pool is shut down");
            return Err(WorkerPoolError::ShutDown {
                label: label.to_string(),
            });
        }

        let id = Uuid::new_v4();
        let token = self.inner.shutdown.child_token();
        let completion = Arc::new(Completion::new());
        let handle = AsyncHandle::new(id, label.to_string(), Arc::clone(&completion), token.clone());

        let counters = Arc::clone(&self.inner.counters);
        counters.submitted.fetch_add(1, Ordering::Relaxed);
        counters.queued.fetch_add(1, Ordering::Relaxed);

        let unit = UnitOfWork {
            id,
            label: Arc::from(label),
            token,
            semaphore: Arc::clone(&self.inner.semaphore),
            counters,
            guard: CompletionGuard::new(completion),
        };
        self.inner.runtime.spawn(unit.execute(work));

        debug!(operation_id = %id, label = %label, "Unit of work submitted");
        Ok(handle)
    }

    pub fn max_concurrency(&self) -> usize {
        self.inner.max_concurrency
    }

    pub fn stats(&self) -> WorkerPoolStats {
        let counters = &self.inner.counters;
        let active = if self.inner.semaphore.is_closed() {
            0
        } else {
            self.inner.max_concurrency - self.inner.semaphore.available_permits()
        };

        WorkerPoolStats {
            max_concurrency: self.inner.max_concurrency,
            active,
            queued: counters.queued.load(Ordering::Relaxed),
            detached: counters.detached.load(Ordering::Relaxed),
            total_submitted: counters.submitted.load(Ordering::Relaxed),
            total_completed: counters.completed.load(Ordering::Relaxed),
            total_failed: counters.failed.load(Ordering::Relaxed),
            total_cancelled: counters.cancelled.load(Ordering::Relaxed),
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.semaphore.is_closed()
    }

    /// Reject new submissions and cancel everything queued or running
    pub fn shutdown(&self) {
        if self.is_shut_down() {
            return;
        }
        info!("Worker pool shutting down");
        self.inner.semaphore.close();
        self.inner.shutdown.cancel();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Everything a spawned unit of work needs, detached from the pool itself
struct UnitOfWork<T> {
    id: Uuid,
    label: Arc<str>,
    token: CancellationToken,
    semaphore: Arc<Semaphore>,
    counters: Arc<PoolCounters>,
    guard: CompletionGuard<T>,
}

impl<T: Send + 'static> UnitOfWork<T> {
    async fn execute<F>(self, work: F)
    where
        F: FnOnce(WorkContext) -> anyhow::Result<T> + Send + 'static,
    {
        let queued_at = Instant::now();

        let permit = tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                self.counters.queued.fetch_sub(1, Ordering::Relaxed);
                self.finish(Err(WorkError::Cancelled));
                return;
            }
            acquired = Arc::clone(&self.semaphore).acquire_owned() => match acquired {
                Ok(permit) => permit,
                Err(_) => {
                    self.counters.queued.fetch_sub(1, Ordering::Relaxed);
                    self.finish(Err(WorkError::PoolClosed));
                    return;
                }
            },
        };
        self.counters.queued.fetch_sub(1, Ordering::Relaxed);

        debug!(
            operation_id = %self.id,
            label = %self.label,
            queue_ms = queued_at.elapsed().as_millis() as u64,
            "Unit of work acquired execution slot"
        );

        let ctx = WorkContext::new(
            self.id,
            Arc::clone(&self.label),
            self.token.clone(),
            Handle::current(),
        );
        let started = Instant::now();
        let mut blocking = tokio::task::spawn_blocking(move || work(ctx));

        let (outcome, detached) = tokio::select! {
            biased;
            joined = &mut blocking => (match joined {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(error)) => Err(WorkError::from_anyhow(error)),
                Err(join_error) if join_error.is_panic() => {
                    Err(WorkError::Panicked(panic_message(join_error.into_panic().as_ref())))
                }
                Err(_) => Err(WorkError::Cancelled),
            }, false),
            _ = self.token.cancelled() => (Err(WorkError::Cancelled), true),
        };

        // The slot goes back before the outcome becomes observable
        drop(permit);

        if detached {
            let counters = Arc::clone(&self.counters);
            counters.detached.fetch_add(1, Ordering::Relaxed);
            warn!(
                operation_id = %self.id,
                label = %self.label,
                "Cancelled unit of work detached; its blocking call is still running"
            );
            tokio::spawn(async move {
                let _ = blocking.await;
                counters.detached.fetch_sub(1, Ordering::Relaxed);
            });
        }

        debug!(
            operation_id = %self.id,
            label = %self.label,
            duration_ms = started.elapsed().as_millis() as u64,
            success = outcome.is_ok(),
            "Unit of work finished"
        );
        self.finish(outcome);
    }

    fn finish(&self, outcome: Result<T, WorkError>) {
        self.counters.record(&outcome);
        self.guard.complete(outcome);
    }
}
