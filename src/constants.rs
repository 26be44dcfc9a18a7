//! # System Constants
//!
//! Default values shared by the configuration layer and the components that
//! fall back to them when built without a loaded configuration.

use std::time::Duration;

/// Worker pool defaults
pub mod worker_pool {
    /// Maximum number of units of work executing at once
    pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
    pub const DEFAULT_THREAD_NAME: &str = "admin-worker";
    /// Upper bound on OS threads running units of work, including cancelled
    /// units whose blocking call has not returned yet
    pub const DEFAULT_MAX_BLOCKING_THREADS: usize = 64;
}

/// Presentation-thread defaults
pub mod dispatch {
    /// Completion poller tick interval
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
    pub const DEFAULT_THREAD_NAME: &str = "admin-ui";
}

/// Health probe thresholds
pub mod health {
    /// Free space (percent) below which a Warning is raised
    pub const DEFAULT_DISK_WARNING_PERCENT: f64 = 15.0;
    /// Free space (percent) below which an Issue is raised
    pub const DEFAULT_DISK_CRITICAL_PERCENT: f64 = 5.0;
    /// Certificates expiring within this many days raise a Warning
    pub const DEFAULT_CERT_WARNING_DAYS: i64 = 30;
}

/// Auto-recovery defaults
pub mod recovery {
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;
    pub const DEFAULT_START_TIMEOUT_MS: u64 = 30_000;
}

/// Well-known operation names used by the console facade
pub mod operations {
    pub const HEALTH_CHECK: &str = "Health check";
    pub const AUTO_RECOVERY: &str = "Auto-recovery";
    pub const AUTO_HEAL: &str = "Health check and recovery";
}

/// Convert a millisecond setting into a `Duration`
pub fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}
