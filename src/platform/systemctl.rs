//! `ServiceControl` backed by the `systemctl` command line.

use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::health::ServiceControl;

const DEFAULT_BINARY: &str = "systemctl";
const DEFAULT_STATUS_POLL: Duration = Duration::from_millis(500);

/// Controls systemd units; a missing unit or binary reads as "not running"
#[derive(Debug, Clone)]
pub struct SystemctlServiceControl {
    binary: String,
    status_poll: Duration,
}

impl Default for SystemctlServiceControl {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemctlServiceControl {
    pub fn new() -> Self {
        Self::with_binary(DEFAULT_BINARY)
    }

    /// Use another executable with the same CLI contract
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            status_poll: DEFAULT_STATUS_POLL,
        }
    }

    pub fn with_status_poll(mut self, interval: Duration) -> Self {
        self.status_poll = interval;
        self
    }

    fn run(&self, args: &[&str]) -> bool {
        let status = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) => status.success(),
            Err(error) => {
                debug!(binary = %self.binary, args = ?args, error = %error, "Service control command could not run");
                false
            }
        }
    }
}

impl ServiceControl for SystemctlServiceControl {
    fn is_running(&self, name: &str) -> bool {
        self.run(&["is-active", "--quiet", name])
    }

    fn start(&self, name: &str, timeout: Duration) -> bool {
        // --no-block so a hung unit cannot outlive the timeout
        if !self.run(&["start", "--no-block", name]) {
            warn!(service = %name, "Service start request was rejected");
            return false;
        }

        let deadline = Instant::now() + timeout;
        loop {
            if self.is_running(name) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                debug!(service = %name, timeout_ms = timeout.as_millis() as u64, "Service did not become active in time");
                return false;
            }
            std::thread::sleep(self.status_poll.min(deadline - now));
        }
    }
}
