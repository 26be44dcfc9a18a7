//! # Health Aggregator
//!
//! Folds independent probe results into one [`HealthCheckResult`].
//!
//! Precedence:
//!
//! - a blocking result appends its issues and forces `Unhealthy`, which is
//!   never downgraded afterwards
//! - a non-blocking result appends its warnings and raises `Healthy` to
//!   `Degraded`
//! - no issues and no warnings leaves `Healthy`
//!
//! The overall status therefore depends only on the multiset of results, not
//! on their order.

use std::collections::BTreeMap;

use tracing::debug;

use super::types::{HealthCheckResult, HealthStatus, ProbeResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct HealthAggregator;

impl HealthAggregator {
    pub fn aggregate<I>(results: I) -> HealthCheckResult
    where
        I: IntoIterator<Item = ProbeResult>,
    {
        let mut overall = HealthStatus::Healthy;
        let mut issues = Vec::new();
        let mut warnings = Vec::new();
        let mut probes = BTreeMap::new();

        for result in results {
            if result.is_blocking() {
                if result.issues.is_empty() {
                    // Keep the report self-consistent: Unhealthy always has an issue
                    issues.push(format!("{} is unhealthy", result.name));
                }
                issues.extend(result.issues.iter().cloned());
                warnings.extend(result.warnings.iter().cloned());
                overall = HealthStatus::Unhealthy;
            } else if result.is_warning() {
                if result.warnings.is_empty() {
                    warnings.push(format!("{} is degraded", result.name));
                }
                warnings.extend(result.warnings.iter().cloned());
                if overall == HealthStatus::Healthy {
                    overall = HealthStatus::Degraded;
                }
            }

            insert_unique(&mut probes, result);
        }

        debug!(
            overall = %overall,
            probes = probes.len(),
            issues = issues.len(),
            warnings = warnings.len(),
            "Health aggregated"
        );

        HealthCheckResult::new(overall, probes, issues, warnings)
    }
}

/// Keys are `<kind>:<name>`; a repeated key gets a `#n` suffix so no result is lost
fn insert_unique(probes: &mut BTreeMap<String, ProbeResult>, result: ProbeResult) {
    let key = result.key();
    if !probes.contains_key(&key) {
        probes.insert(key, result);
        return;
    }

    let mut n = 2;
    while probes.contains_key(&format!("{key}#{n}")) {
        n += 1;
    }
    probes.insert(format!("{key}#{n}"), result);
}
