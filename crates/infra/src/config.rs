//! Configuration loading and representation.

use std::time::Duration;

use tracing::warn;

/// Settings of the bulk job subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobsConfig {
    /// Poll interval recommended to clients watching a job.
    pub poll_interval: Duration,
    /// How long an assembled export bundle stays downloadable.
    pub export_ttl: Duration,
    /// How often the retention sweeper runs.
    pub sweep_interval: Duration,
    /// At most one active job per kind. Disable only in tests.
    pub single_flight: bool,
    /// Upper bound for a single item; `None` lets an item run forever.
    pub item_timeout: Option<Duration>,
    /// How long finished jobs stay queryable before the sweeper prunes them.
    pub finished_job_retention: Duration,
    /// Simulated latency of the local workers (dev/demo only).
    pub worker_latency: Duration,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(2_000),
            export_ttl: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(60),
            single_flight: true,
            item_timeout: Some(Duration::from_secs(10 * 60)),
            finished_job_retention: Duration::from_secs(24 * 60 * 60),
            worker_latency: Duration::ZERO,
        }
    }
}

impl JobsConfig {
    /// Load from `ASSESSLY_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (used by `from_env` and tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let item_timeout = match parse_u64(&lookup, "ASSESSLY_ITEM_TIMEOUT_SECS") {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.item_timeout,
        };

        Self {
            poll_interval: parse_u64(&lookup, "ASSESSLY_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            export_ttl: parse_u64(&lookup, "ASSESSLY_EXPORT_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.export_ttl),
            sweep_interval: parse_u64(&lookup, "ASSESSLY_SWEEP_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            single_flight: parse_bool(&lookup, "ASSESSLY_SINGLE_FLIGHT")
                .unwrap_or(defaults.single_flight),
            item_timeout,
            finished_job_retention: parse_u64(&lookup, "ASSESSLY_FINISHED_JOB_RETENTION_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.finished_job_retention),
            worker_latency: parse_u64(&lookup, "ASSESSLY_WORKER_LATENCY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.worker_latency),
        }
    }

    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }

    pub fn with_export_ttl(mut self, ttl: Duration) -> Self {
        self.export_ttl = ttl;
        self
    }

    pub fn with_item_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.item_timeout = timeout;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_worker_latency(mut self, latency: Duration) -> Self {
        self.worker_latency = latency;
        self
    }
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring invalid integer setting; using default");
            None
        }
    }
}

fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    let raw = lookup(key)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!(key, value = %raw, "ignoring invalid boolean setting; using default");
            None
        }
    }
}
