//! API process configuration.

use std::net::SocketAddr;

use assessly_infra::JobsConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jobs: JobsConfig,
}

impl ApiConfig {
    /// `ASSESSLY_BIND_ADDR` plus the `ASSESSLY_*` job settings.
    pub fn from_env() -> Self {
        Self {
            bind_addr: bind_addr(std::env::var("ASSESSLY_BIND_ADDR").ok()),
            jobs: JobsConfig::from_env(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn bind_addr(raw: Option<String>) -> SocketAddr {
    match raw {
        None => default_bind_addr(),
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(value = %raw, default = DEFAULT_BIND_ADDR, "invalid ASSESSLY_BIND_ADDR; using default");
            default_bind_addr()
        }),
    }
}
