//! Server and relay settings, read once from the process environment

use crate::llm::LlmConfig;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_BODY_LIMIT: usize = 16 * 1024 * 1024;

/// Fixed generation parameters and the per-request time budget
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelaySettings {
    pub max_tokens: u32,
    pub temperature: f32,
    /// Wall-clock budget for handling one request, stream included
    pub timeout: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            max_tokens: 4000,
            temperature: 0.7,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Everything the server binary needs to start
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Largest accepted request body; extracted documents travel inline
    pub body_limit: usize,
    pub relay: RelaySettings,
    pub llm: LlmConfig,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = RelaySettings::default();
        Self {
            port: parse_or(&lookup, "NEURALDEEP_PORT", DEFAULT_PORT),
            body_limit: parse_or(&lookup, "NEURALDEEP_BODY_LIMIT_BYTES", DEFAULT_BODY_LIMIT),
            relay: RelaySettings {
                max_tokens: parse_or(&lookup, "NEURALDEEP_MAX_TOKENS", defaults.max_tokens),
                temperature: parse_or(&lookup, "NEURALDEEP_TEMPERATURE", defaults.temperature),
                timeout: lookup("NEURALDEEP_TIMEOUT_SECS")
                    .and_then(|v| v.parse().ok())
                    .map_or(defaults.timeout, Duration::from_secs),
            },
            llm: LlmConfig::from_lookup(&lookup),
        }
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> T {
    lookup(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}
