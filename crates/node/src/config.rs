//! # Node Configuration
//!
//! The typed shape of a regional node's configuration file: listen
//! ports, event-bus connection, sync tuning, position-storage backend
//! choice, and session limits. Loading the file itself (path resolution,
//! CLI override merging) is `bin/server.rs`'s job; this module only
//! defines the shape, its defaults, and the TOML/env-var deserialization.

use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

/// Top-level node configuration, deserialized from a TOML file.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Listen ports.
    pub server: ServerConfig,
    /// Event-bus connection.
    pub eventbus: EventBusConfig,
    /// Cross-region sync tuning.
    pub sync: SyncConfig,
    /// Position cache storage backend.
    pub position_storage: PositionStorageConfig,
    /// Session and action limits.
    pub limits: LimitsConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            eventbus: EventBusConfig::default(),
            sync: SyncConfig::default(),
            position_storage: PositionStorageConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Parses a node configuration from TOML source, applying the
    /// environment-variable port overlay first.
    ///
    /// # Errors
    ///
    /// Returns a [`toml::de::Error`] if `source` is not valid TOML or
    /// doesn't match [`NodeConfig`]'s shape.
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        let mut config: Self = toml::from_str(source)?;
        config.server.apply_env_overlay();
        Ok(config)
    }
}

/// `server.{tcp_port, udp_port, rest_port, metrics_port}`.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP port for the region control plane.
    pub tcp_port: u16,
    /// UDP port for the game transport session layer.
    pub udp_port: u16,
    /// REST port for admin/health endpoints.
    pub rest_port: u16,
    /// Prometheus-style metrics port.
    pub metrics_port: u16,
}

impl ServerConfig {
    /// Overrides port fields from `NODE_TCP_PORT`/`NODE_UDP_PORT`/
    /// `NODE_REST_PORT`/`NODE_METRICS_PORT`, when present and parseable.
    fn apply_env_overlay(&mut self) {
        Self::overlay_port(&mut self.tcp_port, "NODE_TCP_PORT");
        Self::overlay_port(&mut self.udp_port, "NODE_UDP_PORT");
        Self::overlay_port(&mut self.rest_port, "NODE_REST_PORT");
        Self::overlay_port(&mut self.metrics_port, "NODE_METRICS_PORT");
    }

    fn overlay_port(field: &mut u16, var: &str) {
        if let Ok(value) = std::env::var(var) {
            if let Ok(port) = value.parse() {
                *field = port;
            }
        }
    }

    /// The UDP bind address for the game transport session layer.
    #[must_use]
    pub fn udp_bind_address(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.udp_port))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { tcp_port: 7776, udp_port: 7777, rest_port: 7778, metrics_port: 9090 }
    }
}

/// `eventbus.{url, stream, retention_hours}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    /// JetStream server URL.
    pub url: String,
    /// Stream name events are published under.
    pub stream: String,
    /// Retention window, in hours.
    pub retention_hours: u32,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self { url: "nats://127.0.0.1:4222".to_string(), stream: "EVENTS".to_string(), retention_hours: 24 }
    }
}

/// `sync.{region_id, batch_size, flush_seconds, gzip}`.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// This node's region id, used to partition event-bus subjects and
    /// as the conflict-resolution tiebreaker.
    pub region_id: u32,
    /// Maximum change records per batch.
    pub batch_size: usize,
    /// Maximum time a batch may sit before being flushed.
    pub flush_seconds: u64,
    /// Whether to gzip-compress batch payloads.
    pub gzip: bool,
}

impl SyncConfig {
    /// The flush interval as a [`Duration`].
    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_seconds)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { region_id: 0, batch_size: 256, flush_seconds: 1, gzip: false }
    }
}

/// `position_storage.{type, dsn, fallback_to_memory}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PositionStorageConfig {
    /// Backend kind.
    pub kind: PositionStorageKind,
    /// Connection string for the durable backend, if `kind` is durable.
    pub dsn: Option<String>,
    /// Fall back to the in-memory backend if the durable one is
    /// unreachable at startup, rather than failing to start.
    pub fallback_to_memory: bool,
}

impl Default for PositionStorageConfig {
    fn default() -> Self {
        Self { kind: PositionStorageKind::Memory, dsn: None, fallback_to_memory: true }
    }
}

/// Position cache storage backend choice.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PositionStorageKind {
    /// In-process only; lost on restart.
    #[default]
    Memory,
    /// Backed by a durable store at `dsn`.
    Durable,
}

/// `limits.{max_sessions, max_per_ip, idle_timeout, metadata_max}`.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum concurrent sessions.
    pub max_sessions: usize,
    /// Maximum concurrent sessions from one source address.
    pub max_per_ip: usize,
    /// Seconds of inactivity before a session is reaped.
    pub idle_timeout_seconds: u64,
    /// Maximum per-action metadata size in bytes.
    pub metadata_max: usize,
}

impl LimitsConfig {
    /// The idle timeout as a [`Duration`].
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { max_sessions: 1000, max_per_ip: 5, idle_timeout_seconds: 300, metadata_max: 1024 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_limits() {
        let config = NodeConfig::default();
        assert_eq!(config.limits.max_sessions, 1000);
        assert_eq!(config.limits.max_per_ip, 5);
        assert_eq!(config.limits.idle_timeout(), Duration::from_secs(300));
        assert_eq!(config.limits.metadata_max, 1024);
    }

    #[test]
    fn partial_toml_fills_the_rest_from_defaults() {
        let config = NodeConfig::from_toml_str(
            r#"
            [server]
            udp_port = 9999

            [sync]
            region_id = 3
            "#,
        )
        .expect("valid toml");

        assert_eq!(config.server.udp_port, 9999);
        assert_eq!(config.server.tcp_port, 7776);
        assert_eq!(config.sync.region_id, 3);
        assert_eq!(config.sync.batch_size, 256);
    }

    #[test]
    fn overlay_port_parses_and_ignores_garbage() {
        let mut port = 7777u16;
        ServerConfig::overlay_port(&mut port, "__NODE_CONFIG_TEST_PORT_DOES_NOT_EXIST__");
        assert_eq!(port, 7777, "missing env var leaves the field untouched");
    }
}
