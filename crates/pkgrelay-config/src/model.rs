// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for pkgrelay.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level pkgrelay configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PkgrelayConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Relational store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Blob store settings.
    #[serde(default)]
    pub blob: BlobConfig,

    /// Inbound delivery queue settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Downstream forwarding settings.
    #[serde(default)]
    pub forward: ForwardConfig,

    /// Archive packer settings.
    #[serde(default)]
    pub packing: PackingConfig,

    /// HTTP API settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Prometheus exporter settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Service name, used in logs and health output.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "pkgrelay".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// SQLite storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journal mode.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("pkgrelay").join("pkgrelay.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("pkgrelay.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Filesystem blob store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BlobConfig {
    /// Directory holding input files and packed containers.
    #[serde(default = "default_blob_root")]
    pub root_dir: String,

    /// Upper bound for a single get or put, in milliseconds.
    #[serde(default = "default_blob_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            root_dir: default_blob_root(),
            timeout_ms: default_blob_timeout_ms(),
        }
    }
}

fn default_blob_root() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("pkgrelay").join("blobs"))
        .unwrap_or_else(|| std::path::PathBuf::from("blobs"))
        .to_string_lossy()
        .into_owned()
}

fn default_blob_timeout_ms() -> u64 {
    30_000
}

/// Inbound queue consumer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Queue the consumer reads package requests from.
    #[serde(default = "default_inbound_queue")]
    pub inbound: String,

    /// Number of concurrent workers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Deliveries after which a nacked message is dead-lettered.
    #[serde(default = "default_max_deliver")]
    pub max_deliver: u32,

    /// Lock held on a delivery before it becomes visible again.
    #[serde(default = "default_ack_wait_secs")]
    pub ack_wait_secs: u64,

    /// Delay before a nacked delivery is redelivered.
    #[serde(default = "default_nak_delay_secs")]
    pub nak_delay_secs: u64,

    /// Idle poll interval when the queue is empty.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            inbound: default_inbound_queue(),
            workers: default_workers(),
            max_deliver: default_max_deliver(),
            ack_wait_secs: default_ack_wait_secs(),
            nak_delay_secs: default_nak_delay_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_inbound_queue() -> String {
    "package-creator".to_string()
}

fn default_workers() -> usize {
    4
}

fn default_max_deliver() -> u32 {
    10
}

fn default_ack_wait_secs() -> u64 {
    300
}

fn default_nak_delay_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// How packed containers are handed downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardMode {
    /// Enqueue onto a local queue consumed by the sender service.
    #[default]
    Queue,
    /// POST the descriptor to an HTTP endpoint.
    Http,
}

/// Downstream forwarding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ForwardConfig {
    #[serde(default)]
    pub mode: ForwardMode,

    /// Outbound queue name when `mode = "queue"`.
    #[serde(default = "default_forward_queue")]
    pub queue_name: String,

    /// Endpoint when `mode = "http"`.
    #[serde(default)]
    pub http_url: Option<String>,

    /// Routing hint passed with every publish.
    #[serde(default)]
    pub receipt_url: String,

    /// Upper bound for one publish, in milliseconds.
    #[serde(default = "default_forward_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            mode: ForwardMode::default(),
            queue_name: default_forward_queue(),
            http_url: None,
            receipt_url: String::new(),
            timeout_ms: default_forward_timeout_ms(),
        }
    }
}

fn default_forward_queue() -> String {
    "package-sender".to_string()
}

fn default_forward_timeout_ms() -> u64 {
    10_000
}

/// Archive packer configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PackingConfig {
    /// Hex-encoded 32-byte ed25519 seed used to sign manifests.
    /// A fresh key is generated at startup when unset.
    #[serde(default)]
    pub signing_key: Option<String>,
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_enabled")]
    pub enabled: bool,

    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token required on `/v1` routes. Requests are rejected when unset.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_gateway_enabled(),
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
        }
    }
}

fn default_gateway_enabled() -> bool {
    true
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3000
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    #[serde(default = "default_prometheus_enabled")]
    pub enabled: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: default_prometheus_enabled(),
        }
    }
}

fn default_prometheus_enabled() -> bool {
    true
}
