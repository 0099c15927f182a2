//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, inbound limits).
    pub listener: ListenerConfig,

    /// Route definitions mapping upstream templates to downstream targets.
    pub routes: Vec<RouteConfig>,

    /// Fan-out routes composed from other routes.
    pub aggregates: Vec<AggregateConfig>,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Default timeouts, overridable per route.
    pub timeouts: TimeoutConfig,

    /// Default retry policy, overridable per route.
    pub retries: RetryConfig,

    /// Downstream connection pool settings.
    pub pool: PoolConfig,

    /// Settings for the `rate_limit` middleware stage.
    pub rate_limit: RateLimitConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrently handled requests (backpressure).
    pub max_connections: usize,

    /// Largest accepted request body in bytes.
    pub max_body_bytes: usize,

    /// Largest downstream response body buffered per attempt.
    pub max_response_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            max_response_bytes: 16 * 1024 * 1024, // 16MB
        }
    }
}

/// A single upstream route forwarded to a downstream target.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics, unique across routes and aggregates.
    pub name: String,

    /// Upstream path template, e.g. `/api/items/{id}` or `/static/{*rest}`.
    pub upstream: String,

    /// Allowed methods. Empty means any method.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Where matched requests go.
    pub downstream: DownstreamConfig,

    /// Endpoint selection strategy.
    #[serde(default)]
    pub strategy: Strategy,

    /// Overall deadline for the request, including retries.
    pub timeout_ms: Option<u64>,

    /// Deadline for a single attempt. Must not exceed `timeout_ms`.
    pub attempt_timeout_ms: Option<u64>,

    /// Number of retries after the first attempt.
    pub retries: Option<u32>,

    /// Middleware stage names, outermost first.
    #[serde(default)]
    pub middleware: Vec<String>,

    /// Rules for the `header_rewrite` stage.
    #[serde(default)]
    pub headers: HeaderRules,

    /// Slot name when this route is a branch of an aggregate (defaults to `name`).
    pub key: Option<String>,
}

/// Downstream target of a route.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownstreamConfig {
    /// URI scheme used to reach the endpoints.
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Downstream path template; may reference upstream parameters.
    pub path: String,

    /// Endpoints that can serve this route.
    pub endpoints: Vec<EndpointConfig>,

    /// Probe path overriding `health_check.path` for these endpoints.
    pub health_path: Option<String>,
}

fn default_scheme() -> String {
    "http".to_string()
}

/// A single downstream host.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
}

/// Endpoint selection strategy tag.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    RoundRobin,
    Random,
    LeastConnections,
}

/// Header set/remove rules applied by the `header_rewrite` stage.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HeaderRules {
    pub request_set: BTreeMap<String, String>,
    pub request_remove: Vec<String>,
    pub response_set: BTreeMap<String, String>,
    pub response_remove: Vec<String>,
}

/// A fan-out route whose response merges several branch routes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AggregateConfig {
    /// Aggregate identifier.
    pub name: String,

    /// Upstream path template. Its parameters are passed to every branch.
    pub upstream: String,

    /// Allowed methods. Empty means any method.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Names of the routes to call.
    pub routes: Vec<String>,

    /// Deadline for all branches together.
    pub timeout_ms: Option<u64>,

    /// Middleware stage names, outermost first.
    #[serde(default)]
    pub middleware: Vec<String>,

    /// Rules for the `header_rewrite` stage.
    #[serde(default)]
    pub headers: HeaderRules,
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Probe interval in seconds.
    pub interval_secs: u64,

    /// Probe timeout in seconds.
    pub timeout_secs: u64,

    /// Default probe path.
    pub path: String,

    /// Consecutive failures before an endpoint is marked unhealthy.
    pub unhealthy_threshold: u32,

    /// Consecutive probe successes before an endpoint is restored.
    pub healthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            timeout_secs: 2,
            path: "/health".to_string(),
            unhealthy_threshold: 3,
            healthy_threshold: 1,
        }
    }
}

/// Default timeouts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// TCP connect timeout in milliseconds.
    pub connect_ms: u64,

    /// Overall request deadline in milliseconds, used when a route sets none.
    pub request_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 2_000,
            request_ms: 30_000,
        }
    }
}

/// Default retry policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt, used when a route sets none.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 50,
            max_delay_ms: 1_000,
        }
    }
}

/// Downstream connection pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Concurrent in-flight calls allowed per endpoint.
    pub max_connections_per_endpoint: usize,

    /// How long to wait for a free slot before failing with 503.
    pub acquire_timeout_ms: u64,

    /// Idle keep-alive connections kept per host.
    pub max_idle_per_host: usize,

    /// Idle connection lifetime in seconds.
    pub idle_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections_per_endpoint: 100,
            acquire_timeout_ms: 1_000,
            max_idle_per_host: 32,
            idle_timeout_secs: 90,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Sustained requests per second per client IP.
    pub requests_per_second: u32,

    /// Burst capacity.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 100,
            burst_size: 50,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
