//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → routing::RouteTable::build (templates, methods, stages)
//!
//! On reload (file change or SIGHUP):
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → new RouteTable built off to the side
//!     → atomic swap in routing::Router
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, AggregateConfig, DownstreamConfig, EndpointConfig, GatewayConfig,
    HeaderRules, HealthCheckConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    PoolConfig, RateLimitConfig, RetryConfig, RouteConfig, Strategy, TimeoutConfig,
};
