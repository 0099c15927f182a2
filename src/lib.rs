//! API gateway library: route matching, middleware, dispatch and aggregation.

pub mod admin;
pub mod aggregate;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod middleware;
pub mod observability;
pub mod resilience;
pub mod routing;

pub use config::{load_config, parse_config, ConfigError, GatewayConfig};
pub use error::GatewayError;
pub use gateway::Gateway;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use routing::{RouteTable, Router};
