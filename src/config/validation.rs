//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Check names are unique across routes and aggregates
//!
//! Route templates, methods, middleware names and aggregate references are
//! checked when the route table is compiled, since that is where they get parsed.
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{GatewayConfig, RouteConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be > 0"));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be > 0"));
    }
    if config.listener.max_response_bytes == 0 {
        errors.push(ValidationError::new("listener.max_response_bytes", "must be > 0"));
    }

    if config.timeouts.connect_ms == 0 {
        errors.push(ValidationError::new("timeouts.connect_ms", "must be > 0"));
    }
    if config.timeouts.request_ms == 0 {
        errors.push(ValidationError::new("timeouts.request_ms", "must be > 0"));
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            "must not exceed retries.max_delay_ms",
        ));
    }
    if config.pool.max_connections_per_endpoint == 0 {
        errors.push(ValidationError::new(
            "pool.max_connections_per_endpoint",
            "must be > 0",
        ));
    }
    if config.rate_limit.requests_per_second == 0 || config.rate_limit.burst_size == 0 {
        errors.push(ValidationError::new(
            "rate_limit",
            "requests_per_second and burst_size must be > 0",
        ));
    }

    let health = &config.health_check;
    if health.enabled {
        if health.interval_secs == 0 || health.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "health_check",
                "interval_secs and timeout_secs must be > 0",
            ));
        }
        if !health.path.starts_with('/') {
            errors.push(ValidationError::new("health_check.path", "must start with '/'"));
        }
    }
    if health.unhealthy_threshold == 0 || health.healthy_threshold == 0 {
        errors.push(ValidationError::new(
            "health_check",
            "thresholds must be >= 1",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "is not a socket address",
        ));
    }
    if config.admin.enabled {
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new("admin.bind_address", "is not a socket address"));
        }
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be empty"));
        }
    }

    let mut names = HashSet::new();
    for (i, route) in config.routes.iter().enumerate() {
        validate_route(i, route, config.timeouts.request_ms, &mut errors);
        if !names.insert(route.name.as_str()) {
            errors.push(ValidationError::new(
                format!("routes[{i}].name"),
                format!("duplicate name '{}'", route.name),
            ));
        }
    }
    for (i, aggregate) in config.aggregates.iter().enumerate() {
        let field = format!("aggregates[{i}]");
        if aggregate.name.is_empty() {
            errors.push(ValidationError::new(format!("{field}.name"), "must not be empty"));
        } else if !names.insert(aggregate.name.as_str()) {
            errors.push(ValidationError::new(
                format!("{field}.name"),
                format!("duplicate name '{}'", aggregate.name),
            ));
        }
        if aggregate.routes.is_empty() {
            errors.push(ValidationError::new(format!("{field}.routes"), "must not be empty"));
        }
        if aggregate.timeout_ms == Some(0) {
            errors.push(ValidationError::new(format!("{field}.timeout_ms"), "must be > 0"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_route(
    index: usize,
    route: &RouteConfig,
    default_timeout_ms: u64,
    errors: &mut Vec<ValidationError>,
) {
    let field = format!("routes[{index}]");

    if route.name.is_empty() {
        errors.push(ValidationError::new(format!("{field}.name"), "must not be empty"));
    }
    if route.downstream.scheme != "http" {
        errors.push(ValidationError::new(
            format!("{field}.downstream.scheme"),
            format!(
                "unsupported scheme '{}'; terminate TLS in front of the backend",
                route.downstream.scheme
            ),
        ));
    }
    if route.downstream.endpoints.is_empty() {
        errors.push(ValidationError::new(
            format!("{field}.downstream.endpoints"),
            "at least one endpoint is required",
        ));
    }
    for (j, endpoint) in route.downstream.endpoints.iter().enumerate() {
        if endpoint.host.is_empty() || endpoint.port == 0 {
            errors.push(ValidationError::new(
                format!("{field}.downstream.endpoints[{j}]"),
                "host must not be empty and port must be > 0",
            ));
        }
    }
    if let Some(path) = &route.downstream.health_path {
        if !path.starts_with('/') {
            errors.push(ValidationError::new(
                format!("{field}.downstream.health_path"),
                "must start with '/'",
            ));
        }
    }

    let timeout_ms = route.timeout_ms.unwrap_or(default_timeout_ms);
    if route.timeout_ms == Some(0) {
        errors.push(ValidationError::new(format!("{field}.timeout_ms"), "must be > 0"));
    }
    match route.attempt_timeout_ms {
        Some(0) => errors.push(ValidationError::new(
            format!("{field}.attempt_timeout_ms"),
            "must be > 0",
        )),
        Some(attempt) if attempt > timeout_ms => errors.push(ValidationError::new(
            format!("{field}.attempt_timeout_ms"),
            format!("{attempt}ms exceeds the route timeout of {timeout_ms}ms"),
        )),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{AggregateConfig, DownstreamConfig, EndpointConfig};

    fn route(name: &str) -> RouteConfig {
        RouteConfig {
            name: name.into(),
            upstream: "/a".into(),
            methods: vec![],
            downstream: DownstreamConfig {
                scheme: "http".into(),
                path: "/a".into(),
                endpoints: vec![EndpointConfig {
                    host: "localhost".into(),
                    port: 3000,
                }],
                health_path: None,
            },
            strategy: Default::default(),
            timeout_ms: None,
            attempt_timeout_ms: None,
            retries: None,
            middleware: vec![],
            headers: Default::default(),
            key: None,
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn rejects_duplicate_names_across_routes_and_aggregates() {
        let mut config = GatewayConfig::default();
        config.routes.push(route("a"));
        config.routes.push(route("a"));
        config.aggregates.push(AggregateConfig {
            name: "a".into(),
            upstream: "/agg".into(),
            methods: vec![],
            routes: vec!["a".into()],
            timeout_ms: None,
            middleware: vec![],
            headers: Default::default(),
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors.iter().filter(|e| e.message.contains("duplicate")).count(),
            2
        );
    }

    #[test]
    fn attempt_timeout_must_fit_in_route_timeout() {
        let mut config = GatewayConfig::default();
        let mut r = route("slow");
        r.timeout_ms = Some(100);
        r.attempt_timeout_ms = Some(500);
        config.routes.push(r);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "routes[0].attempt_timeout_ms");
    }

    #[test]
    fn rejects_https_downstream() {
        let mut config = GatewayConfig::default();
        let mut r = route("tls");
        r.downstream.scheme = "https".into();
        config.routes.push(r);

        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].message.contains("unsupported scheme"));
    }
}
