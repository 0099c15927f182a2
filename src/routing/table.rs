//! Compiled route table.
//!
//! # Responsibilities
//! - Compile route and aggregate config into immutable `Route`s
//! - Reject anything malformed before a table becomes visible
//! - Share one `Endpoint` per host:port across routes
//! - Carry endpoint state (health, slots) across rebuilds
//!
//! # Design Decisions
//! - Routes keep declaration order; aggregates follow plain routes
//! - Two routes conflict when their templates have the same shape and their method
//!   sets overlap (an empty set overlaps everything)
//! - Any error fails the whole build; callers keep the previous table

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;

use crate::config::{AggregateConfig, ConfigError, GatewayConfig, RouteConfig};
use crate::load_balancer::{Endpoint, TargetSet};
use crate::middleware::Pipeline;
use crate::routing::matcher::{Matcher, RouteMatch};
use crate::routing::template::PathTemplate;

/// Reserved key for branch diagnostics in aggregate responses.
pub const DIAGNOSTICS_KEY: &str = "_diagnostics";

const KNOWN_METHODS: [Method; 9] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
    Method::OPTIONS,
    Method::TRACE,
    Method::CONNECT,
];

/// Timeout and retry settings resolved for one route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutePolicy {
    /// Hard deadline for the whole request.
    pub timeout: Duration,
    /// Deadline for a single attempt.
    pub attempt_timeout: Duration,
    /// Retries after the first attempt.
    pub retries: u32,
}

/// Where a proxy route forwards to.
#[derive(Debug)]
pub struct Downstream {
    pub scheme: String,
    pub path: PathTemplate,
    pub targets: TargetSet,
}

/// Branches of a fan-out route.
#[derive(Debug)]
pub struct AggregatePlan {
    pub branches: Vec<Arc<Route>>,
}

#[derive(Debug)]
pub enum RouteKind {
    Proxy(Downstream),
    Aggregate(AggregatePlan),
}

/// A compiled, immutable route.
#[derive(Debug)]
pub struct Route {
    pub name: String,
    /// Slot name in aggregate responses.
    pub key: String,
    /// Allowed methods; empty means any.
    pub methods: Vec<Method>,
    pub upstream: PathTemplate,
    pub kind: RouteKind,
    pub policy: RoutePolicy,
    pub pipeline: Pipeline,
}

impl Route {
    pub fn allows(&self, method: &Method) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }

    pub fn downstream(&self) -> Option<&Downstream> {
        match &self.kind {
            RouteKind::Proxy(downstream) => Some(downstream),
            RouteKind::Aggregate(_) => None,
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self.kind, RouteKind::Aggregate(_))
    }
}

/// The immutable set of routes served at one point in time.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
    matcher: Matcher,
    endpoints: Vec<Arc<Endpoint>>,
}

impl RouteTable {
    /// Compile a fresh table.
    pub fn build(config: &GatewayConfig) -> Result<Self, ConfigError> {
        Self::compile(config, &[])
    }

    /// Compile a replacement for `previous`, reusing its endpoints where the
    /// settings are unchanged.
    pub fn rebuild(config: &GatewayConfig, previous: &RouteTable) -> Result<Self, ConfigError> {
        Self::compile(config, &previous.endpoints)
    }

    fn compile(config: &GatewayConfig, previous: &[Arc<Endpoint>]) -> Result<Self, ConfigError> {
        let mut registry = EndpointRegistry {
            previous,
            max_connections: config.pool.max_connections_per_endpoint,
            current: Vec::new(),
        };

        let mut routes = Vec::with_capacity(config.routes.len() + config.aggregates.len());
        for route in &config.routes {
            routes.push(Arc::new(compile_route(route, config, &mut registry)?));
        }

        let mut aggregates = Vec::with_capacity(config.aggregates.len());
        for aggregate in &config.aggregates {
            aggregates.push(Arc::new(compile_aggregate(aggregate, config, &routes)?));
        }
        routes.extend(aggregates);

        check_conflicts(&routes)?;

        let matcher = Matcher::new(&routes);
        Ok(Self {
            routes,
            matcher,
            endpoints: registry.current,
        })
    }

    /// Find the best route for a request.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        self.matcher.find(&self.routes, method, path)
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    pub fn route(&self, name: &str) -> Option<&Arc<Route>> {
        self.routes.iter().find(|r| r.name == name)
    }

    /// Every distinct endpoint referenced by the table.
    pub fn endpoints(&self) -> &[Arc<Endpoint>] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

struct EndpointRegistry<'a> {
    previous: &'a [Arc<Endpoint>],
    max_connections: usize,
    current: Vec<Arc<Endpoint>>,
}

impl EndpointRegistry<'_> {
    /// One endpoint per host:port; every route naming it must agree on the probe path.
    fn get(&mut self, route: &str, host: &str, port: u16, probe_path: &str) -> Result<Arc<Endpoint>, ConfigError> {
        if let Some(existing) = self.current.iter().find(|e| e.host() == host && e.port() == port) {
            if existing.probe_path() != probe_path {
                return Err(ConfigError::ConflictingProbePath {
                    route: route.to_string(),
                    endpoint: existing.authority().to_string(),
                    probe_path: probe_path.to_string(),
                    existing: existing.probe_path().to_string(),
                });
            }
            return Ok(existing.clone());
        }

        let endpoint = self
            .previous
            .iter()
            .find(|e| e.same_settings(host, port, self.max_connections, probe_path))
            .cloned()
            .unwrap_or_else(|| Arc::new(Endpoint::new(host, port, self.max_connections, probe_path)));

        self.current.push(endpoint.clone());
        Ok(endpoint)
    }
}

fn parse_template(owner: &str, raw: &str) -> Result<PathTemplate, ConfigError> {
    PathTemplate::parse(raw).map_err(|source| ConfigError::InvalidTemplate {
        route: owner.to_string(),
        template: raw.to_string(),
        source,
    })
}

fn parse_methods(owner: &str, raw: &[String]) -> Result<Vec<Method>, ConfigError> {
    let mut methods: Vec<Method> = Vec::with_capacity(raw.len());
    for name in raw {
        let upper = name.to_ascii_uppercase();
        let method = KNOWN_METHODS
            .iter()
            .find(|m| m.as_str() == upper)
            .cloned()
            .ok_or_else(|| ConfigError::InvalidMethod {
                route: owner.to_string(),
                method: name.clone(),
            })?;
        if !methods.contains(&method) {
            methods.push(method);
        }
    }
    Ok(methods)
}

fn compile_route(
    config: &RouteConfig,
    global: &GatewayConfig,
    registry: &mut EndpointRegistry<'_>,
) -> Result<Route, ConfigError> {
    let upstream = parse_template(&config.name, &config.upstream)?;
    let downstream_path = parse_template(&config.name, &config.downstream.path)?;

    let captured: HashSet<&str> = upstream.param_names().collect();
    if let Some(param) = downstream_path.param_names().find(|p| !captured.contains(p)) {
        return Err(ConfigError::UnknownParameter {
            route: config.name.clone(),
            param: param.to_string(),
        });
    }

    let probe_path = config
        .downstream
        .health_path
        .as_deref()
        .unwrap_or(&global.health_check.path);
    let endpoints = config
        .downstream
        .endpoints
        .iter()
        .map(|e| registry.get(&config.name, &e.host, e.port, probe_path))
        .collect::<Result<Vec<_>, _>>()?;

    let timeout = Duration::from_millis(config.timeout_ms.unwrap_or(global.timeouts.request_ms));
    let attempt_timeout = config
        .attempt_timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(timeout)
        .min(timeout);

    Ok(Route {
        name: config.name.clone(),
        key: config.key.clone().unwrap_or_else(|| config.name.clone()),
        methods: parse_methods(&config.name, &config.methods)?,
        upstream,
        kind: RouteKind::Proxy(Downstream {
            scheme: config.downstream.scheme.clone(),
            path: downstream_path,
            targets: TargetSet::new(endpoints, config.strategy),
        }),
        policy: RoutePolicy {
            timeout,
            attempt_timeout,
            retries: config.retries.unwrap_or(global.retries.max_retries),
        },
        pipeline: Pipeline::build(&config.name, &config.middleware, &config.headers, &global.rate_limit)?,
    })
}

fn compile_aggregate(
    config: &AggregateConfig,
    global: &GatewayConfig,
    routes: &[Arc<Route>],
) -> Result<Route, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidAggregate {
        aggregate: config.name.clone(),
        reason,
    };

    let upstream = parse_template(&config.name, &config.upstream)?;
    let captured: HashSet<&str> = upstream.param_names().collect();

    let mut keys = HashSet::new();
    let mut branches = Vec::with_capacity(config.routes.len());
    for name in &config.routes {
        let branch = routes
            .iter()
            .find(|r| &r.name == name)
            .ok_or_else(|| invalid(format!("unknown route '{name}'")))?;

        let Some(downstream) = branch.downstream() else {
            return Err(invalid(format!("route '{name}' is itself an aggregate")));
        };
        if let Some(param) = downstream.path.param_names().find(|p| !captured.contains(p)) {
            return Err(invalid(format!("route '{name}' needs parameter '{param}' which is not captured")));
        }
        if branch.key == DIAGNOSTICS_KEY {
            return Err(invalid(format!("key '{DIAGNOSTICS_KEY}' is reserved")));
        }
        if !keys.insert(branch.key.as_str()) {
            return Err(invalid(format!("duplicate key '{}'", branch.key)));
        }
        branches.push(branch.clone());
    }
    if branches.is_empty() {
        return Err(invalid("no branch routes".to_string()));
    }

    let timeout = Duration::from_millis(config.timeout_ms.unwrap_or(global.timeouts.request_ms));

    Ok(Route {
        name: config.name.clone(),
        key: config.name.clone(),
        methods: parse_methods(&config.name, &config.methods)?,
        upstream,
        kind: RouteKind::Aggregate(AggregatePlan { branches }),
        policy: RoutePolicy {
            timeout,
            attempt_timeout: timeout,
            retries: 0,
        },
        pipeline: Pipeline::build(&config.name, &config.middleware, &config.headers, &global.rate_limit)?,
    })
}

fn check_conflicts(routes: &[Arc<Route>]) -> Result<(), ConfigError> {
    let mut by_shape: HashMap<String, Vec<&Route>> = HashMap::new();

    for route in routes {
        let bucket = by_shape.entry(route.upstream.shape()).or_default();
        for other in bucket.iter() {
            if let Some(method) = overlapping_method(other, route) {
                return Err(ConfigError::DuplicateRoute {
                    method,
                    template: route.upstream.to_string(),
                    first: other.name.clone(),
                    second: route.name.clone(),
                });
            }
        }
        bucket.push(route);
    }
    Ok(())
}

fn overlapping_method(a: &Route, b: &Route) -> Option<String> {
    match (a.methods.first(), b.methods.first()) {
        (None, None) => Some("*".to_string()),
        (None, Some(m)) | (Some(m), None) => Some(m.to_string()),
        _ => a
            .methods
            .iter()
            .find(|m| b.methods.contains(m))
            .map(ToString::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_config, EndpointConfig};
    use crate::routing::test_support::{config_with, route_config};

    #[test]
    fn duplicate_method_and_template_rejected() {
        let config = config_with(vec![
            route_config("a", &["GET"], "/users/{id}", "/u/{id}"),
            route_config("b", &["get", "POST"], "/users/{uid}", "/u/{uid}"),
        ]);
        match RouteTable::build(&config).unwrap_err() {
            ConfigError::DuplicateRoute { method, first, second, .. } => {
                assert_eq!(method, "GET");
                assert_eq!((first.as_str(), second.as_str()), ("a", "b"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn same_template_different_methods_is_fine() {
        let config = config_with(vec![
            route_config("read", &["GET"], "/bill", "/bill"),
            route_config("pay", &["POST"], "/bill", "/bill/pay"),
        ]);
        assert_eq!(RouteTable::build(&config).unwrap().len(), 2);
    }

    #[test]
    fn shared_endpoint_needs_one_probe_path() {
        let mut first = route_config("bill", &["GET"], "/bill", "/bill");
        first.downstream.health_path = Some("/ping".to_string());
        let mut second = route_config("detail", &["GET"], "/detail", "/detail");
        second.downstream.health_path = Some("/status".to_string());

        match RouteTable::build(&config_with(vec![first.clone(), second])).unwrap_err() {
            ConfigError::ConflictingProbePath { route, endpoint, existing, .. } => {
                assert_eq!(route, "detail");
                assert_eq!(endpoint, "backend:8080");
                assert_eq!(existing, "/ping");
            }
            other => panic!("unexpected error: {other}"),
        }

        let mut agreeing = route_config("detail", &["GET"], "/detail", "/detail");
        agreeing.downstream.health_path = Some("/ping".to_string());
        let table = RouteTable::build(&config_with(vec![first, agreeing])).unwrap();
        assert_eq!(table.endpoints().len(), 1);
        assert_eq!(table.endpoints()[0].probe_path(), "/ping");
    }

    #[test]
    fn any_method_conflicts_with_specific() {
        let config = config_with(vec![
            route_config("read", &["GET"], "/bill", "/bill"),
            route_config("all", &[], "/bill", "/bill"),
        ]);
        assert!(matches!(
            RouteTable::build(&config),
            Err(ConfigError::DuplicateRoute { .. })
        ));
    }

    #[test]
    fn malformed_templates_and_methods_rejected() {
        let config = config_with(vec![route_config("bad", &["GET"], "/users/{id", "/u")]);
        assert!(matches!(
            RouteTable::build(&config),
            Err(ConfigError::InvalidTemplate { .. })
        ));

        let config = config_with(vec![route_config("bad", &["FETCH"], "/users", "/u")]);
        assert!(matches!(RouteTable::build(&config), Err(ConfigError::InvalidMethod { .. })));

        let config = config_with(vec![route_config("bad", &["GET"], "/users/{id}", "/u/{uid}")]);
        assert!(matches!(
            RouteTable::build(&config),
            Err(ConfigError::UnknownParameter { param, .. }) if param == "uid"
        ));
    }

    #[test]
    fn endpoints_shared_and_preserved_across_rebuild() {
        let mut second = route_config("two", &["GET"], "/two", "/two");
        second.downstream.endpoints.push(EndpointConfig {
            host: "other".into(),
            port: 9000,
        });
        let config = config_with(vec![route_config("one", &["GET"], "/one", "/one"), second]);

        let table = RouteTable::build(&config).unwrap();
        assert_eq!(table.endpoints().len(), 2);

        let one = table.route("one").unwrap().downstream().unwrap().targets.endpoints()[0].clone();
        let two = table.route("two").unwrap().downstream().unwrap().targets.endpoints()[0].clone();
        assert!(Arc::ptr_eq(&one, &two));

        one.health().record_failure(1);
        let rebuilt = RouteTable::rebuild(&config, &table).unwrap();
        assert!(Arc::ptr_eq(&rebuilt.endpoints()[0], &one));
        assert!(!rebuilt.endpoints()[0].is_healthy());
    }

    #[test]
    fn policy_falls_back_to_global_defaults() {
        let mut route = route_config("r", &["GET"], "/r", "/r");
        route.attempt_timeout_ms = Some(60_000);
        let mut config = config_with(vec![route]);
        config.timeouts.request_ms = 5_000;
        config.retries.max_retries = 4;

        let table = RouteTable::build(&config).unwrap();
        let policy = table.route("r").unwrap().policy;
        assert_eq!(policy.timeout, Duration::from_secs(5));
        assert_eq!(policy.attempt_timeout, Duration::from_secs(5));
        assert_eq!(policy.retries, 4);
    }

    #[test]
    fn aggregate_validation() {
        let base = r#"
            [[routes]]
            name = "bill"
            upstream = "/QueryBill/query/{account}"
            [routes.downstream]
            path = "/bill/{account}"
            endpoints = [{ host = "billing", port = 8080 }]

            [[routes]]
            name = "detail"
            upstream = "/QueryBillDetailed/query-detailed"
            key = "_diagnostics"
            [routes.downstream]
            path = "/detail"
            endpoints = [{ host = "billing", port = 8080 }]
        "#;

        let missing_param = format!(
            "{base}\n[[aggregates]]\nname = \"overview\"\nupstream = \"/overview\"\nroutes = [\"bill\"]\n"
        );
        let err = RouteTable::build(&parse_config(&missing_param).unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAggregate { .. }), "{err}");

        let reserved = format!(
            "{base}\n[[aggregates]]\nname = \"overview\"\nupstream = \"/overview\"\nroutes = [\"detail\"]\n"
        );
        let err = RouteTable::build(&parse_config(&reserved).unwrap()).unwrap_err();
        assert!(err.to_string().contains("reserved"), "{err}");

        let unknown = format!(
            "{base}\n[[aggregates]]\nname = \"overview\"\nupstream = \"/overview/{{account}}\"\nroutes = [\"bill\", \"nope\"]\n"
        );
        let err = RouteTable::build(&parse_config(&unknown).unwrap()).unwrap_err();
        assert!(err.to_string().contains("unknown route 'nope'"), "{err}");

        let ok = format!(
            "{base}\n[[aggregates]]\nname = \"overview\"\nupstream = \"/overview/{{account}}\"\nroutes = [\"bill\"]\n"
        );
        let table = RouteTable::build(&parse_config(&ok).unwrap()).unwrap();
        assert!(table.route("overview").unwrap().is_aggregate());
    }
}
