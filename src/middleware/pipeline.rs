//! Middleware composition.
//!
//! # Data Flow
//! ```text
//! request → error_mapping → stage[0] → stage[1] → … → terminal (dispatch)
//! response ←──────────────────────────────────────────┘
//! ```
//!
//! # Design Decisions
//! - Stages are a closed enum resolved once at table build; no per-request allocation
//!   beyond the boxed future each stage returns
//! - `Next` borrows the remaining stage slice, so composition is plain recursion
//! - `error_mapping` is always the outermost stage; listing it explicitly is allowed
//!   and has no extra effect

use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use futures_util::future::BoxFuture;

use crate::config::{ConfigError, HeaderRules, RateLimitConfig};
use crate::error::GatewayError;
use crate::http::response::error_response;
use crate::http::RequestContext;
use crate::middleware::{
    access_log, auth, error_mapping, forwarded, header_rewrite::HeaderRewrite, rate_limit::RateLimiter,
};

pub type StageResult = Result<Response<Body>, GatewayError>;

/// The innermost handler a pipeline wraps.
pub trait Terminal: Send + Sync {
    fn call(&self, request: Request<Body>) -> BoxFuture<'_, StageResult>;
}

impl<F, Fut> Terminal for F
where
    F: Fn(Request<Body>) -> Fut + Send + Sync,
    Fut: Future<Output = StageResult> + Send + 'static,
{
    fn call(&self, request: Request<Body>) -> BoxFuture<'_, StageResult> {
        Box::pin(self(request))
    }
}

/// The rest of the chain, handed to each stage.
pub struct Next<'a> {
    stages: &'a [Stage],
    terminal: &'a dyn Terminal,
}

impl<'a> Next<'a> {
    pub fn run(self, request: Request<Body>) -> BoxFuture<'a, StageResult> {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.process(
                request,
                Next {
                    stages: rest,
                    terminal: self.terminal,
                },
            ),
            None => self.terminal.call(request),
        }
    }
}

/// A named middleware stage.
#[derive(Debug)]
pub enum Stage {
    ErrorMapping,
    AccessLog,
    ForwardedHeaders,
    RequireAuth,
    RateLimit(Arc<RateLimiter>),
    HeaderRewrite(Arc<HeaderRewrite>),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::ErrorMapping => "error_mapping",
            Stage::AccessLog => "access_log",
            Stage::ForwardedHeaders => "forwarded_headers",
            Stage::RequireAuth => "require_auth",
            Stage::RateLimit(_) => "rate_limit",
            Stage::HeaderRewrite(_) => "header_rewrite",
        }
    }

    pub fn process<'a>(&'a self, request: Request<Body>, next: Next<'a>) -> BoxFuture<'a, StageResult> {
        match self {
            Stage::ErrorMapping => Box::pin(error_mapping::process(request, next)),
            Stage::AccessLog => Box::pin(access_log::process(request, next)),
            Stage::ForwardedHeaders => Box::pin(forwarded::process(request, next)),
            Stage::RequireAuth => Box::pin(auth::process(request, next)),
            Stage::RateLimit(limiter) => Box::pin(limiter.process(request, next)),
            Stage::HeaderRewrite(rules) => Box::pin(rules.process(request, next)),
        }
    }
}

/// An ordered, shareable middleware chain.
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Arc<[Stage]>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            stages: Arc::from(vec![Stage::ErrorMapping]),
        }
    }
}

impl Pipeline {
    /// Resolve stage names for `owner` (a route or aggregate name).
    pub fn build(
        owner: &str,
        names: &[String],
        headers: &HeaderRules,
        rate_limit: &RateLimitConfig,
    ) -> Result<Self, ConfigError> {
        let mut stages = vec![Stage::ErrorMapping];

        for name in names {
            let stage = match name.as_str() {
                "error_mapping" => continue,
                "access_log" => Stage::AccessLog,
                "forwarded_headers" => Stage::ForwardedHeaders,
                "require_auth" => Stage::RequireAuth,
                "rate_limit" => Stage::RateLimit(Arc::new(RateLimiter::new(rate_limit))),
                "header_rewrite" => Stage::HeaderRewrite(Arc::new(HeaderRewrite::compile(owner, headers)?)),
                other => {
                    return Err(ConfigError::UnknownStage {
                        route: owner.to_string(),
                        stage: other.to_string(),
                    })
                }
            };
            stages.push(stage);
        }

        Ok(Self {
            stages: Arc::from(stages),
        })
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(Stage::name).collect()
    }

    /// Run `request` through every stage and then `terminal`.
    pub async fn handle(&self, request: Request<Body>, terminal: &dyn Terminal) -> Response<Body> {
        let correlation_id = RequestContext::of(&request)
            .map(|ctx| ctx.correlation_id.clone())
            .unwrap_or_default();

        let next = Next {
            stages: &self.stages,
            terminal,
        };
        match next.run(request).await {
            Ok(response) => response,
            Err(err) => error_response(&err, &correlation_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn build(list: &[&str]) -> Result<Pipeline, ConfigError> {
        Pipeline::build("test", &names(list), &HeaderRules::default(), &RateLimitConfig::default())
    }

    #[test]
    fn error_mapping_is_always_outermost() {
        let pipeline = build(&["access_log", "error_mapping", "require_auth"]).unwrap();
        assert_eq!(pipeline.stage_names(), vec!["error_mapping", "access_log", "require_auth"]);
    }

    #[test]
    fn unknown_stage_fails_build() {
        let err = build(&["cors"]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownStage { stage, .. } if stage == "cors"));
    }

    #[tokio::test]
    async fn short_circuit_skips_terminal() {
        let pipeline = build(&["require_auth"]).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let terminal = move |_req: Request<Body>| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(Response::new(Body::empty())) }
        };

        let response = pipeline
            .handle(Request::builder().uri("/x").body(Body::empty()).unwrap(), &terminal)
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn terminal_errors_are_mapped() {
        let pipeline = Pipeline::default();
        let terminal = |_req: Request<Body>| async {
            Err(GatewayError::PoolExhausted {
                endpoint: "backend:8080".into(),
            })
        };

        let response = pipeline
            .handle(Request::builder().uri("/x").body(Body::empty()).unwrap(), &terminal)
            .await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
