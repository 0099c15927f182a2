//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Matched route + buffered request
//!     → dispatcher.rs (endpoint selection, retry loop, deadline)
//!     → pool.rs (scoped per-endpoint slot)
//!     → transport.rs (hyper client)
//!     → Response (buffered) or DownstreamError
//! ```

pub mod dispatcher;
pub mod pool;
pub mod transport;

pub use dispatcher::{Dispatcher, ForwardRequest};
pub use pool::{ConnectionPool, PoolStats, PooledConnection};
pub use transport::{HyperTransport, Transport, TransportError};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{HeaderMap, Request, Response};
    use futures_util::future::BoxFuture;

    use super::{ConnectionPool, Dispatcher, Transport, TransportError};
    use crate::health::PassiveHealth;
    use crate::resilience::RetryPolicy;

    pub enum MockReply {
        Status(u16, &'static str),
        Delayed(Duration, u16, &'static str),
        ConnectError,
        Hang,
    }

    type Responder = Box<dyn Fn(&Request<Body>) -> MockReply + Send + Sync>;

    /// In-process downstream that records what it receives.
    pub struct MockTransport {
        calls: AtomicUsize,
        uris: Mutex<Vec<String>>,
        last_headers: Mutex<HeaderMap>,
        respond: Responder,
    }

    impl MockTransport {
        pub fn new(respond: impl Fn(&Request<Body>) -> MockReply + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                uris: Mutex::new(Vec::new()),
                last_headers: Mutex::new(HeaderMap::new()),
                respond: Box::new(respond),
            })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn uris(&self) -> Vec<String> {
            self.uris.lock().unwrap().clone()
        }

        pub fn last_headers(&self) -> HeaderMap {
            self.last_headers.lock().unwrap().clone()
        }
    }

    impl Transport for MockTransport {
        fn send(&self, request: Request<Body>) -> BoxFuture<'static, Result<Response<Body>, TransportError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.uris.lock().unwrap().push(request.uri().to_string());
            *self.last_headers.lock().unwrap() = request.headers().clone();

            let reply = (self.respond)(&request);
            let respond = |status: u16, body: &'static str| {
                Ok(Response::builder().status(status).body(Body::from(body)).unwrap())
            };
            Box::pin(async move {
                match reply {
                    MockReply::Status(status, body) => respond(status, body),
                    MockReply::Delayed(delay, status, body) => {
                        tokio::time::sleep(delay).await;
                        respond(status, body)
                    }
                    MockReply::ConnectError => Err(TransportError::Connect("connection refused".into())),
                    MockReply::Hang => std::future::pending().await,
                }
            })
        }
    }

    pub fn dispatcher(transport: Arc<MockTransport>) -> Dispatcher {
        Dispatcher::new(
            ConnectionPool::new(transport, Duration::from_secs(1)),
            RetryPolicy::new(&Default::default()),
            PassiveHealth::new(3),
            64 * 1024,
        )
    }
}
