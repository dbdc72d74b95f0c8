//! Per-client admission middleware.
//!
//! Every request is attributed to the IP address of its peer, checked
//! against that client's token bucket, and either passed through untouched
//! or answered with 429. A request without a peer address is answered with
//! 500.

use std::{
    future::Future,
    net::SocketAddr,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{body::Body, extract::ConnectInfo};
use gatekeeper_admin::GatekeeperMetrics;
use gatekeeper_common::{GatekeeperError, GatekeeperResult};
use gatekeeper_rate_limit::RateLimiter;
use http::{Request, Response};
use tower::Layer;

use crate::response;

#[derive(Clone)]
pub struct AdmissionLayer {
    limiter: RateLimiter,
    metrics: Arc<GatekeeperMetrics>,
}

impl AdmissionLayer {
    pub fn new(limiter: RateLimiter, metrics: Arc<GatekeeperMetrics>) -> Self {
        Self { limiter, metrics }
    }
}

impl<Service> Layer<Service> for AdmissionLayer {
    type Service = AdmissionService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        AdmissionService {
            next,
            limiter: self.limiter.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AdmissionService<Service> {
    next: Service,
    limiter: RateLimiter,
    metrics: Arc<GatekeeperMetrics>,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for AdmissionService<Service>
where
    Service: tower::Service<Request<ReqBody>, Response = Response<Body>> + Send + Clone + 'static,
    Service::Future: Send,
    ReqBody: Send + 'static,
{
    type Response = Response<Body>;
    type Error = Service::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Body>, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.next.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        self.metrics.requests_total.inc();

        let identity = match client_identity(&req) {
            Ok(identity) => identity,
            Err(err) => {
                tracing::error!(error = %err, uri = %req.uri(), "rejecting request");
                self.metrics.identity_errors.inc();
                return Box::pin(async { Ok::<_, Service::Error>(response::identity_unavailable()) });
            }
        };

        tracing::debug!(client_ip = %identity, "checking client rate");

        // Decided here rather than in the returned future, so an unpolled
        // response still consumes the token.
        if !self.limiter.check(&identity) {
            tracing::debug!(client_ip = %identity, "request rate limited");
            self.metrics.requests_rate_limited.inc();
            return Box::pin(async { Ok::<_, Service::Error>(response::rate_limited()) });
        }

        self.metrics.requests_admitted.inc();

        // Call the instance that was driven to readiness and leave a fresh
        // clone behind for the next request.
        let clone = self.next.clone();
        let mut next = std::mem::replace(&mut self.next, clone);
        Box::pin(async move { next.call(req).await })
    }
}

/// Client identity for rate limiting: the peer's IP address, without port.
///
/// IPv4-mapped IPv6 addresses are reported in their IPv4 form so a client is
/// keyed the same on dual-stack listeners.
pub fn client_identity<B>(req: &Request<B>) -> GatekeeperResult<String> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_canonical().to_string())
        .ok_or_else(|| {
            GatekeeperError::IdentityExtraction("request carries no peer address".into())
        })
}
