//! HTTP middleware for the LORIS client.

use crate::utils::fmt_duration;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next};
use std::num::NonZeroU32;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

const SLOW_REQUEST_THRESHOLD: Duration = Duration::from_secs(1);

/// Logs every request with its outcome and timing; never alters it.
pub struct TransparentMiddleware;

#[async_trait::async_trait]
impl Middleware for TransparentMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let method = req.method().to_string();
        let path = req.url().path().to_string();
        trace!(method, path, "sending request");

        let start = Instant::now();
        let result = next.run(req, extensions).await;
        let elapsed = start.elapsed();

        if elapsed > SLOW_REQUEST_THRESHOLD {
            warn!(method, path, duration = fmt_duration(elapsed), "slow request");
        }

        match &result {
            Ok(response) if !response.status().is_success() => {
                debug!(
                    method,
                    path,
                    status = response.status().as_u16(),
                    duration = fmt_duration(elapsed),
                    "request returned non-success status"
                );
            }
            Ok(response) => {
                trace!(
                    method,
                    path,
                    status = response.status().as_u16(),
                    duration = fmt_duration(elapsed),
                    "request completed"
                );
            }
            Err(e) => {
                debug!(
                    method,
                    path,
                    duration = fmt_duration(elapsed),
                    error = %e,
                    "request failed"
                );
            }
        }

        result
    }
}

/// Throttles outbound requests so a crawl doesn't hammer the shared portal.
pub struct RateLimitMiddleware {
    limiter: DefaultDirectRateLimiter,
}

impl RateLimitMiddleware {
    pub fn new(requests_per_second: NonZeroU32, burst: NonZeroU32) -> Self {
        let quota = Quota::per_second(requests_per_second).allow_burst(burst);
        Self {
            limiter: RateLimiter::direct(quota),
        }
    }
}

#[async_trait::async_trait]
impl Middleware for RateLimitMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        self.limiter.until_ready().await;
        next.run(req, extensions).await
    }
}
