//! Search-form reset.
//!
//! The portal keeps the last search's filters in server-side session state
//! and silently applies them to the next search. Every query-bearing call is
//! therefore paired with a reset, and the pair runs under a session-wide lock
//! so no other query can slip in between.

use crate::loris::client::{Params, Transport};
use crate::loris::errors::LorisApiError;
use crate::loris::retry::RetryPolicy;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, trace, warn};
use url::Url;

/// What to do when a reset fails for a reason other than a connection reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetMode {
    /// Skip the paired query: its results could be filtered by stale state.
    #[default]
    Strict,
    /// Log and run the query anyway.
    Lenient,
}

pub struct ResetProtocol {
    transport: Arc<dyn Transport>,
    url: Url,
    retry: RetryPolicy,
    mode: ResetMode,
    /// Held across each reset+query pair.
    query_lock: Mutex<()>,
}

impl ResetProtocol {
    pub fn new(
        transport: Arc<dyn Transport>,
        url: Url,
        retry: RetryPolicy,
        mode: ResetMode,
    ) -> Self {
        Self {
            transport,
            url,
            retry,
            mode,
            query_lock: Mutex::new(()),
        }
    }

    fn body() -> Vec<(&'static str, String)> {
        vec![
            ("resetCourses", "false".to_string()),
            ("resetSections", "true".to_string()),
        ]
    }

    /// Clear the server-side search form, retrying connection resets.
    ///
    /// In [`ResetMode::Lenient`] a non-transient failure is logged and
    /// swallowed; an invalid session always propagates.
    pub async fn reset(&self) -> Result<(), LorisApiError> {
        let body = Self::body();
        let body: &Params = &body;
        let this = self;

        let result = self
            .retry
            .run("reset", move || async move {
                let response = this.transport.post_form(&this.url, body).await?;
                response.error_for_status()
            })
            .await;

        match result {
            Ok(()) => {
                trace!("search form reset");
                Ok(())
            }
            Err(e) if e.is_session_fatal() => Err(e),
            Err(e) => match self.mode {
                ResetMode::Strict => {
                    error!(error = %e, "Reset failed, skipping paired query");
                    Err(LorisApiError::ResetFailed(format!("{e:#}")))
                }
                ResetMode::Lenient => {
                    warn!(error = %e, "Reset failed, continuing with unknown form state");
                    Ok(())
                }
            },
        }
    }

    /// Run `query` immediately after a reset, as one retryable unit.
    ///
    /// A connection reset anywhere in the unit re-runs both the reset and the
    /// query. The session lock is released between attempts.
    pub async fn with_reset<T, F, Fut>(&self, operation: &str, query: F) -> Result<T, LorisApiError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, LorisApiError>>,
    {
        let query = &query;
        let this = self;
        self.retry
            .run(operation, move || async move {
                let _guard = this.query_lock.lock().await;
                this.reset().await?;
                query().await
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loris::client::{RawResponse, TransportError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Answers every reset with a fixed status, optionally dropping the
    /// connection for the first few calls.
    struct FixedReset {
        status: u16,
        resets_before_success: u32,
        calls: AtomicU32,
    }

    impl FixedReset {
        fn new(status: u16, resets_before_success: u32) -> Arc<Self> {
            Arc::new(Self {
                status,
                resets_before_success,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl Transport for FixedReset {
        async fn post_form(&self, url: &Url, form: &Params) -> Result<RawResponse, TransportError> {
            assert_eq!(url.path(), "/ssb/courseSearch/resetDataForm");
            assert_eq!(
                form,
                &[
                    ("resetCourses", "false".to_string()),
                    ("resetSections", "true".to_string())
                ]
            );
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.resets_before_success {
                return Err(TransportError::ConnectionReset(anyhow::anyhow!("ECONNRESET")));
            }
            Ok(RawResponse {
                status: self.status,
                url: url.to_string(),
                body: String::new(),
            })
        }

        async fn get_query(
            &self,
            _url: &Url,
            _query: &Params,
        ) -> Result<RawResponse, TransportError> {
            unreachable!("reset never issues GET requests")
        }
    }

    fn protocol(transport: Arc<FixedReset>, mode: ResetMode) -> ResetProtocol {
        ResetProtocol::new(
            transport,
            Url::parse("http://portal.test/ssb/courseSearch/resetDataForm").unwrap(),
            RetryPolicy::new(2, Duration::ZERO, Duration::ZERO),
            mode,
        )
    }

    #[tokio::test]
    async fn test_reset_retries_connection_resets() {
        let transport = FixedReset::new(200, 2);
        protocol(transport.clone(), ResetMode::Strict)
            .reset()
            .await
            .unwrap();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_strict_reset_failure_is_an_error() {
        let transport = FixedReset::new(500, 0);
        let result = protocol(transport.clone(), ResetMode::Strict).reset().await;
        assert!(matches!(result, Err(LorisApiError::ResetFailed(_))));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lenient_reset_failure_is_swallowed() {
        let transport = FixedReset::new(500, 0);
        protocol(transport, ResetMode::Lenient).reset().await.unwrap();
    }

    #[tokio::test]
    async fn test_unauthorized_reset_always_propagates() {
        let transport = FixedReset::new(401, 0);
        let result = protocol(transport, ResetMode::Lenient).reset().await;
        assert!(matches!(result, Err(LorisApiError::InvalidSession(_))));
    }

    #[tokio::test]
    async fn test_with_reset_reruns_reset_on_query_connection_reset() {
        let transport = FixedReset::new(200, 0);
        let protocol = protocol(transport.clone(), ResetMode::Strict);
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;

        let value = protocol
            .with_reset("probe", move || async move {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(TransportError::ConnectionReset(anyhow::anyhow!("ECONNRESET")).into())
                } else {
                    Ok("page")
                }
            })
            .await
            .unwrap();

        assert_eq!(value, "page");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }
}
