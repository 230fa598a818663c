//! Session-bound HTTP client for the LORIS portal.

use crate::config::RateLimitingConfig;
use crate::loris::errors::LorisApiError;
use crate::loris::json::{looks_like_html, parse_json_with_context};
use crate::loris::middleware::{RateLimitMiddleware, TransparentMiddleware};
use crate::loris::session::Session;
use anyhow::Context;
use async_trait::async_trait;
use http::header::{ACCEPT, COOKIE, HeaderMap, HeaderValue};
use reqwest::Response;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde::de::DeserializeOwned;
use std::error::Error as StdError;
use std::io;
use std::time::Duration;
use url::Url;

/// Messages hyper and rustls produce when the peer drops the connection
/// mid-request without a usable `io::Error` in the source chain.
const CONNECTION_CLOSED_MESSAGES: &[&str] = &[
    "connection reset",
    "connection closed before message completed",
    "peer closed connection",
];

/// A form body or query string as ordered key/value pairs.
pub type Params = [(&'static str, String)];

/// A fully-read upstream response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub url: String,
    pub body: String,
}

impl RawResponse {
    async fn read(response: Response) -> Result<Self, TransportError> {
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response.text().await.map_err(TransportError::from_error)?;
        Ok(Self { status, url, body })
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Map rejected sessions and non-success statuses to errors.
    pub fn error_for_status(&self) -> Result<(), LorisApiError> {
        if matches!(self.status, 401 | 403) {
            return Err(LorisApiError::InvalidSession(format!(
                "{} returned status {}",
                self.url, self.status
            )));
        }
        if !self.is_success() {
            return Err(LorisApiError::RequestFailed(anyhow::anyhow!(
                "{} returned status {}",
                self.url,
                self.status
            )));
        }
        Ok(())
    }

    /// Decode a JSON endpoint's body.
    ///
    /// The portal serves its login page with a 200 once the session is gone,
    /// so an HTML body counts as an invalid session rather than a parse error.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, LorisApiError> {
        self.error_for_status()?;
        if looks_like_html(&self.body) {
            return Err(LorisApiError::InvalidSession(format!(
                "{} answered with an HTML page",
                self.url
            )));
        }
        parse_json_with_context(&self.body).map_err(|source| LorisApiError::ParseFailed {
            status: self.status,
            url: self.url.clone(),
            source,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer closed the connection mid-request.
    #[error("connection reset by peer")]
    ConnectionReset(#[source] anyhow::Error),
    #[error("transport failure")]
    Other(#[source] anyhow::Error),
}

impl TransportError {
    /// Classify any transport-level error by inspecting its source chain.
    pub fn from_error<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        if is_connection_reset(&err) {
            Self::ConnectionReset(anyhow::Error::new(err))
        } else {
            Self::Other(anyhow::Error::new(err))
        }
    }
}

fn is_connection_reset(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>()
            && matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            )
        {
            return true;
        }
        let msg = e.to_string().to_ascii_lowercase();
        if CONNECTION_CLOSED_MESSAGES.iter().any(|m| msg.contains(m)) {
            return true;
        }
        current = e.source();
    }
    false
}

/// The seam between the crawler and the network.
///
/// [`SessionClient`] is the production implementation; tests drive the
/// crawler against scripted upstreams through the same trait.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_form(&self, url: &Url, form: &Params) -> Result<RawResponse, TransportError>;

    async fn get_query(&self, url: &Url, query: &Params) -> Result<RawResponse, TransportError>;
}

/// HTTP client bound to one session's cookies for the life of a crawl.
///
/// Every request carries the session `Cookie` header. Errors are returned
/// unchanged; retrying is the caller's business.
pub struct SessionClient {
    http: ClientWithMiddleware,
}

impl SessionClient {
    pub fn new_with_config(
        session: Session,
        rate_limiting: &RateLimitingConfig,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let mut cookie = HeaderValue::from_str(session.cookie_header())
            .context("session cookies are not a valid header value")?;
        cookie.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, cookie);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("loris/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()
            .context("failed to build HTTP client")?;

        let http = ClientBuilder::new(client)
            .with(TransparentMiddleware)
            .with(RateLimitMiddleware::new(
                rate_limiting.requests_per_second,
                rate_limiting.burst,
            ))
            .build();

        Ok(Self { http })
    }

    pub async fn post(
        &self,
        url: &Url,
        form: &Params,
        headers: HeaderMap,
    ) -> reqwest_middleware::Result<Response> {
        self.http
            .post(url.clone())
            .headers(headers)
            .form(form)
            .send()
            .await
    }

    pub async fn get(&self, url: &Url, query: &Params) -> reqwest_middleware::Result<Response> {
        self.http
            .get(url.clone())
            .headers(ajax_headers())
            .query(query)
            .send()
            .await
    }
}

/// Headers the portal's own search page sends with its XHR calls.
fn ajax_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
    );
    headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
    headers
}

#[async_trait]
impl Transport for SessionClient {
    async fn post_form(&self, url: &Url, form: &Params) -> Result<RawResponse, TransportError> {
        let response = self
            .post(url, form, ajax_headers())
            .await
            .map_err(TransportError::from_error)?;
        RawResponse::read(response).await
    }

    async fn get_query(&self, url: &Url, query: &Params) -> Result<RawResponse, TransportError> {
        let response = self
            .get(url, query)
            .await
            .map_err(TransportError::from_error)?;
        RawResponse::read(response).await
    }
}
