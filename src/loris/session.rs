//! Authenticated portal sessions.
//!
//! LORIS has no public API: a session is established by walking the
//! registration UI in a browser, after which the resulting cookies are reused
//! for every JSON call of the crawl. How those cookies are obtained is the
//! business of a [`SessionProvider`]; this module only models the result.

use async_trait::async_trait;
use custom_debug_derive::Debug;
use std::fmt;

/// Number of cookies the portal hands out for an authenticated search session.
pub const SESSION_COOKIE_COUNT: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("expected {expected} session cookies, got {0}", expected = SESSION_COOKIE_COUNT)]
    WrongCookieCount(usize),
    #[error("malformed cookie: {0}")]
    Malformed(String),
    #[error("no session cookies configured")]
    NotConfigured,
    #[error("failed to acquire session")]
    Acquire(#[source] anyhow::Error),
}

/// One name/value cookie pair.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
}

impl fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=<{} bytes>", self.name, self.value.len())
    }
}

/// The cookie bundle of one authenticated crawl pass.
///
/// Order is preserved as supplied; the `Cookie` header is built once.
#[derive(Debug, Clone)]
pub struct Session {
    cookies: Vec<SessionCookie>,
    #[debug(skip)]
    header: String,
}

impl Session {
    pub fn new(
        cookies: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, SessionError> {
        let cookies: Vec<SessionCookie> = cookies
            .into_iter()
            .map(|(name, value)| SessionCookie { name, value })
            .collect();

        if cookies.len() != SESSION_COOKIE_COUNT {
            return Err(SessionError::WrongCookieCount(cookies.len()));
        }
        if let Some(bad) = cookies.iter().find(|c| c.name.trim().is_empty()) {
            return Err(SessionError::Malformed(format!("{bad:?}")));
        }

        let header = cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");

        Ok(Self { cookies, header })
    }

    /// Parse a raw `Cookie` header string such as `JSESSIONID=abc; BIGipServer=def; ...`.
    pub fn from_cookie_header(raw: &str) -> Result<Self, SessionError> {
        let mut pairs = Vec::new();
        for parsed in cookie::Cookie::split_parse(raw.trim()) {
            let c = parsed.map_err(|e| SessionError::Malformed(e.to_string()))?;
            pairs.push((c.name().to_owned(), c.value().to_owned()));
        }
        Self::new(pairs)
    }

    pub fn cookies(&self) -> &[SessionCookie] {
        &self.cookies
    }

    /// The `Cookie` header value: `name=value` pairs joined with `"; "`.
    pub fn cookie_header(&self) -> &str {
        &self.header
    }
}

/// Supplies an authenticated session at crawl start.
///
/// Called exactly once per crawl; any failure is fatal to the crawl.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn acquire_session(&self) -> Result<Session, SessionError>;
}

/// Provides a session from a cookie header captured out-of-band (e.g. copied
/// from a browser after completing the term-selection flow).
#[derive(Debug, Clone)]
pub struct CookieHeaderProvider {
    #[debug(skip)]
    raw: Option<String>,
}

impl CookieHeaderProvider {
    pub fn new(raw: Option<String>) -> Self {
        Self {
            raw: raw.filter(|r| !r.trim().is_empty()),
        }
    }
}

#[async_trait]
impl SessionProvider for CookieHeaderProvider {
    async fn acquire_session(&self) -> Result<Session, SessionError> {
        let raw = self.raw.as_deref().ok_or(SessionError::NotConfigured)?;
        Session::from_cookie_header(raw)
    }
}
