//! HTTP dispatch behind a trait seam.
//!
//! The clients only need "GET this URL with this query and give me the
//! status, headers and body". [`HttpTransport`] and [`AsyncHttpTransport`]
//! do that over `reqwest`; tests and callers with special needs can plug in
//! their own implementation through `Client::with_transport`.

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue, USER_AGENT};

use crate::config::ClientConfig;
use crate::error::{Error, Result};

pub const HEADER_API_KEY: &str = "x-api-key";

/// Undecoded HTTP response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

/// Blocking transport used by [`Client`](crate::Client).
pub trait Transport: Send + Sync {
    fn send(&self, url: &str, query: &[(&'static str, String)]) -> Result<RawResponse>;
}

/// Non-blocking transport used by [`AsyncClient`](crate::AsyncClient).
#[async_trait]
pub trait AsyncTransport: Send + Sync {
    async fn send(&self, url: &str, query: &[(&'static str, String)]) -> Result<RawResponse>;
}

fn default_headers(config: &ClientConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Config(format!("invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::Config(format!("invalid value for header {name}: {e}")))?;
        headers.insert(name, value);
    }
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&config.user_agent)
            .map_err(|e| Error::Config(format!("invalid user agent: {e}")))?,
    );
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    if let Some(key) = config.api_key.as_deref() {
        let mut value = HeaderValue::from_str(key)
            .map_err(|e| Error::Config(format!("invalid API key header value: {e}")))?;
        value.set_sensitive(true);
        headers.insert(HeaderName::from_static(HEADER_API_KEY), value);
    }
    Ok(headers)
}

/// `reqwest` blocking session with the client's default headers, timeout
/// and pool limits.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .default_headers(default_headers(config)?)
            .timeout(config.timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }
}

impl Transport for HttpTransport {
    fn send(&self, url: &str, query: &[(&'static str, String)]) -> Result<RawResponse> {
        let resp = self
            .http
            .get(url)
            .query(query)
            .send()
            .map_err(Error::from_transport)?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.text().map_err(Error::from_transport)?;
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// `reqwest` async session, configured like [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct AsyncHttpTransport {
    http: reqwest::Client,
}

impl AsyncHttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .default_headers(default_headers(config)?)
            .timeout(config.timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl AsyncTransport for AsyncHttpTransport {
    async fn send(&self, url: &str, query: &[(&'static str, String)]) -> Result<RawResponse> {
        let resp = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(Error::from_transport)?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.text().await.map_err(Error::from_transport)?;
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
