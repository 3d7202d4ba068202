use std::future::Future;

use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;
use url::Url;

use crate::config::Config;

/// Collector route appended to the configured base url.
const NODES_PATH: &str = "/api/nodes";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("collector target is not a valid URL: {0}")]
    InvalidTarget(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// What came back from the collector. Transport-level failures are
/// `TransportError::Http` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushResponse {
    pub status: u16,
    pub body: String,
}

impl PushResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Delivers one serialized payload to the collector.
pub trait Transport: Send + Sync + 'static {
    fn post(&self, body: String)
    -> impl Future<Output = Result<PushResponse, TransportError>> + Send + '_;
}

pub struct HttpTransport {
    client: Client,
    target: Url,
    headers: HeaderMap,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(TransportError::Client)?;

        Ok(Self {
            client,
            target: nodes_url(&config.url)?,
            headers: header_map(&config.headers)?,
        })
    }

    pub fn target(&self) -> &Url {
        &self.target
    }
}

impl Transport for HttpTransport {
    async fn post(&self, body: String) -> Result<PushResponse, TransportError> {
        let resp = self
            .client
            .post(self.target.clone())
            .headers(self.headers.clone())
            .body(body)
            .send()
            .await?;

        // The status decides the outcome; an unreadable body must not hide it.
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Ok(PushResponse { status, body })
    }
}

/// `<base>/api/nodes`, tolerating a trailing slash on the base.
fn nodes_url(base: &Url) -> Result<Url, TransportError> {
    let joined = format!("{}{NODES_PATH}", base.as_str().trim_end_matches('/'));
    Url::parse(&joined).map_err(|_| TransportError::InvalidTarget(joined))
}

/// Configured headers applied in order with set semantics: a repeated name
/// replaces the earlier value. The JSON content type goes in first so a
/// configured `Content-Type` can override it.
fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::new();
    map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    for (k, v) in headers {
        let name = HeaderName::from_bytes(k.as_bytes())
            .map_err(|_| TransportError::InvalidHeader(k.clone()))?;
        let value = HeaderValue::from_str(v).map_err(|_| TransportError::InvalidHeader(k.clone()))?;
        map.insert(name, value);
    }
    Ok(map)
}
