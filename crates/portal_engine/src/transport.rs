use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use portal_logging::portal_trace;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use tokio::sync::Semaphore;

use crate::{FailureKind, TransportError, TransportResponse};

#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    /// Session cookie header owned by the host application.
    pub cookie: Option<String>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 64 * 1024 * 1024,
            cookie: None,
        }
    }
}

/// Authenticated retrieval capability. The engine never looks at session
/// state; it only asks for URIs.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn retrieve(&self, uri: &str) -> Result<TransportResponse, TransportError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    settings: TransportSettings,
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(settings: TransportSettings) -> Result<Self, TransportError> {
        let client = build_client(&settings)?;
        Ok(Self { settings, client })
    }
}

fn build_client(settings: &TransportSettings) -> Result<reqwest::Client, TransportError> {
    let policy = reqwest::redirect::Policy::limited(settings.redirect_limit);

    let mut headers = HeaderMap::new();
    if let Some(cookie) = settings.cookie.as_deref() {
        let value = HeaderValue::from_str(cookie)
            .map_err(|err| TransportError::new(FailureKind::InvalidUrl, err.to_string()))?;
        headers.insert(COOKIE, value);
    }

    reqwest::Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.request_timeout)
        .redirect(policy)
        .default_headers(headers)
        .build()
        .map_err(|err| TransportError::new(FailureKind::Network, err.to_string()))
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn retrieve(&self, uri: &str) -> Result<TransportResponse, TransportError> {
        let parsed = reqwest::Url::parse(uri)
            .map_err(|err| TransportError::new(FailureKind::InvalidUrl, err.to_string()))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(TransportError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let final_uri = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
            })
            .collect::<Vec<_>>();

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = body.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(TransportError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            body.extend_from_slice(&chunk);
        }

        portal_trace!("retrieved {} ({} bytes)", final_uri, body.len());

        Ok(TransportResponse {
            status: status.as_u16(),
            final_uri,
            headers,
            body,
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return TransportError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    TransportError::new(FailureKind::Network, err.to_string())
}

/// Shared request queue: every retrieval waits for one of a fixed number of
/// permits before reaching the inner transport.
#[derive(Clone)]
pub struct LimitedTransport {
    inner: Arc<dyn Transport>,
    permits: Arc<Semaphore>,
}

impl LimitedTransport {
    pub fn new(inner: Arc<dyn Transport>, max_concurrent: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait::async_trait]
impl Transport for LimitedTransport {
    async fn retrieve(&self, uri: &str) -> Result<TransportResponse, TransportError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|err| TransportError::new(FailureKind::Network, err.to_string()))?;
        self.inner.retrieve(uri).await
    }
}
