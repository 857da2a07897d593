//! HTTP transport: the seam between the retry loop and the network.

use crate::error::{HttpError, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use pacekeeper_common_config::TransportConfig;
use reqwest::cookie::Jar;
use reqwest::{Client, ClientBuilder, StatusCode};
use std::sync::Arc;

/// Status and body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl TransportResponse {
    /// Create a response.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Sends one native request and reads the whole response body.
///
/// Errors mean nothing usable came back; any status code, including 4xx and
/// 5xx, is a successful exchange at this level.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: reqwest::Request) -> Result<TransportResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(
        &self,
        request: reqwest::Request,
    ) -> Result<TransportResponse, TransportError> {
        (**self).execute(request).await
    }
}

/// Build a configured reqwest client, optionally wired to a cookie jar.
pub fn build_client(
    config: &TransportConfig,
    cookies: Option<Arc<Jar>>,
) -> Result<Client, HttpError> {
    let mut builder = ClientBuilder::new()
        .connect_timeout(config.connect_timeout())
        .timeout(config.request_timeout())
        .user_agent(&config.user_agent)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .gzip(config.gzip);

    if let Some(jar) = cookies {
        builder = builder.cookie_provider(jar);
    }

    builder.build().map_err(HttpError::ClientBuild)
}

/// Production transport backed by `reqwest`.
///
/// Owns its client and, when enabled, a cookie jar shared only with that
/// client.
pub struct ReqwestTransport {
    client: Client,
    cookies: Option<Arc<Jar>>,
}

impl ReqwestTransport {
    /// Create a transport with default settings.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_config(&TransportConfig::default())
    }

    /// Create a transport from explicit settings.
    pub fn with_config(config: &TransportConfig) -> Result<Self, HttpError> {
        let cookies = config.cookies.then(|| Arc::new(Jar::default()));
        let client = build_client(config, cookies.clone())?;
        Ok(Self { client, cookies })
    }

    /// The underlying reqwest client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// The cookie jar, when cookies are enabled.
    pub fn cookie_jar(&self) -> Option<&Arc<Jar>> {
        self.cookies.as_ref()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(
        &self,
        request: reqwest::Request,
    ) -> Result<TransportResponse, TransportError> {
        let response = self.client.execute(request).await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok(TransportResponse { status, body })
    }
}
