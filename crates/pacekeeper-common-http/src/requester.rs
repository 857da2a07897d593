//! The requester façade.
//!
//! A [`Requester`] owns one transport (and its cookie jar) and exposes the
//! typed call shapes. Every call goes through [`RequestGate::global`], so
//! dispatches from all requesters in the process are serialized and paced.
//!
//! Calls never return errors: a value comes back as `Some`, anything else
//! (exhausted retries, cancellation, invalid input) as `None`. Failed
//! attempts are reported to the requester's [`LogSink`]; invalid input is
//! rejected before dispatch without touching the sink.

use crate::codec::{self, Decoder};
use crate::descriptor::{Headers, PreparedRequest, RequestDescriptor};
use crate::envelope::ResponseEnvelope;
use crate::error::{HttpError, InvalidRequest};
use crate::gate::RequestGate;
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::transport::{ReqwestTransport, Transport};
use pacekeeper_common_async::CancelSignal;
use pacekeeper_common_config::{PacekeeperConfig, PacingConfig, TransportConfig};
use pacekeeper_common_core::{CallId, RequesterId};
use pacekeeper_common_log::spans::{instrument_future, request_span};
use pacekeeper_common_log::{LogSink, TracingSink};
use reqwest::cookie::Jar;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Rate-limited, retrying HTTP client instance.
pub struct Requester {
    id: RequesterId,
    label: String,
    policy: RetryPolicy,
    base_url: Option<Url>,
    transport: Box<dyn Transport>,
    cookies: Option<Arc<Jar>>,
    sink: Arc<dyn LogSink>,
    cancel: Option<CancelSignal>,
}

impl std::fmt::Debug for Requester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Requester")
            .field("id", &self.id)
            .field("policy", &self.policy)
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("cookies", &self.cookies.is_some())
            .finish_non_exhaustive()
    }
}

impl Requester {
    /// Requester with default pacing and a fresh `reqwest` transport.
    pub fn new() -> Result<Self, HttpError> {
        Self::builder().build()
    }

    pub fn builder() -> RequesterBuilder {
        RequesterBuilder::default()
    }

    /// Requester configured from loaded settings.
    pub fn from_config(config: &PacekeeperConfig) -> Result<Self, HttpError> {
        Self::builder()
            .pacing(&config.pacing)
            .transport_config(config.http.clone())
            .build()
    }

    pub fn id(&self) -> RequesterId {
        self.id
    }

    /// Short debug label used in logs.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn max_tries(&self) -> u32 {
        self.policy.max_tries()
    }

    pub fn success_delay(&self) -> Duration {
        self.policy.success_delay()
    }

    pub fn failure_delay(&self) -> Duration {
        self.policy.failure_delay()
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// The cookie jar shared with the transport, if this requester owns one.
    ///
    /// Cookies set by responses land here; callers may also seed it.
    pub fn cookie_jar(&self) -> Option<&Arc<Jar>> {
        self.cookies.as_ref()
    }

    /// GET `url` and return the body as text.
    pub async fn get_string(&self, url: &str) -> Option<String> {
        let descriptor = RequestDescriptor::new(Method::GET).url(url);
        self.dispatch(descriptor, codec::decode_text).await
    }

    /// Send a bodiless request and decode the JSON response.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        headers: &Headers,
    ) -> Option<T> {
        let descriptor = RequestDescriptor::new(method).url(url).headers(headers);
        self.dispatch(descriptor, codec::decode::<T>).await
    }

    /// Send `body` as JSON and decode the JSON response.
    pub async fn request_with_body<B, T>(
        &self,
        method: Method,
        url: &str,
        headers: &Headers,
        body: &B,
    ) -> Option<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let descriptor = match RequestDescriptor::new(method)
            .url(url)
            .headers(headers)
            .json_body(body)
        {
            Ok(descriptor) => descriptor,
            Err(e) => return self.reject(e),
        };
        self.dispatch(descriptor, codec::decode::<T>).await
    }

    /// Like [`Requester::request_with_body`], returning the unmodified body
    /// alongside the decoded response.
    pub async fn request_with_envelope<B, T>(
        &self,
        method: Method,
        url: &str,
        headers: &Headers,
        body: B,
    ) -> Option<ResponseEnvelope<B, T>>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let response = self.request_with_body(method, url, headers, &body).await?;
        Some(ResponseEnvelope::new(body, response))
    }

    /// Send a pre-built native request and decode the JSON response.
    ///
    /// The request is rebuilt for every attempt; streaming bodies are
    /// rejected.
    pub async fn send_native<T: DeserializeOwned>(&self, request: reqwest::Request) -> Option<T> {
        match PreparedRequest::from_native(request) {
            Ok(prepared) => self.execute(prepared, codec::decode::<T>).await,
            Err(e) => self.reject(e),
        }
    }

    /// Release the transport and its cookie jar.
    pub fn dispose(self) {}

    async fn dispatch<T>(&self, descriptor: RequestDescriptor, decode: Decoder<T>) -> Option<T> {
        match descriptor.prepare(self.base_url.as_ref()) {
            Ok(prepared) => self.execute(prepared, decode).await,
            Err(e) => self.reject(e),
        }
    }

    async fn execute<T>(&self, request: PreparedRequest, decode: Decoder<T>) -> Option<T> {
        let call = CallId::new();
        let span = request_span(
            &self.label,
            &call.short(),
            request.method().as_str(),
            request.url().as_str(),
        );

        let executor = RetryExecutor::new(
            self.policy,
            RequestGate::global(),
            self.transport.as_ref(),
            self.sink.as_ref(),
        )
        .with_cancel(self.cancel.as_ref());

        instrument_future(executor.run(&request, decode), span)
            .await
            .into_option()
    }

    fn reject<T>(&self, error: InvalidRequest) -> Option<T> {
        debug!(requester = %self.label, error = %error, "request rejected before dispatch");
        None
    }
}

impl Drop for Requester {
    fn drop(&mut self) {
        debug!(requester = %self.label, "requester disposed");
    }
}

/// Builder for [`Requester`].
#[derive(Default)]
pub struct RequesterBuilder {
    policy: RetryPolicy,
    transport: Option<Box<dyn Transport>>,
    transport_config: TransportConfig,
    sink: Option<Arc<dyn LogSink>>,
    cancel: Option<CancelSignal>,
    base_url: Option<String>,
}

impl RequesterBuilder {
    /// Attempts per logical request. 0 is treated as 1.
    pub fn max_tries(mut self, max_tries: u32) -> Self {
        self.policy = self.policy.with_max_tries(max_tries);
        self
    }

    pub fn success_delay(mut self, delay: Duration) -> Self {
        self.policy = self.policy.with_success_delay(delay);
        self
    }

    pub fn failure_delay(mut self, delay: Duration) -> Self {
        self.policy = self.policy.with_failure_delay(delay);
        self
    }

    /// Take all three pacing settings from configuration.
    pub fn pacing(mut self, config: &PacingConfig) -> Self {
        self.policy = RetryPolicy::from(config);
        self
    }

    /// Use a custom transport. The requester will have no cookie jar.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Settings for the default `reqwest` transport, including its base URL.
    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.transport_config = config;
        self
    }

    /// Report failures here instead of to a per-requester [`TracingSink`].
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn cancel_signal(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    /// Base for relative call URLs. Overrides the transport config's.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn build(self) -> Result<Requester, HttpError> {
        let id = RequesterId::new();
        let label = id.short();

        let base_url = self
            .base_url
            .or_else(|| self.transport_config.base_url.clone())
            .map(|raw| parse_base_url(&raw))
            .transpose()?;

        let (transport, cookies): (Box<dyn Transport>, _) = match self.transport {
            Some(transport) => (transport, None),
            None => {
                let transport = ReqwestTransport::with_config(&self.transport_config)?;
                let cookies = transport.cookie_jar().cloned();
                (Box::new(transport), cookies)
            }
        };

        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(TracingSink::new(label.clone())));

        debug!(requester = %label, policy = ?self.policy, "requester created");

        Ok(Requester {
            id,
            label,
            policy: self.policy,
            base_url,
            transport,
            cookies,
            sink,
            cancel: self.cancel,
        })
    }
}

/// Parse a base URL, forcing a trailing slash so relative paths append to
/// it rather than replacing its last segment.
fn parse_base_url(raw: &str) -> Result<Url, HttpError> {
    let invalid = |reason: String| HttpError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };

    let mut url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
        return Err(invalid("expected an http(s) URL with a host".to_string()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
