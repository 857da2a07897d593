//! Scripted transport for tests.
//!
//! Replays a fixed sequence of responses and records every request it sees,
//! along with when it started and finished (tokio time, so paused-clock
//! tests see virtual instants).

use crate::error::TransportError;
use crate::transport::{Transport, TransportResponse};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode, Url};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum Scripted {
    Respond { status: StatusCode, body: Bytes },
    Fail(String),
}

impl Scripted {
    /// 200 with a JSON body.
    pub fn json(value: serde_json::Value) -> Self {
        Self::body(200, value.to_string())
    }

    /// Bare status with an empty body.
    pub fn status(code: u16) -> Self {
        Self::body(code, Bytes::new())
    }

    pub fn body(code: u16, body: impl Into<Bytes>) -> Self {
        Scripted::Respond {
            status: StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body: body.into(),
        }
    }

    pub fn connection_refused() -> Self {
        Scripted::Fail("connection refused".to_string())
    }
}

/// A request as the transport received it.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub started: Instant,
    pub finished: Instant,
}

/// Transport that pops replies from a script, then repeats a fallback.
#[derive(Debug)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Scripted,
    latency: Duration,
    captured: Mutex<Vec<CapturedRequest>>,
}

impl ScriptedTransport {
    /// Replay `script` in order; once exhausted, answer 500.
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: Scripted::status(500),
            latency: Duration::ZERO,
            captured: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with `reply`.
    pub fn always(reply: Scripted) -> Self {
        Self::new([]).with_fallback(reply)
    }

    pub fn with_fallback(mut self, reply: Scripted) -> Self {
        self.fallback = reply;
        self
    }

    /// Simulated time spent on the wire per request.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of requests received so far.
    pub fn calls(&self) -> usize {
        self.captured.lock().len()
    }

    pub fn captured(&self) -> Vec<CapturedRequest> {
        self.captured.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(
        &self,
        request: reqwest::Request,
    ) -> Result<TransportResponse, TransportError> {
        let started = Instant::now();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let reply = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        self.captured.lock().push(CapturedRequest {
            method: request.method().clone(),
            url: request.url().clone(),
            headers: request.headers().clone(),
            body: request
                .body()
                .and_then(|b| b.as_bytes())
                .map(Bytes::copy_from_slice),
            started,
            finished: Instant::now(),
        });

        match reply {
            Scripted::Respond { status, body } => Ok(TransportResponse { status, body }),
            Scripted::Fail(message) => Err(TransportError::Other(message)),
        }
    }
}
