//! Error taxonomy for the request pipeline.
//!
//! None of these cross the public call-shape boundary: attempt failures are
//! reported to the log sink and collapse into the `None` sentinel, invalid
//! input is rejected silently before dispatch. Only [`HttpError`] is
//! returned to callers, from constructors.

use crate::codec::CodecError;
use reqwest::StatusCode;

/// Failure while constructing a requester or its transport.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// Transport-level failure: nothing usable came back from the peer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed")]
    Connect(#[source] reqwest::Error),

    #[error("request failed")]
    Request(#[source] reqwest::Error),

    /// Failure raised by a non-reqwest transport.
    #[error("transport failure: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e)
        } else {
            TransportError::Request(e)
        }
    }
}

/// Why a single attempt failed. Every variant is retryable.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("transport error")]
    Transport(#[from] TransportError),

    #[error("unexpected status {status}")]
    Status { status: StatusCode, body: String },

    #[error("empty response body (status {status})")]
    EmptyBody { status: StatusCode },

    #[error("undecodable response body")]
    Decode(#[from] CodecError),
}

impl RequestError {
    /// Short category name for structured logs.
    pub fn category(&self) -> &'static str {
        match self {
            RequestError::Transport(_) => "transport",
            RequestError::Status { .. } => "status",
            RequestError::EmptyBody { .. } => "empty_body",
            RequestError::Decode(_) => "decode",
        }
    }

    /// Whether this failure carries an underlying error worth reporting
    /// with its source chain, as opposed to a plain protocol-level message.
    pub fn is_exception(&self) -> bool {
        matches!(self, RequestError::Transport(_) | RequestError::Decode(_))
    }
}

/// Structurally invalid input, rejected before any network activity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidRequest {
    #[error("request URL is missing")]
    MissingUrl,

    #[error("request URL {url:?} is malformed: {reason}")]
    MalformedUrl { url: String, reason: String },

    #[error("request body is required but absent")]
    MissingBody,

    #[error("request body could not be encoded: {0}")]
    UnencodableBody(String),

    #[error("request body is a stream and cannot be replayed")]
    UnclonableBody,
}
