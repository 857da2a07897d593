//! Tracing spans for request pipelines.

use std::future::Future;
use tracing::{info_span, Instrument, Span};

/// Span covering one logical request, across all of its attempts.
///
/// `outcome` and `attempts` are left empty and filled in by
/// [`record_outcome`] once the request settles.
pub fn request_span(requester: &str, call: &str, method: &str, url: &str) -> Span {
    info_span!(
        "request",
        requester = %requester,
        call = %call,
        method = %method,
        url = %url,
        attempts = tracing::field::Empty,
        outcome = tracing::field::Empty,
    )
}

/// Record how a request span ended.
pub fn record_outcome(span: &Span, attempts: u32, outcome: &str) {
    span.record("attempts", attempts);
    span.record("outcome", outcome);
}

/// Instrument a future with a span.
pub fn instrument_future<F: Future>(future: F, span: Span) -> impl Future<Output = F::Output> {
    future.instrument(span)
}
