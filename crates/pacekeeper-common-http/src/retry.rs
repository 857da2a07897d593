//! Bounded retry loop for one logical request.

use crate::codec::{self, Decoder};
use crate::descriptor::PreparedRequest;
use crate::error::{RequestError, TransportError};
use crate::gate::RequestGate;
use crate::transport::{Transport, TransportResponse};
use pacekeeper_common_async::{sleep_or_cancel, CancelSignal};
use pacekeeper_common_config::PacingConfig;
use pacekeeper_common_log::spans::record_outcome;
use pacekeeper_common_log::LogSink;
use std::time::Duration;
use tracing::{debug, Span};

/// Attempt budget and the two fixed delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_tries: u32,
    success_delay: Duration,
    failure_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy. A `max_tries` of 0 is raised to 1.
    pub fn new(max_tries: u32, success_delay: Duration, failure_delay: Duration) -> Self {
        Self {
            max_tries: max_tries.max(1),
            success_delay,
            failure_delay,
        }
    }

    /// Total attempts per logical request.
    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }

    /// Pacing applied after every dispatch, before the gate is released.
    pub fn success_delay(&self) -> Duration {
        self.success_delay
    }

    /// Wait between a failed attempt and the next one.
    pub fn failure_delay(&self) -> Duration {
        self.failure_delay
    }

    pub fn with_max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = max_tries.max(1);
        self
    }

    pub fn with_success_delay(mut self, delay: Duration) -> Self {
        self.success_delay = delay;
        self
    }

    pub fn with_failure_delay(mut self, delay: Duration) -> Self {
        self.failure_delay = delay;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&PacingConfig::default())
    }
}

impl From<&PacingConfig> for RetryPolicy {
    fn from(config: &PacingConfig) -> Self {
        Self::new(
            config.max_tries,
            config.success_delay(),
            config.failure_delay(),
        )
    }
}

/// Result of one attempt or of a whole retry sequence.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    /// The body decoded into a value.
    Succeeded(T),
    /// A single attempt failed; more may follow.
    Failed(RequestError),
    /// Every attempt failed, or the sequence was cancelled.
    Exhausted,
}

impl<T> RetryOutcome<T> {
    /// Collapse into the caller-facing sentinel form.
    pub fn into_option(self) -> Option<T> {
        match self {
            RetryOutcome::Succeeded(value) => Some(value),
            RetryOutcome::Failed(_) | RetryOutcome::Exhausted => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Succeeded(_))
    }
}

/// Drives up to `max_tries` attempts of one prepared request through a gate.
pub struct RetryExecutor<'a> {
    policy: RetryPolicy,
    gate: &'a RequestGate,
    transport: &'a dyn Transport,
    sink: &'a dyn LogSink,
    cancel: Option<&'a CancelSignal>,
}

impl<'a> RetryExecutor<'a> {
    pub fn new(
        policy: RetryPolicy,
        gate: &'a RequestGate,
        transport: &'a dyn Transport,
        sink: &'a dyn LogSink,
    ) -> Self {
        Self {
            policy,
            gate,
            transport,
            sink,
            cancel: None,
        }
    }

    /// Bind a cancellation signal.
    pub fn with_cancel(mut self, cancel: Option<&'a CancelSignal>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the retry sequence.
    ///
    /// Returns [`RetryOutcome::Succeeded`] or [`RetryOutcome::Exhausted`];
    /// every failed attempt is reported to the sink, followed by one terminal
    /// message when the sequence gives up. No failure wait follows the last
    /// attempt.
    pub async fn run<T>(&self, request: &PreparedRequest, decode: Decoder<T>) -> RetryOutcome<T> {
        let span = Span::current();
        let max_tries = self.policy.max_tries;
        let mut attempts = 0;
        let mut cancelled = false;

        while attempts < max_tries {
            if attempts > 0 && self.is_cancelled() {
                cancelled = true;
                break;
            }
            attempts += 1;

            let error = match self.attempt(request, decode).await {
                RetryOutcome::Succeeded(value) => {
                    debug!(attempt = attempts, "request succeeded");
                    record_outcome(&span, attempts, "success");
                    return RetryOutcome::Succeeded(value);
                }
                RetryOutcome::Failed(error) => error,
                RetryOutcome::Exhausted => break,
            };

            debug!(
                attempt = attempts,
                max_tries,
                category = error.category(),
                "attempt failed"
            );
            self.report(&error);

            if attempts < max_tries
                && !sleep_or_cancel(self.policy.failure_delay, self.cancel).await
            {
                cancelled = true;
                break;
            }
        }

        let outcome = if cancelled { "cancelled" } else { "exhausted" };
        self.sink.log_error(&format!(
            "{} {} {} after {} attempt(s)",
            request.method(),
            request.url(),
            outcome,
            attempts
        ));
        record_outcome(&span, attempts, outcome);
        RetryOutcome::Exhausted
    }

    /// Perform a single gated attempt and classify its result.
    ///
    /// The gate is held for the network call plus the success delay,
    /// whatever the call produced.
    pub async fn attempt<T>(
        &self,
        request: &PreparedRequest,
        decode: Decoder<T>,
    ) -> RetryOutcome<T> {
        let native = request.to_native();
        let result = self
            .gate
            .run_exclusive(self.policy.success_delay, self.transport.execute(native))
            .await;

        match classify(result, decode) {
            Ok(value) => RetryOutcome::Succeeded(value),
            Err(error) => RetryOutcome::Failed(error),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(CancelSignal::is_cancelled)
    }

    fn report(&self, error: &RequestError) {
        match error {
            RequestError::Status { body, .. } if !body.is_empty() => {
                self.sink.log_error(&format!("{error}: {body}"));
            }
            _ if error.is_exception() => self.sink.log_exception(error),
            _ => self.sink.log_error(&error.to_string()),
        }
    }
}

/// Map a transport result onto a decoded value or a [`RequestError`].
pub fn classify<T>(
    result: Result<TransportResponse, TransportError>,
    decode: Decoder<T>,
) -> Result<T, RequestError> {
    let response = result?;

    if !response.is_success() {
        return Err(RequestError::Status {
            status: response.status,
            body: codec::snippet(&response.body),
        });
    }
    if response.body.is_empty() {
        return Err(RequestError::EmptyBody {
            status: response.status,
        });
    }

    Ok(decode(&response.body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::RequestDescriptor;
    use crate::testing::{Scripted, ScriptedTransport};
    use pacekeeper_common_log::{LogEntry, MemorySink};
    use reqwest::{Method, StatusCode};
    use serde::Deserialize;
    use serde_json::json;
    use tokio::time::Instant;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Ack {
        ok: bool,
    }

    fn prepared() -> PreparedRequest {
        RequestDescriptor::new(Method::GET)
            .url("http://localhost/ack")
            .prepare(None)
            .unwrap()
    }

    fn policy(max_tries: u32) -> RetryPolicy {
        RetryPolicy::new(max_tries, Duration::ZERO, Duration::from_secs(10))
    }

    #[test]
    fn test_zero_tries_clamped() {
        assert_eq!(policy(0).max_tries(), 1);
        assert_eq!(RetryPolicy::default().with_max_tries(0).max_tries(), 1);
    }

    #[test]
    fn test_policy_from_pacing_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_tries(), 3);
        assert_eq!(policy.success_delay(), Duration::from_secs(1));
        assert_eq!(policy.failure_delay(), Duration::from_secs(10));
    }

    #[test]
    fn test_classify() {
        let ok = TransportResponse::new(StatusCode::OK, r#"{"ok":true}"#);
        assert_eq!(classify(Ok(ok), codec::decode::<Ack>).unwrap(), Ack { ok: true });

        let status = TransportResponse::new(StatusCode::BAD_GATEWAY, "upstream down");
        match classify(Ok(status), codec::decode::<Ack>) {
            Err(RequestError::Status { status, body }) => {
                assert_eq!(status, StatusCode::BAD_GATEWAY);
                assert_eq!(body, "upstream down");
            }
            other => panic!("expected Status, got {other:?}"),
        }

        let empty = TransportResponse::new(StatusCode::OK, "");
        assert!(matches!(
            classify(Ok(empty), codec::decode::<Ack>),
            Err(RequestError::EmptyBody { .. })
        ));

        let garbage = TransportResponse::new(StatusCode::OK, "not json");
        assert!(matches!(
            classify(Ok(garbage), codec::decode::<Ack>),
            Err(RequestError::Decode(_))
        ));

        let refused = Err(TransportError::Other("refused".into()));
        assert!(matches!(
            classify(refused, codec::decode::<Ack>),
            Err(RequestError::Transport(_))
        ));
    }

    #[test]
    fn test_outcome_into_option() {
        assert_eq!(RetryOutcome::Succeeded(7).into_option(), Some(7));
        assert_eq!(RetryOutcome::<i32>::Exhausted.into_option(), None);
        assert!(!RetryOutcome::<i32>::Failed(TransportError::Timeout.into()).is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_omits_trailing_wait() {
        let gate = RequestGate::new();
        let transport = ScriptedTransport::always(Scripted::status(500));
        let sink = MemorySink::new();
        let executor = RetryExecutor::new(policy(4), &gate, &transport, &sink);

        let start = Instant::now();
        let outcome = executor.run(&prepared(), codec::decode::<Ack>).await;

        assert!(matches!(outcome, RetryOutcome::Exhausted));
        assert_eq!(transport.calls(), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(30));
        assert_eq!(sink.error_count(), 5);
        assert_eq!(sink.exception_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt_logs_nothing() {
        let gate = RequestGate::new();
        let transport = ScriptedTransport::always(Scripted::json(json!({"ok": true})));
        let sink = MemorySink::new();
        let executor = RetryExecutor::new(policy(3), &gate, &transport, &sink);

        let start = Instant::now();
        let outcome = executor.run(&prepared(), codec::decode::<Ack>).await;

        assert_eq!(outcome.into_option(), Some(Ack { ok: true }));
        assert_eq!(transport.calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(sink.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_kinds_reported_by_channel() {
        let gate = RequestGate::new();
        let transport = ScriptedTransport::new([
            Scripted::connection_refused(),
            Scripted::body(200, "<html>"),
            Scripted::body(200, ""),
            Scripted::body(503, "busy"),
        ]);
        let sink = MemorySink::new();
        let executor = RetryExecutor::new(policy(4), &gate, &transport, &sink);

        let outcome = executor.run(&prepared(), codec::decode::<Ack>).await;
        assert!(outcome.into_option().is_none());

        let entries = sink.entries();
        assert_eq!(entries.len(), 5);
        assert!(matches!(entries[0], LogEntry::Exception(_)));
        assert!(matches!(entries[1], LogEntry::Exception(_)));
        assert!(matches!(entries[2], LogEntry::Error(_)));
        assert_eq!(entries[3].text(), "unexpected status 503 Service Unavailable: busy");
        assert!(entries[4].text().contains("exhausted after 4 attempt(s)"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_delay_paces_every_attempt() {
        let gate = RequestGate::new();
        let transport = ScriptedTransport::new([Scripted::status(500)])
            .with_fallback(Scripted::json(json!({"ok": false})));
        let sink = MemorySink::new();
        let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(10));
        let executor = RetryExecutor::new(policy, &gate, &transport, &sink);

        let start = Instant::now();
        let outcome = executor.run(&prepared(), codec::decode::<Ack>).await;

        assert_eq!(outcome.into_option(), Some(Ack { ok: false }));
        assert_eq!(start.elapsed(), Duration::from_secs(12));
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_failure_wait() {
        let gate = RequestGate::new();
        let transport = ScriptedTransport::always(Scripted::status(500));
        let sink = MemorySink::new();
        let cancel = CancelSignal::new();
        let executor =
            RetryExecutor::new(policy(5), &gate, &transport, &sink).with_cancel(Some(&cancel));

        let trigger = {
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(15)).await;
                cancel.cancel();
            }
        };

        let request = prepared();
        let start = Instant::now();
        let (outcome, ()) = tokio::join!(executor.run(&request, codec::decode::<Ack>), trigger);

        assert!(matches!(outcome, RetryOutcome::Exhausted));
        assert_eq!(transport.calls(), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(15));
        assert!(sink.entries().last().unwrap().text().contains("cancelled after 2 attempt(s)"));
    }

    #[tokio::test]
    async fn test_pre_cancelled_still_makes_first_attempt() {
        let gate = RequestGate::new();
        let transport = ScriptedTransport::always(Scripted::status(500));
        let sink = MemorySink::new();
        let cancel = CancelSignal::new();
        cancel.cancel();
        let executor =
            RetryExecutor::new(policy(3), &gate, &transport, &sink).with_cancel(Some(&cancel));

        let outcome = executor.run(&prepared(), codec::decode::<Ack>).await;

        assert!(matches!(outcome, RetryOutcome::Exhausted));
        assert_eq!(transport.calls(), 1);
        assert_eq!(sink.len(), 2);
    }
}
