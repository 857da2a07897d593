//! Single-flight, paced HTTP request pipeline for Pacekeeper.
//!
//! Every [`Requester`] dispatches through one process-wide [`RequestGate`],
//! retries failed attempts with fixed delays and decodes JSON into
//! caller-chosen types.

pub mod codec;
pub mod descriptor;
pub mod envelope;
pub mod error;
pub mod gate;
pub mod requester;
pub mod retry;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use codec::{CodecError, Decoder};
pub use descriptor::{headers, Headers, PreparedRequest, RequestDescriptor};
pub use envelope::{EnvelopeError, ResponseEnvelope};
pub use error::{HttpError, InvalidRequest, RequestError, TransportError};
pub use gate::{GatePermit, RequestGate};
pub use requester::{Requester, RequesterBuilder};
pub use retry::{RetryExecutor, RetryOutcome, RetryPolicy};
pub use transport::{build_client, ReqwestTransport, Transport, TransportResponse};

pub use reqwest::{Method, StatusCode};
