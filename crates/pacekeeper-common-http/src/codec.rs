//! JSON body codec.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Longest body excerpt carried inside a decode error.
const SNIPPET_LEN: usize = 200;

/// An explicit decode function for a caller-chosen result type.
pub type Decoder<T> = fn(&[u8]) -> Result<T, CodecError>;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode JSON body")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode JSON body {snippet:?}")]
    Decode {
        snippet: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("response body is not valid UTF-8")]
    Utf8(#[source] std::str::Utf8Error),
}

/// Encode a value as a JSON body.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Bytes, CodecError> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(CodecError::Encode)
}

/// Decode a JSON body into `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(bytes).map_err(|source| CodecError::Decode {
        snippet: snippet(bytes),
        source,
    })
}

/// Decode a body as raw text. Invalid UTF-8 is an error, not replaced.
pub fn decode_text(bytes: &[u8]) -> Result<String, CodecError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(CodecError::Utf8)
}

/// Whether an encoded body is JSON `null`, i.e. carries no value.
pub fn is_absent(body: &[u8]) -> bool {
    std::str::from_utf8(body).is_ok_and(|text| text.trim() == "null")
}

/// Lossy, length-capped excerpt of a body for diagnostics.
pub(crate) fn snippet(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    match text.char_indices().nth(SNIPPET_LEN) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.into_owned(),
    }
}
