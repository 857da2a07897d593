//! Request/response pairing.

use serde::{Deserialize, Deserializer, Serialize};

/// Construction error for [`ResponseEnvelope::from_parts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("envelope is missing its request value")]
    MissingRequest,

    #[error("envelope is missing its response value")]
    MissingResponse,
}

/// The request value a call was made with, paired with the decoded response.
///
/// Both halves are always present. Deserializing requires both keys, even
/// when a half is itself an `Option`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "Req: Deserialize<'de>, Resp: Deserialize<'de>"))]
pub struct ResponseEnvelope<Req, Resp> {
    #[serde(deserialize_with = "required")]
    request: Req,
    #[serde(deserialize_with = "required")]
    response: Resp,
}

// A field with `deserialize_with` gets no implicit `None` when its key is
// missing.
fn required<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer)
}

impl<Req, Resp> ResponseEnvelope<Req, Resp> {
    pub fn new(request: Req, response: Resp) -> Self {
        Self { request, response }
    }

    /// Build from optional halves, failing if either is absent.
    pub fn from_parts(request: Option<Req>, response: Option<Resp>) -> Result<Self, EnvelopeError> {
        let request = request.ok_or(EnvelopeError::MissingRequest)?;
        let response = response.ok_or(EnvelopeError::MissingResponse)?;
        Ok(Self { request, response })
    }

    pub fn request(&self) -> &Req {
        &self.request
    }

    pub fn response(&self) -> &Resp {
        &self.response
    }

    pub fn into_parts(self) -> (Req, Resp) {
        (self.request, self.response)
    }
}
