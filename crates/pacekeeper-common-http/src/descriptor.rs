//! Request descriptors and their validated, replayable form.

use crate::codec;
use crate::error::InvalidRequest;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Common header values.
pub mod headers {
    pub const CONTENT_TYPE_JSON: &str = "application/json";
}

/// Header mapping supplied by callers. Keys are unique; order is irrelevant.
pub type Headers = HashMap<String, String>;

/// Caller-level description of one logical request.
///
/// Nothing is validated until [`RequestDescriptor::prepare`].
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    url: Option<String>,
    headers: Headers,
    body: Option<Bytes>,
}

impl RequestDescriptor {
    /// Create a descriptor for `method` with no URL yet.
    pub fn new(method: Method) -> Self {
        Self {
            method,
            url: None,
            headers: Headers::new(),
            body: None,
        }
    }

    /// Set the target URL, absolute or relative to the requester's base URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Add a header, replacing any previous value under the same key.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add every entry of `headers`.
    pub fn headers(mut self, headers: &Headers) -> Self {
        self.headers
            .extend(headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Attach an already-encoded body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Encode `value` as the JSON body.
    ///
    /// A value that encodes to JSON `null` counts as a missing body.
    pub fn json_body<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, InvalidRequest> {
        let body = codec::encode(value)
            .map_err(|e| InvalidRequest::UnencodableBody(e.to_string()))?;
        if codec::is_absent(&body) {
            return Err(InvalidRequest::MissingBody);
        }
        Ok(self.body(body))
    }

    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The raw URL as given, if any.
    pub fn raw_url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// The encoded body, if any.
    pub fn body_bytes(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Validate and resolve into a [`PreparedRequest`].
    pub fn prepare(self, base: Option<&Url>) -> Result<PreparedRequest, InvalidRequest> {
        let url = resolve_url(self.url.as_deref(), base)?;

        let mut headers = filter_headers(&self.headers);
        if self.body.is_some() && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static(headers::CONTENT_TYPE_JSON),
            );
        }

        Ok(PreparedRequest {
            method: self.method,
            url,
            headers,
            body: self.body,
            timeout: None,
        })
    }
}

/// Resolve `raw` against `base` and require an http(s) URL.
pub fn resolve_url(raw: Option<&str>, base: Option<&Url>) -> Result<Url, InvalidRequest> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(InvalidRequest::MissingUrl)?;

    let malformed = |reason: String| InvalidRequest::MalformedUrl {
        url: raw.to_string(),
        reason,
    };

    let url = match (Url::parse(raw), base) {
        (Ok(url), _) => url,
        (Err(url::ParseError::RelativeUrlWithoutBase), Some(base)) => {
            base.join(raw).map_err(|e| malformed(e.to_string()))?
        }
        (Err(e), _) => return Err(malformed(e.to_string())),
    };

    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        "http" | "https" => Err(malformed("missing host".to_string())),
        other => Err(malformed(format!("unsupported scheme {other:?}"))),
    }
}

/// Build a header map, dropping entries whose name or value is empty or
/// not a legal HTTP header.
///
/// Entries are applied in ascending key order. Keys that differ only by
/// case name the same header, so the greatest spelling wins (`x-key` over
/// `X-Key`).
pub fn filter_headers(headers: &Headers) -> HeaderMap {
    let mut entries: Vec<_> = headers.iter().collect();
    entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

    let mut map = HeaderMap::with_capacity(entries.len());
    for (name, value) in entries {
        if name.trim().is_empty() || value.trim().is_empty() {
            continue;
        }
        if let (Ok(header), Ok(value)) = (
            HeaderName::try_from(name.trim()),
            HeaderValue::try_from(value.as_str()),
        ) {
            if map.insert(header, value).is_some() {
                tracing::debug!(header = %name, "header spelled more than once, keeping the last");
            }
        }
    }
    map
}

/// A validated request that can be turned into a fresh native request for
/// every attempt.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Bytes>,
    timeout: Option<Duration>,
}

impl PreparedRequest {
    /// Adopt a pre-built native request.
    ///
    /// Empty header values are stripped. Streaming bodies are rejected since
    /// they cannot be replayed across attempts.
    pub fn from_native(request: reqwest::Request) -> Result<Self, InvalidRequest> {
        let url = resolve_url(Some(request.url().as_str()), None)?;

        let body = match request.body() {
            None => None,
            Some(body) => Some(Bytes::copy_from_slice(
                body.as_bytes().ok_or(InvalidRequest::UnclonableBody)?,
            )),
        };

        let mut headers = HeaderMap::with_capacity(request.headers().len());
        for (name, value) in request.headers() {
            if !value.as_bytes().iter().all(u8::is_ascii_whitespace) {
                headers.append(name.clone(), value.clone());
            }
        }

        Ok(Self {
            method: request.method().clone(),
            url,
            headers,
            body,
            timeout: request.timeout().copied(),
        })
    }

    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The resolved URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Headers that will be sent.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Body that will be sent.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Build a fresh native request.
    pub fn to_native(&self) -> reqwest::Request {
        let mut request = reqwest::Request::new(self.method.clone(), self.url.clone());
        *request.headers_mut() = self.headers.clone();
        *request.body_mut() = self.body.clone().map(reqwest::Body::from);
        *request.timeout_mut() = self.timeout;
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Login<'a> {
        user: &'a str,
    }

    fn headers(entries: &[(&str, &str)]) -> Headers {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_header_entries_dropped() {
        let map = filter_headers(&headers(&[
            ("X-Keep", "yes"),
            ("", "orphan value"),
            ("X-Empty", ""),
            ("X-Blank", "   "),
        ]));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("x-keep").unwrap(), "yes");
    }

    #[test]
    fn test_case_colliding_keys_resolve_by_key_order() {
        for _ in 0..50 {
            let map = filter_headers(&headers(&[("X-Key", "upper"), ("x-key", "lower")]));
            assert_eq!(map.len(), 1);
            assert_eq!(map.get("x-key").unwrap(), "lower");
        }
    }

    #[test]
    fn test_illegal_header_names_dropped() {
        let map = filter_headers(&headers(&[("bad header", "v"), ("X-Ok", "v")]));
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("x-ok"));
    }

    #[test]
    fn test_missing_url() {
        let err = RequestDescriptor::new(Method::GET).prepare(None).unwrap_err();
        assert_eq!(err, InvalidRequest::MissingUrl);

        let err = RequestDescriptor::new(Method::GET)
            .url("   ")
            .prepare(None)
            .unwrap_err();
        assert_eq!(err, InvalidRequest::MissingUrl);
    }

    #[test]
    fn test_malformed_urls() {
        for raw in ["/relative/without/base", "ftp://example.com/file", "http://"] {
            let err = RequestDescriptor::new(Method::GET)
                .url(raw)
                .prepare(None)
                .unwrap_err();
            assert!(
                matches!(err, InvalidRequest::MalformedUrl { .. }),
                "{raw} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_relative_url_resolves_against_base() {
        let base = Url::parse("https://api.example.com/v1/").unwrap();
        let prepared = RequestDescriptor::new(Method::GET)
            .url("users/7")
            .prepare(Some(&base))
            .unwrap();
        assert_eq!(prepared.url().as_str(), "https://api.example.com/v1/users/7");
    }

    #[test]
    fn test_absolute_url_ignores_base() {
        let base = Url::parse("https://api.example.com/v1/").unwrap();
        let prepared = RequestDescriptor::new(Method::GET)
            .url("http://other.example.com/x")
            .prepare(Some(&base))
            .unwrap();
        assert_eq!(prepared.url().host_str(), Some("other.example.com"));
    }

    #[test]
    fn test_json_body_sets_content_type() {
        let prepared = RequestDescriptor::new(Method::POST)
            .url("http://localhost/login")
            .json_body(&Login { user: "ada" })
            .unwrap()
            .prepare(None)
            .unwrap();

        assert_eq!(
            prepared.headers().get(CONTENT_TYPE).unwrap(),
            headers::CONTENT_TYPE_JSON
        );
        assert_eq!(&prepared.body().unwrap()[..], br#"{"user":"ada"}"#);
    }

    #[test]
    fn test_explicit_content_type_kept() {
        let prepared = RequestDescriptor::new(Method::PUT)
            .url("http://localhost/raw")
            .header("Content-Type", "text/plain")
            .body("hello")
            .prepare(None)
            .unwrap();
        assert_eq!(prepared.headers().get(CONTENT_TYPE).unwrap(), "text/plain");
    }

    #[test]
    fn test_null_body_is_missing() {
        let err = RequestDescriptor::new(Method::POST)
            .json_body(&Option::<Login>::None)
            .unwrap_err();
        assert_eq!(err, InvalidRequest::MissingBody);
    }

    #[test]
    fn test_to_native_is_repeatable() {
        let prepared = RequestDescriptor::new(Method::POST)
            .url("http://localhost/echo")
            .header("X-Trace", "abc")
            .body("payload")
            .prepare(None)
            .unwrap();

        for _ in 0..2 {
            let native = prepared.to_native();
            assert_eq!(native.method(), &Method::POST);
            assert_eq!(native.url().as_str(), "http://localhost/echo");
            assert_eq!(native.headers().get("x-trace").unwrap(), "abc");
            assert_eq!(
                native.body().and_then(|b| b.as_bytes()),
                Some(&b"payload"[..])
            );
        }
    }

    #[test]
    fn test_from_native_strips_empty_values() {
        let url = Url::parse("https://example.com/item/1").unwrap();
        let mut native = reqwest::Request::new(Method::DELETE, url);
        native
            .headers_mut()
            .insert("x-empty", HeaderValue::from_static(""));
        native
            .headers_mut()
            .insert("x-real", HeaderValue::from_static("1"));
        *native.timeout_mut() = Some(Duration::from_secs(3));

        let prepared = PreparedRequest::from_native(native).unwrap();
        assert!(prepared.headers().get("x-empty").is_none());
        assert_eq!(prepared.headers().get("x-real").unwrap(), "1");
        assert_eq!(prepared.to_native().timeout(), Some(&Duration::from_secs(3)));
    }

    proptest! {
        #[test]
        fn test_filtered_headers_never_empty(
            entries in prop::collection::hash_map("[A-Za-z-]{0,8}", "[ -~]{0,8}", 0..12)
        ) {
            let map = filter_headers(&entries);
            prop_assert!(map.len() <= entries.len());
            for (name, value) in &map {
                prop_assert!(!name.as_str().is_empty());
                prop_assert!(!value.as_bytes().iter().all(u8::is_ascii_whitespace));
            }
        }
    }
}
