use std::collections::HashMap;
use std::time::Duration;

use switchboard_core::headers::keys;
use switchboard_core::{ArgScheme, ResponseCode, TransportHeaders};
use switchboard_fabric::codec::Codec;
use switchboard_fabric::frame::{CallRequest, CallResponse};

use crate::error::Result;

/// A call to `endpoint` on `service`
///
/// The body is typed until dispatch encodes it with the codec of the chosen
/// argument scheme.
#[derive(Debug, Clone, PartialEq)]
pub struct Request<T> {
    service: String,
    endpoint: String,
    headers: HashMap<String, String>,
    transport_headers: TransportHeaders,
    timeout: Option<Duration>,
    body: T,
}

/// Request whose body is already bytes
pub type RawRequest = Request<Vec<u8>>;

impl Request<()> {
    /// Start a request; the body type is fixed by `RequestBuilder::body`
    pub fn builder(service: impl Into<String>, endpoint: impl Into<String>) -> RequestBuilder {
        RequestBuilder {
            service: service.into(),
            endpoint: endpoint.into(),
            headers: HashMap::new(),
            transport_headers: TransportHeaders::new(),
            timeout: None,
        }
    }
}

impl<T> Request<T> {
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn transport_headers(&self) -> &TransportHeaders {
        &self.transport_headers
    }

    pub fn transport_header(&self, key: &str) -> Option<&str> {
        self.transport_headers.get(key).map(String::as_str)
    }

    pub fn set_transport_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.transport_headers.insert(key.into(), value.into());
    }

    /// Set `key` only when the caller has not already chosen a value
    pub fn default_transport_header(&mut self, key: &str, value: &str) {
        if !self.transport_headers.contains_key(key) {
            self.transport_headers
                .insert(key.to_string(), value.to_string());
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn body(&self) -> &T {
        &self.body
    }

    pub fn into_body(self) -> T {
        self.body
    }

    /// Encode the body, keeping every header
    pub fn encode_with<C: Codec>(self, codec: &C, scheme: ArgScheme) -> Result<RawRequest>
    where
        T: serde::Serialize,
    {
        let body = codec.encode(&self.body)?;
        let mut raw = self.with_body(body);
        raw.set_transport_header(keys::ARG_SCHEME, scheme.as_str());
        Ok(raw)
    }

    fn with_body<U>(self, body: U) -> Request<U> {
        Request {
            service: self.service,
            endpoint: self.endpoint,
            headers: self.headers,
            transport_headers: self.transport_headers,
            timeout: self.timeout,
            body,
        }
    }
}

impl RawRequest {
    /// Build the call frame for correlation id `id`
    pub(crate) fn into_frame(self, id: u32, ttl: Duration) -> CallRequest {
        CallRequest {
            id,
            ttl_ms: u32::try_from(ttl.as_millis()).unwrap_or(u32::MAX),
            service: self.service,
            endpoint: self.endpoint,
            headers: self.headers,
            transport_headers: self.transport_headers,
            body: self.body,
        }
    }
}

/// Builder for `Request`
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    service: String,
    endpoint: String,
    headers: HashMap<String, String>,
    transport_headers: TransportHeaders,
    timeout: Option<Duration>,
}

impl RequestBuilder {
    /// Add an application header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn transport_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.transport_headers.insert(key.into(), value.into());
        self
    }

    /// Per-request deadline; the multiplexer default applies otherwise
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn body<T>(self, body: T) -> Request<T> {
        Request {
            service: self.service,
            endpoint: self.endpoint,
            headers: self.headers,
            transport_headers: self.transport_headers,
            timeout: self.timeout,
            body,
        }
    }
}

/// A correlated reply
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T> {
    code: ResponseCode,
    headers: HashMap<String, String>,
    transport_headers: TransportHeaders,
    body: T,
}

/// Response whose body has not been decoded
pub type RawResponse = Response<Vec<u8>>;

impl<T> Response<T> {
    pub fn new(body: T) -> Self {
        Self {
            code: ResponseCode::Ok,
            headers: HashMap::new(),
            transport_headers: TransportHeaders::new(),
            body,
        }
    }

    /// Flag the response as an application error
    pub fn with_code(mut self, code: ResponseCode) -> Self {
        self.code = code;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn code(&self) -> ResponseCode {
        self.code
    }

    /// Whether the remote handler flagged an application error
    pub fn is_error(&self) -> bool {
        self.code == ResponseCode::Error
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn transport_headers(&self) -> &TransportHeaders {
        &self.transport_headers
    }

    pub fn body(&self) -> &T {
        &self.body
    }

    pub fn into_body(self) -> T {
        self.body
    }
}

impl RawResponse {
    /// Decode the body with `codec`, keeping every header
    pub fn decode_with<C, U>(self, codec: &C) -> Result<Response<U>>
    where
        C: Codec,
        U: serde::de::DeserializeOwned,
    {
        let body = codec.decode(&self.body)?;
        Ok(Response {
            code: self.code,
            headers: self.headers,
            transport_headers: self.transport_headers,
            body,
        })
    }
}

impl From<CallResponse> for RawResponse {
    fn from(frame: CallResponse) -> Self {
        Self {
            code: frame.code,
            headers: frame.headers,
            transport_headers: frame.transport_headers,
            body: frame.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_header_keeps_explicit_value() {
        let mut request: RawRequest = Request::builder("ledger", "balance")
            .transport_header(keys::ARG_SCHEME, "json")
            .body(Vec::new());

        request.default_transport_header(keys::ARG_SCHEME, "raw");
        assert_eq!(request.transport_header(keys::ARG_SCHEME), Some("json"));

        request.default_transport_header(keys::SHARD_KEY, "eu-1");
        assert_eq!(request.transport_header(keys::SHARD_KEY), Some("eu-1"));
    }

    #[test]
    fn frame_carries_ttl_in_millis() {
        let request: RawRequest = Request::builder("ledger", "balance")
            .header("tenant", "acme")
            .body(b"ping".to_vec());

        let frame = request.into_frame(9, Duration::from_millis(1500));
        assert_eq!(frame.id, 9);
        assert_eq!(frame.ttl_ms, 1500);
        assert_eq!(frame.endpoint, "balance");
        assert_eq!(frame.headers.get("tenant").map(String::as_str), Some("acme"));
        assert_eq!(frame.body, b"ping");
    }
}
