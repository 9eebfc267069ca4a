//! HTTP request/response model for operation channels
//!
//! Channels never speak HTTP themselves. They build a [`MultipartPostRequest`]
//! through an [`HttpDataProcessor`], hand it to an [`HttpClient`] and get an
//! [`HttpResponse`] back. The client is the only part that touches the network
//! and the only part that can abort an exchange in progress.

use std::sync::Arc;

use tracing::debug;
use url::Url;

use crate::crypto::EncoderDecoder;
use crate::errors::{ChannelError, Result, TransportError};

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Client signature over the wrapped session key
pub const SIGNATURE_FIELD: &str = "signature";
/// Wrapped session key
pub const REQUEST_KEY_FIELD: &str = "requestKey";
/// Encrypted request body
pub const REQUEST_DATA_FIELD: &str = "requestData";
/// Client X25519 public key
pub const CLIENT_KEY_FIELD: &str = "clientKey";

const DEFAULT_BOUNDARY: &str = "synclink-multipart-boundary";

// ----------------------------------------------------------------------------
// HTTP Client Trait
// ----------------------------------------------------------------------------

/// Blocking HTTP transport used by a channel's worker
pub trait HttpClient: Send + Sync {
    /// Send a request and block until the response arrives or the exchange fails
    ///
    /// An exchange cut short by [`HttpClient::close_connection`] must fail, ideally
    /// with [`TransportError::Aborted`].
    fn send_request(&self, request: &MultipartPostRequest) -> Result<HttpResponse>;

    /// Abort whatever exchange is currently active; callable from any thread
    fn close_connection(&self);
}

// ----------------------------------------------------------------------------
// Multipart POST Request
// ----------------------------------------------------------------------------

/// `multipart/form-data` POST with named binary fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPostRequest {
    url: Url,
    boundary: String,
    fields: Vec<(String, Vec<u8>)>,
}

impl MultipartPostRequest {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            boundary: DEFAULT_BOUNDARY.into(),
            fields: Vec::new(),
        }
    }

    /// Use a specific multipart boundary
    pub fn with_boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = boundary.into();
        self
    }

    /// Set a field, replacing an earlier value with the same name
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn field(&self, name: &str) -> Option<&[u8]> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_slice())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn port(&self) -> u16 {
        self.url.port_or_known_default().unwrap_or(80)
    }

    /// Path and query the request line targets
    pub fn path(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Encoded multipart body
    pub fn body(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in &self.fields {
            body.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n").as_bytes(),
            );
            body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            body.extend_from_slice(value);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        body
    }

    /// Full HTTP/1.1 request: request line, headers and body
    pub fn to_bytes(&self) -> Vec<u8> {
        let body = self.body();
        let mut request = format!(
            "POST {} HTTP/1.1\r\nHost: {}:{}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n",
            self.path(),
            self.host(),
            self.port(),
            self.content_type(),
            body.len()
        )
        .into_bytes();
        request.extend_from_slice(&body);
        request
    }
}

// ----------------------------------------------------------------------------
// HTTP Response
// ----------------------------------------------------------------------------

/// Response returned by an [`HttpClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Header value, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

// ----------------------------------------------------------------------------
// HTTP Data Processor
// ----------------------------------------------------------------------------

/// Applies a channel's cryptographic context to requests and responses
#[derive(Debug, Clone)]
pub struct HttpDataProcessor {
    encoder: Arc<EncoderDecoder>,
}

impl HttpDataProcessor {
    pub fn new(encoder: EncoderDecoder) -> Self {
        Self {
            encoder: Arc::new(encoder),
        }
    }

    pub fn encoder(&self) -> &EncoderDecoder {
        &self.encoder
    }

    /// Build the encrypted operation request for the given server URL
    pub fn create_operation_request(&self, url: &Url, body: &[u8]) -> Result<MultipartPostRequest> {
        let mut request = MultipartPostRequest::new(url.clone());
        request.set_field(
            SIGNATURE_FIELD,
            self.encoder.session_key_signature().to_vec(),
        );
        request.set_field(REQUEST_KEY_FIELD, self.encoder.encoded_session_key());
        request.set_field(REQUEST_DATA_FIELD, self.encoder.encode_data(body)?);
        request.set_field(CLIENT_KEY_FIELD, self.encoder.client_public_key().to_vec());
        Ok(request)
    }

    /// Validate and decrypt an operation response
    ///
    /// A `204` or an empty body means the server's poll window elapsed with
    /// nothing to deliver and yields an empty payload.
    pub fn retrieve_operation_response(&self, response: &HttpResponse) -> Result<Vec<u8>> {
        if !response.is_success() {
            debug!(status = response.status(), "operation request rejected");
            return Err(ChannelError::Transport(TransportError::HttpStatus {
                status: response.status(),
            }));
        }

        if response.status() == 204 || response.body().is_empty() {
            return Ok(Vec::new());
        }

        self.encoder.decode_data(response.body())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{ClientKeyPair, ServerCipher};
    use crate::errors::CryptographicError;
    use crate::types::ServerPublicKey;
    use x25519_dalek::{PublicKey, StaticSecret};

    const SERVER_SECRET: [u8; 32] = [11u8; 32];

    fn processor() -> HttpDataProcessor {
        let server_public = PublicKey::from(&StaticSecret::from(SERVER_SECRET));
        let encoder = EncoderDecoder::new(
            &ClientKeyPair::generate(),
            ServerPublicKey::new(server_public.to_bytes()),
        )
        .unwrap();
        HttpDataProcessor::new(encoder)
    }

    fn server_for(request: &MultipartPostRequest) -> ServerCipher {
        let client_key: [u8; 32] = request.field(CLIENT_KEY_FIELD).unwrap().try_into().unwrap();
        ServerCipher::from_request_key(
            &SERVER_SECRET,
            &client_key,
            request.field(REQUEST_KEY_FIELD).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_multipart_body_layout() {
        let url = Url::parse("http://ops.example.com:9999/sync?ep=1").unwrap();
        let mut request = MultipartPostRequest::new(url).with_boundary("XYZ");
        request.set_field("a", b"one".to_vec());
        request.set_field("b", b"two".to_vec());
        request.set_field("a", b"uno".to_vec());

        assert_eq!(request.field("a"), Some(&b"uno"[..]));
        assert_eq!(request.fields().count(), 2);
        assert_eq!(request.path(), "/sync?ep=1");
        assert_eq!(request.content_type(), "multipart/form-data; boundary=XYZ");

        let body = String::from_utf8(request.body()).unwrap();
        assert!(body.starts_with("--XYZ\r\nContent-Disposition: form-data; name=\"a\""));
        assert!(body.contains("uno\r\n--XYZ\r\n"));
        assert!(body.ends_with("--XYZ--\r\n"));

        let raw = String::from_utf8(request.to_bytes()).unwrap();
        assert!(raw.starts_with("POST /sync?ep=1 HTTP/1.1\r\nHost: ops.example.com:9999\r\n"));
        assert!(raw.contains(&format!("Content-Length: {}\r\n", request.body().len())));
    }

    #[test]
    fn test_response_header_lookup() {
        let response = HttpResponse::new(200, b"x".to_vec()).with_header("X-Signature", "abc");
        assert_eq!(response.header("x-signature"), Some("abc"));
        assert_eq!(response.header("missing"), None);
        assert!(response.is_success());
        assert!(!HttpResponse::new(503, Vec::new()).is_success());
    }

    #[test]
    fn test_operation_request_round_trip_through_server() {
        let processor = processor();
        let url = Url::parse("http://ops.example.com/lp").unwrap();
        let request = processor.create_operation_request(&url, b"pending data").unwrap();

        assert_eq!(request.url(), &url);
        for field in [SIGNATURE_FIELD, REQUEST_KEY_FIELD, REQUEST_DATA_FIELD, CLIENT_KEY_FIELD] {
            assert!(request.field(field).is_some(), "missing {field}");
        }

        let server = server_for(&request);
        let body = server
            .decode_data(request.field(REQUEST_DATA_FIELD).unwrap())
            .unwrap();
        assert_eq!(body, b"pending data");

        let response = HttpResponse::new(200, server.encode_data(b"server data").unwrap());
        assert_eq!(
            processor.retrieve_operation_response(&response).unwrap(),
            b"server data"
        );
    }

    #[test]
    fn test_retrieve_rejects_error_status() {
        let err = processor()
            .retrieve_operation_response(&HttpResponse::new(500, b"oops".to_vec()))
            .unwrap_err();
        assert!(matches!(
            err,
            ChannelError::Transport(TransportError::HttpStatus { status: 500 })
        ));
    }

    #[test]
    fn test_retrieve_empty_poll() {
        let processor = processor();
        assert!(processor
            .retrieve_operation_response(&HttpResponse::new(204, Vec::new()))
            .unwrap()
            .is_empty());
        assert!(processor
            .retrieve_operation_response(&HttpResponse::new(200, Vec::new()))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_retrieve_rejects_garbage() {
        let err = processor()
            .retrieve_operation_response(&HttpResponse::new(200, vec![0u8; 64]))
            .unwrap_err();
        assert!(matches!(
            err,
            ChannelError::Crypto(CryptographicError::DecryptionFailed)
        ));
    }
}
