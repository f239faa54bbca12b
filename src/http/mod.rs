use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_core::Stream;
use futures_util::StreamExt;
use ::reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;

use crate::error::RelayError;

pub mod reqwest;

/// HTTP methods the relay issues upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Fully specified outbound call: URL, method, headers and body.
///
/// Adapters build one of these per inbound request; after construction it is
/// handed to the transport as-is. Header lookups are case-insensitive.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    /// Overall deadline for this call; `None` leaves only the client's connect timeout.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Builds a bodiless GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Builds a POST request with a JSON request body.
    ///
    /// The body is stored untouched; only `Content-Type` is stamped.
    ///
    /// # Examples
    ///
    /// ```
    /// use llm_relay::http::{HttpMethod, HttpRequest};
    ///
    /// let request = HttpRequest::post_json("https://example.com", br"{}".to_vec());
    /// assert_eq!(request.method, HttpMethod::Post);
    /// assert_eq!(request.header("content-type"), Some("application/json"));
    /// ```
    pub fn post_json(url: impl Into<String>, body: Vec<u8>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers,
            body: Some(body),
            timeout: None,
        }
    }

    /// Adds a header, rejecting values that cannot travel in an HTTP header.
    ///
    /// Credentials end up here, so the error names the header but never echoes the
    /// value.
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Result<Self, RelayError> {
        let value = HeaderValue::from_str(value).map_err(|_| {
            RelayError::invalid_config(name.as_str(), "value contains invalid header characters")
        })?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Bounds the whole call, response body included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// HTTP response with a fully buffered body.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserializes the body as JSON, tagging failures with the provider id.
    pub fn json<T: DeserializeOwned>(&self, provider: &str) -> Result<T, RelayError> {
        serde_json::from_slice(&self.body).map_err(|err| {
            RelayError::provider(provider, format!("malformed response payload: {err}"))
        })
    }
}

/// HTTP response that carries a streaming body.
pub struct HttpStreamResponse {
    pub status: u16,
    pub body: HttpBodyStream,
}

impl HttpStreamResponse {
    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Alias for the body stream returned by [`HttpTransport::send_stream`].
pub type HttpBodyStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, RelayError>> + Send>>;

/// Transport abstraction used to decouple adapters from the concrete HTTP client.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends a request and resolves when the full response is available.
    ///
    /// # Errors
    ///
    /// Implementations should map network failures to [`RelayError::Transport`].
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, RelayError>;

    /// Sends a request and resolves once the response headers arrived; the body is
    /// returned as a stream.
    ///
    /// # Examples
    ///
    /// ```
    /// # use async_trait::async_trait;
    /// # use llm_relay::http::{HttpTransport, HttpRequest, HttpResponse, HttpStreamResponse};
    /// # use llm_relay::error::RelayError;
    /// # use futures_util::{stream, StreamExt};
    /// struct EchoTransport;
    ///
    /// #[async_trait]
    /// impl HttpTransport for EchoTransport {
    ///     async fn send(&self, request: HttpRequest) -> Result<HttpResponse, RelayError> {
    ///         Ok(HttpResponse { status: 200, body: request.body.unwrap_or_default() })
    ///     }
    ///     async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, RelayError> {
    ///         let stream = stream::once(async move { Ok::<_, RelayError>(request.body.unwrap_or_default()) });
    ///         Ok(HttpStreamResponse { status: 200, body: Box::pin(stream) })
    ///     }
    /// }
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let response = EchoTransport
    ///     .send_stream(HttpRequest::post_json("https://example.com", br"{}".to_vec()))
    ///     .await
    ///     .unwrap();
    /// let chunks: Vec<_> = response.body.collect::<Vec<_>>().await;
    /// assert_eq!(chunks.len(), 1);
    /// # });
    /// ```
    ///
    /// # Errors
    ///
    /// Implementations should return [`RelayError::Transport`] for network failures.
    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, RelayError>;
}

/// Thread-safe handle to a transport implementation.
pub type DynHttpTransport = Arc<dyn HttpTransport>;

/// Drains a streaming body into memory, used for upstream error payloads.
pub async fn collect_body(mut body: HttpBodyStream) -> Result<Vec<u8>, RelayError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = body.next().await {
        bytes.extend_from_slice(&chunk?);
    }
    Ok(bytes)
}
