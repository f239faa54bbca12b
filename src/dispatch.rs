//! Request dispatcher: turns one inbound chat call into an upstream streaming call
//! and hands the response to the right translator.

use reqwest::Url;
use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::{DynConfigResolver, default_endpoint};
use crate::error::{ErrorBody, RelayError};
use crate::http::{DynHttpTransport, collect_body};
use crate::provider::{AdapterRegistry, ProviderAdapter};
use crate::stream::EventStream;
use crate::types::{CallMetadata, ChatCall, ProviderId};

pub const PROVIDER_HEADER: &str = "x-provider";
pub const CHAT_ID_HEADER: &str = "x-chat-id";
pub const ENDPOINT_HEADER: &str = "x-endpoint";
pub const MODEL_HEADER: &str = "x-model";
pub const APIKEY_HEADER: &str = "x-apikey";

/// Inbound chat call as received from the client.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    pub provider: Option<String>,
    pub chat_id: Option<String>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub apikey: Option<String>,
    /// Provider-shaped body, forwarded byte for byte.
    pub body: Vec<u8>,
}

impl InboundRequest {
    /// Reads the relay headers; blank values count as absent.
    pub fn from_parts(headers: &HeaderMap, body: Vec<u8>) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        Self {
            provider: header(PROVIDER_HEADER),
            chat_id: header(CHAT_ID_HEADER),
            endpoint: header(ENDPOINT_HEADER),
            model: header(MODEL_HEADER),
            apikey: header(APIKEY_HEADER),
            body,
        }
    }

    /// `X-Model`, else the body's `model` field.
    pub fn effective_model(&self) -> Option<String> {
        if let Some(model) = &self.model {
            return Some(model.clone());
        }
        serde_json::from_slice::<Value>(&self.body)
            .ok()?
            .get("model")?
            .as_str()
            .map(str::to_string)
    }
}

/// Result of [`Dispatcher::dispatch`].
pub enum DispatchOutcome {
    /// Upstream accepted the call; `events` yields canonical events.
    Stream {
        metadata: CallMetadata,
        events: EventStream,
    },
    /// Ready-to-send JSON error response.
    Error { status: u16, body: Vec<u8> },
}

impl std::fmt::Debug for DispatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream { metadata, .. } => f
                .debug_struct("Stream")
                .field("metadata", metadata)
                .finish_non_exhaustive(),
            Self::Error { status, body } => f
                .debug_struct("Error")
                .field("status", status)
                .field("body", &String::from_utf8_lossy(body))
                .finish(),
        }
    }
}

impl DispatchOutcome {
    /// Builds the error response for `err`.
    ///
    /// Upstream rejections keep their status and, when the body is JSON, their body.
    pub fn from_error(err: &RelayError) -> Self {
        if let RelayError::ProviderRejected { status, body } = err {
            if serde_json::from_slice::<Value>(body).is_ok() {
                return Self::Error {
                    status: *status,
                    body: body.clone(),
                };
            }
        }
        Self::Error {
            status: err.status_code(),
            body: encode_error_body(&err.to_body()),
        }
    }
}

fn encode_error_body(body: &ErrorBody) -> Vec<u8> {
    serde_json::to_vec(body).unwrap_or_else(|_| br#"{"error":"Internal Server Error"}"#.to_vec())
}

/// Shared, stateless dispatcher; clone freely across requests.
#[derive(Clone)]
pub struct Dispatcher {
    registry: AdapterRegistry,
    resolver: DynConfigResolver,
    transport: DynHttpTransport,
}

impl Dispatcher {
    pub fn new(transport: DynHttpTransport, resolver: DynConfigResolver) -> Self {
        Self {
            registry: AdapterRegistry::new(transport.clone(), resolver.clone()),
            resolver,
            transport,
        }
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &DynConfigResolver {
        &self.resolver
    }

    /// Forwards one chat call. Never fails: every fault becomes
    /// [`DispatchOutcome::Error`].
    pub async fn dispatch(&self, inbound: InboundRequest) -> DispatchOutcome {
        match self.forward(inbound).await {
            Ok(outcome) => outcome,
            Err(err) => {
                match &err {
                    RelayError::ProviderRejected { status, .. } => {
                        warn!(status, "provider rejected chat request")
                    }
                    RelayError::Internal { .. } => error!(error = %err, "dispatch failed"),
                    other => warn!(error = %other, "dispatch failed"),
                }
                DispatchOutcome::from_error(&err)
            }
        }
    }

    async fn forward(&self, inbound: InboundRequest) -> Result<DispatchOutcome, RelayError> {
        let provider = inbound
            .provider
            .as_deref()
            .map(ProviderId::from)
            .ok_or_else(|| RelayError::Validation {
                message: "missing X-Provider header".to_string(),
            })?;
        let adapter = self.registry.resolve(&provider);

        let stored = self.resolver.resolve(&provider).await?;
        let mut config = stored.with_overrides(inbound.endpoint.as_deref(), inbound.apikey.as_deref());
        if config.endpoint().is_none() {
            config.endpoint = default_endpoint(provider.as_str()).map(str::to_string);
        }

        let model = inbound.effective_model();
        let call = ChatCall {
            body: inbound.body,
            model: model.clone(),
        };
        let request = adapter.build_outbound_request(&call, &config)?;
        info!(
            provider = %provider,
            chat_id = inbound.chat_id.as_deref().unwrap_or("-"),
            model = model.as_deref().unwrap_or("-"),
            host = %target_host(&request.url),
            "dispatching chat request"
        );

        let response = self.transport.send_stream(request).await?;
        if !response.is_success() {
            let body = collect_body(response.body).await?;
            return Err(RelayError::ProviderRejected {
                status: response.status,
                body,
            });
        }

        let metadata = CallMetadata {
            chat_id: inbound.chat_id,
            model,
            provider_id: provider.to_string(),
        };
        let events = adapter
            .family()
            .event_stream(response.body, metadata.clone());
        Ok(DispatchOutcome::Stream { metadata, events })
    }
}

/// Host part of the outbound URL; query strings may carry credentials.
fn target_host(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| "<invalid url>".to_string())
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    #[test]
    fn relay_headers_are_read_and_blank_values_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert("x-provider", HeaderValue::from_static("claude"));
        headers.insert("x-chat-id", HeaderValue::from_static("chat-7"));
        headers.insert("x-apikey", HeaderValue::from_static("  "));
        let inbound = InboundRequest::from_parts(&headers, Vec::new());
        assert_eq!(inbound.provider.as_deref(), Some("claude"));
        assert_eq!(inbound.chat_id.as_deref(), Some("chat-7"));
        assert!(inbound.apikey.is_none());
    }

    #[test]
    fn model_header_wins_over_body() {
        let mut inbound = InboundRequest {
            body: br#"{"model":"gpt-4o-mini","messages":[]}"#.to_vec(),
            ..InboundRequest::default()
        };
        assert_eq!(inbound.effective_model().as_deref(), Some("gpt-4o-mini"));
        inbound.model = Some("gpt-4o".to_string());
        assert_eq!(inbound.effective_model().as_deref(), Some("gpt-4o"));

        inbound.model = None;
        inbound.body = b"not json".to_vec();
        assert!(inbound.effective_model().is_none());
    }

    #[test]
    fn non_json_rejection_is_wrapped() {
        let outcome = DispatchOutcome::from_error(&RelayError::ProviderRejected {
            status: 503,
            body: b"Service Unavailable".to_vec(),
        });
        let DispatchOutcome::Error { status, body } = outcome else {
            panic!("expected error outcome");
        };
        assert_eq!(status, 503);
        let body: ErrorBody = serde_json::from_slice(&body).expect("json body");
        assert_eq!(body.error, "upstream error");
        assert_eq!(body.details.as_deref(), Some("Service Unavailable"));
    }

    #[test]
    fn target_host_hides_query() {
        assert_eq!(
            target_host("https://generativelanguage.googleapis.com/v1beta/models/x:streamGenerateContent?alt=sse&key=secret"),
            "generativelanguage.googleapis.com"
        );
    }
}
