use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Aggregates every failure mode the relay can surface to a caller.
///
/// Adapter-level operations (`check`, `models`) fold these into structured results;
/// only the dispatcher and the HTTP surface turn them into error responses, using
/// [`RelayError::status_code`] and [`RelayError::to_body`].
#[derive(Debug, Error)]
pub enum RelayError {
    /// The caller did not present a valid access token.
    #[error("unauthorized")]
    CallerUnauthorized,
    /// A stored provider endpoint or credential is missing or malformed.
    ///
    /// This is a relay-side misconfiguration, so it maps to a 5xx status.
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfig {
        /// Name of the configuration field that failed validation.
        field: String,
        /// Additional context explaining why the field is invalid.
        reason: String,
    },
    /// Signals malformed inbound requests, such as a missing `X-Provider` header.
    #[error("invalid request: {message}")]
    Validation { message: String },
    /// The provider answered with a non-2xx status. The body is kept verbatim.
    #[error("provider rejected request with status {status}")]
    ProviderRejected {
        /// Upstream HTTP status code.
        status: u16,
        /// Raw upstream body.
        body: Vec<u8>,
    },
    /// The provider stream ended abnormally or carried an embedded error frame.
    #[error("stream fault: {message}")]
    StreamFault { message: String },
    /// Represents transport-layer or networking failures.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// Wraps provider payloads that could not be interpreted.
    #[error("provider {provider} error: {message}")]
    Provider {
        /// Provider identifier, such as `openai` or `vllm`.
        provider: String,
        /// Human-readable description of the failure.
        message: String,
    },
    /// Catches unexpected failures inside the relay itself.
    #[error("internal error: {message}")]
    Internal { message: String },
}

/// JSON error body returned to callers: `{"error": ..., "details": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            error: error.into(),
            details,
        }
    }
}

impl RelayError {
    /// Creates an [`RelayError::Transport`] from a textual description.
    ///
    /// # Examples
    ///
    /// ```
    /// use llm_relay::error::RelayError;
    ///
    /// let err = RelayError::transport("dns lookup failed");
    /// assert!(matches!(err, RelayError::Transport { .. }));
    /// ```
    pub fn transport<T: Into<String>>(message: T) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an [`RelayError::Provider`] with the given provider id and message.
    pub fn provider<P: Into<String>, T: Into<String>>(provider: P, message: T) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates an [`RelayError::InvalidConfig`] for the named field.
    ///
    /// # Examples
    ///
    /// ```
    /// use llm_relay::error::RelayError;
    ///
    /// let err = RelayError::invalid_config("endpoint", "invalid endpoint");
    /// assert_eq!(err.status_code(), 500);
    /// ```
    pub fn invalid_config<F: Into<String>, R: Into<String>>(field: F, reason: R) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an [`RelayError::Internal`].
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// HTTP status mirroring the failure category.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::CallerUnauthorized => 401,
            Self::Validation { .. } => 400,
            Self::ProviderRejected { status, .. } => *status,
            Self::Transport { .. } | Self::Provider { .. } | Self::StreamFault { .. } => 502,
            Self::InvalidConfig { .. } | Self::Internal { .. } => 500,
        }
    }

    /// Renders the caller-facing JSON body.
    ///
    /// For [`RelayError::ProviderRejected`] this is only used when the upstream body
    /// is not JSON; JSON bodies are forwarded untouched by the dispatcher.
    pub fn to_body(&self) -> ErrorBody {
        match self {
            Self::CallerUnauthorized => ErrorBody::new("Unauthorized", None),
            Self::InvalidConfig { field, reason } => {
                ErrorBody::new("Invalid configuration", Some(format!("{field}: {reason}")))
            }
            Self::Validation { message } => ErrorBody::new("Bad Request", Some(message.clone())),
            Self::ProviderRejected { body, .. } => ErrorBody::new(
                "upstream error",
                Some(String::from_utf8_lossy(body).into_owned()),
            ),
            Self::StreamFault { message } => ErrorBody::new("Stream fault", Some(message.clone())),
            Self::Transport { message } => {
                ErrorBody::new("Upstream unreachable", Some(message.clone()))
            }
            Self::Provider { provider, message } => {
                ErrorBody::new("Provider error", Some(format!("{provider}: {message}")))
            }
            Self::Internal { message } => {
                ErrorBody::new("Internal Server Error", Some(message.clone()))
            }
        }
    }
}

/// Attempts to pull a human readable message out of a provider error payload.
///
/// Handles the OpenAI/Claude `{"error": {"message": ..}}` and the Gemini
/// `[{"error": {..}}]` shapes, falling back to the raw text.
pub(crate) fn extract_error_message(body: &str) -> String {
    fn from_value(value: &serde_json::Value) -> Option<String> {
        match value {
            serde_json::Value::Array(items) => items.iter().find_map(from_value),
            serde_json::Value::Object(map) => {
                let error = map.get("error")?;
                match error {
                    serde_json::Value::String(text) => Some(text.clone()),
                    other => other
                        .get("message")
                        .and_then(|m| m.as_str())
                        .map(str::to_string),
                }
            }
            _ => None,
        }
    }

    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .as_ref()
        .and_then(from_value)
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_failure_category() {
        assert_eq!(RelayError::CallerUnauthorized.status_code(), 401);
        assert_eq!(RelayError::invalid_config("endpoint", "empty").status_code(), 500);
        assert_eq!(
            RelayError::Validation {
                message: "missing X-Provider header".to_string()
            }
            .status_code(),
            400
        );
        assert_eq!(
            RelayError::ProviderRejected {
                status: 429,
                body: Vec::new()
            }
            .status_code(),
            429
        );
        assert_eq!(RelayError::transport("refused").status_code(), 502);
        assert_eq!(RelayError::internal("boom").status_code(), 500);
    }

    #[test]
    fn error_body_skips_missing_details() {
        let body = RelayError::CallerUnauthorized.to_body();
        let json = serde_json::to_string(&body).expect("serialize");
        assert_eq!(json, r#"{"error":"Unauthorized"}"#);
    }

    #[test]
    fn extract_error_message_handles_provider_shapes() {
        let openai = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(extract_error_message(openai), "Incorrect API key provided");

        let gemini = r#"[{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}]"#;
        assert_eq!(extract_error_message(gemini), "API key not valid");

        let vllm = r#"{"error":"model not loaded"}"#;
        assert_eq!(extract_error_message(vllm), "model not loaded");

        assert_eq!(extract_error_message("  bad gateway \n"), "bad gateway");
    }
}
