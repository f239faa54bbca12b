//! Data structures shared by adapters, the dispatcher and the HTTP surface.
//!
//! Wire names follow the UI collaborator's JSON conventions (camelCase), while the
//! Rust side keeps snake_case fields.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque, case-sensitive provider key such as `openai`, `claude` or `vllm`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(pub String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ProviderId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for ProviderId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Outcome reported by a connectivity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Success,
    Error,
}

/// Result of [`crate::provider::ProviderAdapter::check`].
///
/// `message` is only present on errors.
///
/// # Examples
///
/// ```
/// use llm_relay::types::CheckResult;
///
/// let json = serde_json::to_string(&CheckResult::error("invalid endpoint")).unwrap();
/// assert_eq!(json, r#"{"status":"error","message":"invalid endpoint"}"#);
/// assert_eq!(serde_json::to_string(&CheckResult::success()).unwrap(), r#"{"status":"success"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    pub fn success() -> Self {
        Self {
            status: CheckStatus::Success,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Error,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CheckStatus::Success
    }
}

/// Provider reference embedded in every [`ModelDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRef {
    pub id: String,
    pub provider_name: String,
}

/// One entry of a provider's model catalog.
///
/// Built fresh on every listing call and never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    pub support_vision: bool,
    pub selected: bool,
    pub provider: ProviderRef,
}

/// Normalized inbound chat call.
///
/// The body is already shaped for the target provider and is forwarded byte for
/// byte; `model` is the effective model id (the `X-Model` header, else the body's
/// `model` field).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatCall {
    pub body: Vec<u8>,
    pub model: Option<String>,
}

/// Correlation data attached to every canonical stream event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub provider_id: String,
}
