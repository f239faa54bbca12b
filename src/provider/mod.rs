//! Provider adapters.
//!
//! Every provider family implements [`ProviderAdapter`]; [`Adapter`] is the closed
//! set of families the registry hands out. The adapter that built a request also
//! decides, through [`ProviderFamily`], which frame translator reads its response.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::{ConfigResolver, ProviderConfig};
use crate::error::{RelayError, extract_error_message};
use crate::http::{HttpBodyStream, HttpRequest, HttpTransport};
use crate::stream::{EventStream, create_event_stream};
use crate::types::{CallMetadata, ChatCall, CheckResult, ModelDescriptor, ProviderId};

pub mod claude;
pub mod gemini;
pub mod openai_compatible;
pub mod registry;
pub mod vllm;

pub use claude::ClaudeAdapter;
pub use gemini::GeminiAdapter;
pub use openai_compatible::OpenAiCompatibleAdapter;
pub use registry::AdapterRegistry;
pub use vllm::VllmAdapter;

/// Providers sharing one request/response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFamily {
    OpenAiCompatible,
    Claude,
    Gemini,
    Vllm,
}

impl ProviderFamily {
    /// Wraps a successful upstream body in this family's translator.
    pub fn event_stream(self, body: HttpBodyStream, metadata: CallMetadata) -> EventStream {
        match self {
            Self::OpenAiCompatible | Self::Vllm => {
                create_event_stream(body, openai_compatible::OpenAiFrameTranslator, metadata)
            }
            Self::Claude => create_event_stream(body, claude::ClaudeFrameTranslator, metadata),
            Self::Gemini => create_event_stream(body, gemini::GeminiFrameTranslator, metadata),
        }
    }
}

/// 统一的 Adapter 能力接口
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Identifier this adapter was resolved for.
    fn provider_id(&self) -> &ProviderId;

    /// Family deciding auth shape and stream framing.
    fn family(&self) -> ProviderFamily;

    /// Verifies that `api_url` is reachable with `apikey` and, when `model_id` is not
    /// empty, that the model is served there. Never fails; problems are reported in
    /// the returned [`CheckResult`].
    async fn check(&self, model_id: &str, apikey: &str, api_url: &str) -> CheckResult;

    /// Live catalog for the stored configuration. Empty on any failure.
    async fn models(&self) -> Vec<ModelDescriptor>;

    /// Builds the outbound streaming call for `call` against `config`, where
    /// `config` already has per-request overrides applied.
    fn build_outbound_request(
        &self,
        call: &ChatCall,
        config: &ProviderConfig,
    ) -> Result<HttpRequest, RelayError>;
}

/// Closed set of adapter variants handed out by [`AdapterRegistry`].
pub enum Adapter {
    OpenAiCompatible(OpenAiCompatibleAdapter),
    Claude(ClaudeAdapter),
    Gemini(GeminiAdapter),
    Vllm(VllmAdapter),
}

impl Adapter {
    fn inner(&self) -> &dyn ProviderAdapter {
        match self {
            Self::OpenAiCompatible(adapter) => adapter,
            Self::Claude(adapter) => adapter,
            Self::Gemini(adapter) => adapter,
            Self::Vllm(adapter) => adapter,
        }
    }
}

#[async_trait]
impl ProviderAdapter for Adapter {
    fn provider_id(&self) -> &ProviderId {
        self.inner().provider_id()
    }

    fn family(&self) -> ProviderFamily {
        self.inner().family()
    }

    async fn check(&self, model_id: &str, apikey: &str, api_url: &str) -> CheckResult {
        self.inner().check(model_id, apikey, api_url).await
    }

    async fn models(&self) -> Vec<ModelDescriptor> {
        self.inner().models().await
    }

    fn build_outbound_request(
        &self,
        call: &ChatCall,
        config: &ProviderConfig,
    ) -> Result<HttpRequest, RelayError> {
        self.inner().build_outbound_request(call, config)
    }
}

/// Deadline for catalog calls made by `check` and `models`.
pub const CATALOG_TIMEOUT: Duration = Duration::from_secs(15);

/// Sends a catalog request under [`CATALOG_TIMEOUT`] and decodes the JSON payload.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    transport: &dyn HttpTransport,
    request: HttpRequest,
    provider: &ProviderId,
) -> Result<T, RelayError> {
    let response = transport.send(request.with_timeout(CATALOG_TIMEOUT)).await?;
    if !response.is_success() {
        return Err(RelayError::ProviderRejected {
            status: response.status,
            body: response.body,
        });
    }
    response.json(provider.as_str())
}

/// Folds a catalog listing into a connectivity verdict.
///
/// An empty catalog counts as a failure even when no model id was requested.
pub(crate) fn check_verdict(
    listing: Result<Vec<ModelDescriptor>, RelayError>,
    model_id: &str,
    provider_name: &str,
) -> CheckResult {
    let models = match listing {
        Ok(models) => models,
        Err(err) => return CheckResult::error(check_failure_message(err, provider_name)),
    };
    if models.is_empty() {
        return CheckResult::error(format!("no models available on {provider_name}"));
    }
    let model_id = model_id.trim();
    if model_id.is_empty() || models.iter().any(|model| model.id == model_id) {
        CheckResult::success()
    } else {
        CheckResult::error(format!("model {model_id} not found on {provider_name}"))
    }
}

fn check_failure_message(err: RelayError, provider_name: &str) -> String {
    match err {
        RelayError::InvalidConfig { reason, .. } => reason,
        RelayError::ProviderRejected { status, body } => format!(
            "failed to connect to {provider_name} (status {status}): {}",
            extract_error_message(&String::from_utf8_lossy(&body))
        ),
        RelayError::Transport { message } => {
            format!("failed to connect to {provider_name}: {message}")
        }
        other => other.to_string(),
    }
}

/// Resolves stored config and lists models, degrading to an empty catalog.
pub(crate) async fn list_configured<F, Fut>(
    resolver: &dyn ConfigResolver,
    provider: &ProviderId,
    list: F,
) -> Vec<ModelDescriptor>
where
    F: FnOnce(ProviderConfig) -> Fut,
    Fut: std::future::Future<Output = Result<Vec<ModelDescriptor>, RelayError>>,
{
    let config = match resolver.resolve(provider).await {
        Ok(config) => config,
        Err(err) => {
            warn!(provider = %provider, error = %err, "failed to resolve provider config");
            return Vec::new();
        }
    };
    if !config.is_complete() {
        debug!(provider = %provider, "provider is not configured, skipping model listing");
        return Vec::new();
    }
    match list(config).await {
        Ok(models) => models,
        Err(err) => {
            warn!(provider = %provider, error = %err, "failed to list models");
            Vec::new()
        }
    }
}

/// `{base}/v1/{path}`, without doubling the version when `base` already ends in `/v1`.
pub(crate) fn versioned_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.ends_with("/v1") {
        format!("{base}/{path}")
    } else {
        format!("{base}/v1/{path}")
    }
}

/// Rough multimodal hint for catalogs that do not report capabilities.
pub(crate) fn looks_vision_capable(model_id: &str) -> bool {
    const HINTS: [&str; 8] = [
        "vision", "gpt-4o", "gpt-4.1", "gpt-5", "-vl", "claude-3", "claude-sonnet-4", "claude-opus-4",
    ];
    let lower = model_id.to_ascii_lowercase();
    HINTS.iter().any(|needle| lower.contains(needle))
}
