use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};
use tracing::debug;

use crate::config::{DynConfigResolver, ProviderConfig, default_endpoint, normalize_endpoint};
use crate::error::RelayError;
use crate::http::{DynHttpTransport, HttpRequest, HttpTransport};
use crate::provider::{
    ProviderAdapter, ProviderFamily, check_verdict, fetch_json, list_configured,
    looks_vision_capable, versioned_url,
};
use crate::types::{ChatCall, CheckResult, ModelDescriptor, ProviderId, ProviderRef};

use super::types::OpenAiModelList;

/// Adapter for OpenAI and every server speaking the Chat Completions protocol.
///
/// This is also the fallback for provider ids the registry does not know.
pub struct OpenAiCompatibleAdapter {
    pub(crate) provider: ProviderId,
    pub(crate) transport: DynHttpTransport,
    pub(crate) resolver: DynConfigResolver,
}

impl OpenAiCompatibleAdapter {
    pub fn new(
        provider: impl Into<ProviderId>,
        transport: DynHttpTransport,
        resolver: DynConfigResolver,
    ) -> Self {
        Self {
            provider: provider.into(),
            transport,
            resolver,
        }
    }

    /// Human readable name used in model descriptors and check messages.
    pub fn provider_name(&self) -> String {
        let name = match self.provider.as_str() {
            "openai" => "OpenAI",
            "deepseek" => "DeepSeek",
            "moonshot" => "Moonshot",
            "qwen" => "Qwen",
            "openrouter" => "OpenRouter",
            other => other,
        };
        name.to_string()
    }

    fn check_base_url(&self, api_url: &str) -> Result<String, RelayError> {
        match default_endpoint(self.provider.as_str()) {
            Some(fallback) if api_url.trim().is_empty() => normalize_endpoint(fallback),
            _ => normalize_endpoint(api_url),
        }
    }

    async fn list(&self, base: &str, apikey: Option<&str>) -> Result<Vec<ModelDescriptor>, RelayError> {
        list_models(
            self.transport.as_ref(),
            &self.provider,
            &self.provider_name(),
            base,
            apikey,
            looks_vision_capable,
        )
        .await
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatibleAdapter {
    fn provider_id(&self) -> &ProviderId {
        &self.provider
    }

    fn family(&self) -> ProviderFamily {
        ProviderFamily::OpenAiCompatible
    }

    async fn check(&self, model_id: &str, apikey: &str, api_url: &str) -> CheckResult {
        let base = match self.check_base_url(api_url) {
            Ok(base) => base,
            Err(err) => return check_verdict(Err(err), model_id, &self.provider_name()),
        };
        if apikey.trim().is_empty() {
            return CheckResult::error("missing API key");
        }
        debug!(provider = %self.provider, endpoint = %base, "checking provider connectivity");
        let listing = self.list(&base, Some(apikey)).await;
        check_verdict(listing, model_id, &self.provider_name())
    }

    async fn models(&self) -> Vec<ModelDescriptor> {
        list_configured(self.resolver.as_ref(), &self.provider, |config| async move {
            let base = normalize_endpoint(config.endpoint().unwrap_or_default())?;
            self.list(&base, config.apikey()).await
        })
        .await
    }

    fn build_outbound_request(
        &self,
        call: &ChatCall,
        config: &ProviderConfig,
    ) -> Result<HttpRequest, RelayError> {
        let base = normalize_endpoint(config.endpoint().unwrap_or_default())?;
        let apikey = config.apikey().ok_or_else(|| {
            RelayError::invalid_config("apikey", format!("missing API key for {}", self.provider))
        })?;
        build_chat_request(&base, call, Some(apikey))
    }
}

/// `{base}/v1/chat/completions`, or `{base}/chat/completions` when the base already
/// ends in `/v1`.
pub(crate) fn chat_completions_url(base: &str) -> String {
    versioned_url(base, "chat/completions")
}

pub(crate) fn models_url(base: &str) -> String {
    versioned_url(base, "models")
}

fn with_bearer(request: HttpRequest, apikey: Option<&str>) -> Result<HttpRequest, RelayError> {
    match apikey {
        Some(key) => request.with_header(AUTHORIZATION, &format!("Bearer {key}")),
        None => Ok(request),
    }
}

/// Streaming Chat Completions call; the caller's body is forwarded untouched.
pub(crate) fn build_chat_request(
    base: &str,
    call: &ChatCall,
    apikey: Option<&str>,
) -> Result<HttpRequest, RelayError> {
    let mut request = HttpRequest::post_json(chat_completions_url(base), call.body.clone());
    request
        .headers
        .insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
    with_bearer(request, apikey)
}

/// Lists `GET /v1/models`, shared by the OpenAI-compatible and vLLM adapters.
pub(crate) async fn list_models(
    transport: &dyn HttpTransport,
    provider: &ProviderId,
    provider_name: &str,
    base: &str,
    apikey: Option<&str>,
    support_vision: fn(&str) -> bool,
) -> Result<Vec<ModelDescriptor>, RelayError> {
    let request = with_bearer(HttpRequest::get(models_url(base)), apikey)?;
    let listing: OpenAiModelList = fetch_json(transport, request, provider).await?;
    Ok(listing
        .data
        .into_iter()
        .map(|model| ModelDescriptor {
            display_name: model.id.clone(),
            max_tokens: model.max_model_len.or(model.context_length),
            support_vision: support_vision(&model.id),
            selected: true,
            provider: ProviderRef {
                id: provider.to_string(),
                provider_name: provider_name.to_string(),
            },
            id: model.id,
        })
        .collect())
}
