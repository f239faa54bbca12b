use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::{ACCEPT, HeaderValue};
use tracing::debug;

use crate::config::{DynConfigResolver, ProviderConfig};
use crate::error::RelayError;
use crate::http::{DynHttpTransport, HttpRequest};
use crate::provider::{ProviderAdapter, ProviderFamily, check_verdict, fetch_json, list_configured};
use crate::types::{ChatCall, CheckResult, ModelDescriptor, ProviderId, ProviderRef};

use super::types::GeminiModelList;

const PROVIDER_NAME: &str = "Gemini";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini adapter.
///
/// Gemini always talks to the public Generative Language API: configured or
/// overridden endpoints are ignored and the key travels in the `key` query
/// parameter.
pub struct GeminiAdapter {
    pub(crate) provider: ProviderId,
    pub(crate) transport: DynHttpTransport,
    pub(crate) resolver: DynConfigResolver,
}

impl GeminiAdapter {
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

    async fn list(&self, apikey: &str) -> Result<Vec<ModelDescriptor>, RelayError> {
        let url = keyed_url(api_url(&["models"])?, apikey, false);
        let listing: GeminiModelList =
            fetch_json(self.transport.as_ref(), HttpRequest::get(url), &self.provider).await?;
        Ok(listing
            .models
            .into_iter()
            .filter(|model| {
                model
                    .supported_generation_methods
                    .iter()
                    .any(|method| method == "generateContent")
            })
            .map(|model| {
                let id = model_path(&model.name).to_string();
                ModelDescriptor {
                    display_name: model.display_name.unwrap_or_else(|| id.clone()),
                    max_tokens: model.input_token_limit,
                    support_vision: true,
                    selected: true,
                    provider: ProviderRef {
                        id: self.provider.to_string(),
                        provider_name: PROVIDER_NAME.to_string(),
                    },
                    id,
                }
            })
            .collect())
    }
}

/// 去掉 `models/` 前缀
fn model_path(model: &str) -> &str {
    model.strip_prefix("models/").unwrap_or(model)
}

/// `API_BASE` with `segments` appended; each segment is percent-encoded.
fn api_url(segments: &[&str]) -> Result<Url, RelayError> {
    let mut url = Url::parse(API_BASE)
        .map_err(|err| RelayError::internal(format!("invalid Gemini base url: {err}")))?;
    url.path_segments_mut()
        .map_err(|()| RelayError::internal("Gemini base url cannot carry a path"))?
        .extend(segments);
    Ok(url)
}

fn keyed_url(mut url: Url, apikey: &str, sse: bool) -> String {
    {
        let mut query = url.query_pairs_mut();
        if sse {
            query.append_pair("alt", "sse");
        }
        query.append_pair("key", apikey);
    }
    url.into()
}

fn missing_model() -> RelayError {
    RelayError::Validation {
        message: "model is required for Gemini".to_string(),
    }
}

/// Streaming URL for `model`; the key is only ever placed in the query.
///
/// The model id stays inside one path segment: `/`, `?` and `#` are escaped.
pub(crate) fn stream_url(model: &str, apikey: &str) -> Result<String, RelayError> {
    let model = model_path(model.trim());
    if model.is_empty() {
        return Err(missing_model());
    }
    let method = format!("{model}:streamGenerateContent");
    Ok(keyed_url(api_url(&["models", &method])?, apikey, true))
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn provider_id(&self) -> &ProviderId {
        &self.provider
    }

    fn family(&self) -> ProviderFamily {
        ProviderFamily::Gemini
    }

    async fn check(&self, model_id: &str, apikey: &str, _api_url: &str) -> CheckResult {
        if apikey.trim().is_empty() {
            return CheckResult::error("missing API key");
        }
        debug!(provider = %self.provider, "checking Gemini connectivity");
        check_verdict(self.list(apikey).await, model_id, PROVIDER_NAME)
    }

    async fn models(&self) -> Vec<ModelDescriptor> {
        list_configured(self.resolver.as_ref(), &self.provider, |config| async move {
            self.list(config.apikey().unwrap_or_default()).await
        })
        .await
    }

    fn build_outbound_request(
        &self,
        call: &ChatCall,
        config: &ProviderConfig,
    ) -> Result<HttpRequest, RelayError> {
        let apikey = config.apikey().ok_or_else(|| {
            RelayError::invalid_config("apikey", format!("missing API key for {}", self.provider))
        })?;
        let model = call
            .model
            .as_deref()
            .ok_or_else(missing_model)?;
        let mut request = HttpRequest::post_json(stream_url(model, apikey)?, call.body.clone());
        request
            .headers
            .insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        Ok(request)
    }
}
