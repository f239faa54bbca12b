use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderName, HeaderValue};
use tracing::debug;

use crate::config::{DynConfigResolver, ProviderConfig, default_endpoint, normalize_endpoint};
use crate::error::RelayError;
use crate::http::{DynHttpTransport, HttpRequest};
use crate::provider::{
    ProviderAdapter, ProviderFamily, check_verdict, fetch_json, list_configured,
    looks_vision_capable, versioned_url,
};
use crate::types::{ChatCall, CheckResult, ModelDescriptor, ProviderId, ProviderRef};

use super::types::ClaudeModelList;

const PROVIDER_NAME: &str = "Claude";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API adapter
pub struct ClaudeAdapter {
    pub(crate) provider: ProviderId,
    pub(crate) transport: DynHttpTransport,
    pub(crate) resolver: DynConfigResolver,
}

impl ClaudeAdapter {
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

    async fn list(&self, base: &str, apikey: &str) -> Result<Vec<ModelDescriptor>, RelayError> {
        let request = authorize(HttpRequest::get(versioned_url(base, "models")), apikey)?;
        let listing: ClaudeModelList =
            fetch_json(self.transport.as_ref(), request, &self.provider).await?;
        Ok(listing
            .data
            .into_iter()
            .map(|model| ModelDescriptor {
                display_name: model.display_name.unwrap_or_else(|| model.id.clone()),
                max_tokens: None,
                support_vision: looks_vision_capable(&model.id),
                selected: true,
                provider: ProviderRef {
                    id: self.provider.to_string(),
                    provider_name: PROVIDER_NAME.to_string(),
                },
                id: model.id,
            })
            .collect())
    }
}

/// Anthropic authenticates with `x-api-key`; `Authorization` is never sent.
fn authorize(request: HttpRequest, apikey: &str) -> Result<HttpRequest, RelayError> {
    request
        .with_header(HeaderName::from_static("x-api-key"), apikey)?
        .with_header(HeaderName::from_static("anthropic-version"), ANTHROPIC_VERSION)
}

#[async_trait]
impl ProviderAdapter for ClaudeAdapter {
    fn provider_id(&self) -> &ProviderId {
        &self.provider
    }

    fn family(&self) -> ProviderFamily {
        ProviderFamily::Claude
    }

    async fn check(&self, model_id: &str, apikey: &str, api_url: &str) -> CheckResult {
        let raw = if api_url.trim().is_empty() {
            default_endpoint("claude").unwrap_or_default()
        } else {
            api_url
        };
        let base = match normalize_endpoint(raw) {
            Ok(base) => base,
            Err(err) => return check_verdict(Err(err), model_id, PROVIDER_NAME),
        };
        if apikey.trim().is_empty() {
            return CheckResult::error("missing API key");
        }
        debug!(provider = %self.provider, endpoint = %base, "checking provider connectivity");
        check_verdict(self.list(&base, apikey).await, model_id, PROVIDER_NAME)
    }

    async fn models(&self) -> Vec<ModelDescriptor> {
        list_configured(self.resolver.as_ref(), &self.provider, |config| async move {
            let base = normalize_endpoint(config.endpoint().unwrap_or_default())?;
            self.list(&base, config.apikey().unwrap_or_default()).await
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
        let mut request = HttpRequest::post_json(versioned_url(&base, "messages"), call.body.clone());
        request
            .headers
            .insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        authorize(request, apikey)
    }
}
