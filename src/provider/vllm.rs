//! Self-hosted vLLM servers.
//!
//! vLLM speaks the Chat Completions protocol, so requests and streams reuse the
//! OpenAI-compatible pieces. The differences are that there is no default endpoint,
//! the credential is optional, and the catalog reports `max_model_len`.

use async_trait::async_trait;
use tracing::debug;

use crate::config::{DynConfigResolver, ProviderConfig, normalize_endpoint};
use crate::error::RelayError;
use crate::http::{DynHttpTransport, HttpRequest};
use crate::provider::openai_compatible::{build_chat_request, list_models};
use crate::provider::{ProviderAdapter, ProviderFamily, check_verdict, list_configured};
use crate::types::{ChatCall, CheckResult, ModelDescriptor, ProviderId};

const PROVIDER_NAME: &str = "VLLM";

pub struct VllmAdapter {
    pub(crate) provider: ProviderId,
    pub(crate) transport: DynHttpTransport,
    pub(crate) resolver: DynConfigResolver,
}

impl VllmAdapter {
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

    async fn list(&self, base: &str, apikey: Option<&str>) -> Result<Vec<ModelDescriptor>, RelayError> {
        list_models(
            self.transport.as_ref(),
            &self.provider,
            PROVIDER_NAME,
            base,
            apikey,
            |_| false,
        )
        .await
    }
}

fn optional_key(apikey: &str) -> Option<&str> {
    Some(apikey).filter(|key| !key.trim().is_empty())
}

#[async_trait]
impl ProviderAdapter for VllmAdapter {
    fn provider_id(&self) -> &ProviderId {
        &self.provider
    }

    fn family(&self) -> ProviderFamily {
        ProviderFamily::Vllm
    }

    async fn check(&self, model_id: &str, apikey: &str, api_url: &str) -> CheckResult {
        let base = match normalize_endpoint(api_url) {
            Ok(base) => base,
            Err(err) => return check_verdict(Err(err), model_id, PROVIDER_NAME),
        };
        debug!(provider = %self.provider, endpoint = %base, "checking vLLM server");
        let listing = self.list(&base, optional_key(apikey)).await;
        check_verdict(listing, model_id, PROVIDER_NAME)
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
        build_chat_request(&base, call, config.apikey())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::StaticConfigResolver;
    use crate::http::reqwest::ReqwestTransport;

    fn adapter() -> VllmAdapter {
        VllmAdapter::new(
            "vllm",
            Arc::new(ReqwestTransport::new(reqwest::Client::new())),
            Arc::new(StaticConfigResolver::default()),
        )
    }

    #[tokio::test]
    async fn empty_endpoint_is_reported_without_network() {
        let result = adapter().check("", "", "").await;
        assert_eq!(result, CheckResult::error("invalid endpoint"));
    }

    #[test]
    fn outbound_request_omits_authorization_without_key() {
        let config = ProviderConfig::new(Some("gpu-box:8000".to_string()), None);
        let request = adapter()
            .build_outbound_request(&ChatCall::default(), &config)
            .expect("request");
        assert_eq!(request.url, "http://gpu-box:8000/v1/chat/completions");
        assert!(request.header("authorization").is_none());
    }

    #[test]
    fn outbound_request_requires_endpoint() {
        let err = adapter()
            .build_outbound_request(&ChatCall::default(), &ProviderConfig::default())
            .expect_err("missing endpoint");
        assert!(matches!(err, RelayError::InvalidConfig { .. }));
    }
}
