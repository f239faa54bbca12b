use crate::config::DynConfigResolver;
use crate::http::DynHttpTransport;
use crate::types::ProviderId;

use super::{Adapter, ClaudeAdapter, GeminiAdapter, OpenAiCompatibleAdapter, VllmAdapter};

/// Maps provider ids to adapters.
///
/// Resolution is total: ids without a dedicated family are served by the
/// OpenAI-compatible adapter. Adapters are cheap handles over the shared transport
/// and resolver, so a fresh one is built per lookup.
#[derive(Clone)]
pub struct AdapterRegistry {
    transport: DynHttpTransport,
    resolver: DynConfigResolver,
}

impl AdapterRegistry {
    pub fn new(transport: DynHttpTransport, resolver: DynConfigResolver) -> Self {
        Self {
            transport,
            resolver,
        }
    }

    pub fn resolve(&self, provider: &ProviderId) -> Adapter {
        let transport = self.transport.clone();
        let resolver = self.resolver.clone();
        let id = provider.clone();
        match provider.as_str() {
            "claude" => Adapter::Claude(ClaudeAdapter::new(id, transport, resolver)),
            "gemini" => Adapter::Gemini(GeminiAdapter::new(id, transport, resolver)),
            "vllm" => Adapter::Vllm(VllmAdapter::new(id, transport, resolver)),
            _ => Adapter::OpenAiCompatible(OpenAiCompatibleAdapter::new(id, transport, resolver)),
        }
    }
}
