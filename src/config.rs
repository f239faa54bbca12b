use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::types::ProviderId;

const DEFAULT_LISTEN: &str = "127.0.0.1:8787";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// 内置默认 endpoint（用户未配置时使用）
const BUILTIN_ENDPOINTS: &[(&str, &str)] = &[
    ("openai", "https://api.openai.com"),
    ("claude", "https://api.anthropic.com"),
    ("gemini", "https://generativelanguage.googleapis.com"),
    ("deepseek", "https://api.deepseek.com"),
    ("moonshot", "https://api.moonshot.cn"),
    ("qwen", "https://dashscope.aliyuncs.com/compatible-mode/v1"),
    ("openrouter", "https://openrouter.ai/api/v1"),
];

/// 单个 provider 的连接配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub apikey: Option<String>,
}

impl ProviderConfig {
    pub fn new(endpoint: Option<String>, apikey: Option<String>) -> Self {
        Self { endpoint, apikey }
    }

    /// Applies per-request overrides; an override wins over the stored value.
    ///
    /// Blank overrides are ignored so an empty `X-Apikey` header does not wipe a
    /// stored credential.
    pub fn with_overrides(&self, endpoint: Option<&str>, apikey: Option<&str>) -> Self {
        let pick = |override_value: Option<&str>, stored: &Option<String>| {
            override_value
                .filter(|value| !value.trim().is_empty())
                .map(str::to_string)
                .or_else(|| stored.clone())
        };
        Self {
            endpoint: pick(endpoint, &self.endpoint),
            apikey: pick(apikey, &self.apikey),
        }
    }

    /// Credential, or `None` when missing or blank.
    pub fn apikey(&self) -> Option<&str> {
        self.apikey.as_deref().filter(|key| !key.trim().is_empty())
    }

    /// Endpoint, or `None` when missing or blank.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref().filter(|url| !url.trim().is_empty())
    }

    /// `true` when both endpoint and credential are present.
    pub fn is_complete(&self) -> bool {
        self.endpoint().is_some() && self.apikey().is_some()
    }
}

/// Looks up stored configuration for a provider.
///
/// Implementations are read-only and shared by every in-flight request.
#[async_trait]
pub trait ConfigResolver: Send + Sync {
    /// Returns the stored configuration; unknown providers yield an empty config.
    async fn resolve(&self, provider: &ProviderId) -> Result<ProviderConfig, RelayError>;
}

/// Thread-safe resolver handle.
pub type DynConfigResolver = Arc<dyn ConfigResolver>;

/// Resolver over a fixed provider table, filling built-in default endpoints.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigResolver {
    providers: HashMap<String, ProviderConfig>,
}

impl StaticConfigResolver {
    pub fn new(providers: HashMap<String, ProviderConfig>) -> Self {
        Self { providers }
    }

    /// 注册一个 provider 配置
    pub fn with_provider(mut self, id: impl Into<String>, config: ProviderConfig) -> Self {
        self.providers.insert(id.into(), config);
        self
    }

    fn lookup(&self, provider: &str) -> ProviderConfig {
        let mut config = self.providers.get(provider).cloned().unwrap_or_default();
        if config.endpoint().is_none() {
            config.endpoint = default_endpoint(provider).map(str::to_string);
        }
        config
    }
}

#[async_trait]
impl ConfigResolver for StaticConfigResolver {
    async fn resolve(&self, provider: &ProviderId) -> Result<ProviderConfig, RelayError> {
        Ok(self.lookup(provider.as_str()))
    }
}

/// Built-in endpoint for well-known providers.
pub fn default_endpoint(provider: &str) -> Option<&'static str> {
    BUILTIN_ENDPOINTS
        .iter()
        .find(|(id, _)| *id == provider)
        .map(|(_, url)| *url)
}

/// Normalizes a user-supplied endpoint.
///
/// Strings without an `http://` or `https://` scheme get `http://` prefixed and
/// trailing slashes are dropped. Empty input is rejected before any request can be
/// attempted.
///
/// # Examples
///
/// ```
/// use llm_relay::config::normalize_endpoint;
///
/// assert_eq!(normalize_endpoint("api.example.com").unwrap(), "http://api.example.com");
/// assert_eq!(normalize_endpoint("https://api.example.com/").unwrap(), "https://api.example.com");
/// assert!(normalize_endpoint("  ").is_err());
/// ```
pub fn normalize_endpoint(raw: &str) -> Result<String, RelayError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RelayError::invalid_config("endpoint", "invalid endpoint"));
    }
    let lower = trimmed.to_ascii_lowercase();
    let url = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    Ok(url.trim_end_matches('/').to_string())
}

/// 服务整体配置（TOML）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Bearer tokens accepted from callers; empty leaves the relay open.
    #[serde(default)]
    pub access_tokens: Vec<String>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            access_tokens: Vec::new(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            providers: HashMap::new(),
        }
    }
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

impl RelayConfig {
    /// Parses a TOML document and expands `env:NAME` credentials.
    ///
    /// # Examples
    ///
    /// ```
    /// use llm_relay::config::RelayConfig;
    ///
    /// let config = RelayConfig::from_toml_str(r#"
    /// listen = "0.0.0.0:9000"
    ///
    /// [providers.vllm]
    /// endpoint = "10.0.0.5:8000"
    /// "#).unwrap();
    /// assert_eq!(config.listen, "0.0.0.0:9000");
    /// assert_eq!(config.providers["vllm"].endpoint.as_deref(), Some("10.0.0.5:8000"));
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self, RelayError> {
        let mut config: Self = toml::from_str(source)
            .map_err(|err| RelayError::invalid_config("config", err.to_string()))?;
        config.expand_env_credentials(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RelayError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|err| {
            RelayError::invalid_config("config", format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, RelayError> {
        self.listen
            .parse()
            .map_err(|err| RelayError::invalid_config("listen", format!("{err}")))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn resolver(&self) -> StaticConfigResolver {
        StaticConfigResolver::new(self.providers.clone())
    }

    fn expand_env_credentials<F>(&mut self, lookup: F) -> Result<(), RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for (id, provider) in self.providers.iter_mut() {
            let Some(name) = provider
                .apikey
                .as_deref()
                .and_then(|key| key.strip_prefix("env:"))
            else {
                continue;
            };
            let value = lookup(name.trim()).ok_or_else(|| {
                RelayError::invalid_config(
                    format!("providers.{id}.apikey"),
                    format!("environment variable {} is not set", name.trim()),
                )
            })?;
            provider.apikey = Some(value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_endpoint_prefixes_missing_scheme() {
        assert_eq!(
            normalize_endpoint("api.example.com").expect("valid"),
            "http://api.example.com"
        );
        assert_eq!(
            normalize_endpoint("192.168.1.20:8000").expect("valid"),
            "http://192.168.1.20:8000"
        );
        assert_eq!(
            normalize_endpoint("https://api.example.com").expect("valid"),
            "https://api.example.com"
        );
        assert_eq!(
            normalize_endpoint("HTTPS://api.example.com/v1/").expect("valid"),
            "HTTPS://api.example.com/v1"
        );
    }

    #[test]
    fn normalize_endpoint_rejects_empty_input() {
        let err = normalize_endpoint("").expect_err("empty must fail");
        match err {
            RelayError::InvalidConfig { field, reason } => {
                assert_eq!(field, "endpoint");
                assert_eq!(reason, "invalid endpoint");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn overrides_take_precedence_but_blank_overrides_do_not() {
        let stored = ProviderConfig::new(
            Some("https://stored.example.com".to_string()),
            Some("stored-key".to_string()),
        );
        let merged = stored.with_overrides(Some("test.example.com"), Some("adhoc-key"));
        assert_eq!(merged.endpoint(), Some("test.example.com"));
        assert_eq!(merged.apikey(), Some("adhoc-key"));

        let merged = stored.with_overrides(Some(""), Some("  "));
        assert_eq!(merged, stored);
    }

    #[tokio::test]
    async fn static_resolver_fills_builtin_endpoints() {
        let resolver = StaticConfigResolver::default()
            .with_provider("openai", ProviderConfig::new(None, Some("sk".to_string())))
            .with_provider(
                "vllm",
                ProviderConfig::new(Some("gpu-box:8000".to_string()), None),
            );

        let openai = resolver.resolve(&ProviderId::from("openai")).await.expect("ok");
        assert_eq!(openai.endpoint(), Some("https://api.openai.com"));
        assert_eq!(openai.apikey(), Some("sk"));

        let vllm = resolver.resolve(&ProviderId::from("vllm")).await.expect("ok");
        assert_eq!(vllm.endpoint(), Some("gpu-box:8000"));

        let unknown = resolver.resolve(&ProviderId::from("my-llm")).await.expect("ok");
        assert_eq!(unknown, ProviderConfig::default());
    }

    #[test]
    fn relay_config_defaults_and_env_credentials() {
        let mut config: RelayConfig = toml::from_str(
            r#"
            access_tokens = ["t1"]

            [providers.openai]
            apikey = "env:OPENAI_KEY_FOR_TEST"

            [providers.claude]
            apikey = "plain-key"
            "#,
        )
        .expect("parse");
        config
            .expand_env_credentials(|name| {
                (name == "OPENAI_KEY_FOR_TEST").then(|| "sk-from-env".to_string())
            })
            .expect("expand");

        assert_eq!(config.listen, DEFAULT_LISTEN);
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.access_tokens, vec!["t1".to_string()]);
        assert_eq!(
            config.providers["openai"].apikey.as_deref(),
            Some("sk-from-env")
        );
        assert_eq!(config.providers["claude"].apikey.as_deref(), Some("plain-key"));
    }

    #[test]
    fn missing_env_credential_is_a_config_error() {
        let mut config: RelayConfig = toml::from_str(
            r#"
            [providers.gemini]
            apikey = "env:NOT_SET_ANYWHERE"
            "#,
        )
        .expect("parse");
        let err = config
            .expand_env_credentials(|_| None)
            .expect_err("must fail");
        match err {
            RelayError::InvalidConfig { field, reason } => {
                assert_eq!(field, "providers.gemini.apikey");
                assert!(reason.contains("NOT_SET_ANYWHERE"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
