//! HTTP surface: completions, provider check, model listing and health.

use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Request, State};
use axum::http::header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::{DynConfigResolver, RelayConfig};
use crate::dispatch::{DispatchOutcome, Dispatcher, InboundRequest};
use crate::error::RelayError;
use crate::http::DynHttpTransport;
use crate::http::reqwest::ReqwestTransport;
use crate::provider::ProviderAdapter;
use crate::types::{CheckResult, ModelDescriptor, ProviderId};

/// Bearer-token guard for the `/api` routes.
///
/// With no tokens configured every caller is admitted.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    tokens: Arc<HashSet<String>>,
}

impl AccessPolicy {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: HashSet<String> = tokens
            .into_iter()
            .map(Into::into)
            .filter(|token: &String| !token.trim().is_empty())
            .collect();
        Self {
            tokens: Arc::new(tokens),
        }
    }

    pub fn is_open(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Checks `Authorization: Bearer <token>` against the configured set.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), RelayError> {
        if self.is_open() {
            return Ok(());
        }
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim);
        match token {
            Some(token) if self.tokens.contains(token) => Ok(()),
            _ => Err(RelayError::CallerUnauthorized),
        }
    }
}

/// 路由共享状态
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub policy: AccessPolicy,
}

impl AppState {
    pub fn new(transport: DynHttpTransport, resolver: DynConfigResolver, policy: AccessPolicy) -> Self {
        Self {
            dispatcher: Dispatcher::new(transport, resolver),
            policy,
        }
    }

    /// Wires the reqwest transport, the static resolver and the access policy.
    pub fn from_config(config: &RelayConfig) -> Result<Self, RelayError> {
        let transport = ReqwestTransport::with_connect_timeout(config.connect_timeout())?;
        Ok(Self::new(
            Arc::new(transport),
            Arc::new(config.resolver()),
            AccessPolicy::new(config.access_tokens.iter().cloned()),
        ))
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
        (status, Json(self.to_body())).into_response()
    }
}

impl IntoResponse for DispatchOutcome {
    fn into_response(self) -> Response {
        match self {
            Self::Stream { events, .. } => {
                let body = Body::from_stream(
                    events.map(|event| Ok::<_, Infallible>(Bytes::from(event.to_sse()))),
                );
                (
                    [
                        (CONTENT_TYPE, HeaderValue::from_static("text/event-stream")),
                        (CACHE_CONTROL, HeaderValue::from_static("no-cache")),
                    ],
                    body,
                )
                    .into_response()
            }
            Self::Error { status, body } => {
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                (
                    status,
                    [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
                    body,
                )
                    .into_response()
            }
        }
    }
}

/// Builds the relay router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/completions", post(completions))
        .route("/api/providers/{provider}/check", post(check_provider))
        .route("/api/providers/{provider}/models", get(list_models))
        .route_layer(middleware::from_fn_with_state(
            state.policy.clone(),
            require_caller,
        ));

    Router::new()
        .merge(api)
        .route("/health", get(health))
        .with_state(state)
}

/// Serves `router` until ctrl-c.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if state.policy.is_open() {
        warn!("no access tokens configured, /api routes are open");
    }
    info!(addr = ?listener.local_addr().ok(), "llm relay listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}

async fn require_caller(State(policy): State<AccessPolicy>, request: Request, next: Next) -> Response {
    match policy.authorize(request.headers()) {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

async fn completions(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let inbound = InboundRequest::from_parts(&headers, body.to_vec());
    state.dispatcher.dispatch(inbound).await.into_response()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckRequest {
    #[serde(default)]
    model_id: Option<String>,
    #[serde(default)]
    apikey: Option<String>,
    #[serde(default)]
    endpoint: Option<String>,
}

/// Missing credential or endpoint fields fall back to the stored configuration.
async fn check_provider(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    payload: Result<Json<CheckRequest>, JsonRejection>,
) -> Result<Json<CheckResult>, RelayError> {
    let Json(request) = payload.map_err(|rejection| RelayError::Validation {
        message: rejection.body_text(),
    })?;
    let provider = ProviderId::from(provider);
    let stored = state.dispatcher.resolver().resolve(&provider).await?;
    let config = stored.with_overrides(request.endpoint.as_deref(), request.apikey.as_deref());
    let adapter = state.dispatcher.registry().resolve(&provider);
    let result = adapter
        .check(
            request.model_id.as_deref().unwrap_or_default(),
            config.apikey().unwrap_or_default(),
            config.endpoint().unwrap_or_default(),
        )
        .await;
    if let Some(message) = &result.message {
        info!(provider = %provider, %message, "provider check failed");
    }
    Ok(Json(result))
}

async fn list_models(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Json<Vec<ModelDescriptor>> {
    let adapter = state.dispatcher.registry().resolve(&ProviderId::from(provider));
    Json(adapter.models().await)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
