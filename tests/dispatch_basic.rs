mod common;

use std::sync::Arc;

use common::{ScriptedTransport, dyn_resolver, dyn_transport, provider};
use futures_util::StreamExt;
use llm_relay::config::StaticConfigResolver;
use llm_relay::dispatch::{DispatchOutcome, Dispatcher, InboundRequest};
use llm_relay::error::ErrorBody;
use llm_relay::stream::EventPayload;
use serde_json::Value;

const OPENAI_STREAM: &str = concat!(
    "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hi\"},\"finish_reason\":null}]}\n\n",
    "data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
    "data: [DONE]\n\n",
);

const BODY: &str = r#"{"model":"gpt-4o-mini","stream":true,"messages":[{"role":"user","content":"hi"}],"temperature":0.2}"#;

fn dispatcher(transport: &Arc<ScriptedTransport>, resolver: StaticConfigResolver) -> Dispatcher {
    Dispatcher::new(dyn_transport(transport), dyn_resolver(resolver))
}

fn stored_openai() -> StaticConfigResolver {
    StaticConfigResolver::default().with_provider("openai", provider(None, Some("sk-stored")))
}

fn inbound(provider: &str) -> InboundRequest {
    InboundRequest {
        provider: Some(provider.to_string()),
        chat_id: Some("chat-42".to_string()),
        body: BODY.as_bytes().to_vec(),
        ..InboundRequest::default()
    }
}

fn expect_error(outcome: DispatchOutcome) -> (u16, Vec<u8>) {
    match outcome {
        DispatchOutcome::Error { status, body } => (status, body),
        other => panic!("expected error outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn successful_call_streams_canonical_events() {
    let transport = ScriptedTransport::new();
    transport.reply(200, OPENAI_STREAM);

    let outcome = dispatcher(&transport, stored_openai())
        .dispatch(inbound("openai"))
        .await;
    let DispatchOutcome::Stream { metadata, events } = outcome else {
        panic!("expected stream outcome");
    };
    assert_eq!(metadata.chat_id.as_deref(), Some("chat-42"));
    assert_eq!(metadata.model.as_deref(), Some("gpt-4o-mini"));
    assert_eq!(metadata.provider_id, "openai");

    let payloads: Vec<_> = events.map(|event| event.payload).collect().await;
    assert_eq!(
        payloads,
        vec![
            EventPayload::Delta {
                content: "Hi".to_string()
            },
            EventPayload::Done {
                finish_reason: Some("stop".to_string())
            },
        ]
    );

    let request = transport.last_request();
    assert_eq!(request.url, "https://api.openai.com/v1/chat/completions");
    assert_eq!(request.header("authorization"), Some("Bearer sk-stored"));
    assert_eq!(request.body.as_deref(), Some(BODY.as_bytes()), "请求体应逐字节转发");
}

#[tokio::test]
async fn per_request_overrides_win_over_stored_config() {
    let transport = ScriptedTransport::new();
    transport.reply(200, OPENAI_STREAM);

    let mut request = inbound("openai");
    request.apikey = Some("sk-override".to_string());
    request.endpoint = Some("proxy.internal:8080/".to_string());
    request.model = Some("gpt-4o".to_string());

    let outcome = dispatcher(&transport, stored_openai()).dispatch(request).await;
    let DispatchOutcome::Stream { metadata, .. } = outcome else {
        panic!("expected stream outcome");
    };
    assert_eq!(metadata.model.as_deref(), Some("gpt-4o"));

    let sent = transport.last_request();
    assert_eq!(sent.url, "http://proxy.internal:8080/v1/chat/completions");
    assert_eq!(sent.header("authorization"), Some("Bearer sk-override"));
}

#[tokio::test]
async fn upstream_json_error_is_forwarded_verbatim() {
    let transport = ScriptedTransport::new();
    let upstream = r#"{"error":{"message":"Rate limit reached for gpt-4o-mini","type":"requests","code":"rate_limit_exceeded"}}"#;
    transport.reply_chunks(429, &[&upstream[..20], &upstream[20..]]);

    let outcome = dispatcher(&transport, stored_openai())
        .dispatch(inbound("openai"))
        .await;
    let (status, body) = expect_error(outcome);
    assert_eq!(status, 429);
    assert_eq!(body, upstream.as_bytes());
}

#[tokio::test]
async fn upstream_text_error_keeps_status_and_is_wrapped() {
    let transport = ScriptedTransport::new();
    transport.reply(502, "<html>Bad Gateway</html>");

    let outcome = dispatcher(&transport, stored_openai())
        .dispatch(inbound("openai"))
        .await;
    let (status, body) = expect_error(outcome);
    assert_eq!(status, 502);
    let body: ErrorBody = serde_json::from_slice(&body).expect("json error body");
    assert_eq!(body.error, "upstream error");
    assert_eq!(body.details.as_deref(), Some("<html>Bad Gateway</html>"));
}

#[tokio::test]
async fn missing_provider_header_is_a_bad_request() {
    let transport = ScriptedTransport::new();
    let outcome = dispatcher(&transport, stored_openai())
        .dispatch(InboundRequest {
            body: BODY.as_bytes().to_vec(),
            ..InboundRequest::default()
        })
        .await;
    let (status, _) = expect_error(outcome);
    assert_eq!(status, 400);
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn vllm_without_endpoint_fails_before_any_request() {
    let transport = ScriptedTransport::new();
    let outcome = dispatcher(&transport, StaticConfigResolver::default())
        .dispatch(inbound("vllm"))
        .await;
    let (status, body) = expect_error(outcome);
    assert_eq!(status, 500);
    let body: Value = serde_json::from_slice(&body).expect("json");
    assert!(body["details"].as_str().unwrap_or_default().contains("invalid endpoint"));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn missing_stored_credential_is_a_server_fault() {
    let transport = ScriptedTransport::new();
    let outcome = dispatcher(&transport, StaticConfigResolver::default())
        .dispatch(inbound("claude"))
        .await;
    let (status, body) = expect_error(outcome);
    assert_eq!(status, 500);
    let body: ErrorBody = serde_json::from_slice(&body).expect("json");
    assert_eq!(body.error, "Invalid configuration");
    assert_eq!(body.details.as_deref(), Some("apikey: missing API key for claude"));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn gemini_without_model_is_a_bad_request() {
    let transport = ScriptedTransport::new();
    let resolver =
        StaticConfigResolver::default().with_provider("gemini", provider(None, Some("AIza-stored")));
    let mut request = inbound("gemini");
    request.body = br#"{"contents":[]}"#.to_vec();

    let (status, _) = expect_error(dispatcher(&transport, resolver).dispatch(request).await);
    assert_eq!(status, 400);
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn transport_failure_maps_to_bad_gateway() {
    let transport = ScriptedTransport::new();
    transport.fail("connection reset by peer");

    let outcome = dispatcher(&transport, stored_openai())
        .dispatch(inbound("openai"))
        .await;
    let (status, body) = expect_error(outcome);
    assert_eq!(status, 502);
    let body: ErrorBody = serde_json::from_slice(&body).expect("json");
    assert!(body.details.unwrap_or_default().contains("connection reset by peer"));
}

#[tokio::test]
async fn gemini_call_puts_key_in_query_and_ignores_endpoint_override() {
    let transport = ScriptedTransport::new();
    transport.reply(
        200,
        "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"ok\"}]},\"finishReason\":\"STOP\"}]}\n\n",
    );
    let resolver =
        StaticConfigResolver::default().with_provider("gemini", provider(None, Some("AIza-stored")));

    let mut request = inbound("gemini");
    request.model = Some("gemini-2.0-flash".to_string());
    request.endpoint = Some("https://elsewhere.example.com".to_string());
    request.body = br#"{"contents":[{"role":"user","parts":[{"text":"hi"}]}]}"#.to_vec();

    let outcome = dispatcher(&transport, resolver).dispatch(request).await;
    let DispatchOutcome::Stream { events, .. } = outcome else {
        panic!("expected stream outcome");
    };
    let kinds: Vec<_> = events.map(|event| event.kind()).collect().await;
    assert_eq!(kinds, vec!["delta", "done"]);

    let sent = transport.last_request();
    assert!(sent.url.starts_with("https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:streamGenerateContent?"));
    assert!(sent.url.ends_with("key=AIza-stored"));
    assert!(sent.header("authorization").is_none());
}

#[tokio::test]
async fn unknown_provider_uses_openai_compatible_path() {
    let transport = ScriptedTransport::new();
    transport.reply(200, OPENAI_STREAM);

    let mut request = inbound("my-gateway");
    request.endpoint = Some("https://gateway.example.com/v1".to_string());
    request.apikey = Some("gw-key".to_string());

    let outcome = dispatcher(&transport, StaticConfigResolver::default())
        .dispatch(request)
        .await;
    assert!(matches!(outcome, DispatchOutcome::Stream { .. }));
    assert_eq!(
        transport.last_request().url,
        "https://gateway.example.com/v1/chat/completions"
    );
}
