use serde_json::Value;

use crate::stream::{FrameAction, FrameTranslator, SseFrame};

/// Translates Anthropic Messages SSE events.
///
/// The event kind is read from the payload's `type` field and falls back to the
/// SSE `event:` line.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClaudeFrameTranslator;

impl FrameTranslator for ClaudeFrameTranslator {
    fn translate(&mut self, frame: &SseFrame) -> Vec<FrameAction> {
        let data = frame.data.trim();
        if data.is_empty() {
            return Vec::new();
        }
        let event: Value = match serde_json::from_str(data) {
            Ok(event) => event,
            Err(err) => {
                return vec![FrameAction::Fail(format!(
                    "failed to parse stream event: {err}"
                ))];
            }
        };
        let kind = event
            .get("type")
            .and_then(Value::as_str)
            .or(frame.event.as_deref())
            .unwrap_or_default();

        match kind {
            "content_block_delta" => {
                let Some(delta) = event.get("delta") else {
                    return Vec::new();
                };
                match delta.get("type").and_then(Value::as_str) {
                    Some("thinking_delta") => delta
                        .get("thinking")
                        .and_then(Value::as_str)
                        .map(|text| vec![FrameAction::Reasoning(text.to_string())])
                        .unwrap_or_default(),
                    // signature_delta / input_json_delta carry no user visible text
                    Some("text_delta") | None => delta
                        .get("text")
                        .and_then(Value::as_str)
                        .map(|text| vec![FrameAction::Content(text.to_string())])
                        .unwrap_or_default(),
                    Some(_) => Vec::new(),
                }
            }
            "message_delta" => event
                .get("delta")
                .and_then(|delta| delta.get("stop_reason"))
                .and_then(Value::as_str)
                .map(|reason| vec![FrameAction::FinishReason(reason.to_string())])
                .unwrap_or_default(),
            "message_stop" => vec![FrameAction::Complete],
            "error" => {
                let message = event
                    .get("error")
                    .and_then(|error| error.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("upstream stream error");
                vec![FrameAction::Fail(message.to_string())]
            }
            _ => Vec::new(),
        }
    }
}
