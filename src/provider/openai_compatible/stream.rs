use serde_json::Value;

use crate::stream::{FrameAction, FrameTranslator, SseFrame};

use super::types::{OpenAiDeltaContent, OpenAiStreamChunk};

/// Translates Chat Completions SSE frames (OpenAI, vLLM and other compatible
/// servers).
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenAiFrameTranslator;

impl FrameTranslator for OpenAiFrameTranslator {
    fn translate(&mut self, frame: &SseFrame) -> Vec<FrameAction> {
        let data = frame.data.trim();
        if data.is_empty() {
            return Vec::new();
        }
        if data == "[DONE]" {
            return vec![FrameAction::Complete];
        }
        let chunk: OpenAiStreamChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(err) => {
                return vec![FrameAction::Fail(format!(
                    "failed to parse stream chunk: {err}"
                ))];
            }
        };
        if let Some(error) = &chunk.error {
            return vec![FrameAction::Fail(error_message(error))];
        }

        let mut actions = Vec::new();
        for choice in chunk.choices {
            if let Some(delta) = choice.delta {
                if let Some(reasoning) = delta.reasoning_content.or(delta.reasoning) {
                    actions.push(FrameAction::Reasoning(reasoning));
                }
                match delta.content {
                    Some(OpenAiDeltaContent::Text(text)) => actions.push(FrameAction::Content(text)),
                    Some(OpenAiDeltaContent::Parts(parts)) => {
                        let text: String = parts
                            .iter()
                            .filter(|part| matches!(part.kind.as_str(), "text" | "output_text"))
                            .filter_map(|part| part.text.as_deref())
                            .collect();
                        actions.push(FrameAction::Content(text));
                    }
                    None => {}
                }
            }
            if let Some(reason) = choice.finish_reason {
                actions.push(FrameAction::FinishReason(reason));
            }
        }
        actions
    }
}

fn error_message(error: &Value) -> String {
    match error {
        Value::String(message) => message.clone(),
        other => other
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| other.to_string()),
    }
}
