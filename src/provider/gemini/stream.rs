use serde_json::Value;

use crate::stream::{FrameAction, FrameTranslator, SseFrame};

use super::types::GeminiStreamChunk;

/// Translates `streamGenerateContent?alt=sse` chunks.
///
/// Gemini never sends an explicit end marker; the stream completes when the body
/// ends after a `finishReason` was seen.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeminiFrameTranslator;

impl FrameTranslator for GeminiFrameTranslator {
    fn translate(&mut self, frame: &SseFrame) -> Vec<FrameAction> {
        let data = frame.data.trim();
        if data.is_empty() {
            return Vec::new();
        }
        let chunk: GeminiStreamChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(err) => {
                return vec![FrameAction::Fail(format!(
                    "failed to parse stream chunk: {err}"
                ))];
            }
        };
        if let Some(error) = &chunk.error {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return vec![FrameAction::Fail(message)];
        }
        if let Some(reason) = chunk
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
        {
            return vec![FrameAction::Fail(format!("prompt blocked: {reason}"))];
        }

        let mut actions = Vec::new();
        for candidate in chunk.candidates {
            if let Some(content) = candidate.content {
                for part in content.parts {
                    match part.text {
                        Some(text) if part.thought => actions.push(FrameAction::Reasoning(text)),
                        Some(text) => actions.push(FrameAction::Content(text)),
                        None => {}
                    }
                }
            }
            if let Some(reason) = candidate.finish_reason {
                actions.push(FrameAction::FinishReason(reason));
            }
        }
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(payload: &str) -> SseFrame {
        SseFrame {
            event: None,
            data: payload.to_string(),
        }
    }

    #[test]
    fn text_parts_and_finish_reason() {
        let actions = GeminiFrameTranslator.translate(&data(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hel"},{"text":"lo"}],"role":"model"},"finishReason":"STOP","index":0}],"usageMetadata":{"promptTokenCount":4},"modelVersion":"gemini-2.0-flash"}"#,
        ));
        assert_eq!(
            actions,
            vec![
                FrameAction::Content("Hel".to_string()),
                FrameAction::Content("lo".to_string()),
                FrameAction::FinishReason("STOP".to_string()),
            ]
        );
    }

    #[test]
    fn thought_parts_become_reasoning() {
        let actions = GeminiFrameTranslator.translate(&data(
            r#"{"candidates":[{"content":{"parts":[{"text":"weighing options","thought":true}],"role":"model"}}]}"#,
        ));
        assert_eq!(
            actions,
            vec![FrameAction::Reasoning("weighing options".to_string())]
        );
    }

    #[test]
    fn blocked_prompt_fails() {
        let actions = GeminiFrameTranslator.translate(&data(
            r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#,
        ));
        assert_eq!(
            actions,
            vec![FrameAction::Fail("prompt blocked: SAFETY".to_string())]
        );
    }

    #[test]
    fn error_payload_fails() {
        let actions = GeminiFrameTranslator.translate(&data(
            r#"{"error":{"code":503,"message":"The model is overloaded.","status":"UNAVAILABLE"}}"#,
        ));
        assert_eq!(
            actions,
            vec![FrameAction::Fail("The model is overloaded.".to_string())]
        );
    }
}
