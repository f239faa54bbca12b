//! Canonical event stream and the state machine that drives provider translators.
//!
//! Each provider family contributes a [`FrameTranslator`] that maps one complete
//! SSE frame to a list of [`FrameAction`]s. [`TranslatedStream`] owns the upstream
//! body, assembles frames with [`SseDecoder`] and walks the
//! `Streaming -> Done | Failed` transitions, so every family shares the same
//! ordering and termination guarantees.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::http::HttpBodyStream;
use crate::types::CallMetadata;

pub mod sse;

pub use sse::{SseDecoder, SseFrame};

/// Payload of a canonical event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Incremental answer text.
    Delta { content: String },
    /// Incremental reasoning/thinking text, kept apart from the answer.
    Reasoning { content: String },
    /// Upstream signalled completion.
    Done {
        #[serde(
            rename = "finishReason",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        finish_reason: Option<String>,
    },
    /// Upstream failed mid-stream; always the last event.
    Error { message: String },
}

/// Canonical unit emitted to the client.
///
/// # Examples
///
/// ```
/// use llm_relay::stream::{EventPayload, StreamEvent};
/// use llm_relay::types::CallMetadata;
///
/// let event = StreamEvent {
///     payload: EventPayload::Delta { content: "Hi".into() },
///     metadata: CallMetadata { chat_id: None, model: Some("gpt-4o".into()), provider_id: "openai".into() },
/// };
/// let frame = String::from_utf8(event.to_sse()).unwrap();
/// assert_eq!(
///     frame,
///     "event: delta\ndata: {\"type\":\"delta\",\"content\":\"Hi\",\"model\":\"gpt-4o\",\"providerId\":\"openai\"}\n\n"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(flatten)]
    pub payload: EventPayload,
    #[serde(flatten)]
    pub metadata: CallMetadata,
}

impl StreamEvent {
    /// SSE event name for this payload.
    pub fn kind(&self) -> &'static str {
        match self.payload {
            EventPayload::Delta { .. } => "delta",
            EventPayload::Reasoning { .. } => "reasoning",
            EventPayload::Done { .. } => "done",
            EventPayload::Error { .. } => "error",
        }
    }

    /// Returns `true` for `done` and `error` events.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.payload,
            EventPayload::Done { .. } | EventPayload::Error { .. }
        )
    }

    /// Encodes the event as one SSE frame.
    pub fn to_sse(&self) -> Vec<u8> {
        let data = match serde_json::to_string(self) {
            Ok(data) => data,
            Err(err) => {
                serde_json::json!({ "type": "error", "message": format!("failed to encode event: {err}") })
                    .to_string()
            }
        };
        format!("event: {}\ndata: {data}\n\n", self.kind()).into_bytes()
    }
}

/// Boxed canonical stream handed to the HTTP layer.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// What one provider frame means for the canonical stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameAction {
    Content(String),
    Reasoning(String),
    /// Recorded and reported with the final `done` event.
    FinishReason(String),
    /// Explicit end-of-stream marker.
    Complete,
    /// Embedded provider error or unparseable frame.
    Fail(String),
}

/// Provider-specific mapping from SSE frames to [`FrameAction`]s.
pub trait FrameTranslator: Send {
    fn translate(&mut self, frame: &SseFrame) -> Vec<FrameAction>;
}

/// Lifecycle of a translated stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslatorState {
    Streaming,
    Done,
    Failed,
}

/// Drives a [`FrameTranslator`] over an upstream body.
pub struct TranslatedStream<T> {
    body: HttpBodyStream,
    decoder: SseDecoder,
    translator: T,
    metadata: CallMetadata,
    pending: VecDeque<StreamEvent>,
    state: TranslatorState,
    finish_reason: Option<String>,
}

impl<T: FrameTranslator> TranslatedStream<T> {
    pub fn new(body: HttpBodyStream, translator: T, metadata: CallMetadata) -> Self {
        Self {
            body,
            decoder: SseDecoder::new(),
            translator,
            metadata,
            pending: VecDeque::new(),
            state: TranslatorState::Streaming,
            finish_reason: None,
        }
    }

    /// Current lifecycle state; terminal once the `done` or `error` event is queued.
    pub fn state(&self) -> TranslatorState {
        self.state
    }

    fn emit(&mut self, payload: EventPayload) {
        self.pending.push_back(StreamEvent {
            payload,
            metadata: self.metadata.clone(),
        });
    }

    fn apply(&mut self, frame: SseFrame) {
        for action in self.translator.translate(&frame) {
            if self.state != TranslatorState::Streaming {
                break;
            }
            match action {
                FrameAction::Content(content) if !content.is_empty() => {
                    self.emit(EventPayload::Delta { content })
                }
                FrameAction::Reasoning(content) if !content.is_empty() => {
                    self.emit(EventPayload::Reasoning { content })
                }
                FrameAction::Content(_) | FrameAction::Reasoning(_) => {}
                FrameAction::FinishReason(reason) => self.finish_reason = Some(reason),
                FrameAction::Complete => self.complete(),
                FrameAction::Fail(message) => self.fail(message),
            }
        }
    }

    fn complete(&mut self) {
        debug!(
            provider = %self.metadata.provider_id,
            finish_reason = ?self.finish_reason,
            "upstream stream completed"
        );
        self.state = TranslatorState::Done;
        let finish_reason = self.finish_reason.take();
        self.emit(EventPayload::Done { finish_reason });
        self.release_body();
    }

    fn fail(&mut self, message: String) {
        warn!(
            provider = %self.metadata.provider_id,
            chat_id = ?self.metadata.chat_id,
            %message,
            "upstream stream failed"
        );
        self.state = TranslatorState::Failed;
        self.emit(EventPayload::Error { message });
        self.release_body();
    }

    /// Drops the upstream connection as soon as the outcome is known.
    fn release_body(&mut self) {
        self.body = Box::pin(futures_util::stream::empty());
    }

    fn on_body_end(&mut self) {
        if let Some(frame) = self.decoder.finish() {
            self.apply(frame);
        }
        if self.state == TranslatorState::Streaming {
            if self.finish_reason.is_some() {
                self.complete();
            } else {
                self.fail("upstream closed the stream before completion".to_string());
            }
        }
    }
}

impl<T: FrameTranslator + Unpin> Stream for TranslatedStream<T> {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(event));
            }
            if this.state != TranslatorState::Streaming {
                return Poll::Ready(None);
            }
            match this.body.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    for frame in this.decoder.feed(&bytes) {
                        this.apply(frame);
                        if this.state != TranslatorState::Streaming {
                            break;
                        }
                    }
                }
                Poll::Ready(Some(Err(err))) => {
                    this.fail(format!("upstream connection failed: {err}"));
                }
                Poll::Ready(None) => this.on_body_end(),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Boxes a translator over `body` into an [`EventStream`].
pub fn create_event_stream<T>(body: HttpBodyStream, translator: T, metadata: CallMetadata) -> EventStream
where
    T: FrameTranslator + Unpin + 'static,
{
    Box::pin(TranslatedStream::new(body, translator, metadata))
}
