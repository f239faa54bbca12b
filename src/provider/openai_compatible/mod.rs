//! OpenAI Chat Completions compatible providers.

mod provider;
mod stream;
mod types;

pub use provider::OpenAiCompatibleAdapter;
pub use stream::OpenAiFrameTranslator;

pub(crate) use provider::{build_chat_request, list_models};
