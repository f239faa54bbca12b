//! Anthropic Claude (Messages API).

mod provider;
mod stream;
mod types;

pub use provider::ClaudeAdapter;
pub use stream::ClaudeFrameTranslator;
