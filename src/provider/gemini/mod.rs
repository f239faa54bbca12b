//! Google Gemini (Generative Language API).

mod provider;
mod stream;
mod types;

pub use provider::GeminiAdapter;
pub use stream::GeminiFrameTranslator;
