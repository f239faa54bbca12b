//! 多供应商 LLM 流式转发服务
//!
//! Clients send provider-shaped chat bodies to one endpoint; the relay forwards them
//! to OpenAI-compatible, Claude, Gemini or vLLM backends and normalizes every
//! streaming reply into one canonical event format.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod provider;
pub mod server;
pub mod stream;
pub mod types;

pub use config::{ConfigResolver, ProviderConfig, RelayConfig, StaticConfigResolver};
pub use dispatch::{DispatchOutcome, Dispatcher, InboundRequest};
pub use error::RelayError;
pub use provider::{Adapter, AdapterRegistry, ProviderAdapter, ProviderFamily};
pub use server::{AccessPolicy, AppState, router};
pub use stream::{EventPayload, EventStream, StreamEvent};
pub use types::*;
