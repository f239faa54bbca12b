#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream;
use llm_relay::config::{DynConfigResolver, ProviderConfig, StaticConfigResolver};
use llm_relay::error::RelayError;
use llm_relay::http::{
    DynHttpTransport, HttpBodyStream, HttpRequest, HttpResponse, HttpStreamResponse,
    HttpTransport,
};
use llm_relay::provider::AdapterRegistry;

/// One canned upstream answer.
pub enum Scripted {
    Reply { status: u16, chunks: Vec<Vec<u8>> },
    Fail(String),
}

/// In-memory transport replaying scripted answers in order and recording every
/// request it was handed.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, status: u16, body: &str) {
        self.reply_chunks(status, &[body]);
    }

    pub fn reply_chunks(&self, status: u16, chunks: &[&str]) {
        self.push(Scripted::Reply {
            status,
            chunks: chunks.iter().map(|chunk| chunk.as_bytes().to_vec()).collect(),
        });
    }

    pub fn fail(&self, message: &str) {
        self.push(Scripted::Fail(message.to_string()));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn last_request(&self) -> HttpRequest {
        self.requests()
            .pop()
            .expect("transport should have received a request")
    }

    fn push(&self, scripted: Scripted) {
        self.script.lock().expect("script lock").push_back(scripted);
    }

    fn next(&self, request: HttpRequest) -> Result<(u16, Vec<Vec<u8>>), RelayError> {
        self.requests.lock().expect("requests lock").push(request);
        match self.script.lock().expect("script lock").pop_front() {
            Some(Scripted::Reply { status, chunks }) => Ok((status, chunks)),
            Some(Scripted::Fail(message)) => Err(RelayError::transport(message)),
            None => Err(RelayError::transport("no scripted response left")),
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, RelayError> {
        let (status, chunks) = self.next(request)?;
        Ok(HttpResponse {
            status,
            body: chunks.concat(),
        })
    }

    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, RelayError> {
        let (status, chunks) = self.next(request)?;
        Ok(HttpStreamResponse {
            status,
            body: body_stream(chunks),
        })
    }
}

pub fn body_stream(chunks: Vec<Vec<u8>>) -> HttpBodyStream {
    Box::pin(stream::iter(chunks.into_iter().map(Ok)))
}

/// Splits `body` into fixed-size byte chunks.
pub fn chunked(body: &str, size: usize) -> HttpBodyStream {
    body_stream(body.as_bytes().chunks(size).map(<[u8]>::to_vec).collect())
}

pub fn provider(endpoint: Option<&str>, apikey: Option<&str>) -> ProviderConfig {
    ProviderConfig::new(endpoint.map(str::to_string), apikey.map(str::to_string))
}

pub fn dyn_transport(transport: &Arc<ScriptedTransport>) -> DynHttpTransport {
    transport.clone()
}

pub fn dyn_resolver(resolver: StaticConfigResolver) -> DynConfigResolver {
    Arc::new(resolver)
}

pub fn registry(transport: &Arc<ScriptedTransport>, resolver: StaticConfigResolver) -> AdapterRegistry {
    AdapterRegistry::new(dyn_transport(transport), dyn_resolver(resolver))
}
