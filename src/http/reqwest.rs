use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Method};

use crate::error::RelayError;

use super::{
    DynHttpTransport, HttpBodyStream, HttpMethod, HttpRequest, HttpResponse, HttpStreamResponse,
    HttpTransport,
};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// 基于 reqwest 的默认 HttpTransport
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// 使用自定义 reqwest::Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// 创建仅设置连接超时的客户端
    ///
    /// No overall request timeout is applied: streams may legitimately run for as
    /// long as the hosting platform allows. Requests carrying
    /// [`HttpRequest::timeout`] get their own deadline.
    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self, RelayError> {
        Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map(Self::new)
            .map_err(|err| RelayError::transport(format!("failed to create reqwest client: {err}")))
    }

    /// 创建默认配置
    pub fn default_client() -> Result<Self, RelayError> {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    fn method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        }
    }

    fn build_request(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let HttpRequest {
            method,
            url,
            headers,
            body,
            timeout,
        } = request;
        let mut builder = self
            .client
            .request(Self::method(method), &url)
            .headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }
        builder
    }

    async fn execute(&self, request: HttpRequest) -> Result<reqwest::Response, RelayError> {
        self.build_request(request)
            .send()
            .await
            .map_err(|err| RelayError::transport(describe(err)))
    }
}

/// Strips the URL from reqwest errors: Gemini URLs carry the API key.
fn describe(err: reqwest::Error) -> String {
    err.without_url().to_string()
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, RelayError> {
        let response = self.execute(request).await?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|err| RelayError::transport(describe(err)))?
            .to_vec();

        Ok(HttpResponse { status, body })
    }

    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, RelayError> {
        let response = self.execute(request).await?;
        let status = response.status().as_u16();
        let stream = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|err| RelayError::transport(describe(err)))
        });
        let body: HttpBodyStream = Box::pin(stream);

        Ok(HttpStreamResponse { status, body })
    }
}

/// 便捷构造线程安全 Transport
pub fn default_dyn_transport() -> Result<DynHttpTransport, RelayError> {
    Ok(Arc::new(ReqwestTransport::default_client()?))
}
