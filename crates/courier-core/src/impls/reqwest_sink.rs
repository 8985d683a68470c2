//! ReqwestSink - HttpSink over a pooled reqwest client.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;

use crate::domain::HttpMethod;
use crate::error::Result;
use crate::ports::{DispatchRequest, DispatchResponse, HttpSink, SinkFactory, TransportError};

#[derive(Debug, Clone)]
pub struct ReqwestSink {
    client: reqwest::Client,
}

impl ReqwestSink {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// A fresh client (and connection pool) per dispatcher start.
    pub fn factory() -> SinkFactory {
        Arc::new(|| -> Result<Arc<dyn HttpSink>> {
            Ok(Arc::new(ReqwestSink::new()?) as Arc<dyn HttpSink>)
        })
    }
}

fn method(m: HttpMethod) -> Method {
    match m {
        HttpMethod::Post => Method::POST,
        HttpMethod::Get => Method::GET,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Head => Method::HEAD,
    }
}

fn transport_error(err: reqwest::Error, request: &DispatchRequest) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(request.timeout)
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}

#[async_trait]
impl HttpSink for ReqwestSink {
    async fn send(
        &self,
        request: DispatchRequest,
    ) -> std::result::Result<DispatchResponse, TransportError> {
        let mut builder = self
            .client
            .request(method(request.method), &request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(e, &request))?;
        let status = response.status().as_u16();
        // Status decides the outcome; an unreadable body is reported as empty.
        let body = response.text().await.unwrap_or_default();
        Ok(DispatchResponse { status, body })
    }
}
