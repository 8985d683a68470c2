//! HttpSink port: delivery of a dispatched task's HTTP request.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::HttpMethod;
use crate::error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResponse {
    pub status: u16,
    pub body: String,
}

/// The request never produced an HTTP response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),
}

/// Sends one HTTP request and reports the status code and body.
///
/// Non-2xx statuses are responses, not errors; classification is the
/// dispatcher's job.
#[async_trait]
pub trait HttpSink: Send + Sync {
    async fn send(&self, request: DispatchRequest) -> Result<DispatchResponse, TransportError>;
}

/// Creates the sink a running dispatcher delivers through. Called on every
/// `start()`; the sink is dropped again on `stop()`.
pub type SinkFactory = Arc<dyn Fn() -> error::Result<Arc<dyn HttpSink>> + Send + Sync>;

/// Factory that hands out clones of one caller-owned sink.
pub fn shared_sink(sink: Arc<dyn HttpSink>) -> SinkFactory {
    Arc::new(move || -> error::Result<Arc<dyn HttpSink>> { Ok(Arc::clone(&sink)) })
}
