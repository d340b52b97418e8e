// SPDX-License-Identifier: MIT OR Apache-2.0
//! The HTTP transport seam and its `reqwest` implementation.

use crate::classify::{TransportError, TransportFailure};
use crate::request::PreparedRequest;
use async_trait::async_trait;
use rfe_config::EngineConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Outcome of reading a response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// No payload.
    Empty,
    /// Payload decoded as UTF-8 (lossily).
    Text(String),
    /// Payload larger than the size limit; discarded.
    TooLarge,
    /// The read timed out after the status line arrived.
    ReadTimeout,
    /// The read failed for another reason.
    ReadFailed(String),
}

/// A received response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// Status code.
    pub status: u16,
    /// Headers in wire order.
    pub headers: Vec<(String, String)>,
    /// Body outcome.
    pub body: ResponseBody,
}

impl RawResponse {
    /// Response with no headers.
    pub fn new(status: u16, body: ResponseBody) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }

    /// Builder: add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First header named `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// `Location` header.
    pub fn location(&self) -> Option<&str> {
        self.header("location")
    }

    /// `Content-Type` header.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Whether the server asked to close the connection.
    pub fn requests_connection_close(&self) -> bool {
        self.header("connection")
            .is_some_and(|v| v.eq_ignore_ascii_case("close"))
    }
}

// ---------------------------------------------------------------------------
// Transport trait
// ---------------------------------------------------------------------------

/// Sends prepared requests.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send `request` and read the response.
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError>;
}

/// Builds transports; used again whenever the current one must be replaced.
pub trait TransportFactory: Send + Sync {
    /// A new transport with fresh connections.
    fn create(&self) -> Result<Arc<dyn HttpTransport>, TransportError>;
}

/// The transport currently in use, replaceable as a whole.
pub struct TransportHandle {
    current: Arc<dyn HttpTransport>,
    factory: Arc<dyn TransportFactory>,
    generation: u64,
}

impl TransportHandle {
    /// Handle holding a first transport from `factory`.
    pub fn new(factory: Arc<dyn TransportFactory>) -> Result<Self, TransportError> {
        Ok(Self {
            current: factory.create()?,
            factory,
            generation: 0,
        })
    }

    /// The transport in use.
    pub fn current(&self) -> Arc<dyn HttpTransport> {
        Arc::clone(&self.current)
    }

    /// Drop the transport in use and its connections, and build a new one.
    pub fn recreate(&mut self) -> Result<(), TransportError> {
        self.current = self.factory.create()?;
        self.generation += 1;
        debug!(target: "rfe.transport", generation = self.generation, "transport recreated");
        Ok(())
    }

    /// Number of times the transport was replaced.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

// ---------------------------------------------------------------------------
// reqwest implementation
// ---------------------------------------------------------------------------

/// Client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    /// Whole-exchange timeout.
    pub timeout: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Bodies larger than this are discarded.
    pub max_body_bytes: usize,
}

impl TransportSettings {
    /// Settings derived from the engine configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            timeout: config.tcp_timeout(),
            connect_timeout: config.connect_timeout(),
            max_body_bytes: config.max_response_byte_size,
        }
    }
}

/// [`HttpTransport`] over a `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl ReqwestTransport {
    /// Build a client with `settings`.
    ///
    /// Redirects are never followed: a 3xx is the observed response of the
    /// call.
    pub fn new(settings: &TransportSettings) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .connect_timeout(settings.connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| TransportError::from_reqwest(e, ""))?;
        Ok(Self {
            client,
            max_body_bytes: settings.max_body_bytes,
        })
    }

    async fn read_body(&self, mut response: reqwest::Response) -> ResponseBody {
        if response
            .content_length()
            .is_some_and(|len| len > self.max_body_bytes as u64)
        {
            return ResponseBody::TooLarge;
        }
        let mut buf: Vec<u8> = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    if buf.len() + chunk.len() > self.max_body_bytes {
                        return ResponseBody::TooLarge;
                    }
                    buf.extend_from_slice(&chunk);
                }
                Ok(None) => break,
                Err(e) if e.is_timeout() => return ResponseBody::ReadTimeout,
                Err(e) => return ResponseBody::ReadFailed(e.to_string()),
            }
        }
        if buf.is_empty() {
            ResponseBody::Empty
        } else {
            ResponseBody::Text(String::from_utf8_lossy(&buf).into_owned())
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError> {
        let method = reqwest::Method::from_bytes(request.verb.as_str().as_bytes()).map_err(|e| {
            TransportError::new(TransportFailure::Internal, &request.url, e.to_string())
        })?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, &body.content_type)
                .body(body.payload.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, &request.url))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = self.read_body(response).await;
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// Factory of [`ReqwestTransport`]s sharing one set of settings.
#[derive(Debug, Clone)]
pub struct ReqwestFactory {
    settings: TransportSettings,
}

impl ReqwestFactory {
    /// Factory with `settings`.
    pub fn new(settings: TransportSettings) -> Self {
        Self { settings }
    }
}

impl TransportFactory for ReqwestFactory {
    fn create(&self) -> Result<Arc<dyn HttpTransport>, TransportError> {
        Ok(Arc::new(ReqwestTransport::new(&self.settings)?))
    }
}
