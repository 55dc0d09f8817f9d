//! In-memory script model
//!
//! A [`Script`] is an ordered list of expected connections, each an ordered list of
//! exchanges. It is built once by the loader and shared read-only afterwards.

use bytes::Bytes;
use http::{HeaderName, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// Ordered list of connections the client is expected to open
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    pub connections: Vec<ConnectionSpec>,
}

impl Script {
    pub fn new(connections: Vec<ConnectionSpec>) -> Self {
        Self { connections }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

/// Ordered exchanges performed over one persistent connection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionSpec {
    pub exchanges: Vec<ExchangeSpec>,
}

impl ConnectionSpec {
    pub fn new(exchanges: Vec<ExchangeSpec>) -> Self {
        Self { exchanges }
    }
}

/// An expected request and the optional canned response to it
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeSpec {
    pub request: RequestSpec,
    /// `None` means: send nothing and close the connection
    pub response: Option<ResponseSpec>,
}

impl ExchangeSpec {
    pub fn new(request: RequestSpec, response: Option<ResponseSpec>) -> Self {
        Self { request, response }
    }
}

/// How an expected body is compared with a received one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum BodyType {
    /// Byte-for-byte equality
    #[default]
    #[serde(skip)]
    Raw,
    /// Structural equality of JSON documents
    #[serde(rename = "JSON", alias = "json")]
    Json,
}

/// Expected request body, already resolved from a literal or a file
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectedBody {
    pub content: Bytes,
    pub body_type: BodyType,
}

/// Expected request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub method: String,
    pub url: String,
    /// Headers that must be present with exactly these values
    pub headers: Vec<(HeaderName, String)>,
    pub body: Option<ExpectedBody>,
}

impl RequestSpec {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn with_body(mut self, content: impl Into<Bytes>, body_type: BodyType) -> Self {
        self.body = Some(ExpectedBody {
            content: content.into(),
            body_type,
        });
        self
    }
}

/// Canned response
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSpec {
    pub status_code: StatusCode,
    pub content_type: String,
    /// Extra headers sent after Content-Type
    pub headers: Vec<(String, String)>,
    /// Wait before the first byte is written
    pub delay: Duration,
    pub body: Bytes,
}

impl ResponseSpec {
    pub fn new(status_code: StatusCode, content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            status_code,
            content_type: content_type.into(),
            headers: Vec::new(),
            delay: Duration::ZERO,
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}
