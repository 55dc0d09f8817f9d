//! Requests as received from the client

use bytes::Bytes;
use http::HeaderMap;

/// A request already parsed by the transport
#[derive(Debug, Clone, Default)]
pub struct ObservedRequest {
    pub method: String,
    /// Request target as sent, including any query string
    pub target: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ObservedRequest {
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Path component of the target, without query or fragment
    pub fn path(&self) -> &str {
        let end = self.target.find(['?', '#']).unwrap_or(self.target.len());
        &self.target[..end]
    }

    /// Header value as a string, if present and printable
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
