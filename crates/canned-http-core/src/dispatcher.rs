//! Response dispatch
//!
//! Turns the scripted response of an exchange into instructions for the transport.

use bytes::Bytes;
use http::StatusCode;
use std::time::Duration;

use crate::script::ResponseSpec;

/// What the transport must do after a request matched
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Wait for `delay`, then write the response
    Send(CannedResponse),
    /// Write nothing and close the connection
    CloseWithoutResponse,
}

impl Dispatch {
    pub fn is_close(&self) -> bool {
        matches!(self, Dispatch::CloseWithoutResponse)
    }
}

/// A fully resolved response ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct CannedResponse {
    pub status_code: StatusCode,
    /// Content-Type first, then any scripted headers in order
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub delay: Duration,
}

/// Build the dispatch instruction for an exchange's scripted response
pub fn dispatch(expected: Option<&ResponseSpec>) -> Dispatch {
    let Some(response) = expected else {
        return Dispatch::CloseWithoutResponse;
    };

    let mut headers = Vec::with_capacity(response.headers.len() + 1);
    headers.push(("Content-Type".to_string(), response.content_type.clone()));
    headers.extend(response.headers.iter().cloned());

    Dispatch::Send(CannedResponse {
        status_code: response.status_code,
        headers,
        // Bytes clones share the underlying buffer
        body: response.body.clone(),
        delay: response.delay,
    })
}
