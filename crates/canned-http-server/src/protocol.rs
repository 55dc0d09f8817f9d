//! HTTP/1.1 wire format - request heads in, response heads out

use canned_http_core::constants::{MAX_BODY_SIZE, MAX_HEADERS};
use canned_http_core::{CannedResponse, Error, Result};
use http::header::{CONNECTION, CONTENT_LENGTH, EXPECT, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue};

/// Parsed request line and headers
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: String,
    pub target: String,
    pub headers: HeaderMap,
    pub content_length: u64,
    /// Client waits for `100 Continue` before sending the body
    pub expects_continue: bool,
}

/// Parse a complete request head (terminated by an empty line)
pub fn parse_head(buf: &[u8]) -> Result<RequestHead> {
    let mut parsed_headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut parsed_headers);

    match req.parse(buf) {
        Ok(httparse::Status::Complete(_)) => {}
        Ok(httparse::Status::Partial) => return Err(Error::transport("Incomplete HTTP request head")),
        Err(e) => return Err(Error::transport(format!("HTTP parse error: {}", e))),
    }

    let method = req.method.unwrap_or_default().to_string();
    let target = req.path.unwrap_or("/").to_string();

    let mut headers = HeaderMap::with_capacity(req.headers.len());
    for h in req.headers.iter() {
        let name = HeaderName::from_bytes(h.name.as_bytes())
            .map_err(|_| Error::transport(format!("Invalid header name: {}", h.name)))?;
        let value = HeaderValue::from_bytes(h.value)
            .map_err(|_| Error::transport(format!("Invalid value for header {}", h.name)))?;
        headers.append(name, value);
    }

    if headers
        .get_all(TRANSFER_ENCODING)
        .iter()
        .any(|v| v.to_str().map(|s| s.to_ascii_lowercase().contains("chunked")).unwrap_or(true))
    {
        return Err(Error::transport("Chunked request bodies are not supported"));
    }

    let content_length = match headers.get(CONTENT_LENGTH) {
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .ok_or_else(|| Error::transport("Invalid Content-Length header"))?,
        None => 0,
    };
    if content_length > MAX_BODY_SIZE {
        return Err(Error::transport(format!(
            "Request body of {} bytes exceeds limit of {} bytes",
            content_length, MAX_BODY_SIZE
        )));
    }

    let expects_continue = headers
        .get(EXPECT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("100-continue"))
        .unwrap_or(false);

    Ok(RequestHead {
        method,
        target,
        headers,
        content_length,
        expects_continue,
    })
}

/// Interim response sent before reading an expected body
pub const CONTINUE_RESPONSE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

/// Serialize the status line and headers of a canned response
pub fn encode_response_head(response: &CannedResponse, keep_alive: bool) -> Vec<u8> {
    let mut head = format!(
        "HTTP/1.1 {} {}\r\n",
        response.status_code.as_u16(),
        response.status_code.canonical_reason().unwrap_or("")
    );

    for (name, value) in &response.headers {
        // Framing headers are owned by the transport
        if name.eq_ignore_ascii_case(CONTENT_LENGTH.as_str()) || name.eq_ignore_ascii_case(CONNECTION.as_str()) {
            continue;
        }
        head.push_str(&format!("{}: {}\r\n", name, value));
    }

    head.push_str(&format!("Content-Length: {}\r\n", response.body.len()));
    if !keep_alive {
        head.push_str("Connection: close\r\n");
    }
    head.push_str("\r\n");
    head.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::StatusCode;
    use std::time::Duration;

    #[test]
    fn test_parse_head() {
        let head = parse_head(
            b"POST /submit?x=1 HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: 7\r\n\r\n",
        )
        .unwrap();
        assert_eq!(head.method, "POST");
        assert_eq!(head.target, "/submit?x=1");
        assert_eq!(head.content_length, 7);
        assert_eq!(head.headers.get("content-type").unwrap(), "application/json");
        assert!(!head.expects_continue);
    }

    #[test]
    fn test_parse_head_rejects_chunked() {
        let err = parse_head(b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n").unwrap_err();
        assert!(err.to_string().contains("Chunked"));
    }

    #[test]
    fn test_parse_head_invalid() {
        assert!(parse_head(b"NOT HTTP\r\n\r\n").is_err());
        assert!(parse_head(b"GET / HTTP/1.1\r\nContent-Length: abc\r\n\r\n").is_err());
    }

    #[test]
    fn test_parse_head_expect_continue() {
        let head = parse_head(b"PUT /a HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 3\r\n\r\n").unwrap();
        assert!(head.expects_continue);
    }

    #[test]
    fn test_encode_response_head() {
        let response = CannedResponse {
            status_code: StatusCode::NOT_FOUND,
            headers: vec![
                ("Content-Type".to_string(), "text/plain".to_string()),
                ("X-Trace".to_string(), "abc".to_string()),
                ("Content-Length".to_string(), "999".to_string()),
            ],
            body: Bytes::from_static(b"missing"),
            delay: Duration::ZERO,
        };

        let head = String::from_utf8(encode_response_head(&response, true)).unwrap();
        assert_eq!(
            head,
            "HTTP/1.1 404 Not Found\r\nContent-Type: text/plain\r\nX-Trace: abc\r\nContent-Length: 7\r\n\r\n"
        );

        let closing = String::from_utf8(encode_response_head(&response, false)).unwrap();
        assert!(closing.ends_with("Connection: close\r\n\r\n"));
    }
}
