//! HTTP server - TCP listener and per-connection request/response I/O

use bytes::Bytes;
use canned_http_core::constants::MAX_HEAD_SIZE;
use canned_http_core::{CannedResponse, Error, ObservedRequest, Result};
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::protocol::{encode_response_head, parse_head, CONTINUE_RESPONSE};

/// TCP listener accepting HTTP/1.1 clients
pub struct HttpServer {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl HttpServer {
    /// Bind to an address such as `0.0.0.0:8080`
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::transport(format!("Failed to bind {}: {}", addr, e)))?;
        let local_addr = listener.local_addr()?;

        info!("HTTP server listening on {}", local_addr);
        Ok(Self { listener, local_addr })
    }

    /// Accept a new connection
    pub async fn accept(&self) -> Result<HttpConnection> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(|e| Error::transport(format!("Accept failed: {}", e)))?;

        debug!("Accepted connection from {}", peer);
        Ok(HttpConnection::new(stream, peer))
    }

    /// Get the bound address (useful when binding port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Single persistent client connection
pub struct HttpConnection {
    stream: BufReader<TcpStream>,
    peer: SocketAddr,
}

impl HttpConnection {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream: BufReader::new(stream),
            peer,
        }
    }

    /// Read the next request, or `None` if the client hung up between requests
    pub async fn read_request(&mut self) -> Result<Option<ObservedRequest>> {
        let mut head = Vec::new();

        loop {
            let start = head.len();
            // Bound each read so a request line without a newline cannot grow forever
            let limit = (MAX_HEAD_SIZE - start) as u64 + 1;
            let n = match (&mut self.stream).take(limit).read_until(b'\n', &mut head).await {
                Ok(n) => n,
                Err(e) if start == 0 && is_hangup(&e) => return Ok(None),
                Err(e) => return Err(Error::transport(format!("Read error: {}", e))),
            };

            if n == 0 {
                if head.is_empty() {
                    return Ok(None);
                }
                return Err(Error::transport("Connection closed in the middle of a request"));
            }
            if head.len() > MAX_HEAD_SIZE {
                return Err(Error::transport(format!(
                    "Request head exceeds {} bytes",
                    MAX_HEAD_SIZE
                )));
            }

            let line = &head[start..];
            if line == b"\r\n" || line == b"\n" {
                if start == 0 {
                    // Stray line breaks before a request line are ignored
                    head.clear();
                    continue;
                }
                break;
            }
        }

        let request_head = parse_head(&head)?;

        if request_head.expects_continue && request_head.content_length > 0 {
            self.write(CONTINUE_RESPONSE).await?;
        }

        let mut body = vec![0u8; request_head.content_length as usize];
        self.stream
            .read_exact(&mut body)
            .await
            .map_err(|e| Error::transport(format!("Failed to read request body: {}", e)))?;

        debug!(
            "Received {} {} ({} byte body) from {}",
            request_head.method,
            request_head.target,
            body.len(),
            self.peer
        );
        Ok(Some(ObservedRequest {
            method: request_head.method,
            target: request_head.target,
            headers: request_head.headers,
            body: Bytes::from(body),
        }))
    }

    /// Send a response; `keep_alive` is false for the last one on this connection
    pub async fn send_response(&mut self, response: &CannedResponse, keep_alive: bool, include_body: bool) -> Result<()> {
        let head = encode_response_head(response, keep_alive);
        self.write(&head).await?;
        if include_body {
            self.write(&response.body).await?;
        }

        debug!(
            "Sent {} response ({} bytes) to {}",
            response.status_code,
            response.body.len(),
            self.peer
        );
        Ok(())
    }

    /// Stop writing; the client sees end of stream
    pub async fn close(&mut self) {
        if let Err(e) = self.stream.get_mut().shutdown().await {
            debug!("Shutdown of {} failed: {}", self.peer, e);
        }
    }

    async fn write(&mut self, buf: &[u8]) -> Result<()> {
        let stream = self.stream.get_mut();
        stream
            .write_all(buf)
            .await
            .map_err(|e| Error::transport(format!("Write error: {}", e)))?;
        stream
            .flush()
            .await
            .map_err(|e| Error::transport(format!("Flush error: {}", e)))
    }
}

fn is_hangup(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted | std::io::ErrorKind::UnexpectedEof
    )
}
