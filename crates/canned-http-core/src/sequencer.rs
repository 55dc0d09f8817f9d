//! Connection sequencing
//!
//! The [`Director`] hands each accepted connection the next unconsumed
//! [`ConnectionSpec`](crate::script::ConnectionSpec) in accept order. Each
//! [`ConnectionSession`] then walks that connection's exchanges one request at a
//! time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::dispatcher::{dispatch, Dispatch};
use crate::error::{Error, Result};
use crate::request::ObservedRequest;
use crate::script::{ExchangeSpec, Script};
use crate::validator::{validate, Mismatch};

/// Assigns scripted connections to accepted connections
pub struct Director {
    script: Arc<Script>,
    next_connection: AtomicUsize,
}

impl Director {
    pub fn new(script: Arc<Script>) -> Self {
        Self {
            script,
            next_connection: AtomicUsize::new(0),
        }
    }

    /// Claim the next scripted connection for a newly accepted client
    pub fn open_connection(&self) -> Result<ConnectionSession> {
        let index = self.next_connection.fetch_add(1, Ordering::SeqCst);
        if index >= self.script.len() {
            return Err(Error::UnexpectedConnection {
                connection: index + 1,
            });
        }

        info!("Opened connection {}", index + 1);
        Ok(ConnectionSession::new(Arc::clone(&self.script), index))
    }

    pub fn script(&self) -> &Script {
        &self.script
    }
}

/// Where a connection is in its script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for the request of the exchange at this 0-based position
    AwaitingExchange(usize),
    /// No further requests are allowed; the connection should be closed
    Closing,
    Closed,
}

/// Per-connection state machine, owned by the connection's worker
#[derive(Debug)]
pub struct ConnectionSession {
    script: Arc<Script>,
    index: usize,
    state: ConnectionState,
}

impl ConnectionSession {
    fn new(script: Arc<Script>, index: usize) -> Self {
        let state = if script.connections[index].exchanges.is_empty() {
            ConnectionState::Closing
        } else {
            ConnectionState::AwaitingExchange(0)
        };
        Self {
            script,
            index,
            state,
        }
    }

    /// 1-based connection number used in diagnostics
    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_closing(&self) -> bool {
        matches!(self.state, ConnectionState::Closing | ConnectionState::Closed)
    }

    fn exchanges(&self) -> &[ExchangeSpec] {
        &self.script.connections[self.index].exchanges
    }

    /// Handle a request and decide what to send back
    pub fn on_request(&mut self, request: &ObservedRequest) -> Result<Dispatch> {
        let position = match self.state {
            ConnectionState::AwaitingExchange(position) => position,
            ConnectionState::Closing | ConnectionState::Closed => {
                self.state = ConnectionState::Closed;
                return Err(Error::UnexpectedRequest {
                    method: request.method.clone(),
                    url: request.target.clone(),
                    connection: self.number(),
                });
            }
        };

        let exchange = &self.exchanges()[position];
        if let Err(mismatch) = validate(request, &exchange.request) {
            self.state = ConnectionState::Closed;
            return Err(self.exchange_error(mismatch, position + 1));
        }

        let instruction = dispatch(exchange.response.as_ref());
        let remaining = self.exchanges().len() - (position + 1);
        self.state = if instruction.is_close() || remaining == 0 {
            ConnectionState::Closing
        } else {
            ConnectionState::AwaitingExchange(position + 1)
        };

        debug!(
            "Connection {}, exchange {} matched {} {} ({:?})",
            self.number(),
            position + 1,
            request.method,
            request.target,
            self.state
        );
        Ok(instruction)
    }

    /// Handle the client hanging up
    pub fn on_close(&mut self) -> Result<()> {
        let state = std::mem::replace(&mut self.state, ConnectionState::Closed);
        match state {
            ConnectionState::AwaitingExchange(position) => Err(Error::ConnectionClosedEarly {
                connection: self.number(),
                exchange: position + 1,
            }),
            ConnectionState::Closing | ConnectionState::Closed => {
                info!("Closed connection {}", self.number());
                Ok(())
            }
        }
    }

    fn exchange_error(&self, mismatch: Mismatch, exchange: usize) -> Error {
        match mismatch {
            Mismatch::InvalidJson { side, reason } => Error::InvalidBody {
                side,
                reason,
                connection: self.number(),
                exchange,
            },
            mismatch => Error::Mismatch {
                mismatch,
                connection: self.number(),
                exchange,
            },
        }
    }
}
