//! Error types for canned-http

use std::path::PathBuf;

use crate::validator::Mismatch;

/// Which side of an exchange a body came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodySide {
    Expected,
    Received,
}

impl std::fmt::Display for BodySide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BodySide::Expected => write!(f, "Expected"),
            BodySide::Received => write!(f, "Received"),
        }
    }
}

/// canned-http error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid script: {0}")]
    InvalidScript(String),

    #[error("Script file not found: {0}")]
    ScriptNotFound(PathBuf),

    #[error("Failed to read body file {path}: {source}")]
    BodyFileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{mismatch} for connection {connection}, exchange {exchange}")]
    Mismatch {
        mismatch: Mismatch,
        connection: usize,
        exchange: usize,
    },

    #[error("{side} body is not valid JSON for connection {connection}, exchange {exchange}: {reason}")]
    InvalidBody {
        side: BodySide,
        reason: String,
        connection: usize,
        exchange: usize,
    },

    #[error("Unexpected extra request with method '{method}' and URL '{url}' on connection {connection}")]
    UnexpectedRequest {
        method: String,
        url: String,
        connection: usize,
    },

    #[error("Client opened connection {connection} after the script ended")]
    UnexpectedConnection { connection: usize },

    #[error("Client closed connection {connection} instead of performing exchange {exchange}")]
    ConnectionClosedEarly { connection: usize, exchange: usize },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Result type alias for canned-http
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn script<S: Into<String>>(msg: S) -> Self {
        Error::InvalidScript(msg.into())
    }

    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Error::Transport(msg.into())
    }

    /// Whether the client deviated from the script, as opposed to a load or I/O failure
    pub fn is_script_violation(&self) -> bool {
        matches!(
            self,
            Error::Mismatch { .. }
                | Error::InvalidBody { .. }
                | Error::UnexpectedRequest { .. }
                | Error::UnexpectedConnection { .. }
                | Error::ConnectionClosedEarly { .. }
        )
    }
}
