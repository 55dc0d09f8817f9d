//! Constants and default values for canned-http

use std::time::Duration;

/// Default port to listen on
pub const DEFAULT_PORT: u16 = 8080;

/// Default address to bind to
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default time to wait for a client to hang up once its script is exhausted
pub const DEFAULT_CLOSE_GRACE_MS: u64 = 2000;

/// Maximum size of a request line plus headers (64KB)
pub const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Maximum number of request headers
pub const MAX_HEADERS: usize = 64;

/// Maximum request body size (10MB)
pub const MAX_BODY_SIZE: u64 = 10 * 1024 * 1024;

/// Request methods a script may expect
pub const SUPPORTED_METHODS: &[&str] = &["GET", "HEAD", "POST", "PUT", "DELETE", "PATCH", "OPTIONS"];

/// Script file extensions recognised by the loader
pub const SCRIPT_EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

/// Get the default close grace period
pub fn default_close_grace() -> Duration {
    Duration::from_millis(DEFAULT_CLOSE_GRACE_MS)
}

/// Check whether a method is one a script may expect
pub fn is_supported_method(method: &str) -> bool {
    SUPPORTED_METHODS.contains(&method)
}
