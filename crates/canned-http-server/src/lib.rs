//! canned-http server - HTTP/1.1 transport and the script runner

pub mod protocol;
pub mod runner;
pub mod server;

pub use runner::{RunSummary, Runner, RunnerConfig};
pub use server::{HttpConnection, HttpServer};
