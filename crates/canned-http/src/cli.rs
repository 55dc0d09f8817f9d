//! CLI argument definitions

use canned_http_core::constants::{DEFAULT_CLOSE_GRACE_MS, DEFAULT_HOST, DEFAULT_PORT};
use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "canned-http")]
#[command(version, about = "Serve canned HTTP responses to a scripted sequence of requests")]
#[command(group(ArgGroup::new("script").required(true).args(["json_filename", "yaml_filename"])))]
pub struct Cli {
    /// Port the web server should run on
    #[arg(short, long, env = "CANNED_HTTP_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind to
    #[arg(long, env = "CANNED_HTTP_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// JSON input file for expected requests and replies
    #[arg(long, value_name = "FILE")]
    pub json_filename: Option<PathBuf>,

    /// YAML input file for expected requests and replies
    #[arg(long, value_name = "FILE")]
    pub yaml_filename: Option<PathBuf>,

    /// Milliseconds to wait for a client to hang up after its last exchange
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_CLOSE_GRACE_MS)]
    pub close_grace_ms: u64,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// The script file, whichever flag supplied it
    pub fn script_path(&self) -> Option<&PathBuf> {
        self.json_filename.as_ref().or(self.yaml_filename.as_ref())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }
}
