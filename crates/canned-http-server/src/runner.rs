//! Script runner - accepts connections and plays each one against its scripted exchanges

use canned_http_core::constants::default_close_grace;
use canned_http_core::{ConnectionSession, Director, Dispatch, Error, Result, Script};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::server::{HttpConnection, HttpServer};

/// Runner settings
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// How long to wait for a client to hang up after its last exchange
    pub close_grace: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            close_grace: default_close_grace(),
        }
    }
}

/// Totals for a completed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub connections: usize,
    pub requests: usize,
}

/// Serves one script until every scripted connection completes or the client deviates
pub struct Runner {
    server: HttpServer,
    director: Director,
    config: RunnerConfig,
}

impl Runner {
    pub fn new(script: Arc<Script>, server: HttpServer, config: RunnerConfig) -> Self {
        Self {
            server,
            director: Director::new(script),
            config,
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// Run until the script is complete (`Ok`) or violated (`Err`)
    pub async fn run(self) -> Result<RunSummary> {
        let total = self.director.script().len();
        let mut summary = RunSummary::default();
        if total == 0 {
            info!("Script has no connections, nothing to serve");
            return Ok(summary);
        }

        info!("Waiting for {} scripted connections on {}", total, self.local_addr());

        // Dropping the set aborts any connection still in flight
        let mut workers: JoinSet<Result<usize>> = JoinSet::new();

        loop {
            tokio::select! {
                accepted = self.server.accept() => {
                    let conn = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            continue;
                        }
                    };

                    let session = self.director.open_connection()?;
                    let close_grace = self.config.close_grace;
                    workers.spawn(serve_connection(conn, session, close_grace));
                }
                Some(joined) = workers.join_next() => {
                    let requests = joined
                        .map_err(|e| Error::transport(format!("Connection worker failed: {}", e)))??;

                    summary.connections += 1;
                    summary.requests += requests;
                    if summary.connections == total {
                        info!(
                            "Script complete: {} connections, {} requests",
                            summary.connections, summary.requests
                        );
                        return Ok(summary);
                    }
                }
            }
        }
    }
}

/// Drive one connection through its session; returns the number of requests served
async fn serve_connection(
    mut conn: HttpConnection,
    mut session: ConnectionSession,
    close_grace: Duration,
) -> Result<usize> {
    let mut served = 0;

    while !session.is_closing() {
        let Some(request) = conn.read_request().await? else {
            session.on_close()?;
            return Ok(served);
        };

        match session.on_request(&request)? {
            Dispatch::Send(response) => {
                if !response.delay.is_zero() {
                    debug!(
                        "Delaying response on connection {} by {:?}",
                        session.number(),
                        response.delay
                    );
                    tokio::time::sleep(response.delay).await;
                }
                let keep_alive = !session.is_closing();
                conn.send_response(&response, keep_alive, request.method != "HEAD")
                    .await?;
            }
            Dispatch::CloseWithoutResponse => {
                debug!("Closing connection {} without a response", session.number());
            }
        }
        served += 1;
    }

    conn.close().await;

    // Anything the client still sends is a request the script does not allow
    match timeout(close_grace, conn.read_request()).await {
        Ok(Ok(Some(request))) => {
            session.on_request(&request)?;
        }
        Ok(Ok(None)) => {}
        Ok(Err(e)) => debug!("Connection {} ended with: {}", session.number(), e),
        Err(_) => debug!(
            "Connection {} still open after {:?}, dropping it",
            session.number(),
            close_grace
        ),
    }

    session.on_close()?;
    Ok(served)
}
