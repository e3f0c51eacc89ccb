//! HTTP server for the user API
//!
//! Routes:
//! - `/users` (and `/users/`): GET list or `?id=N`, POST create, PUT `?id=N`,
//!   DELETE `?id=N`. Any other verb gets `405 Method not allowed`.
//! - `/health`: liveness plus the stored user count

mod response;
mod router;

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use anyhow::Context;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub use response::{HttpResponse, USERS_ALLOW};
pub use router::{AppState, Router, WriteTimeout, MAX_BODY_BYTES};

/// Listen address and per-request timeouts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            read_timeout: Duration::from_secs(15),
            write_timeout: Duration::from_secs(15),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Handle to a running server that can be used to stop it
pub struct ServerHandle {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
    addr: SocketAddr,
}

impl ServerHandle {
    /// Port actually bound, useful when configured with port 0
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL reachable from this machine
    ///
    /// A wildcard bind is reached through the loopback of the same family.
    pub fn url(&self) -> String {
        let ip = match self.addr.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
            ip => ip,
        };
        format!("http://{}", SocketAddr::new(ip, self.addr.port()))
    }

    /// Stop accepting connections and wait for the accept loop to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            error!("Server task failed: {}", e);
        }
    }
}

/// Bind the listener and serve requests in the background
///
/// The host may be an IP literal or a name such as `localhost`.
pub async fn start_server(config: &ServerConfig, router: Router) -> anyhow::Result<ServerHandle> {
    let addr = config.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let local_addr = listener.local_addr()?;

    info!("Server starting on {}", local_addr);

    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
    let router = Arc::new(router);
    let header_timeout = config.read_timeout;

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Shutting down server on {}", local_addr);
                    break;
                }
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            debug!("Accepted connection from {}", peer);
                            let io = TokioIo::new(stream);
                            let router = Arc::clone(&router);

                            tokio::spawn(async move {
                                let service = service_fn(move |req| {
                                    let router = Arc::clone(&router);
                                    async move { router.handle(req).await }
                                });

                                // A handler past the write timeout errors, which
                                // closes the connection without a response.
                                if let Err(err) = http1::Builder::new()
                                    .timer(TokioTimer::new())
                                    .header_read_timeout(header_timeout)
                                    .serve_connection(io, service)
                                    .await
                                {
                                    debug!("Error serving connection: {:?}", err);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }
    });

    Ok(ServerHandle {
        shutdown_tx,
        task,
        addr: local_addr,
    })
}
