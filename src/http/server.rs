//! # HTTP Server
//!
//! TCP accept loop for the reminder API. Each connection is handled in its
//! own task: read one request, route it, write the response, close.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Graceful shutdown with a grace period for in-flight connections
//! - 1.0.0: Initial accept loop with connection limit

use crate::features::reminders::ReminderScheduler;
use crate::http::protocol::{read_request, HttpResponse, ProtocolError};
use crate::http::routes::route;
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// How long a client gets to send a complete request
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll interval while waiting for connections to drain
const DRAIN_POLL: Duration = Duration::from_millis(25);

pub struct HttpServer {
    scheduler: ReminderScheduler,
    max_connections: usize,
    /// Connections currently being served
    active: Arc<AtomicUsize>,
}

/// Handle to a running server
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    accept_task: JoinHandle<()>,
    active: Arc<AtomicUsize>,
}

impl HttpServer {
    pub fn new(scheduler: ReminderScheduler, max_connections: usize) -> Self {
        HttpServer {
            scheduler,
            max_connections,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Bind `addr` and start accepting connections in a background task
    pub async fn start(self: Arc<Self>, addr: &str) -> Result<ServerHandle> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind HTTP listener on {addr}"))?;
        let local_addr = listener.local_addr()?;
        info!("HTTP server listening on {local_addr}");

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let server = self.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("HTTP server stopped accepting connections");
                        break;
                    }
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => server.clone().spawn_connection(stream, peer),
                        Err(e) => error!("Failed to accept HTTP connection: {e}"),
                    }
                }
            }
        });

        Ok(ServerHandle {
            local_addr,
            shutdown_tx,
            accept_task,
            active: self.active.clone(),
        })
    }

    fn spawn_connection(self: Arc<Self>, stream: TcpStream, peer: SocketAddr) {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;

        if active > self.max_connections {
            warn!(
                "Maximum connections reached ({}), rejecting {peer}",
                self.max_connections
            );
            tokio::spawn(async move {
                let response = HttpResponse::failure(503, "Server busy, try again later");
                if let Err(e) = write_response(stream, &response).await {
                    debug!("Failed to send busy response to {peer}: {e}");
                }
                self.active.fetch_sub(1, Ordering::SeqCst);
            });
            return;
        }

        tokio::spawn(async move {
            if let Err(e) = self.handle_connection(stream, peer).await {
                debug!("Connection from {peer} ended: {e}");
            }
            self.active.fetch_sub(1, Ordering::SeqCst);
        });
    }

    async fn handle_connection(&self, mut stream: TcpStream, peer: SocketAddr) -> Result<()> {
        let response = match tokio::time::timeout(READ_TIMEOUT, read_request(&mut stream)).await {
            Err(_) => {
                warn!("Timed out reading request from {peer}");
                HttpResponse::failure(408, "Request timed out")
            }
            Ok(Err(ProtocolError::ConnectionClosed)) => return Ok(()),
            Ok(Err(e)) => {
                warn!("Rejected request from {peer}: {e}");
                HttpResponse::failure(e.status_code(), &e.to_string())
            }
            Ok(Ok(request)) => {
                let response = route(&self.scheduler, &request);
                debug!(
                    "{} {} from {peer} -> {}",
                    request.method, request.path, response.status
                );
                response
            }
        };

        write_response(stream, &response).await
    }
}

async fn write_response(mut stream: TcpStream, response: &HttpResponse) -> Result<()> {
    stream.write_all(&response.encode()).await?;
    stream.flush().await?;
    stream.shutdown().await?;
    Ok(())
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, then wait up to `grace` for in-flight connections
    pub async fn shutdown(self, grace: Duration) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.accept_task.await {
            warn!("HTTP accept loop ended abnormally: {e}");
        }

        let deadline = tokio::time::Instant::now() + grace;
        while self.active.load(Ordering::SeqCst) > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(DRAIN_POLL).await;
        }

        let remaining = self.active.load(Ordering::SeqCst);
        if remaining > 0 {
            warn!("HTTP server shut down with {remaining} connection(s) still open");
        } else {
            info!("HTTP server shut down cleanly");
        }
    }
}
