//! HTTP listener with the terminal WebSocket route
//!
//! Every upgraded socket gets its own [`RelayEngine`] and buffer pool.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use wssh_core::config::ServerConfig;
use wssh_core::SessionOpener;
use wssh_protocol::BufferPool;

use crate::relay::RelayEngine;
use crate::web::socket;

/// Shared state handed to every upgrade
#[derive(Clone)]
struct AppState {
    opener: Arc<dyn SessionOpener>,
    buffer_capacity: usize,
    max_idle_buffers: usize,
    cancel: CancellationToken,
}

/// WebSocket server bridging each connection to a new SSH session
pub struct RelayServer {
    /// Listener configuration
    config: ServerConfig,
    /// Opens one SSH session per connection
    opener: Arc<dyn SessionOpener>,
    /// Cancellation token for graceful shutdown
    cancel: CancellationToken,
}

impl RelayServer {
    /// Create a new relay server
    pub fn new(
        config: ServerConfig,
        opener: Arc<dyn SessionOpener>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            opener,
            cancel,
        }
    }

    /// Router with the WebSocket route at the configured path
    pub fn router(&self) -> Router {
        let state = AppState {
            opener: Arc::clone(&self.opener),
            buffer_capacity: self.config.buffer_capacity,
            max_idle_buffers: self.config.max_idle_buffers,
            cancel: self.cancel.clone(),
        };

        Router::new()
            .route(&self.config.path, get(ws_handler))
            .with_state(state)
    }

    /// Bind the configured address and serve until cancelled
    pub async fn run(&self) -> Result<()> {
        let bind_addr = &self.config.listen_address;
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("Failed to bind to {}", bind_addr))?;

        self.serve(listener).await
    }

    /// Serve on an already bound listener until cancelled
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!(
            "Relaying ws://{}{} to {}",
            local_addr,
            self.config.path,
            self.opener.target()
        );

        let cancel = self.cancel.clone();
        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
            tracing::info!("HTTP server shutting down");
        })
        .await
        .context("HTTP server failed")?;

        Ok(())
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| {
        let span = tracing::info_span!("connection", %peer);
        handle_socket(socket, state).instrument(span)
    })
}

/// Run one relay for one upgraded socket
async fn handle_socket(socket: WebSocket, state: AppState) {
    tracing::info!("WebSocket connected");

    let pool = BufferPool::with_capacity(state.buffer_capacity, state.max_idle_buffers);
    let engine = RelayEngine::with_pool(Arc::new(pool));

    // Server shutdown ends every live relay
    let signal = engine.shutdown_signal();
    let cancel = state.cancel.clone();
    let watcher = tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {
                if signal.trip() {
                    tracing::debug!("Server shutdown triggered relay shutdown");
                }
            }
            _ = signal.tripped() => {}
        }
    });

    let (sink, source) = socket::split(socket);
    if let Err(e) = engine.run(state.opener.as_ref(), Arc::new(sink), source).await {
        tracing::error!(
            "Failed to open SSH session to {}: {}",
            state.opener.target(),
            e
        );
    }

    watcher.abort();
    tracing::info!("WebSocket disconnected");
}
