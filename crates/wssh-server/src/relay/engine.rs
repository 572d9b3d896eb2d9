//! Relay engine
//!
//! One engine serves exactly one socket connection. [`RelayEngine::run`]
//! consumes it: open the SSH session, run both pumps plus the shutdown
//! coordinator, start the shell, and tear everything down exactly once.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use wssh_core::{ConnectionState, RemoteSession, SessionError, SessionOpener};
use wssh_protocol::BufferPool;

use crate::relay::pump;
use crate::relay::{FrameSink, FrameSource, ShutdownSignal, StateCell};

/// How long a finished shell's remaining output may take to reach the client
const EXIT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Relays one WebSocket connection to one SSH session
pub struct RelayEngine {
    pool: Arc<BufferPool>,
    signal: Arc<ShutdownSignal>,
    state: Arc<StateCell>,
}

impl RelayEngine {
    /// Create an engine with its own buffer pool
    pub fn new() -> Self {
        Self::with_pool(Arc::new(BufferPool::new()))
    }

    /// Create an engine drawing frame buffers from `pool`
    pub fn with_pool(pool: Arc<BufferPool>) -> Self {
        Self {
            pool,
            signal: Arc::new(ShutdownSignal::new()),
            state: Arc::new(StateCell::default()),
        }
    }

    /// Handle for observing the connection state from outside
    pub fn state(&self) -> Arc<StateCell> {
        Arc::clone(&self.state)
    }

    /// The connection's shutdown signal; tripping it ends the relay
    pub fn shutdown_signal(&self) -> Arc<ShutdownSignal> {
        Arc::clone(&self.signal)
    }

    /// Run the relay until either side goes away
    ///
    /// Returns the factory error if the session could not be opened; the
    /// socket is closed in that case too and no pump is started.
    pub async fn run<S>(
        self,
        opener: &dyn SessionOpener,
        sink: Arc<dyn FrameSink>,
        source: S,
    ) -> Result<(), SessionError>
    where
        S: FrameSource + 'static,
    {
        let RelayEngine {
            pool,
            signal,
            state,
        } = self;

        tracing::debug!("Opening SSH session to {}", opener.target());
        let opened = tokio::select! {
            biased;
            _ = signal.tripped() => None,
            opened = opener.open() => Some(opened),
        };

        let session = match opened {
            Some(Ok(session)) => session,
            Some(Err(e)) => {
                state.set(ConnectionState::Closed);
                sink.close().await;
                return Err(e);
            }
            None => {
                tracing::debug!("Shutdown requested while connecting");
                state.set(ConnectionState::Closed);
                sink.close().await;
                return Ok(());
            }
        };

        state.set(ConnectionState::Active);
        tracing::info!("Relay active to {}", opener.target());

        let tasks = [
            (
                "coordinator",
                tokio::spawn(coordinate(
                    Arc::clone(&session),
                    Arc::clone(&signal),
                    Arc::clone(&state),
                )),
            ),
            (
                "outbound",
                tokio::spawn(pump::outbound(
                    Arc::clone(&session),
                    Arc::clone(&sink),
                    Arc::clone(&pool),
                    Arc::clone(&signal),
                )),
            ),
            (
                "inbound",
                tokio::spawn(pump::inbound(
                    Arc::clone(&session),
                    Arc::clone(&sink),
                    source,
                    Arc::clone(&pool),
                    Arc::clone(&signal),
                )),
            ),
        ];

        supervise(session.as_ref(), &signal).await;

        join(tasks).await;
        sink.close().await;
        state.set(ConnectionState::Closed);
        tracing::info!("Relay closed");

        Ok(())
    }
}

impl Default for RelayEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the shell and wait for it to exit, both raced against shutdown
///
/// After the exit, output still queued is given [`EXIT_DRAIN_TIMEOUT`] to
/// drain before the relay is torn down.
async fn supervise(session: &dyn RemoteSession, signal: &ShutdownSignal) {
    let started = tokio::select! {
        biased;
        _ = signal.tripped() => return,
        started = session.start_shell() => started,
    };
    if let Err(e) = started {
        tracing::error!("Failed to start remote shell: {}", e);
    }

    let exit = tokio::select! {
        biased;
        _ = signal.tripped() => return,
        exit = session.wait() => exit,
    };
    match exit {
        Ok(Some(status)) => tracing::info!("Remote shell exited with status {}", status),
        Ok(None) => tracing::info!("Remote shell exited"),
        Err(e) => tracing::warn!("Waiting for remote shell failed: {}", e),
    }

    // The outbound pump trips the signal itself once it has sent the
    // shell's last output and read end of stream
    if tokio::time::timeout(EXIT_DRAIN_TIMEOUT, signal.tripped())
        .await
        .is_err()
        && signal.trip()
    {
        tracing::debug!("Remote shell exit triggered shutdown");
    }
}

/// Shutdown coordinator: on the first trip, close the session
async fn coordinate(
    session: Arc<dyn RemoteSession>,
    signal: Arc<ShutdownSignal>,
    state: Arc<StateCell>,
) {
    signal.tripped().await;
    state.set(ConnectionState::Closing);
    session.close().await;
}

async fn join(tasks: [(&'static str, JoinHandle<()>); 3]) {
    for (name, task) in tasks {
        if let Err(e) = task.await {
            tracing::warn!("Relay {} task failed: {}", name, e);
        }
    }
}
