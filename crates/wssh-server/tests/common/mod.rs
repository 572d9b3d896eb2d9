//! In-memory stand-ins for the SSH session and the WebSocket

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use wssh_core::{RemoteSession, SessionError, SessionOpener};
use wssh_protocol::TerminalSize;
use wssh_server::relay::{FrameSink, FrameSource, RelayError};

/// What a mock session saw
#[derive(Default)]
pub struct Stats {
    pub closes: AtomicUsize,
    pub shells: AtomicUsize,
    pub resizes: StdMutex<Vec<TerminalSize>>,
    pub input: StdMutex<Vec<u8>>,
}

impl Stats {
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn shells(&self) -> usize {
        self.shells.load(Ordering::SeqCst)
    }

    pub fn resizes(&self) -> Vec<TerminalSize> {
        self.resizes.lock().unwrap().clone()
    }
}

/// Remote session that echoes input back as output
pub struct MockSession {
    output_tx: mpsc::UnboundedSender<Vec<u8>>,
    output_rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    /// Report end of stream on every read
    eof: bool,
    closed: CancellationToken,
    exited: CancellationToken,
    pub stats: Arc<Stats>,
}

impl MockSession {
    pub fn echo() -> Arc<Self> {
        Arc::new(Self::build(false))
    }

    pub fn at_eof() -> Arc<Self> {
        Arc::new(Self::build(true))
    }

    fn build(eof: bool) -> Self {
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        Self {
            output_tx,
            output_rx: Mutex::new(output_rx),
            eof,
            closed: CancellationToken::new(),
            exited: CancellationToken::new(),
            stats: Arc::new(Stats::default()),
        }
    }

    /// Make the remote shell exit
    pub fn exit(&self) {
        self.exited.cancel();
    }

    /// Emit output as if the remote printed it
    pub fn print(&self, data: &[u8]) {
        let _ = self.output_tx.send(data.to_vec());
    }
}

#[async_trait]
impl RemoteSession for MockSession {
    async fn read(&self, buf: &mut [u8]) -> Result<usize, SessionError> {
        if self.eof {
            return Ok(0);
        }

        // Output printed before an exit is still read, then end of stream
        let mut output = self.output_rx.lock().await;
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Ok(0),
            chunk = output.recv() => match chunk {
                Some(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    Ok(n)
                }
                None => Ok(0),
            },
            _ = self.exited.cancelled() => Ok(0),
        }
    }

    async fn write(&self, data: &[u8]) -> Result<(), SessionError> {
        if self.closed.is_cancelled() {
            return Err(SessionError::Closed);
        }
        self.stats.input.lock().unwrap().extend_from_slice(data);
        self.print(data);
        Ok(())
    }

    async fn resize(&self, size: TerminalSize) -> Result<(), SessionError> {
        if self.closed.is_cancelled() {
            return Err(SessionError::Closed);
        }
        self.stats.resizes.lock().unwrap().push(size);
        Ok(())
    }

    async fn start_shell(&self) -> Result<(), SessionError> {
        self.stats.shells.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn wait(&self) -> Result<Option<u32>, SessionError> {
        tokio::select! {
            _ = self.exited.cancelled() => Ok(Some(0)),
            _ = self.closed.cancelled() => Ok(None),
        }
    }

    async fn close(&self) {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        self.closed.cancel();
    }
}

/// Opener handing out one prepared session, or failing
pub struct MockOpener {
    session: Option<Arc<MockSession>>,
    pub opens: AtomicUsize,
}

impl MockOpener {
    pub fn with(session: Arc<MockSession>) -> Arc<Self> {
        Arc::new(Self {
            session: Some(session),
            opens: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            session: None,
            opens: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SessionOpener for MockOpener {
    async fn open(&self) -> Result<Arc<dyn RemoteSession>, SessionError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match &self.session {
            Some(session) => Ok(Arc::clone(session) as Arc<dyn RemoteSession>),
            None => Err(SessionError::Auth("permission denied".to_string())),
        }
    }

    fn target(&self) -> String {
        "test@mock:22".to_string()
    }
}

/// Server-side half of an in-memory socket: frames to the client
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    /// Per-frame send latency, for a slow client
    delay: Option<Duration>,
    pub closes: AtomicUsize,
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send_frame(&self, frame: &[u8]) -> Result<(), RelayError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.tx
            .send(frame.to_vec())
            .map_err(|_| RelayError::Socket("client went away".to_string()))
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Server-side half of an in-memory socket: frames from the client
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

#[async_trait]
impl FrameSource for ChannelSource {
    async fn recv_frame(&mut self, dst: &mut BytesMut) -> Result<bool, RelayError> {
        match self.rx.recv().await {
            Some(frame) => {
                dst.clear();
                dst.extend_from_slice(&frame);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Client-side ends of an in-memory socket
pub struct Client {
    pub tx: mpsc::UnboundedSender<Vec<u8>>,
    pub rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

/// Create a connected in-memory socket pair
pub fn socket_pair() -> (Client, Arc<ChannelSink>, ChannelSource) {
    socket_pair_with_delay(None)
}

/// Socket pair whose server side takes `delay` to send each frame
pub fn socket_pair_with_delay(
    delay: Option<Duration>,
) -> (Client, Arc<ChannelSink>, ChannelSource) {
    let (to_server, from_client) = mpsc::unbounded_channel();
    let (to_client, from_server) = mpsc::unbounded_channel();
    (
        Client {
            tx: to_server,
            rx: from_server,
        },
        Arc::new(ChannelSink {
            tx: to_client,
            delay,
            closes: AtomicUsize::new(0),
        }),
        ChannelSource { rx: from_client },
    )
}

/// Build a frame: tag byte followed by payload
pub fn frame(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(1 + payload.len());
    frame.push(tag);
    frame.extend_from_slice(payload);
    frame
}
