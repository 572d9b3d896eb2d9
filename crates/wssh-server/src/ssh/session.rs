//! Established SSH session
//!
//! A russh [`Channel`] can only be waited on from one place, so a driver
//! task owns it together with the connection handle. The session handed to
//! the relay talks to that task through channels: output arrives on a
//! bounded queue, input/resize/shell requests go over a command queue with a
//! oneshot reply each.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use bytes::{Buf, Bytes};
use russh::client::{Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use wssh_core::{RemoteSession, SessionError};
use wssh_protocol::TerminalSize;

use super::factory::ClientHandler;

/// Output chunks buffered between the driver and the relay
const OUTPUT_QUEUE_CAPACITY: usize = 64;

/// Pending commands for the driver
const COMMAND_QUEUE_CAPACITY: usize = 32;

type Reply = oneshot::Sender<Result<(), SessionError>>;

/// Requests from the session handle to the driver task
enum Command {
    Input(Bytes, Reply),
    Resize(TerminalSize, Reply),
    Shell(Reply),
}

/// Final state published by the driver when it stops
#[derive(Debug, Clone, Copy)]
struct Finished {
    exit_status: Option<u32>,
}

/// Reader side of the output queue
struct OutputReader {
    rx: mpsc::Receiver<Bytes>,
    /// Remainder of a chunk larger than the caller's buffer
    pending: Bytes,
}

/// One SSH shell session with a PTY
pub struct SshSession {
    commands: mpsc::Sender<Command>,
    output: Mutex<OutputReader>,
    finished: watch::Receiver<Option<Finished>>,
    closing: CancellationToken,
    closed: AtomicBool,
    driver: StdMutex<Option<JoinHandle<()>>>,
}

impl SshSession {
    /// Take ownership of an established channel and start its driver
    pub(crate) fn spawn(handle: Handle<ClientHandler>, channel: Channel<Msg>) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let (output_tx, output_rx) = mpsc::channel(OUTPUT_QUEUE_CAPACITY);
        let (finished_tx, finished_rx) = watch::channel(None);
        let closing = CancellationToken::new();

        let driver = Driver {
            channel,
            handle,
            commands: command_rx,
            output: output_tx,
            finished: finished_tx,
            closing: closing.clone(),
            replies: VecDeque::new(),
            exit_status: None,
        };
        let driver = tokio::spawn(driver.run());

        Self {
            commands: command_tx,
            output: Mutex::new(OutputReader {
                rx: output_rx,
                pending: Bytes::new(),
            }),
            finished: finished_rx,
            closing,
            closed: AtomicBool::new(false),
            driver: StdMutex::new(Some(driver)),
        }
    }

    /// Send a command and wait for the driver's answer
    async fn request(&self, command: impl FnOnce(Reply) -> Command) -> Result<(), SessionError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SessionError::Closed);
        }

        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| SessionError::Closed)?;

        // A dropped reply means the driver stopped before answering
        rx.await.map_err(|_| SessionError::Closed)?
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn read(&self, buf: &mut [u8]) -> Result<usize, SessionError> {
        let mut guard = self.output.lock().await;
        let output = &mut *guard;

        if output.pending.is_empty() {
            match output.rx.recv().await {
                Some(chunk) => output.pending = chunk,
                None => return Ok(0),
            }
        }

        let n = buf.len().min(output.pending.len());
        buf[..n].copy_from_slice(&output.pending[..n]);
        output.pending.advance(n);
        Ok(n)
    }

    async fn write(&self, data: &[u8]) -> Result<(), SessionError> {
        let data = Bytes::copy_from_slice(data);
        self.request(|reply| Command::Input(data, reply)).await
    }

    async fn resize(&self, size: TerminalSize) -> Result<(), SessionError> {
        self.request(|reply| Command::Resize(size, reply)).await
    }

    async fn start_shell(&self) -> Result<(), SessionError> {
        self.request(Command::Shell).await
    }

    async fn wait(&self) -> Result<Option<u32>, SessionError> {
        let mut finished = self.finished.clone();
        let state = finished
            .wait_for(Option::is_some)
            .await
            .map(|state| *state)
            .map_err(|_| SessionError::Closed)?;

        Ok(state.and_then(|f| f.exit_status))
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        tracing::debug!("Closing SSH session");
        self.closing.cancel();

        let driver = self.driver.lock().ok().and_then(|mut driver| driver.take());
        if let Some(driver) = driver {
            if let Err(e) = driver.await {
                tracing::warn!("SSH session driver failed: {}", e);
            }
        }
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        self.closing.cancel();
    }
}

/// Task owning the russh channel and connection
struct Driver {
    channel: Channel<Msg>,
    handle: Handle<ClientHandler>,
    commands: mpsc::Receiver<Command>,
    output: mpsc::Sender<Bytes>,
    finished: watch::Sender<Option<Finished>>,
    closing: CancellationToken,
    /// Want-reply requests waiting for Success/Failure, in send order
    replies: VecDeque<Reply>,
    exit_status: Option<u32>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.closing.cancelled() => {
                    tracing::debug!("Session close requested");
                    break;
                }
                msg = self.channel.wait() => {
                    if !self.on_channel_message(msg).await {
                        break;
                    }
                }
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        tracing::debug!("Session handle dropped");
                        break;
                    };
                    // Writes can stall on the SSH window; stay responsive to close
                    let closing = self.closing.clone();
                    tokio::select! {
                        _ = self.execute(command) => {}
                        _ = closing.cancelled() => break,
                    }
                }
            }
        }

        self.shutdown().await;
    }

    /// Handle one channel message; returns false when the channel is done
    async fn on_channel_message(&mut self, msg: Option<ChannelMsg>) -> bool {
        match msg {
            Some(ChannelMsg::Data { data }) | Some(ChannelMsg::ExtendedData { data, .. }) => {
                let chunk = Bytes::copy_from_slice(&data);
                tokio::select! {
                    sent = self.output.send(chunk) => sent.is_ok(),
                    _ = self.closing.cancelled() => false,
                }
            }
            Some(ChannelMsg::Success) => {
                if let Some(reply) = self.replies.pop_front() {
                    let _ = reply.send(Ok(()));
                }
                true
            }
            Some(ChannelMsg::Failure) => {
                if let Some(reply) = self.replies.pop_front() {
                    let _ = reply.send(Err(SessionError::Shell(
                        "request rejected by server".to_string(),
                    )));
                }
                true
            }
            Some(ChannelMsg::ExitStatus { exit_status }) => {
                tracing::debug!("Remote process exited with status {}", exit_status);
                self.exit_status = Some(exit_status);
                true
            }
            Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                tracing::info!("Remote process killed by signal {:?}", signal_name);
                true
            }
            Some(ChannelMsg::Eof) => {
                tracing::debug!("Remote side sent EOF");
                true
            }
            Some(ChannelMsg::Close) | None => {
                tracing::debug!("SSH channel closed by remote");
                false
            }
            Some(other) => {
                tracing::trace!("Ignoring channel message {:?}", other);
                true
            }
        }
    }

    async fn execute(&mut self, command: Command) {
        match command {
            Command::Input(data, reply) => {
                let result = self
                    .channel
                    .data(&data[..])
                    .await
                    .map_err(|_| SessionError::Closed);
                let _ = reply.send(result);
            }
            Command::Resize(size, reply) => {
                let result = self
                    .channel
                    .window_change(size.cols, size.rows, 0, 0)
                    .await
                    .map_err(|e| SessionError::Pty(e.to_string()));
                let _ = reply.send(result);
            }
            Command::Shell(reply) => match self.channel.request_shell(true).await {
                Ok(()) => self.replies.push_back(reply),
                Err(e) => {
                    let _ = reply.send(Err(SessionError::Shell(e.to_string())));
                }
            },
        }
    }

    /// Release the channel and connection, then publish the final state
    async fn shutdown(self) {
        let Driver {
            channel,
            handle,
            mut commands,
            output,
            finished,
            replies,
            exit_status,
            ..
        } = self;

        // Readers see end of stream, queued commands fail with Closed
        drop(output);
        commands.close();
        drop(replies);

        if let Err(e) = channel.close().await {
            tracing::trace!("Channel close: {}", e);
        }
        if let Err(e) = handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            tracing::debug!("Disconnect: {}", e);
        }

        finished.send_replace(Some(Finished { exit_status }));
        tracing::debug!("SSH session released");
    }
}
