//! The two data pumps of a relayed connection
//!
//! Each pump checks the shutdown signal at the top of every iteration and
//! races every blocking call against it. Whatever ends a pump (end of
//! stream, I/O error, or the signal itself) trips the signal on the way out.

use std::sync::Arc;

use wssh_core::RemoteSession;
use wssh_protocol::{BufferPool, Heartbeat, Message, MessageType, ProtocolError};

use crate::relay::{FrameSink, FrameSource, ShutdownSignal};

/// Remote output to client: read a chunk, tag it `SessionData`, send it
pub async fn outbound(
    session: Arc<dyn RemoteSession>,
    sink: Arc<dyn FrameSink>,
    pool: Arc<BufferPool>,
    signal: Arc<ShutdownSignal>,
) {
    let mut relayed: u64 = 0;

    loop {
        if signal.is_tripped() {
            break;
        }

        let mut buf = pool.borrow();
        let read = {
            let payload = buf.begin_frame(MessageType::SessionData);
            tokio::select! {
                biased;
                _ = signal.tripped() => break,
                read = session.read(payload) => read,
            }
        };

        let n = match read {
            Ok(0) => {
                tracing::debug!("Remote output reached end of stream");
                break;
            }
            Ok(n) => n,
            Err(e) if e.is_closed() => {
                tracing::debug!("Remote output closed: {}", e);
                break;
            }
            Err(e) => {
                tracing::warn!("Reading remote output failed: {}", e);
                break;
            }
        };

        buf.finish_frame(n);
        let sent = tokio::select! {
            biased;
            _ = signal.tripped() => break,
            sent = sink.send_frame(&buf[..]) => sent,
        };
        if let Err(e) = sent {
            tracing::debug!("Sending to client failed: {}", e);
            break;
        }

        relayed += n as u64;
        tracing::trace!("Relayed {} bytes to client", n);
    }

    if signal.trip() {
        tracing::debug!("Outbound pump triggered shutdown");
    }
    tracing::debug!("Outbound pump stopped after {} bytes", relayed);
}

/// Client to remote: receive a frame, decode it, act on it
pub async fn inbound<S: FrameSource>(
    session: Arc<dyn RemoteSession>,
    sink: Arc<dyn FrameSink>,
    mut source: S,
    pool: Arc<BufferPool>,
    signal: Arc<ShutdownSignal>,
) {
    loop {
        if signal.is_tripped() {
            break;
        }

        let mut buf = pool.borrow();
        let received = tokio::select! {
            biased;
            _ = signal.tripped() => break,
            received = source.recv_frame(&mut buf) => received,
        };

        match received {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("Client closed the socket");
                break;
            }
            Err(e) => {
                tracing::debug!("Receiving from client failed: {}", e);
                break;
            }
        }

        let message = match Message::decode(&buf[..]) {
            Ok(message) => message,
            Err(e) => {
                log_dropped_frame(&e);
                continue;
            }
        };

        match message {
            Message::SessionData(data) => {
                let written = tokio::select! {
                    biased;
                    _ = signal.tripped() => break,
                    written = session.write(data) => written,
                };
                if let Err(e) = written {
                    tracing::debug!("Writing to remote failed: {}", e);
                    break;
                }
                tracing::trace!("Relayed {} bytes to remote", data.len());
            }
            Message::Resize(size) => {
                let resized = tokio::select! {
                    biased;
                    _ = signal.tripped() => break,
                    resized = session.resize(size) => resized,
                };
                match resized {
                    Ok(()) => tracing::debug!("Resized PTY to {}x{}", size.cols, size.rows),
                    Err(e) => tracing::warn!(
                        "Resize to {}x{} failed: {}",
                        size.cols,
                        size.rows,
                        e
                    ),
                }
            }
            Message::Heartbeat(Heartbeat::Ping) => {
                if let Err(e) = send_pong(sink.as_ref(), &pool).await {
                    tracing::debug!("Sending pong failed: {}", e);
                    break;
                }
            }
            Message::Heartbeat(_) => {
                tracing::trace!("Ignoring heartbeat that is not a ping");
            }
        }
    }

    if signal.trip() {
        tracing::debug!("Inbound pump triggered shutdown");
    }
    tracing::debug!("Inbound pump stopped");
}

async fn send_pong(sink: &dyn FrameSink, pool: &BufferPool) -> Result<(), crate::relay::RelayError> {
    let mut reply = pool.borrow();
    Message::pong().encode(&mut reply)?;
    sink.send_frame(&reply[..]).await
}

fn log_dropped_frame(error: &ProtocolError) {
    if error.is_unknown_type() {
        tracing::warn!("Dropping frame: {}", error);
    } else {
        tracing::warn!("Dropping malformed frame: {}", error);
    }
}
