//! axum WebSocket adapters for the relay's socket seams

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use bytes::BytesMut;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex;

use crate::relay::{FrameSink, FrameSource, RelayError};

/// Split an upgraded socket into the relay's sink and source
pub fn split(socket: WebSocket) -> (WebSocketSink, WebSocketSource) {
    let (sink, stream) = socket.split();
    (
        WebSocketSink {
            inner: Mutex::new(sink),
            closed: AtomicBool::new(false),
        },
        WebSocketSource { inner: stream },
    )
}

/// Sending half; the mutex keeps pump output and pongs from interleaving
pub struct WebSocketSink {
    inner: Mutex<SplitSink<WebSocket, Message>>,
    closed: AtomicBool,
}

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send_frame(&self, frame: &[u8]) -> Result<(), RelayError> {
        let mut sink = self.inner.lock().await;
        sink.send(Message::Binary(frame.to_vec()))
            .await
            .map_err(|e| RelayError::Socket(e.to_string()))
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut sink = self.inner.lock().await;
        if let Err(e) = sink.close().await {
            tracing::debug!("WebSocket close: {}", e);
        }
    }
}

/// Receiving half
pub struct WebSocketSource {
    inner: SplitStream<WebSocket>,
}

#[async_trait]
impl FrameSource for WebSocketSource {
    async fn recv_frame(&mut self, dst: &mut BytesMut) -> Result<bool, RelayError> {
        loop {
            let payload = match self.inner.next().await {
                Some(Ok(Message::Binary(data))) => data,
                // Some clients send text frames; the bytes are the frame
                Some(Ok(Message::Text(text))) => text.into_bytes(),
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return Ok(false),
                Some(Err(e)) => return Err(RelayError::Socket(e.to_string())),
            };

            dst.clear();
            dst.extend_from_slice(&payload);
            return Ok(true);
        }
    }
}
