//! WsTransport - WebSocket transport using tokio-tungstenite.
//!
//! The socket is split after the handshake so `send` and `recv` lock
//! different halves and never wait on each other.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

use super::{Transport, TransportError};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport for the push channel.
#[derive(Clone, Default)]
pub struct WsTransport {
    sink: Arc<Mutex<Option<SplitSink<Socket, Message>>>>,
    stream: Arc<Mutex<Option<SplitStream<Socket>>>>,
    connected: Arc<AtomicBool>,
}

impl WsTransport {
    /// Create a disconnected transport.
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsTransport")
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, url: &Url) -> Result<(), TransportError> {
        // Close existing connection if any
        self.close().await.ok();

        let request = url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        let (socket, response) = connect_async(request)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        debug!(status = %response.status(), "websocket handshake complete");

        let (sink, stream) = socket.split();
        *self.sink.lock().await = Some(sink);
        *self.stream.lock().await = Some(stream);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, frame: &str) -> Result<(), TransportError> {
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(TransportError::NotConnected)?;
        sink.send(Message::Text(frame.to_string()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn recv(&self) -> Result<String, TransportError> {
        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(TransportError::NotConnected)?;

        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text),
                Some(Ok(Message::Binary(data))) => {
                    return String::from_utf8(data)
                        .map_err(|e| TransportError::ReceiveFailed(e.to_string()));
                }
                Some(Ok(Message::Close(_))) | None => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(TransportError::ConnectionClosed);
                }
                // Pings are answered by tungstenite on the next write/flush.
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        let sink = self.sink.lock().await.take();
        if let Some(mut sink) = sink {
            sink.close()
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        }
        // The stream half may be held by a pending recv; that recv observes
        // the close frame and returns.
        if let Ok(mut stream) = self.stream.try_lock() {
            stream.take();
        }
        Ok(())
    }
}
