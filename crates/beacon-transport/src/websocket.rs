//! WebSocket transport implementation
//!
//! Frames are UTF-8 text carrying one JSON object each. Binary frames are
//! tolerated with a lossy UTF-8 conversion so permissive clients still get
//! through parsing, where malformed data is handled properly.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage};
use tracing::{debug, error, info};

use crate::error::{Result, TransportError};
use crate::traits::{
    Transport, TransportEvent, TransportReceiver, TransportSender, TransportServer,
};

/// WebSocket configuration
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Maximum message size
    pub max_message_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_message_size: 64 * 1024, // 64KB
        }
    }
}

/// WebSocket sender half
pub struct WebSocketSender {
    tx: mpsc::Sender<WsMessage>,
    connected: Arc<Mutex<bool>>,
}

#[async_trait]
impl TransportSender for WebSocketSender {
    async fn send(&self, text: String) -> Result<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        self.tx
            .send(WsMessage::Text(text))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        *self.connected.lock()
    }

    async fn close(&self) -> Result<()> {
        let _ = self.tx.send(WsMessage::Close(None)).await;
        *self.connected.lock() = false;
        Ok(())
    }
}

/// WebSocket receiver half
pub struct WebSocketReceiver {
    rx: mpsc::Receiver<TransportEvent>,
}

#[async_trait]
impl TransportReceiver for WebSocketReceiver {
    async fn recv(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }
}

/// Spawn writer/reader pumps for a split WebSocket stream and return the
/// channel-backed sender/receiver pair shared by client and server sides.
fn spawn_pumps<S>(
    write: SplitSink<S, WsMessage>,
    read: SplitStream<S>,
) -> (WebSocketSender, WebSocketReceiver)
where
    S: Stream<Item = std::result::Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + Sink<WsMessage>
        + Send
        + 'static,
    <S as Sink<WsMessage>>::Error: std::fmt::Display,
{
    let (send_tx, mut send_rx) = mpsc::channel::<WsMessage>(100);
    let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(100);

    let connected = Arc::new(Mutex::new(true));
    let connected_write = connected.clone();
    let connected_read = connected.clone();

    tokio::spawn(async move {
        let mut write = write;
        while let Some(msg) = send_rx.recv().await {
            if let Err(e) = write.send(msg).await {
                error!("WebSocket write error: {}", e);
                break;
            }
        }
        *connected_write.lock() = false;
    });

    tokio::spawn(async move {
        let mut read = read;

        let _ = event_tx.send(TransportEvent::Connected).await;

        while let Some(result) = read.next().await {
            match result {
                Ok(msg) => match msg {
                    WsMessage::Text(text) => {
                        let _ = event_tx.send(TransportEvent::Data(text)).await;
                    }
                    WsMessage::Binary(data) => {
                        let text = String::from_utf8_lossy(&data).into_owned();
                        let _ = event_tx.send(TransportEvent::Data(text)).await;
                    }
                    WsMessage::Ping(_) | WsMessage::Pong(_) => {
                        // Pong is handled automatically by tungstenite
                        debug!("Received ping/pong");
                    }
                    WsMessage::Close(frame) => {
                        let reason = frame.map(|f| f.reason.to_string());
                        let _ = event_tx.send(TransportEvent::Disconnected { reason }).await;
                        break;
                    }
                    WsMessage::Frame(_) => {}
                },
                Err(e) => {
                    let _ = event_tx.send(TransportEvent::Error(e.to_string())).await;
                    let _ = event_tx
                        .send(TransportEvent::Disconnected {
                            reason: Some(e.to_string()),
                        })
                        .await;
                    break;
                }
            }
        }

        *connected_read.lock() = false;
    });

    (
        WebSocketSender {
            tx: send_tx,
            connected,
        },
        WebSocketReceiver { rx: event_rx },
    )
}

/// Client-side WebSocket transport
pub struct WebSocketTransport;

#[async_trait]
impl Transport for WebSocketTransport {
    type Sender = WebSocketSender;
    type Receiver = WebSocketReceiver;

    async fn connect(url: &str) -> Result<(Self::Sender, Self::Receiver)> {
        info!("Connecting to WebSocket: {}", url);

        let (ws_stream, response) = connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        debug!("WebSocket connected, response: {:?}", response.status());

        let (write, read) = ws_stream.split();
        Ok(spawn_pumps(write, read))
    }
}

/// WebSocket server
pub struct WebSocketServer {
    listener: tokio::net::TcpListener,
    config: WebSocketConfig,
}

impl WebSocketServer {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        info!("WebSocket server listening on {}", addr);

        Ok(Self {
            listener,
            config: WebSocketConfig::default(),
        })
    }

    pub fn with_config(mut self, config: WebSocketConfig) -> Self {
        self.config = config;
        self
    }
}

#[async_trait]
impl TransportServer for WebSocketServer {
    type Sender = WebSocketSender;
    type Receiver = WebSocketReceiver;

    async fn accept(&mut self) -> Result<(Self::Sender, Self::Receiver, SocketAddr)> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        debug!("Accepted TCP connection from {}", addr);

        let mut ws_config = tokio_tungstenite::tungstenite::protocol::WebSocketConfig::default();
        ws_config.max_message_size = Some(self.config.max_message_size);
        let ws_stream = tokio_tungstenite::accept_async_with_config(stream, Some(ws_config))
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        info!("WebSocket client connected from {}", addr);

        let (write, read) = ws_stream.split();
        let (sender, receiver) = spawn_pumps(write, read);
        Ok((sender, receiver, addr))
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(TransportError::Io)
    }
}
