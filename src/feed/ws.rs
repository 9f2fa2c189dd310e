//! # feed::ws
//!
//! WebSocket transport for the live price stream (`tokio-tungstenite`).

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::error::TransportError;
use crate::feed::{Connector, FrameStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, subscribe: &str) -> Result<Box<dyn FrameStream>, TransportError> {
        info!(url = %redact(&self.url), "Connecting to price stream...");

        let (mut socket, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        socket
            .send(Message::Text(subscribe.to_string()))
            .await
            .map_err(|e| TransportError::Subscribe(e.to_string()))?;

        Ok(Box::new(WsFrames { socket }))
    }
}

struct WsFrames {
    socket: Socket,
}

#[async_trait]
impl FrameStream for WsFrames {
    async fn next_frame(&mut self) -> Option<Result<String, TransportError>> {
        while let Some(message) = self.socket.next().await {
            match message {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => debug!("non-utf8 binary frame ignored"),
                },
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "close frame received");
                    return None;
                }
                // Ping / Pong / raw frames: tungstenite answers pings itself.
                Ok(_) => {}
                Err(e) => return Some(Err(TransportError::Receive(e.to_string()))),
            }
        }
        None
    }

    async fn close(&mut self) {
        if let Err(e) = self.socket.close(None).await {
            debug!(error = %e, "close handshake failed");
        }
    }
}

/// Strip the query string (it carries the API key) before logging.
fn redact(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
