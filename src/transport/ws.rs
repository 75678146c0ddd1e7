//! WebSocket transport over tokio-tungstenite.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::{StreamConnection, StreamTransport, TransportError};

/// Production transport: one WebSocket per locator.
#[derive(Debug, Default)]
pub struct WsTransport;

#[async_trait]
impl StreamTransport for WsTransport {
    async fn connect(&self, locator: &str) -> Result<Box<dyn StreamConnection>, TransportError> {
        let (stream, _response) = connect_async(locator)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(Box::new(WsConnection { stream, open: true }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    open: bool,
}

#[async_trait]
impl StreamConnection for WsConnection {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        while let Some(msg) = self.stream.next().await {
            match msg {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Close(_)) => {
                    self.open = false;
                    return None;
                }
                // Binary frames are not part of the protocol; ping/pong is
                // answered by tungstenite itself.
                Ok(_) => continue,
                Err(e) => {
                    self.open = false;
                    return Some(Err(TransportError::Stream(e.to_string())));
                }
            }
        }
        self.open = false;
        None
    }

    async fn send(&mut self, text: &str) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        match self.stream.send(Message::text(text.to_string())).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.open = false;
                Err(TransportError::Stream(e.to_string()))
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn close(&mut self) {
        if self.open {
            let _ = self.stream.close(None).await;
            self.open = false;
        }
    }
}
