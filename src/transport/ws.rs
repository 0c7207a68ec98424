//! WebSocket connector speaking the `graphql-ws` sub-protocol.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream,
    WebSocketStream,
    connect_async,
    tungstenite::{
        self,
        Message,
        client::IntoClientRequest,
        http::{HeaderValue, header::SEC_WEBSOCKET_PROTOCOL},
    },
};

use super::{Connector, FrameChannel, TransportError};

/// Sub-protocol offered by default during the upgrade.
pub const GRAPHQL_WS: &str = "graphql-ws";

/// Opens [`WsChannel`]s.
#[derive(Clone, Debug)]
pub struct WsConnector {
    subprotocol: String,
}

impl Default for WsConnector {
    fn default() -> Self { Self::new(GRAPHQL_WS) }
}

impl WsConnector {
    /// Create a connector offering `subprotocol` on every upgrade.
    #[must_use]
    pub fn new(subprotocol: impl Into<String>) -> Self {
        Self {
            subprotocol: subprotocol.into(),
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn FrameChannel>, TransportError> {
        let connect_error = |reason: String| TransportError::Connect {
            endpoint: endpoint.to_owned(),
            reason,
        };
        let mut request = endpoint
            .into_client_request()
            .map_err(|e| connect_error(e.to_string()))?;
        let protocol =
            HeaderValue::from_str(&self.subprotocol).map_err(|e| connect_error(e.to_string()))?;
        request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, protocol);

        let (stream, _response) = connect_async(request)
            .await
            .map_err(|e| connect_error(e.to_string()))?;
        tracing::debug!(endpoint, "websocket connected");
        Ok(Box::new(WsChannel { stream }))
    }
}

/// Text-frame view of a WebSocket stream.
pub struct WsChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FrameChannel for WsChannel {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv_text(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(bytes)) => {
                    return Some(
                        String::from_utf8(bytes).map_err(|e| TransportError::Receive(e.to_string())),
                    );
                }
                Ok(Message::Close(_)) => return None,
                // Pings are answered by tungstenite itself.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return None;
                }
                Err(e) => return Some(Err(TransportError::Receive(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.close(None).await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::Send(e.to_string())),
        }
    }
}
