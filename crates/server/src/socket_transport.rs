use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::{net::TcpStream, sync::Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use docket_slack::events::{parse_socket_message, SocketMessage};
use docket_slack::events::SlackEnvelope;
use docket_slack::socket::{SocketTransport, TransportError};

use crate::slack_api::{SlackApiError, SlackWebClient};

type SocketStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Source of Socket Mode WebSocket URLs. Each URL is single-use, so every
/// reconnect asks for a new one.
#[async_trait]
pub trait ConnectionOpener: Send + Sync {
    async fn open_connection(&self) -> Result<String, SlackApiError>;
}

#[async_trait]
impl ConnectionOpener for SlackWebClient {
    async fn open_connection(&self) -> Result<String, SlackApiError> {
        SlackWebClient::open_connection(self).await
    }
}

pub struct WebSocketTransport {
    opener: Arc<dyn ConnectionOpener>,
    stream: Mutex<Option<SocketStream>>,
}

impl WebSocketTransport {
    pub fn new(opener: Arc<dyn ConnectionOpener>) -> Self {
        Self { opener, stream: Mutex::new(None) }
    }
}

#[async_trait]
impl SocketTransport for WebSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let url = self
            .opener
            .open_connection()
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        *self.stream.lock().await = Some(stream);
        info!(event_name = "ingress.slack.socket_opened", "socket mode websocket opened");
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let mut guard = self.stream.lock().await;
        let Some(stream) = guard.as_mut() else {
            return Ok(None);
        };

        while let Some(frame) = stream.next().await {
            let frame = frame.map_err(|error| TransportError::Receive(error.to_string()))?;
            match frame {
                Message::Text(text) => match parse_socket_message(text.as_str()) {
                    Ok(SocketMessage::Envelope(envelope)) => return Ok(Some(envelope)),
                    Ok(SocketMessage::Hello) => {
                        debug!(event_name = "ingress.slack.hello", "socket mode hello received");
                    }
                    Ok(SocketMessage::Disconnect { reason }) => {
                        return Err(TransportError::Refresh(reason));
                    }
                    Err(error) => {
                        warn!(
                            event_name = "ingress.slack.frame_rejected",
                            error = %error,
                            "ignoring unreadable socket frame"
                        );
                    }
                },
                Message::Close(frame) => {
                    let reason = frame
                        .map(|frame| frame.reason.as_str().to_owned())
                        .unwrap_or_else(|| "socket closed".to_owned());
                    return Err(TransportError::Refresh(reason));
                }
                // Pings are answered by tungstenite itself.
                _ => {}
            }
        }

        Err(TransportError::Refresh("socket stream ended".to_owned()))
    }

    async fn acknowledge(
        &self,
        envelope_id: &str,
        payload: Option<serde_json::Value>,
    ) -> Result<(), TransportError> {
        let mut ack = json!({ "envelope_id": envelope_id });
        if let Some(payload) = payload {
            ack["payload"] = payload;
        }

        let mut guard = self.stream.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| TransportError::Acknowledge("socket is not connected".to_owned()))?;
        stream
            .send(Message::Text(ack.to_string().into()))
            .await
            .map_err(|error| TransportError::Acknowledge(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let Some(mut stream) = self.stream.lock().await.take() else {
            return Ok(());
        };
        stream.close(None).await.map_err(|error| TransportError::Disconnect(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use futures::{SinkExt, StreamExt};
    use serde_json::{json, Value};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_tungstenite::{accept_async, tungstenite::Message};

    use docket_slack::events::SlackEvent;
    use docket_slack::socket::{SocketTransport, TransportError};

    use super::{ConnectionOpener, WebSocketTransport};
    use crate::slack_api::SlackApiError;

    struct FixedUrl(String);

    #[async_trait]
    impl ConnectionOpener for FixedUrl {
        async fn open_connection(&self) -> Result<String, SlackApiError> {
            Ok(self.0.clone())
        }
    }

    /// Plays Slack's side of one connection and hands back the first frame
    /// the client sends.
    async fn spawn_socket_server() -> (String, oneshot::Receiver<Value>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("address");
        let (ack_tx, ack_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.expect("accept");
            let mut socket = accept_async(tcp).await.expect("handshake");

            let hello = json!({ "type": "hello", "num_connections": 1 });
            socket.send(Message::Text(hello.to_string().into())).await.expect("hello");
            let envelope = json!({
                "type": "slash_commands",
                "envelope_id": "env-ws-1",
                "payload": {
                    "command": "/listitems",
                    "text": "",
                    "channel_id": "C1",
                    "user_id": "U1",
                    "trigger_id": "t-1"
                }
            });
            socket.send(Message::Text(envelope.to_string().into())).await.expect("envelope");

            while let Some(Ok(frame)) = socket.next().await {
                if let Message::Text(text) = frame {
                    let _ = ack_tx.send(serde_json::from_str(text.as_str()).expect("ack json"));
                    break;
                }
            }

            let disconnect = json!({ "type": "disconnect", "reason": "refresh_requested" });
            let _ = socket.send(Message::Text(disconnect.to_string().into())).await;
        });

        (format!("ws://{address}"), ack_rx)
    }

    #[tokio::test]
    async fn reads_envelopes_acks_and_reports_refresh() {
        let (url, ack_rx) = spawn_socket_server().await;
        let transport = WebSocketTransport::new(Arc::new(FixedUrl(url)));

        transport.connect().await.expect("connect");
        let envelope = transport.next_envelope().await.expect("read").expect("envelope");
        assert_eq!(envelope.envelope_id, "env-ws-1");
        assert!(matches!(envelope.event, SlackEvent::SlashCommand(ref command) if command.command == "/listitems"));

        transport
            .acknowledge(&envelope.envelope_id, Some(json!({ "response_action": "clear" })))
            .await
            .expect("ack");
        let ack = ack_rx.await.expect("ack forwarded");
        assert_eq!(ack, json!({ "envelope_id": "env-ws-1", "payload": { "response_action": "clear" } }));

        let refresh = transport.next_envelope().await.expect_err("refresh");
        assert_eq!(refresh, TransportError::Refresh("refresh_requested".to_owned()));
        transport.disconnect().await.ok();
    }

    #[tokio::test]
    async fn unconnected_transport_has_no_envelopes_and_cannot_ack() {
        let transport = WebSocketTransport::new(Arc::new(FixedUrl("ws://127.0.0.1:1".to_owned())));

        assert_eq!(transport.next_envelope().await, Ok(None));
        assert!(matches!(
            transport.acknowledge("env-1", None).await,
            Err(TransportError::Acknowledge(_))
        ));
        assert!(matches!(transport.connect().await, Err(TransportError::Connect(_))));
        assert_eq!(transport.disconnect().await, Ok(()));
    }
}
