//! # WebSocket Block Monitor
//!
//! `BlockMonitor` over the node's `/block` WebSocket endpoint.
//!
//! Protocol: send the `BlockRequest` as JSON, receive `{"code":0}` as the
//! acknowledgment, then one JSON `BlockNotification` per matching block.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::domain::{BlockNotification, BlockRequest, RelayError};
use crate::ports::{BlockMonitor, BlockSubscription, MonitorEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Acknowledgment of a block request.
#[derive(Debug, Deserialize)]
struct WsResponse {
    code: i64,
    #[serde(default)]
    message: String,
}

/// Block monitor over WebSocket.
pub struct WsBlockMonitor {
    ws_url: String,
    buffer: usize,
    handshake_timeout: Duration,
}

impl WsBlockMonitor {
    /// Create a monitor for `ws_url`.
    pub fn new(ws_url: impl Into<String>, buffer: usize, handshake_timeout: Duration) -> Self {
        Self {
            ws_url: ws_url.into(),
            buffer,
            handshake_timeout,
        }
    }

    /// Create a monitor from the relay config.
    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(
            config.websocket_url(),
            config.notification_buffer,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        &self.ws_url
    }

    /// Connect, send the request and wait for the acknowledgment.
    async fn open(&self, request: &BlockRequest) -> Result<WsStream, RelayError> {
        let (mut ws, _) = connect_async(self.ws_url.as_str())
            .await
            .map_err(|e| RelayError::Subscription(format!("connect {}: {}", self.ws_url, e)))?;

        let body = serde_json::to_string(request)
            .map_err(|e| RelayError::Serialization(e.to_string()))?;
        ws.send(Message::Text(body.into()))
            .await
            .map_err(|e| RelayError::Subscription(format!("send request: {}", e)))?;

        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    parse_ack(&text)?;
                    return Ok(ws);
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = ws.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(RelayError::Subscription(
                        "connection closed before acknowledgment".into(),
                    ));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(RelayError::Subscription(e.to_string())),
            }
        }
    }

    /// Forward notifications until shutdown, close, or failure.
    async fn forward(
        mut ws: WsStream,
        event_tx: mpsc::Sender<MonitorEvent>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    debug!("[btp-relay] Block monitor closing");
                    let _ = ws.close(None).await;
                    break;
                }
                msg = ws.next() => match msg {
                    Some(Ok(Message::Text(text))) => match parse_notification(&text) {
                        Ok(notification) => {
                            if event_tx.send(MonitorEvent::Notification(notification)).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            let _ = event_tx.send(MonitorEvent::Error(e.to_string())).await;
                            break;
                        }
                    },
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("[btp-relay] Block monitor connection closed by peer");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("[btp-relay] Block monitor read failed: {}", e);
                        let _ = event_tx.send(MonitorEvent::Error(e.to_string())).await;
                        break;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl BlockMonitor for WsBlockMonitor {
    async fn subscribe(&self, request: BlockRequest) -> Result<BlockSubscription, RelayError> {
        let ws = tokio::time::timeout(self.handshake_timeout, self.open(&request))
            .await
            .map_err(|_| {
                RelayError::Subscription(format!("no acknowledgment from {}", self.ws_url))
            })??;

        let (event_tx, shutdown_rx, subscription) = BlockSubscription::channel(self.buffer);
        let _ = event_tx
            .send(MonitorEvent::Connected(self.ws_url.clone()))
            .await;
        tokio::spawn(Self::forward(ws, event_tx, shutdown_rx));
        Ok(subscription)
    }
}

fn parse_ack(text: &str) -> Result<(), RelayError> {
    let response: WsResponse = serde_json::from_str(text)
        .map_err(|e| RelayError::Subscription(format!("invalid acknowledgment: {}", e)))?;
    if response.code != 0 {
        return Err(RelayError::Subscription(format!(
            "request rejected ({}): {}",
            response.code, response.message
        )));
    }
    Ok(())
}

fn parse_notification(text: &str) -> Result<BlockNotification, RelayError> {
    serde_json::from_str(text)
        .map_err(|e| RelayError::Serialization(format!("BlockNotification: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ack() {
        assert!(parse_ack(r#"{"code":0}"#).is_ok());
        let err = parse_ack(r#"{"code":-32602,"message":"bad filter"}"#).unwrap_err();
        assert!(matches!(err, RelayError::Subscription(ref m) if m.contains("bad filter")));
        assert!(parse_ack("not json").is_err());
    }

    #[test]
    fn test_parse_notification() {
        let n = parse_notification(
            r#"{"hash":"0x01","height":"0xa","indexes":[["0x0"]],"events":[[["0x0"]]]}"#,
        )
        .unwrap();
        assert_eq!(n.block_height().unwrap(), 10);
        assert!(n.has_matches());
        assert!(matches!(
            parse_notification(r#"{"height":1}"#),
            Err(RelayError::Serialization(_))
        ));
    }

    #[test]
    fn test_from_config() {
        let monitor = WsBlockMonitor::from_config(&RelayConfig::for_testing());
        assert_eq!(monitor.url(), "ws://127.0.0.1:9080/api/v3/block");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let monitor = WsBlockMonitor::new("ws://127.0.0.1:1/block", 4, Duration::from_secs(2));
        let request = RelayConfig::for_testing().block_request(1);
        let err = monitor.subscribe(request).await.unwrap_err();
        assert!(matches!(err, RelayError::Subscription(_)));
    }
}
