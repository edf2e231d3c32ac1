//! Real-time connection factory. A connection is a pair of channels: frames
//! pushed into `outbound` are written to the socket, frames read from the
//! socket arrive on `inbound`. `inbound` yields `None` once the connection
//! is gone.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use shared::{
    domain::UserId,
    protocol::{ClientFrame, ServerFrame},
};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ClientSettings;

pub struct RealtimeLink {
    pub outbound: mpsc::UnboundedSender<ClientFrame>,
    pub inbound: mpsc::UnboundedReceiver<ServerFrame>,
}

#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    async fn connect(&self, user_id: UserId) -> Result<RealtimeLink>;
}

pub struct WsTransport {
    ws_url: String,
}

impl WsTransport {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
        }
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self> {
        Ok(Self::new(settings.ws_url()?))
    }
}

#[async_trait]
impl RealtimeTransport for WsTransport {
    async fn connect(&self, user_id: UserId) -> Result<RealtimeLink> {
        let mut url = Url::parse(&self.ws_url)
            .with_context(|| format!("invalid websocket url: {}", self.ws_url))?;
        url.query_pairs_mut()
            .append_pair("user_id", &user_id.0.to_string());
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .with_context(|| format!("failed to connect websocket: {url}"))?;
        info!(url = %url, "transport: websocket connected");
        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ClientFrame>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<ServerFrame>();

        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(err) => {
                        warn!("transport: failed to encode {}: {err}", frame.event_name());
                        continue;
                    }
                };
                debug!(event = frame.event_name(), "transport: emit");
                if let Err(err) = ws_writer.send(Message::Text(text)).await {
                    warn!("transport: websocket send failed: {err}");
                    break;
                }
            }
            let _ = ws_writer.send(Message::Close(None)).await;
        });

        tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerFrame>(&text) {
                        Ok(frame) => {
                            if inbound_tx.send(frame).is_err() {
                                break;
                            }
                        }
                        Err(err) => warn!("transport: ignoring invalid server frame: {err}"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!("transport: websocket receive failed: {err}");
                        break;
                    }
                }
            }
            debug!("transport: reader finished");
        });

        Ok(RealtimeLink {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
