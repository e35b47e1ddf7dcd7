//! Event sources
//!
//! The service consumes device-state-change events one at a time from an
//! [`EventSource`]. In production that is the event hub, reached over a
//! WebSocket and subscribed to a single room; embedders and tests can feed
//! events through a channel instead.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::events::Event;
use crate::ids::RoomId;

/// Default delay between event hub reconnection attempts
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Delivers events one at a time
#[async_trait]
pub trait EventSource: Send {
    /// Wait for the next event; `None` once the source is closed for good
    async fn next_event(&mut self) -> Option<Event>;
}

/// [`EventSource`] fed through a tokio channel
pub struct ChannelSource {
    rx: mpsc::Receiver<Event>,
}

impl ChannelSource {
    /// Create a source and the sender that feeds it
    pub fn new(capacity: usize) -> (mpsc::Sender<Event>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }
}

#[async_trait]
impl EventSource for ChannelSource {
    async fn next_event(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

#[derive(Serialize)]
struct Subscription {
    subscribe: Vec<String>,
}

type HubStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// [`EventSource`] reading from the event hub
///
/// Connection loss is handled internally: the source reconnects after a
/// fixed delay and subscribes again, so `next_event` never returns `None`.
pub struct HubSource {
    url: String,
    room: RoomId,
    reconnect_delay: Duration,
    stream: Option<HubStream>,
}

impl HubSource {
    pub fn new(address: &str, room: RoomId) -> Self {
        Self {
            url: hub_url(address),
            room,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            stream: None,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Connect and subscribe to the room
    pub async fn connect(&mut self) -> Result<()> {
        info!("Connecting to event hub at {}", self.url);
        let (mut stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| Error::Hub(e.to_string()))?;

        let subscription = serde_json::to_string(&Subscription {
            subscribe: vec![self.room.to_string()],
        })?;
        stream
            .send(Message::Text(subscription))
            .await
            .map_err(|e| Error::Hub(e.to_string()))?;

        info!("Subscribed to events for {}", self.room);
        self.stream = Some(stream);
        Ok(())
    }
}

#[async_trait]
impl EventSource for HubSource {
    async fn next_event(&mut self) -> Option<Event> {
        loop {
            if self.stream.is_none() {
                if let Err(e) = self.connect().await {
                    warn!(
                        "Failed to connect to event hub: {} (retrying in {:?})",
                        e, self.reconnect_delay
                    );
                    tokio::time::sleep(self.reconnect_delay).await;
                }
                continue;
            }
            let Some(stream) = self.stream.as_mut() else {
                continue;
            };

            let message = stream.next().await;
            match message {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<Event>(&text) {
                    Ok(event) => return Some(event),
                    Err(e) => warn!("Skipping malformed hub message: {}", e),
                },
                Some(Ok(Message::Close(_))) | None => {
                    warn!("Event hub connection closed");
                    self.stream = None;
                    tokio::time::sleep(self.reconnect_delay).await;
                }
                Some(Ok(other)) => debug!("Ignoring non-text hub frame: {:?}", other),
                Some(Err(e)) => {
                    warn!("Event hub connection error: {}", e);
                    self.stream = None;
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
    }
}

/// WebSocket URL for a hub address
///
/// A `ws://` or `wss://` URL is used as is; a bare `host:port` gets the
/// messenger endpoint.
pub fn hub_url(address: &str) -> String {
    if address.starts_with("ws://") || address.starts_with("wss://") {
        address.to_string()
    } else {
        format!("ws://{}/connect/messenger", address.trim_end_matches('/'))
    }
}
