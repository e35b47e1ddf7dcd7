//! Room inventory service client
//!
//! Room state is read with `GET /buildings/{building}/rooms/{room}` and
//! written back with a `PUT` to the same path.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::ids::{is_display_name, RoomId};
use crate::state::{AudioDevice, Display, RoomState};

/// Where room state is fetched from and pushed to
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Fetch the current state of a room
    async fn fetch(&self, room: &RoomId) -> Result<RoomState>;

    /// Apply a new state to a room
    async fn push(&self, room: &RoomId, state: &RoomState) -> Result<()>;
}

/// Which fields of the room document are sent on push
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WireMode {
    /// Only `name` and `muted` per device, so power and input are never
    /// touched by a push
    #[default]
    MuteOnly,
    /// The whole room document
    Full,
}

#[derive(Serialize)]
struct NameOnly<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct MuteOnlyDevice<'a> {
    name: &'a str,
    muted: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MuteOnlyBody<'a> {
    displays: Vec<NameOnly<'a>>,
    audio_devices: Vec<MuteOnlyDevice<'a>>,
}

/// Room status as returned by the inventory service
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomStatus {
    #[serde(default)]
    displays: Vec<Display>,
    audio_devices: Option<Vec<AudioDevice>>,
}

/// Serialize a room document for a push
pub fn encode_state(state: &RoomState, mode: WireMode) -> Result<Vec<u8>> {
    let body = match mode {
        WireMode::Full => serde_json::to_vec(state)?,
        WireMode::MuteOnly => serde_json::to_vec(&MuteOnlyBody {
            displays: state
                .displays
                .iter()
                .map(|d| NameOnly { name: &d.name })
                .collect(),
            audio_devices: state
                .audio_devices
                .iter()
                .map(|d| MuteOnlyDevice {
                    name: &d.name,
                    muted: d.muted,
                })
                .collect(),
        })?,
    };
    Ok(body)
}

/// Decode a room status body, keeping only audio devices named like displays
pub fn decode_state(body: &[u8]) -> Result<RoomState> {
    let status: RoomStatus = serde_json::from_slice(body)?;
    let mut audio_devices = status.audio_devices.ok_or(Error::NoAudioDevices)?;
    audio_devices.retain(|device| {
        let keep = is_display_name(&device.name);
        if !keep {
            debug!("Dropping non-display audio device {}", device.name);
        }
        keep
    });

    Ok(RoomState {
        displays: status.displays,
        audio_devices,
    })
}

/// Prefix bare `host:port` addresses with `http://`
pub fn base_url(address: &str) -> String {
    let address = address.trim_end_matches('/');
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    }
}

/// [`StateStore`] backed by the inventory service's HTTP API
#[derive(Debug, Clone)]
pub struct HttpStateStore {
    client: reqwest::Client,
    base_url: String,
    wire_mode: WireMode,
}

impl HttpStateStore {
    pub fn new(address: &str, wire_mode: WireMode) -> Self {
        Self::with_client(reqwest::Client::new(), address, wire_mode)
    }

    pub fn with_client(client: reqwest::Client, address: &str, wire_mode: WireMode) -> Self {
        Self {
            client,
            base_url: base_url(address),
            wire_mode,
        }
    }

    /// Endpoint for a room
    pub fn room_url(&self, room: &RoomId) -> String {
        format!(
            "{}/buildings/{}/rooms/{}",
            self.base_url, room.building, room.room
        )
    }
}

#[async_trait]
impl StateStore for HttpStateStore {
    async fn fetch(&self, room: &RoomId) -> Result<RoomState> {
        let url = self.room_url(room);
        debug!("Requesting room status from {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            error!("Failed to get room status: {}", e);
            Error::from(e)
        })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.bytes().await?;
        decode_state(&body)
    }

    async fn push(&self, room: &RoomId, state: &RoomState) -> Result<()> {
        let url = self.room_url(room);
        let body = encode_state(state, self.wire_mode)?;

        debug!("Sending room state update to {}", url);
        let response = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json; charset=utf-8")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        debug!("Room state update accepted");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    rooms: HashMap<RoomId, RoomState>,
    pushes: Vec<(RoomId, RoomState)>,
    reject_pushes: bool,
}

/// In-process [`StateStore`] that records every push
///
/// Pushed states become the room's current state, like the real service.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace the stored state of a room
    pub fn insert(&self, room: RoomId, state: RoomState) {
        self.lock().rooms.insert(room, state);
    }

    /// Every state pushed so far, oldest first
    pub fn pushes(&self) -> Vec<(RoomId, RoomState)> {
        self.lock().pushes.clone()
    }

    pub fn push_count(&self) -> usize {
        self.lock().pushes.len()
    }

    pub fn last_push(&self) -> Option<RoomState> {
        self.lock().pushes.last().map(|(_, state)| state.clone())
    }

    /// Make subsequent pushes fail as if the service answered 500
    pub fn reject_pushes(&self, reject: bool) {
        self.lock().reject_pushes = reject;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn fetch(&self, room: &RoomId) -> Result<RoomState> {
        self.lock()
            .rooms
            .get(room)
            .cloned()
            .ok_or(Error::UnexpectedStatus {
                status: 404,
                url: format!("memory://{}", room),
            })
    }

    async fn push(&self, room: &RoomId, state: &RoomState) -> Result<()> {
        let mut inner = self.lock();
        if inner.reject_pushes {
            return Err(Error::UnexpectedStatus {
                status: 500,
                url: format!("memory://{}", room),
            });
        }
        inner.pushes.push((room.clone(), state.clone()));
        inner.rooms.insert(room.clone(), state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PowerState;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_memory_store_records_pushes() {
        let store = MemoryStore::new();
        let room = room();
        assert!(store.fetch(&room).await.is_err());

        store.push(&room, &sample_state()).await.unwrap();
        assert_eq!(store.push_count(), 1);
        assert_eq!(store.fetch(&room).await.unwrap(), sample_state());

        store.reject_pushes(true);
        assert!(store.push(&room, &sample_state()).await.is_err());
        assert_eq!(store.push_count(), 1);
    }

    fn sample_state() -> RoomState {
        RoomState {
            displays: vec![Display::named("D1"), Display::named("D2")],
            audio_devices: vec![
                AudioDevice::new("D1", PowerState::On, "VIA1", false),
                AudioDevice::new("D2", PowerState::On, "VIA1", true),
            ],
        }
    }

    fn room() -> RoomId {
        RoomId::parse("ITB-1106").unwrap()
    }

    #[test]
    fn test_mute_only_encoding_omits_power_and_input() {
        let body = encode_state(&sample_state(), WireMode::MuteOnly).unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            value,
            json!({
                "displays": [{"name": "D1"}, {"name": "D2"}],
                "audioDevices": [
                    {"name": "D1", "muted": false},
                    {"name": "D2", "muted": true}
                ]
            })
        );
    }

    #[test]
    fn test_full_encoding_keeps_power_and_input() {
        let body = encode_state(&sample_state(), WireMode::Full).unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["audioDevices"][1]["power"], "on");
        assert_eq!(value["audioDevices"][1]["input"], "VIA1");
        assert!(value["displays"][0].get("blanked").is_none());
    }

    #[test]
    fn test_decode_trims_non_display_devices() {
        let body = br#"{
            "displays": [{"name": "D1"}],
            "audioDevices": [
                {"name": "D1", "power": "on", "input": "VIA1", "muted": false},
                {"name": "MIC1", "muted": false},
                {"name": "AMP", "muted": true},
                {"name": "D2", "power": "on", "input": "VIA1", "muted": false}
            ]
        }"#;

        let state = decode_state(body).unwrap();
        let names: Vec<&str> = state.audio_devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["D1", "D2"]);
    }

    #[test]
    fn test_decode_requires_audio_devices() {
        assert!(matches!(
            decode_state(br#"{"displays": []}"#),
            Err(Error::NoAudioDevices)
        ));
        assert!(matches!(decode_state(b"not json"), Err(Error::Decode(_))));
    }

    #[test]
    fn test_base_url() {
        assert_eq!(base_url("localhost:8000"), "http://localhost:8000");
        assert_eq!(base_url("https://av.example.edu/"), "https://av.example.edu");
    }

    #[tokio::test]
    async fn test_fetch_room_state() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/buildings/ITB/rooms/1106")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"displays": [{"name": "D1"}],
                    "audioDevices": [{"name": "D1", "power": "on", "input": "VIA1", "muted": true}]}"#,
            )
            .create_async()
            .await;

        let store = HttpStateStore::new(&server.url(), WireMode::MuteOnly);
        let state = store.fetch(&room()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(state.audio_devices.len(), 1);
        assert!(state.audio_devices[0].muted);
    }

    #[tokio::test]
    async fn test_fetch_non_200_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/buildings/ITB/rooms/1106")
            .with_status(503)
            .create_async()
            .await;

        let store = HttpStateStore::new(&server.url(), WireMode::MuteOnly);
        assert!(matches!(
            store.fetch(&room()).await,
            Err(Error::UnexpectedStatus { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_push_room_state() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/buildings/ITB/rooms/1106")
            .match_header("content-type", "application/json; charset=utf-8")
            .match_body(mockito::Matcher::Json(json!({
                "displays": [{"name": "D1"}, {"name": "D2"}],
                "audioDevices": [
                    {"name": "D1", "muted": false},
                    {"name": "D2", "muted": true}
                ]
            })))
            .with_status(200)
            .create_async()
            .await;

        let store = HttpStateStore::new(&server.url(), WireMode::MuteOnly);
        store.push(&room(), &sample_state()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_push_requires_exactly_200() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", "/buildings/ITB/rooms/1106")
            .with_status(204)
            .create_async()
            .await;

        let store = HttpStateStore::new(&server.url(), WireMode::Full);
        assert!(matches!(
            store.push(&room(), &sample_state()).await,
            Err(Error::UnexpectedStatus { status: 204, .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_store_is_transport_error() {
        let store = HttpStateStore::new("127.0.0.1:1", WireMode::MuteOnly);
        assert!(matches!(
            store.fetch(&room()).await,
            Err(Error::Transport(_))
        ));
    }
}
