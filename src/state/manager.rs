//! Room state manager
//!
//! Owns one room's state, applies classified events to it, runs the
//! duplicate-input resolver, and pushes the result to the [`StateStore`].

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::resolver::DuplicateInputResolver;
use super::types::RoomState;
use crate::error::Result;
use crate::events::{parse_bool, PowerTarget, RoomEvent};
use crate::ids::RoomId;
use crate::store::StateStore;

/// How long a fetched room state is trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateMode {
    /// Fetch once at startup and keep mutating the in-memory copy
    #[default]
    Retained,
    /// Fetch a fresh copy before every event is applied
    Refetch,
}

/// Keeps one room's mute assignment consistent
pub struct RoomStateManager<S> {
    room: RoomId,
    store: S,
    state: RoomState,
    resolver: DuplicateInputResolver,
    mode: StateMode,
}

impl<S: StateStore> RoomStateManager<S> {
    /// Fetch the room's current state and build a manager around it
    pub async fn initialize(
        room: RoomId,
        store: S,
        resolver: DuplicateInputResolver,
        mode: StateMode,
    ) -> Result<Self> {
        debug!("Fetching state for room {}", room);
        let state = store.fetch(&room).await?;
        info!(
            room = %room,
            displays = state.displays.len(),
            audio_devices = state.audio_devices.len(),
            "Room state initialized"
        );
        Ok(Self::with_state(room, store, resolver, mode, state))
    }

    /// Build a manager around an already known state
    pub fn with_state(
        room: RoomId,
        store: S,
        resolver: DuplicateInputResolver,
        mode: StateMode,
        state: RoomState,
    ) -> Self {
        Self {
            room,
            store,
            state,
            resolver,
            mode,
        }
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub fn state(&self) -> &RoomState {
        &self.state
    }

    pub fn resolver(&self) -> &DuplicateInputResolver {
        &self.resolver
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn mode(&self) -> StateMode {
        self.mode
    }

    /// Replace the in-memory state with a fresh copy from the store
    pub async fn refresh(&mut self) -> Result<()> {
        self.state = self.store.fetch(&self.room).await?;
        debug!("Room state refreshed: {:?}", self.state);
        Ok(())
    }

    /// Apply one event
    ///
    /// Power events are always considered. Everything else is dropped while
    /// any device in the room is in standby.
    pub async fn handle_event(&mut self, event: &RoomEvent) -> Result<()> {
        if event.is_ignored() {
            return Ok(());
        }
        if self.mode == StateMode::Refetch {
            self.refresh().await?;
        }

        debug!("Handling {} event", event.kind());
        match event {
            RoomEvent::Power(target) => self.handle_power(*target).await,
            _ if !self.state.check_power() => {
                debug!("Room is not fully powered, ignoring {} event", event.kind());
                Ok(())
            }
            RoomEvent::Muted { device_id, value } => {
                let muted = parse_bool("muted", value)?;
                let changed = match self.state.compare_mute(device_id, muted) {
                    (Some(device), false) => {
                        device.muted = muted;
                        true
                    }
                    _ => false,
                };
                if changed {
                    debug!("{} : {}", device_id, muted);
                    self.resolve_room().await?;
                }
                Ok(())
            }
            RoomEvent::Input { device_id, input } => {
                let changed = match self.state.compare_input(device_id, input) {
                    (Some(device), false) => {
                        device.input = input.clone();
                        true
                    }
                    _ => false,
                };
                if changed {
                    debug!("{} : {}", device_id, input);
                    self.resolve_room().await?;
                }
                Ok(())
            }
            RoomEvent::MasterMute => self.master_mute().await,
            RoomEvent::MasterVolume => {
                debug!("Master volume changed, resending room state");
                self.push().await
            }
            RoomEvent::Ignored => Ok(()),
        }
    }

    async fn handle_power(&mut self, target: PowerTarget) -> Result<()> {
        match (target, self.state.check_power()) {
            (PowerTarget::Standby, true) => {
                self.power_off();
                Ok(())
            }
            (PowerTarget::On, false) => self.power_on().await,
            _ => Ok(()),
        }
    }

    /// Turn every device on and recompute the mute assignment
    pub async fn power_on(&mut self) -> Result<()> {
        info!("Room {} powering on", self.room);
        self.state.power_on();
        self.resolve_room().await
    }

    /// Put every device in standby and forget mute flags
    pub fn power_off(&mut self) {
        info!("Room {} powering off", self.room);
        self.state.power_off();
    }

    /// Mute every device and push, bypassing the resolver
    pub async fn master_mute(&mut self) -> Result<()> {
        debug!("Master mute pressed");
        for device in &mut self.state.audio_devices {
            device.muted = true;
        }
        self.push().await
    }

    /// Group, resolve, and push the whole room
    pub async fn resolve_room(&mut self) -> Result<()> {
        self.resolver.resolve_room(&mut self.state);
        debug!("Resolved room state: {:?}", self.state);
        self.push().await
    }

    async fn push(&self) -> Result<()> {
        self.store.push(&self.room, &self.state).await
    }
}
