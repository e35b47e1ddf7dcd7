//! Room state type definitions
//!
//! Defines the room document exchanged with the inventory service: displays,
//! audio-capable devices, and their power/input/mute attributes.

use serde::{Deserialize, Serialize};

use crate::ids::parse_display_id;

/// Power state reported for a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    Standby,
    /// Missing or unrecognized value; never counts as standby
    #[default]
    #[serde(other)]
    Unknown,
}

impl PowerState {
    pub fn is_unknown(&self) -> bool {
        matches!(self, PowerState::Unknown)
    }
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PowerState::On => write!(f, "on"),
            PowerState::Standby => write!(f, "standby"),
            PowerState::Unknown => write!(f, "unknown"),
        }
    }
}

/// A physical screen in the room
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Display {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<PowerState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blanked: Option<bool>,
}

impl Display {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A device capable of producing audio
///
/// A device whose `name` matches a [`Display`] is that display's speaker.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioDevice {
    pub name: String,
    #[serde(default, skip_serializing_if = "PowerState::is_unknown")]
    pub power: PowerState,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub muted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<i32>,
}

impl AudioDevice {
    pub fn new(name: impl Into<String>, power: PowerState, input: impl Into<String>, muted: bool) -> Self {
        Self {
            name: name.into(),
            power,
            input: input.into(),
            muted,
            volume: None,
        }
    }
}

/// Full audio-visual state of one room
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomState {
    #[serde(default)]
    pub displays: Vec<Display>,
    #[serde(default)]
    pub audio_devices: Vec<AudioDevice>,
}

impl RoomState {
    /// Find the audio device with the given short name
    pub fn find_audio_device(&self, name: &str) -> Option<&AudioDevice> {
        self.audio_devices.iter().find(|d| d.name == name)
    }

    /// Find the audio device with the given short name, mutably
    pub fn find_audio_device_mut(&mut self, name: &str) -> Option<&mut AudioDevice> {
        self.audio_devices.iter_mut().find(|d| d.name == name)
    }

    /// Compare a device's recorded mute flag against an incoming value
    ///
    /// Returns the device (if the id names one of our audio devices) and
    /// whether the recorded value already equals `muted`. Ids that are
    /// malformed or name a non-audio device report "equal" with no device.
    pub fn compare_mute(&mut self, device_id: &str, muted: bool) -> (Option<&mut AudioDevice>, bool) {
        match self.lookup_device(device_id) {
            Some(device) => {
                let same = device.muted == muted;
                (Some(device), same)
            }
            None => (None, true),
        }
    }

    /// Compare a device's recorded input against an incoming value
    ///
    /// Same lookup rules as [`RoomState::compare_mute`].
    pub fn compare_input(&mut self, device_id: &str, input: &str) -> (Option<&mut AudioDevice>, bool) {
        match self.lookup_device(device_id) {
            Some(device) => {
                let same = device.input == input;
                (Some(device), same)
            }
            None => (None, true),
        }
    }

    fn lookup_device(&mut self, device_id: &str) -> Option<&mut AudioDevice> {
        let display_id = parse_display_id(device_id).ok()?;
        self.find_audio_device_mut(&display_id)
    }
}
