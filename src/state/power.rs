//! Room power derivation and on/off transitions
//!
//! Room power is never stored. It is derived from every audio device's power
//! field: a single device in standby means the room is not fully on.

use super::types::{PowerState, RoomState};

/// Derived power status of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPower {
    AllOn,
    AnyStandby,
}

impl RoomState {
    /// Derived room power
    pub fn room_power(&self) -> RoomPower {
        if self
            .audio_devices
            .iter()
            .any(|device| device.power == PowerState::Standby)
        {
            RoomPower::AnyStandby
        } else {
            RoomPower::AllOn
        }
    }

    /// True iff no audio device reports standby
    pub fn check_power(&self) -> bool {
        self.room_power() == RoomPower::AllOn
    }

    /// Mark every audio device as on
    ///
    /// Mute assignment is stale afterwards; callers follow up with a full
    /// resolution.
    pub fn power_on(&mut self) {
        for device in &mut self.audio_devices {
            device.power = PowerState::On;
        }
    }

    /// Mark every audio device as standby and clear all mute flags
    pub fn power_off(&mut self) {
        for device in &mut self.audio_devices {
            device.power = PowerState::Standby;
            device.muted = false;
        }
    }
}
