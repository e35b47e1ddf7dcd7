//! Room, device, and display identifiers
//!
//! Rooms are named `BUILDING-ROOM`, devices `BUILDING-ROOM-DEVICE`. Display
//! names carry their priority as a number: `D1` outranks `D2`, which outranks
//! `D10`.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

static DISPLAY_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"D([0-9]+)").expect("invariant: display pattern is valid"));

/// A room identifier split into its building and room parts
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId {
    pub building: String,
    pub room: String,
}

impl RoomId {
    /// Parse `BUILDING-ROOM`. Extra trailing tokens are ignored so a device id
    /// also yields its room.
    pub fn parse(id: &str) -> Result<Self> {
        let (building, room) = parse_room_id(id)?;
        Ok(Self { building, room })
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.building, self.room)
    }
}

/// A device identifier: the room it lives in plus its short name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId {
    pub room: RoomId,
    pub name: String,
}

impl DeviceId {
    pub fn parse(id: &str) -> Result<Self> {
        let tokens: Vec<&str> = id.split('-').collect();
        if tokens.len() < 3 {
            return Err(Error::malformed(id, "BUILDING-ROOM-DEVICE"));
        }
        Ok(Self {
            room: RoomId {
                building: tokens[0].to_string(),
                room: tokens[1].to_string(),
            },
            name: tokens[2].to_string(),
        })
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.room, self.name)
    }
}

/// Split a room id into `(building, room)`
pub fn parse_room_id(id: &str) -> Result<(String, String)> {
    let tokens: Vec<&str> = id.split('-').collect();
    if tokens.len() < 2 {
        return Err(Error::malformed(id, "BUILDING-ROOM"));
    }
    Ok((tokens[0].to_string(), tokens[1].to_string()))
}

/// Extract the display name (third token) from a full device id
pub fn parse_display_id(device_id: &str) -> Result<String> {
    DeviceId::parse(device_id).map(|device| device.name)
}

/// Extract the display number from a name containing `D<digits>`
pub fn parse_display_number(name: &str) -> Result<u32> {
    DISPLAY_NUMBER
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|digits| digits.as_str().parse().ok())
        .ok_or_else(|| Error::malformed(name, "display name in the form `D#`"))
}

/// Whether a device name follows the display naming scheme
pub fn is_display_name(name: &str) -> bool {
    parse_display_number(name).is_ok()
}
