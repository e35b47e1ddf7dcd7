//! Device-state-change events and their classification
//!
//! Raw hub events are stringly typed. Everything the manager reacts to is
//! turned into a [`RoomEvent`] up front; whatever does not match becomes
//! [`RoomEvent::Ignored`] and never reaches the manager.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Value sent when the master mute button is pressed on a UI panel
pub const MASTER_MUTE_VALUE: &str = "master volume mute on display page";
/// Value sent when the master volume is changed on a UI panel
pub const MASTER_VOLUME_VALUE: &str = "master volume set on display page";

/// Device the event is about
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDevice {
    #[serde(default)]
    pub device_id: String,
}

/// A raw device-state-change event as delivered by the event hub
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub target_device: TargetDevice,
}

impl Event {
    pub fn new(key: impl Into<String>, value: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            target_device: TargetDevice {
                device_id: device_id.into(),
            },
        }
    }

    /// Classify this event for the manager
    pub fn classify(&self) -> RoomEvent {
        let device_id = || self.target_device.device_id.clone();
        match self.key.as_str() {
            "power" => match self.value.as_str() {
                "on" => RoomEvent::Power(PowerTarget::On),
                "standby" => RoomEvent::Power(PowerTarget::Standby),
                _ => RoomEvent::Ignored,
            },
            "muted" => RoomEvent::Muted {
                device_id: device_id(),
                value: self.value.clone(),
            },
            "input" => RoomEvent::Input {
                device_id: device_id(),
                input: self.value.clone(),
            },
            "user-interaction" => match self.value.as_str() {
                MASTER_MUTE_VALUE => RoomEvent::MasterMute,
                MASTER_VOLUME_VALUE => RoomEvent::MasterVolume,
                _ => RoomEvent::Ignored,
            },
            _ => RoomEvent::Ignored,
        }
    }
}

/// Power value requested by a `power` event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerTarget {
    On,
    Standby,
}

/// Events the room manager acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// A device reported a power change
    Power(PowerTarget),
    /// A device reported its mute flag; the value is parsed when handled
    Muted { device_id: String, value: String },
    /// A device switched inputs
    Input { device_id: String, input: String },
    /// Master mute pressed on a UI panel
    MasterMute,
    /// Master volume changed on a UI panel
    MasterVolume,
    /// Anything else
    Ignored,
}

impl RoomEvent {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            RoomEvent::Power(_) => "power",
            RoomEvent::Muted { .. } => "muted",
            RoomEvent::Input { .. } => "input",
            RoomEvent::MasterMute => "master-mute",
            RoomEvent::MasterVolume => "master-volume",
            RoomEvent::Ignored => "ignored",
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, RoomEvent::Ignored)
    }

    /// Power events are handled even when the room is off
    pub fn bypasses_power_gate(&self) -> bool {
        matches!(self, RoomEvent::Power(_))
    }
}

impl From<&Event> for RoomEvent {
    fn from(event: &Event) -> Self {
        event.classify()
    }
}

/// Parse a boolean event value
///
/// Accepts `1 t T TRUE true True` and `0 f F FALSE false False`.
pub fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(Error::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_power() {
        assert_eq!(
            Event::new("power", "on", "ITB-1106-D1").classify(),
            RoomEvent::Power(PowerTarget::On)
        );
        assert_eq!(
            Event::new("power", "standby", "ITB-1106-D1").classify(),
            RoomEvent::Power(PowerTarget::Standby)
        );
        assert!(Event::new("power", "rebooting", "ITB-1106-D1").classify().is_ignored());
    }

    #[test]
    fn test_classify_device_events() {
        assert_eq!(
            Event::new("muted", "true", "ITB-1106-D2").classify(),
            RoomEvent::Muted {
                device_id: "ITB-1106-D2".to_string(),
                value: "true".to_string()
            }
        );
        assert_eq!(
            Event::new("input", "VIA1", "ITB-1106-D2").classify(),
            RoomEvent::Input {
                device_id: "ITB-1106-D2".to_string(),
                input: "VIA1".to_string()
            }
        );
    }

    #[test]
    fn test_classify_user_interaction() {
        assert_eq!(
            Event::new("user-interaction", MASTER_MUTE_VALUE, "ITB-1106-CP1").classify(),
            RoomEvent::MasterMute
        );
        assert_eq!(
            Event::new("user-interaction", MASTER_VOLUME_VALUE, "ITB-1106-CP1").classify(),
            RoomEvent::MasterVolume
        );
        assert!(Event::new("user-interaction", "page change", "ITB-1106-CP1")
            .classify()
            .is_ignored());
    }

    #[test]
    fn test_classify_unknown_keys_are_ignored() {
        assert!(Event::new("volume", "30", "ITB-1106-D1").classify().is_ignored());
        assert!(Event::default().classify().is_ignored());
    }

    #[test]
    fn test_only_power_bypasses_gate() {
        assert!(RoomEvent::Power(PowerTarget::On).bypasses_power_gate());
        assert!(!RoomEvent::MasterMute.bypasses_power_gate());
        assert!(!RoomEvent::Input {
            device_id: String::new(),
            input: String::new()
        }
        .bypasses_power_gate());
    }

    #[test]
    fn test_parse_bool() {
        for v in ["1", "t", "T", "TRUE", "true", "True"] {
            assert!(parse_bool("muted", v).unwrap());
        }
        for v in ["0", "f", "F", "FALSE", "false", "False"] {
            assert!(!parse_bool("muted", v).unwrap());
        }
        assert!(matches!(
            parse_bool("muted", "maybe"),
            Err(Error::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_deserialize_hub_event() {
        let json = r#"{
            "generating-system": "ITB-1106-CP1",
            "key": "input",
            "value": "PC1",
            "targetDevice": {"buildingID": "ITB", "roomID": "ITB-1106", "deviceId": "ITB-1106-D3"}
        }"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.target_device.device_id, "ITB-1106-D3");
        assert_eq!(event.classify().kind(), "input");
    }
}
