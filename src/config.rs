//! Configuration management for automute
//!
//! Handles loading and validating the YAML configuration file. Command-line
//! flags are layered on top by the binary.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::fs;

use crate::hub::DEFAULT_RECONNECT_DELAY;
use crate::ids::{DeviceId, RoomId};
use crate::state::{SingletonPolicy, StateMode};
use crate::store::WireMode;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Room to manage, `BUILDING-ROOM`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    /// Device acting as room controller, `BUILDING-ROOM-DEVICE`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Event hub address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hub_address: Option<String>,
    /// Room inventory service address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_address: Option<String>,
    /// Room configuration database address; no address means always run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate_address: Option<String>,
    #[serde(default)]
    pub resolution: ResolutionConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub hub: HubConfig,
}

/// Mute resolution behaviour
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResolutionConfig {
    #[serde(default)]
    pub singleton_policy: SingletonPolicy,
    #[serde(default)]
    pub state_mode: StateMode,
    #[serde(default)]
    pub wire_mode: WireMode,
}

/// Startup gate configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GateConfig {
    /// Seconds between gate checks while closed; 0 parks forever
    #[serde(default)]
    pub retry_interval_secs: u64,
    /// Pattern the host name must match for this instance to run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller_hostname: Option<String>,
}

/// Event hub connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HubConfig {
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_secs: default_reconnect_delay(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: ServiceConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;

        Ok(config)
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        let room = self.room()?;

        if let (Some(_), Some(device_id)) = (&self.room_id, &self.device_id) {
            let device = DeviceId::parse(device_id)?;
            if device.room != room {
                anyhow::bail!("Device {} is not in room {}", device_id, room);
            }
        }

        if self.hub_address().is_none() {
            anyhow::bail!("Event hub address required. Use --hub-address to provide the address of the event hub");
        }
        if self.store_address().is_none() {
            anyhow::bail!("State store address required. Use --store-address to provide the address of the av-api");
        }

        if let Some(pattern) = &self.gate.controller_hostname {
            Regex::new(pattern)
                .with_context(|| format!("Invalid controller hostname pattern: {}", pattern))?;
        }

        Ok(())
    }

    /// The room this instance manages, from the room id or the device id
    pub fn room(&self) -> Result<RoomId> {
        if let Some(room_id) = non_empty(&self.room_id) {
            return Ok(RoomId::parse(room_id)?);
        }
        if let Some(device_id) = non_empty(&self.device_id) {
            return Ok(DeviceId::parse(device_id)?.room);
        }
        anyhow::bail!("Room ID required. Use --room-id or --device-id to provide the room to manage")
    }

    pub fn hub_address(&self) -> Option<&str> {
        non_empty(&self.hub_address)
    }

    pub fn store_address(&self) -> Option<&str> {
        non_empty(&self.store_address)
    }

    pub fn gate_address(&self) -> Option<&str> {
        non_empty(&self.gate_address)
    }

    pub fn gate_retry_interval(&self) -> Duration {
        Duration::from_secs(self.gate.retry_interval_secs)
    }

    pub fn hub_reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.hub.reconnect_delay_secs)
    }

    /// Compiled controller hostname pattern, if one is configured
    pub fn controller_hostname(&self) -> Result<Option<Regex>> {
        non_empty(&self.gate.controller_hostname)
            .map(|pattern| {
                Regex::new(pattern)
                    .with_context(|| format!("Invalid controller hostname pattern: {}", pattern))
            })
            .transpose()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// Default value functions
fn default_reconnect_delay() -> u64 { DEFAULT_RECONNECT_DELAY.as_secs() }
