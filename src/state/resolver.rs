//! Duplicate-input audio resolution
//!
//! When several displays show the same input, only one of them should play
//! its audio. The resolver groups displays by input, picks one carrier per
//! group, and mutes the rest.
//!
//! Carrier choice, in priority order:
//! 1. the device remembered for this input in the [`PriorityCache`], if it is
//!    still in the group;
//! 2. the device with the lowest display number (`D2` before `D10`);
//! 3. the first device in the group.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::RoomState;
use crate::ids::parse_display_number;

/// Display names grouped by the input their audio device is showing
pub type InputGroups = BTreeMap<String, Vec<String>>;

/// What to do with the only device on an input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SingletonPolicy {
    /// Force the device unmuted
    #[default]
    Unmute,
    /// Leave its mute flag as reported
    Leave,
}

/// Sticky per-input memory of which device carries audio
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriorityCache {
    entries: HashMap<String, String>,
}

impl PriorityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, input: &str) -> Option<&str> {
        self.entries.get(input).map(String::as_str)
    }

    pub fn insert(&mut self, input: impl Into<String>, name: impl Into<String>) {
        self.entries.insert(input.into(), name.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Group every audio-capable display by its current input
///
/// Displays with no audio device of the same name are left out. Within a
/// group, names keep the order of the display list.
pub fn group_displays(state: &RoomState) -> InputGroups {
    let mut groups = InputGroups::new();
    for display in &state.displays {
        for device in state
            .audio_devices
            .iter()
            .filter(|device| device.name == display.name)
        {
            groups
                .entry(device.input.clone())
                .or_default()
                .push(display.name.clone());
        }
    }
    groups
}

/// Index of the default carrier: lowest display number, first on ties
///
/// Names without a display number never win on number but index 0 is still
/// returned when nothing parses.
pub fn choose_default(names: &[String]) -> usize {
    let mut chosen = 0;
    let mut lowest: Option<u32> = None;
    for (i, name) in names.iter().enumerate() {
        if let Ok(num) = parse_display_number(name) {
            if lowest.map_or(true, |low| num < low) {
                lowest = Some(num);
                chosen = i;
            }
        }
    }
    chosen
}

/// Picks one audio carrier per input and remembers the choice
#[derive(Debug, Clone, Default)]
pub struct DuplicateInputResolver {
    cache: PriorityCache,
    singleton_policy: SingletonPolicy,
}

impl DuplicateInputResolver {
    pub fn new(singleton_policy: SingletonPolicy) -> Self {
        Self::with_cache(PriorityCache::new(), singleton_policy)
    }

    /// Build a resolver around an existing cache
    pub fn with_cache(cache: PriorityCache, singleton_policy: SingletonPolicy) -> Self {
        Self {
            cache,
            singleton_policy,
        }
    }

    pub fn cache(&self) -> &PriorityCache {
        &self.cache
    }

    pub fn singleton_policy(&self) -> SingletonPolicy {
        self.singleton_policy
    }

    /// Recompute mute flags for every input group in the room
    pub fn resolve_room(&mut self, state: &mut RoomState) -> InputGroups {
        let groups = group_displays(state);
        debug!("Display groups: {:?}", groups);

        for (input, names) in &groups {
            match names.len() {
                0 => {}
                1 => self.resolve_singleton(input, &names[0], state),
                _ => {
                    self.resolve_group(input, names, state);
                }
            }
        }
        groups
    }

    /// Choose the carrier for a group of two or more devices and mute the rest
    ///
    /// Returns the chosen device name.
    pub fn resolve_group(&mut self, input: &str, names: &[String], state: &mut RoomState) -> String {
        let cached = self
            .cache
            .get(input)
            .and_then(|name| names.iter().position(|n| n == name));

        let chosen = match cached {
            Some(i) => names[i].clone(),
            None => names[choose_default(names)].clone(),
        };
        debug!(input, chosen = %chosen, sticky = cached.is_some(), "resolved input group");

        self.cache.insert(input, chosen.clone());

        for device in &mut state.audio_devices {
            if device.name == chosen {
                device.muted = false;
            } else if device.input == input {
                device.muted = true;
            }
        }
        chosen
    }

    fn resolve_singleton(&mut self, input: &str, name: &str, state: &mut RoomState) {
        self.cache.insert(input, name);
        if self.singleton_policy == SingletonPolicy::Unmute {
            if let Some(device) = state.find_audio_device_mut(name) {
                device.muted = false;
            }
        }
    }
}
