//! Room state module - data model, power derivation, and mute resolution
//!
//! This module holds the reconciliation engine: the room document, the power
//! state machine derived from it, the duplicate-input resolver with its sticky
//! priority cache, and the manager that drives them from events.

mod manager;
mod power;
mod resolver;
mod types;


pub use manager::{RoomStateManager, StateMode};
pub use power::RoomPower;
pub use resolver::{
    choose_default, group_displays, DuplicateInputResolver, InputGroups, PriorityCache,
    SingletonPolicy,
};
pub use types::{AudioDevice, Display, PowerState, RoomState};
