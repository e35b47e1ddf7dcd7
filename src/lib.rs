//! automute - duplicate audio suppression for shared-input displays
//!
//! When several displays in a room show the same input, only one of them
//! should play audio. This crate listens to a room's device events, keeps an
//! in-memory picture of the room, decides which display carries audio for
//! each input, and pushes the result to the room inventory service.

pub mod config;
pub mod error;
pub mod events;
pub mod gate;
pub mod hub;
pub mod ids;
pub mod service;
pub mod state;
pub mod store;

pub use error::{Error, Result};
pub use events::{Event, RoomEvent};
pub use ids::{DeviceId, RoomId};
pub use state::{DuplicateInputResolver, RoomState, RoomStateManager};
pub use store::{HttpStateStore, StateStore};
