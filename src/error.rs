//! Error types for the mute reconciliation service

use thiserror::Error;

/// Result type for automute operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the reconciliation engine and its collaborators
///
/// None of these ever leave the service: the event loop logs them and drops
/// the offending event.
#[derive(Error, Debug)]
pub enum Error {
    /// A room, device, or display identifier did not have the expected shape
    #[error("malformed identifier `{id}`: expected {expected}")]
    MalformedIdentifier {
        id: String,
        expected: &'static str,
    },

    /// An event carried a value that could not be interpreted
    #[error("invalid value `{value}` for `{key}` event")]
    InvalidValue { key: String, value: String },

    /// Network failure talking to the inventory service or feature gate
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The inventory service answered with something other than 200
    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// A collaborator returned a body that is not the JSON we expect
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The fetched room has no `audioDevices` field at all
    #[error("no audio devices found in the room")]
    NoAudioDevices,

    /// Event hub connection or subscription failure
    #[error("event hub error: {0}")]
    Hub(String),
}

impl Error {
    pub(crate) fn malformed(id: impl Into<String>, expected: &'static str) -> Self {
        Error::MalformedIdentifier {
            id: id.into(),
            expected,
        }
    }
}
