use thiserror::Error;

/// Errors produced by the clip capture pipeline.
///
/// Only `Device` (while arming) and `StorageWrite` (while saving) are meant to
/// reach the user. The rest are absorbed by the layer that sees them first.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClipError {
    /// Camera or microphone unavailable, or permission denied
    #[error("Device error: {0}")]
    Device(String),
    /// A bandwidth probe round failed
    #[error("Network measurement error: {0}")]
    NetworkMeasurement(String),
    /// The storage medium rejected a write
    #[error("Storage write error: {0}")]
    StorageWrite(String),
    /// The storage medium could not be read
    #[error("Storage read error: {0}")]
    StorageRead(String),
    /// A stored payload could not be decoded
    #[error("Codec error: {0}")]
    Codec(String),
    /// A command arrived in a state that cannot accept it
    #[error("Invalid state: {0}")]
    InvalidState(String),
    /// Configuration failed to load or validate
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClipError {
    /// Whether this failure should be shown to the user rather than absorbed.
    pub fn is_user_visible(&self) -> bool {
        matches!(self, ClipError::Device(_) | ClipError::StorageWrite(_))
    }
}

pub type ClipResult<T> = Result<T, ClipError>;
