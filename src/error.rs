//! Error types for the light show

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for light show operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while preparing or running a light show
///
/// Lookup misses (unmapped channel, unmapped note, unknown zone) and
/// malformed effect templates are not errors; they simply produce no
/// lighting action.
#[derive(Debug, Error)]
pub enum Error {
    /// Lighting configuration or song mapping could not be read or parsed
    #[error("Configuration error in {path:?}: {message}")]
    Config { path: PathBuf, message: String },

    /// MIDI file could not be read or parsed
    #[error("MIDI error: {0}")]
    Midi(String),

    /// I/O failure on the controller link
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The controller link has already been closed
    #[error("Transport closed")]
    TransportClosed,

    /// Light show thread failure
    #[error("Playback error: {0}")]
    Playback(String),

    /// Audio decoding or output failure
    #[error("Audio error: {0}")]
    Audio(String),

    /// Song directory could not be scanned
    #[error("Library error: {0}")]
    Library(String),
}

impl Error {
    pub(crate) fn config(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Config {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
