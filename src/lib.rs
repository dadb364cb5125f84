//! Drives a multi-zone LED installation in time with a song's MIDI file.
//!
//! The MIDI file is flattened into a note timeline, played back against the
//! wall clock while the song's audio plays, and every note is resolved per
//! key and sent to the LED controller as a zone effect.

pub mod audio;
pub mod config;
pub mod error;
pub mod led;
pub mod library;
pub mod midi;
pub mod session;
pub mod show;

pub use error::{Error, Result};
