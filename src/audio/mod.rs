//! Song audio: decoding and playback
//!
//! Audio only drives the session's timing. Once a song has been rendered
//! to the end, the completion signal tells the session to tear down the
//! light show.

pub mod device;
mod playback;
mod track;

pub use playback::{AudioPlayback, TrackRenderer};
pub use track::AudioTrack;
