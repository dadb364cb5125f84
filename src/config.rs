//! Lighting configuration and per-song mapping files
//!
//! Both files are YAML. The lighting configuration describes the physical
//! installation (strips of zones), the song mapping tells the player which
//! zone a note drives and which effect a MIDI channel produces.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default lighting configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Physical layout of the installation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    /// Strips in controller order
    pub strips: Vec<StripConfig>,
}

/// One LED strip, an ordered list of zones
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StripConfig {
    pub zones: Vec<ZoneConfig>,
}

/// One independently controllable zone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// Name used by song mappings. Empty names are not addressable.
    pub name: String,
    /// "On" level sent with the set-on-level command
    pub on: u16,
    /// "Off" level; zero means the controller default is kept
    pub off: u16,
}

impl LightingConfig {
    /// Load the lighting configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(path, format!("failed to read: {}", e)))?;
        Self::from_yaml_str(&content).map_err(|e| match e {
            Error::Config { message, .. } => Error::config(path, message),
            other => other,
        })
    }

    /// Parse the lighting configuration from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::config("<inline>", format!("failed to parse: {}", e)))
    }
}

/// Per-song mapping from notes to zones and channels to effects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SongMapping {
    /// Note name (e.g. "C#4") to zone name
    pub keys: HashMap<String, String>,
    /// MIDI channel (0-15) to effect template
    pub channels: HashMap<u8, String>,
}

impl SongMapping {
    /// Load a song mapping from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(path, format!("failed to read mapping: {}", e)))?;
        Self::from_yaml_str(&content).map_err(|e| match e {
            Error::Config { message, .. } => Error::config(path, message),
            other => other,
        })
    }

    /// Parse a song mapping from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::config("<inline>", format!("failed to parse mapping: {}", e)))
    }

    /// Effect template for a channel, if the channel drives lights
    pub fn effect_template(&self, channel: u8) -> Option<&str> {
        self.channels.get(&channel).map(String::as_str)
    }

    /// Zone driven by a note name
    pub fn zone_for_note(&self, note: &str) -> Option<&str> {
        self.keys.get(note).map(String::as_str)
    }
}

/// Mapping file that accompanies a MIDI file: `song.mid` -> `song.map.yaml`
pub fn mapping_path_for(midi_path: &Path) -> PathBuf {
    midi_path.with_extension("map.yaml")
}

const NOTE_NAMES: [&str; 12] = [
    "A", "A#", "B", "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#",
];

/// Name of a MIDI key in piano notation (key 21 = "A0", key 60 = "C4")
///
/// Keys below the piano range have no name.
pub fn note_name(key: u8) -> Option<String> {
    if key < 21 {
        return None;
    }

    let pitch_class = ((key - 21) % 12) as usize;
    let octave = (key - 12) / 12;
    Some(format!("{}{}", NOTE_NAMES[pitch_class], octave))
}
