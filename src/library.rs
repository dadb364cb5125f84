//! Song discovery: audio files and their matching MIDI files

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// A playable song
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    /// Audio file
    pub audio: PathBuf,
    /// MIDI file with the same stem, if present
    pub midi: Option<PathBuf>,
}

impl Song {
    pub fn name(&self) -> String {
        self.audio
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

/// List the songs in a directory (not recursive), sorted by file name.
///
/// Every `.mp3` is a song; a `.mid` with the same stem drives its lights.
pub fn scan(dir: &Path) -> Result<Vec<Song>> {
    let mut audio_files = Vec::new();
    let mut midi_files = HashSet::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| Error::Library(format!("Failed to scan {:?}: {}", dir, e)))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.into_path();
        match path.extension().and_then(|e| e.to_str()) {
            Some("mp3") => audio_files.push(path),
            Some("mid") => {
                midi_files.insert(path);
            }
            _ => {}
        }
    }

    audio_files.sort();

    let songs: Vec<Song> = audio_files
        .into_iter()
        .map(|audio| {
            let midi = audio.with_extension("mid");
            let midi = midi_files.contains(&midi).then_some(midi);
            Song { audio, midi }
        })
        .collect();

    log::info!(
        "Found {} songs in {:?} ({} with lights)",
        songs.len(),
        dir,
        songs.iter().filter(|s| s.midi.is_some()).count()
    );
    Ok(songs)
}

/// Songs in a random play order
pub fn shuffled<R: Rng + ?Sized>(songs: &[Song], rng: &mut R) -> Vec<Song> {
    let mut order = songs.to_vec();
    order.shuffle(rng);
    order
}
