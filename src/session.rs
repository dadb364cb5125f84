//! Playing one song: audio plus its light show
//!
//! Light show setup failures never stop the music. The song plays without
//! lights and the failure is logged.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::audio::{AudioPlayback, AudioTrack};
use crate::config::{mapping_path_for, LightingConfig, SongMapping, DEFAULT_CONFIG_FILE};
use crate::error::Result;
use crate::led::{LedController, SerialTransport, DEFAULT_BAUD_RATE, DEFAULT_PORT};
use crate::library::Song;
use crate::midi::Timeline;
use crate::show::{LightPlayer, LightShow, PlayerConfig};

/// Settings shared by every song of a session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Serial device of the LED controller
    pub port: String,
    pub baud_rate: u32,
    /// Lighting configuration file
    pub lighting_config: PathBuf,
    /// Output device name, default device when None
    pub audio_device: Option<String>,
    /// Run light shows without touching the controller
    pub dry_run: bool,
    pub player: PlayerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            lighting_config: PathBuf::from(DEFAULT_CONFIG_FILE),
            audio_device: None,
            dry_run: false,
            player: PlayerConfig::default(),
        }
    }
}

/// Open the controller and push the lighting configuration to it
pub fn open_controller(config: &SessionConfig) -> Result<Arc<LedController>> {
    let transport = SerialTransport::open(&config.port, config.baud_rate)?;
    let controller = LedController::new(Box::new(transport))?;

    let lighting = LightingConfig::load(&config.lighting_config)?;
    controller.configure(&lighting)?;

    Ok(Arc::new(controller))
}

/// Load a song's MIDI file and mapping into a ready-to-run player
pub fn load_light_player(
    midi_path: &Path,
    controller: Option<Arc<LedController>>,
    config: PlayerConfig,
) -> Result<LightPlayer> {
    let mapping = SongMapping::load(&mapping_path_for(midi_path))?;
    let timeline = Timeline::load(midi_path)?;
    Ok(LightPlayer::new(timeline, mapping, controller, config))
}

/// Everything a light show needs, ready to start in sync with the audio
struct LightSetup {
    player: LightPlayer,
    controller: Option<Arc<LedController>>,
}

fn prepare_lights(midi_path: &Path, config: &SessionConfig) -> Result<LightSetup> {
    let controller = if config.dry_run {
        None
    } else {
        Some(open_controller(config)?)
    };

    let player = load_light_player(midi_path, controller.clone(), config.player)?;
    Ok(LightSetup { player, controller })
}

/// Start the audio, then the light show with its clock set to the instant
/// the audio started. Audio setup must already be done.
fn start_in_sync<F>(player: Option<LightPlayer>, start_audio: F) -> Result<Option<LightShow>>
where
    F: FnOnce() -> Result<Instant>,
{
    let started = start_audio()?;
    let Some(player) = player else {
        return Ok(None);
    };

    match LightShow::spawn_at(player, started) {
        Ok(show) => Ok(Some(show)),
        Err(e) => {
            log::error!("Failed to start light show: {}", e);
            Ok(None)
        }
    }
}

/// Play a song to the end, with lights when its MIDI file allows.
///
/// Returns an error only if the audio itself cannot be played.
pub fn play_song(song: &Song, config: &SessionConfig) -> Result<()> {
    log::info!(
        "Playing {} ({})",
        song.name(),
        song.midi
            .as_ref()
            .map(|m| m.display().to_string())
            .unwrap_or_else(|| "no lights".to_string())
    );

    let track = Arc::new(AudioTrack::load(&song.audio)?);

    let setup = song.midi.as_deref().and_then(|midi| match prepare_lights(midi, config) {
        Ok(setup) => Some(setup),
        Err(e) => {
            log::error!("Light show for {} skipped: {}", song.name(), e);
            None
        }
    });

    let (player, controller) = match setup {
        Some(LightSetup { player, controller }) => (Some(player), controller),
        None => (None, None),
    };

    let mut show: Option<LightShow> = None;
    let result = AudioPlayback::open(track, config.audio_device.as_deref()).and_then(|playback| {
        show = start_in_sync(player, || playback.play())?;
        playback.wait();
        Ok(())
    });

    if let Some(show) = show.as_mut() {
        match show.stop() {
            Ok(summary) => log::info!(
                "Light show ended: {} events, {} zone updates{}",
                summary.events,
                summary.dispatched,
                if summary.cancelled { " (stopped with audio)" } else { "" }
            ),
            Err(e) => log::warn!("Light show ended with error: {}", e),
        }
    }

    if let Some(controller) = controller {
        if let Err(e) = controller.close() {
            log::warn!("Failed to close LED controller: {}", e);
        }
    }

    result
}
