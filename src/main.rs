use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use lightshow::audio::device::list_output_devices;
use lightshow::config::DEFAULT_CONFIG_FILE;
use lightshow::led::{DEFAULT_BAUD_RATE, DEFAULT_PORT};
use lightshow::library;
use lightshow::session::{play_song, SessionConfig};
use lightshow::show::PlayerConfig;

/// Pause after a song fails before moving on
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Play every song in a directory with its MIDI-driven light show
#[derive(Parser, Debug)]
#[command(name = "lightshow", version, about)]
struct Cli {
    /// Directory containing song.mp3 / song.mid / song.map.yaml files
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Serial device of the LED controller
    #[arg(short, long, default_value = DEFAULT_PORT)]
    port: String,

    /// Serial baud rate
    #[arg(short, long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Lighting configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Audio output device (default device if omitted)
    #[arg(long)]
    device: Option<String>,

    /// List audio output devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Log every note event at info level
    #[arg(short, long)]
    verbose: bool,

    /// Run light shows without opening the LED controller
    #[arg(long)]
    dry_run: bool,

    /// Play the directory once instead of looping forever
    #[arg(long)]
    once: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Cli::parse()) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if cli.list_devices {
        for device in list_output_devices()? {
            println!("{}{}", device.name, if device.is_default { " (default)" } else { "" });
        }
        return Ok(());
    }

    let config = SessionConfig {
        port: cli.port,
        baud_rate: cli.baud,
        lighting_config: cli.config,
        audio_device: cli.device,
        dry_run: cli.dry_run,
        player: PlayerConfig {
            event_log_level: if cli.verbose { log::Level::Info } else { log::Level::Debug },
        },
    };

    let mut rng = rand::thread_rng();

    loop {
        let songs = library::scan(&cli.dir)
            .with_context(|| format!("Failed to list songs in {}", cli.dir.display()))?;
        if songs.is_empty() {
            log::warn!("No songs found in {}", cli.dir.display());
            if cli.once {
                return Ok(());
            }
            std::thread::sleep(RETRY_DELAY);
            continue;
        }

        for song in library::shuffled(&songs, &mut rng) {
            if let Err(e) = play_song(&song, &config) {
                log::error!("Failed to play {}: {}", song.name(), e);
                std::thread::sleep(RETRY_DELAY);
            }
        }

        if cli.once {
            return Ok(());
        }
    }
}
