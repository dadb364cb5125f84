//! Audio file decoding via Symphonia

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{Error, Result};

/// A fully decoded song
#[derive(Debug, Clone)]
pub struct AudioTrack {
    /// Interleaved samples
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

impl AudioTrack {
    /// Decode an audio file (mp3, wav, aac) into memory
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::Audio(format!("Failed to open {:?}: {}", path, e)))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::Audio(format!("Unsupported audio format {:?}: {}", path, e)))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Audio(format!("No audio track in {:?}", path)))?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
        let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Audio(format!("Failed to create decoder: {}", e)))?;

        let mut samples: Vec<f32> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(Error::Audio(format!("Failed to read packet: {}", e))),
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    sample_rate = spec.rate;
                    channels = spec.channels.count();

                    let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
                // corrupt frames are skipped, the rest of the song still plays
                Err(SymphoniaError::DecodeError(e)) => {
                    log::warn!("Skipping undecodable frame in {:?}: {}", path, e);
                }
                Err(e) => return Err(Error::Audio(format!("Decode failed: {}", e))),
            }
        }

        let track = Self {
            samples,
            sample_rate,
            channels: channels.max(1),
        };
        log::info!(
            "Decoded {:?}: {} Hz, {} channels, {:.2}s",
            path,
            track.sample_rate,
            track.channels,
            track.duration().as_secs_f32()
        );
        Ok(track)
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1)
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Sample at `frame` for output channel `channel`.
    ///
    /// Mono tracks feed every output channel; missing channels are silent.
    #[inline]
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        let source_channel = if self.channels == 1 { 0 } else { channel };
        if source_channel >= self.channels {
            return 0.0;
        }
        self.samples
            .get(frame * self.channels + source_channel)
            .copied()
            .unwrap_or(0.0)
    }
}
