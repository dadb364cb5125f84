//! Song playback on the default output device
//!
//! The decoded track is streamed through a cpal output callback. When the
//! last frame has been rendered the callback fires a one-shot completion
//! signal that the session blocks on.
//!
//! Opening a device and building its stream is slow, so the stream is built
//! paused by [`AudioPlayback::open`] and started separately with
//! [`AudioPlayback::play`], which reports the instant the audio started.

use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::device::{get_output_config, get_output_device};
use super::track::AudioTrack;
use crate::error::{Error, Result};

/// Extra time allowed past the track's length before giving up on the
/// completion signal
const COMPLETION_GRACE: Duration = Duration::from_secs(5);

/// Renders a track at the device's sample rate
///
/// Rate conversion is done by stepping through the source at a fixed
/// speed ratio with linear interpolation between frames.
pub struct TrackRenderer {
    track: Arc<AudioTrack>,
    position: f64,
    speed_ratio: f64,
}

impl TrackRenderer {
    pub fn new(track: Arc<AudioTrack>, output_sample_rate: u32) -> Self {
        let speed_ratio = track.sample_rate as f64 / output_sample_rate.max(1) as f64;
        Self {
            track,
            position: 0.0,
            speed_ratio,
        }
    }

    pub fn speed_ratio(&self) -> f64 {
        self.speed_ratio
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.track.frames() as f64
    }

    /// Fill an interleaved output buffer. Returns true once the track has
    /// been rendered to the end; the remainder of the buffer is silence.
    pub fn render(&mut self, data: &mut [f32], channels: usize) -> bool {
        let channels = channels.max(1);
        let frames = self.track.frames();

        for chunk in data.chunks_mut(channels) {
            if self.position >= frames as f64 {
                chunk.fill(0.0);
                continue;
            }

            let index = self.position as usize;
            let frac = (self.position - index as f64) as f32;
            let next = (index + 1).min(frames - 1);

            for (channel, sample) in chunk.iter_mut().enumerate() {
                let a = self.track.sample(index, channel);
                let b = self.track.sample(next, channel);
                *sample = a + (b - a) * frac;
            }

            self.position += self.speed_ratio;
        }

        self.is_finished()
    }
}

/// A song on an output stream
///
/// Dropping it stops the output stream.
pub struct AudioPlayback {
    stream: cpal::Stream,
    done: Receiver<()>,
    duration: Duration,
}

impl AudioPlayback {
    /// Build a paused stream for `track` on an output device (the default
    /// one when `device_name` is None)
    pub fn open(track: Arc<AudioTrack>, device_name: Option<&str>) -> Result<Self> {
        let device = get_output_device(device_name)?;
        let stream_config = get_output_config(&device)?;
        let channels = stream_config.channels as usize;
        let sample_rate = stream_config.sample_rate.0;

        let mut renderer = TrackRenderer::new(Arc::clone(&track), sample_rate);
        log::info!(
            "Opened output stream: {} Hz, {} channels (speed ratio {:.4})",
            sample_rate,
            channels,
            renderer.speed_ratio()
        );

        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let error_tx: Sender<()> = done_tx.clone();
        let mut signalled = false;

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let finished = renderer.render(data, channels);
                    if finished && !signalled {
                        signalled = true;
                        let _ = done_tx.try_send(());
                    }
                },
                move |err| {
                    log::error!("Audio stream error: {}", err);
                    let _ = error_tx.try_send(());
                },
                None,
            )
            .map_err(|e| Error::Audio(format!("Failed to build output stream: {}", e)))?;

        // some hosts start streams as soon as they are built
        if let Err(e) = stream.pause() {
            log::warn!("Failed to pause new output stream: {}", e);
        }

        Ok(Self {
            stream,
            done: done_rx,
            duration: track.duration(),
        })
    }

    /// Start the stream. Returns the instant playback began.
    pub fn play(&self) -> Result<Instant> {
        let started = Instant::now();
        self.stream
            .play()
            .map_err(|e| Error::Audio(format!("Failed to start stream: {}", e)))?;
        Ok(started)
    }

    /// Block until the song has finished playing
    pub fn wait(&self) {
        match self.done.recv_timeout(self.duration + COMPLETION_GRACE) {
            Ok(()) => log::debug!("Playback complete"),
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("Playback did not report completion, moving on")
            }
            Err(RecvTimeoutError::Disconnected) => log::warn!("Audio stream ended unexpectedly"),
        }
    }
}
