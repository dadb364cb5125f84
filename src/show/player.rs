//! Real-time light player
//!
//! Walks a note timeline against the wall clock and turns each note into a
//! zone effect. Sleeping between events is done on a cancellation channel so
//! a light show stops promptly when its song ends.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use super::effect::EffectTemplate;
use crate::config::{note_name, SongMapping};
use crate::error::{Error, Result};
use crate::led::LedController;
use crate::midi::{NoteKind, NoteStack, TimedEvent, Timeline};

/// Player settings
#[derive(Debug, Clone, Copy)]
pub struct PlayerConfig {
    /// Level at which every dispatched note is logged
    pub event_log_level: log::Level,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            event_log_level: log::Level::Debug,
        }
    }
}

/// Outcome of a playback run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackSummary {
    /// Events walked (dispatched or ignored)
    pub events: usize,
    /// Effect commands handed to the controller
    pub dispatched: usize,
    /// Whether playback stopped before the end of the timeline
    pub cancelled: bool,
}

/// Plays one song's timeline on the LED controller
pub struct LightPlayer {
    timeline: Timeline,
    mapping: SongMapping,
    templates: HashMap<u8, EffectTemplate>,
    /// `None` runs the show without hardware (logging only)
    controller: Option<Arc<LedController>>,
    notes: NoteStack,
    config: PlayerConfig,
}

impl LightPlayer {
    pub fn new(
        timeline: Timeline,
        mapping: SongMapping,
        controller: Option<Arc<LedController>>,
        config: PlayerConfig,
    ) -> Self {
        let templates = mapping
            .channels
            .iter()
            .map(|(&channel, template)| {
                let parsed = EffectTemplate::parse(template);
                if parsed == EffectTemplate::Unsupported {
                    log::warn!(
                        "Channel {} has unsupported effect template '{}', its notes will turn zones off",
                        channel,
                        template
                    );
                }
                (channel, parsed)
            })
            .collect();

        Self {
            timeline,
            mapping,
            templates,
            controller,
            notes: NoteStack::new(),
            config,
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Play the timeline from now until it ends or `cancel` fires
    pub fn run(&mut self, cancel: &Receiver<()>) -> Result<PlaybackSummary> {
        self.run_from(Instant::now(), cancel)
    }

    /// Play the timeline with event offsets measured from `start`.
    ///
    /// Any message on `cancel`, or dropping every sender, stops playback
    /// between events. Late events are dispatched immediately. A transport
    /// error aborts the rest of the show.
    pub fn run_from(&mut self, start: Instant, cancel: &Receiver<()>) -> Result<PlaybackSummary> {
        self.notes.clear();
        let mut summary = PlaybackSummary::default();

        log::info!(
            "Light show started: {} events over {:.1}s",
            self.timeline.len(),
            self.timeline.duration().as_secs_f32()
        );

        for index in 0..self.timeline.len() {
            let event = self.timeline.events()[index];
            let deadline = start + event.offset();

            if wait_until(deadline, cancel) {
                summary.cancelled = true;
                log::info!("Light show cancelled after {} events", summary.events);
                return Ok(summary);
            }

            summary.events += 1;
            if self.dispatch(&event)? {
                summary.dispatched += 1;
            }
        }

        log::info!(
            "Light show finished: {} events, {} zone updates",
            summary.events,
            summary.dispatched
        );
        Ok(summary)
    }

    /// Apply one note event. Returns whether an effect was sent.
    pub fn dispatch(&mut self, event: &TimedEvent) -> Result<bool> {
        let level = self.config.event_log_level;
        log::log!(
            level,
            "{:?} (channel={}, key={}, velocity={})",
            event.kind,
            event.channel,
            event.key,
            event.velocity
        );

        let effect = match event.kind {
            NoteKind::On => {
                let Some(template) = self.templates.get(&event.channel) else {
                    return Ok(false);
                };
                let effect = template.effect(event.velocity);
                self.notes.play(event.key, event.channel, effect)
            }
            NoteKind::Off => self.notes.release(event.key, event.channel),
        };

        let note = note_name(event.key);
        let zone = note.as_deref().and_then(|n| self.mapping.zone_for_note(n));
        log::log!(
            level,
            "  note={}, zone={}, effect={:08x}",
            note.as_deref().unwrap_or("-"),
            zone.unwrap_or("-"),
            effect
        );

        let (Some(zone), Some(controller)) = (zone, self.controller.as_ref()) else {
            return Ok(false);
        };

        controller.set_zone_effect(zone, effect)
    }
}

/// Sleep until `deadline`. Returns true if cancelled first.
fn wait_until(deadline: Instant, cancel: &Receiver<()>) -> bool {
    let now = Instant::now();
    if deadline <= now {
        // late: still honour a pending cancel, but never sleep
        return match cancel.try_recv() {
            Ok(()) => true,
            Err(e) => e.is_disconnected(),
        };
    }
    match cancel.recv_timeout(deadline - now) {
        Err(RecvTimeoutError::Timeout) => false,
        Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
    }
}

/// A light player running on its own thread
pub struct LightShow {
    cancel: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<Result<PlaybackSummary>>>,
}

impl LightShow {
    /// Start playing immediately on a background thread
    pub fn spawn(player: LightPlayer) -> Result<Self> {
        Self::spawn_at(player, Instant::now())
    }

    /// Play on a background thread with the show's clock starting at
    /// `start`, usually the instant the song's audio started
    pub fn spawn_at(mut player: LightPlayer, start: Instant) -> Result<Self> {
        let (cancel_tx, cancel_rx) = crossbeam_channel::bounded(1);

        let handle = thread::Builder::new()
            .name("light-show".to_string())
            .spawn(move || {
                let result = player.run_from(start, &cancel_rx);
                if let Err(e) = &result {
                    log::error!("Light show aborted: {}", e);
                }
                result
            })?;

        Ok(Self {
            cancel: Some(cancel_tx),
            handle: Some(handle),
        })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Cancel playback and wait for the thread to exit
    pub fn stop(&mut self) -> Result<PlaybackSummary> {
        if let Some(cancel) = self.cancel.take() {
            // the thread may already be gone; dropping the sender cancels too
            let _ = cancel.try_send(());
        }
        self.join()
    }

    /// Wait for the timeline to finish on its own
    pub fn join(&mut self) -> Result<PlaybackSummary> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(Error::Playback("light show thread panicked".to_string()))),
            None => Ok(PlaybackSummary::default()),
        }
    }
}

impl Drop for LightShow {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LightingConfig, StripConfig, ZoneConfig};
    use crate::led::memory::{FrameLog, MemoryTransport};
    use crate::led::Command;
    use std::time::Duration;

    const C4: u8 = 60;

    fn event(micros: u64, channel: u8, key: u8, velocity: u8, kind: NoteKind) -> TimedEvent {
        TimedEvent {
            micros,
            tick: micros,
            track: 0,
            channel,
            key,
            velocity,
            kind,
        }
    }

    fn mapping() -> SongMapping {
        let mut mapping = SongMapping::default();
        mapping.keys.insert("C4".to_string(), "left".to_string());
        mapping.keys.insert("D4".to_string(), "ghost".to_string());
        mapping.channels.insert(0, "0xFF0000".to_string());
        mapping.channels.insert(1, "0x0000FF".to_string());
        mapping.channels.insert(2, "sparkle".to_string());
        mapping
    }

    fn controller() -> (Arc<LedController>, FrameLog) {
        let transport = MemoryTransport::new();
        let log = transport.log();
        let controller = LedController::new(Box::new(transport)).unwrap();
        let config = LightingConfig {
            strips: vec![StripConfig {
                zones: vec![ZoneConfig { name: "left".to_string(), on: 1, off: 0 }],
            }],
        };
        controller.configure(&config).unwrap();
        log.clear();
        (Arc::new(controller), log)
    }

    fn player(events: Vec<TimedEvent>, controller: Option<Arc<LedController>>) -> LightPlayer {
        LightPlayer::new(
            Timeline::from_events(events),
            mapping(),
            controller,
            PlayerConfig::default(),
        )
    }

    fn effect_values(log: &FrameLog) -> Vec<u32> {
        log.effects()
            .into_iter()
            .map(|c| match c {
                Command::SetEffect { effect, .. } => effect,
                _ => unreachable!(),
            })
            .collect()
    }

    #[test]
    fn test_overlapping_chord_on_one_key() {
        let (controller, log) = controller();
        let mut player = player(
            vec![
                event(0, 0, C4, 127, NoteKind::On),
                event(1_000, 1, C4, 127, NoteKind::On),
                event(2_000, 0, C4, 0, NoteKind::Off),
                event(3_000, 1, C4, 0, NoteKind::Off),
            ],
            Some(controller),
        );

        let (_tx, rx) = crossbeam_channel::bounded(1);
        let summary = player.run(&rx).unwrap();

        assert_eq!(summary, PlaybackSummary { events: 4, dispatched: 4, cancelled: false });
        assert_eq!(effect_values(&log), vec![0xFD0000, 0x0000FD, 0x0000FD, 0]);
    }

    #[test]
    fn test_unmapped_channel_sends_nothing() {
        let (controller, log) = controller();
        let mut player = player(vec![event(0, 5, C4, 100, NoteKind::On)], Some(controller));

        let (_tx, rx) = crossbeam_channel::bounded(1);
        let summary = player.run(&rx).unwrap();

        assert_eq!(summary.dispatched, 0);
        assert!(log.is_empty());
    }

    #[test]
    fn test_unmapped_note_and_unknown_zone_send_nothing() {
        let (controller, log) = controller();
        let mut player = player(Vec::new(), Some(controller));

        // E4 has no zone, D4 maps to a zone missing from the lighting config
        assert!(!player.dispatch(&event(0, 0, 64, 100, NoteKind::On)).unwrap());
        assert!(!player.dispatch(&event(0, 0, 62, 100, NoteKind::On)).unwrap());
        // key below the piano range has no note name
        assert!(!player.dispatch(&event(0, 0, 5, 100, NoteKind::On)).unwrap());
        assert!(log.is_empty());
    }

    #[test]
    fn test_unsupported_template_turns_zone_off() {
        let (controller, log) = controller();
        let mut player = player(Vec::new(), Some(controller));

        assert!(player.dispatch(&event(0, 2, C4, 100, NoteKind::On)).unwrap());
        assert_eq!(effect_values(&log), vec![0]);
    }

    #[test]
    fn test_note_off_on_unmapped_channel_reveals_held_note() {
        let (controller, log) = controller();
        let mut player = player(Vec::new(), Some(controller));

        player.dispatch(&event(0, 0, C4, 64, NoteKind::On)).unwrap();
        // channel 7 never played, so the release leaves channel 0 visible
        player.dispatch(&event(0, 7, C4, 0, NoteKind::Off)).unwrap();
        assert_eq!(effect_values(&log), vec![0x7F0000, 0x7F0000]);
    }

    #[test]
    fn test_dry_run_without_controller() {
        let mut player = player(vec![event(0, 0, C4, 100, NoteKind::On)], None);
        let (_tx, rx) = crossbeam_channel::bounded(1);
        let summary = player.run(&rx).unwrap();
        assert_eq!(summary.events, 1);
        assert_eq!(summary.dispatched, 0);
    }

    #[test]
    fn test_events_wait_for_their_offset() {
        let (controller, _log) = controller();
        let mut player = player(
            vec![
                event(0, 0, C4, 100, NoteKind::On),
                event(50_000, 0, C4, 0, NoteKind::Off),
            ],
            Some(controller),
        );

        let (_tx, rx) = crossbeam_channel::bounded(1);
        let started = Instant::now();
        player.run(&rx).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_offsets_measured_from_given_start() {
        let (controller, log) = controller();
        let mut player = player(vec![event(0, 0, C4, 100, NoteKind::On)], Some(controller));

        let (_tx, rx) = crossbeam_channel::bounded(1);
        let started = Instant::now();
        player.run_from(started + Duration::from_millis(80), &rx).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(80));
        assert_eq!(log.effects().len(), 1);
    }

    #[test]
    fn test_start_in_the_past_catches_up() {
        let (controller, log) = controller();
        let mut player = player(
            vec![
                event(0, 0, C4, 100, NoteKind::On),
                event(100_000, 0, C4, 0, NoteKind::Off),
            ],
            Some(controller),
        );

        let (_tx, rx) = crossbeam_channel::bounded(1);
        let start = Instant::now() - Duration::from_millis(500);
        let started = Instant::now();
        player.run_from(start, &rx).unwrap();
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(effect_values(&log), vec![0xC70000, 0]);
    }

    #[test]
    fn test_zone_dropped_by_reconfigure_sends_nothing() {
        let (controller, log) = controller();
        let mut player = player(Vec::new(), Some(Arc::clone(&controller)));

        assert!(player.dispatch(&event(0, 0, C4, 100, NoteKind::On)).unwrap());
        controller.configure(&LightingConfig::default()).unwrap();
        log.clear();

        assert!(!player.dispatch(&event(0, 0, C4, 0, NoteKind::Off)).unwrap());
        assert!(log.is_empty());
    }

    #[test]
    fn test_cancel_stops_between_events() {
        let (controller, log) = controller();
        let show = player(
            vec![
                event(0, 0, C4, 100, NoteKind::On),
                event(10_000_000, 0, C4, 0, NoteKind::Off),
            ],
            Some(controller),
        );

        let mut show = LightShow::spawn(show).unwrap();
        thread::sleep(Duration::from_millis(50));

        let started = Instant::now();
        let summary = show.stop().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(summary.cancelled);
        assert_eq!(summary.events, 1);
        assert_eq!(log.effects().len(), 1);
    }

    #[test]
    fn test_transport_error_aborts_show() {
        let transport = MemoryTransport::new().fail_after(3);
        let log = transport.log();
        let controller = LedController::new(Box::new(transport)).unwrap();
        let config = LightingConfig {
            strips: vec![StripConfig {
                zones: vec![ZoneConfig { name: "left".to_string(), on: 1, off: 0 }],
            }],
        };
        // reset + on-level use two of the three allowed frames
        controller.configure(&config).unwrap();

        let mut player = player(
            vec![
                event(0, 0, C4, 100, NoteKind::On),
                event(0, 1, C4, 100, NoteKind::On),
                event(0, 1, C4, 0, NoteKind::Off),
            ],
            Some(Arc::new(controller)),
        );
        let (_tx, rx) = crossbeam_channel::bounded(1);
        assert!(matches!(player.run(&rx), Err(Error::Transport(_))));
        assert_eq!(log.effects().len(), 1);
    }

    #[test]
    fn test_closed_controller_aborts_show() {
        let (controller, _log) = controller();
        controller.close().unwrap();
        let mut player = player(vec![event(0, 0, C4, 100, NoteKind::On)], Some(controller));
        let (_tx, rx) = crossbeam_channel::bounded(1);
        assert!(matches!(player.run(&rx), Err(Error::TransportClosed)));
    }
}
