//! Flattening a multi-track MIDI file into one ordered note timeline
//!
//! Each track's delta times are accumulated independently, note events are
//! stamped with their absolute tick and wall-clock offset, and the merged
//! list is stably sorted by tick so simultaneous notes keep their file order.

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default tempo when a file has no tempo event before a note (120 BPM)
pub const DEFAULT_MICROS_PER_BEAT: u32 = 500_000;

/// Note on or off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
    On,
    Off,
}

/// A note event at an absolute position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedEvent {
    /// Offset from the start of the song in microseconds
    pub micros: u64,
    /// Absolute tick
    pub tick: u64,
    /// Track the event came from (ordering only)
    pub track: usize,
    /// MIDI channel (0-15)
    pub channel: u8,
    /// MIDI key (0-127)
    pub key: u8,
    /// Velocity (0-127)
    pub velocity: u8,
    pub kind: NoteKind,
}

impl TimedEvent {
    /// Offset from the start of playback
    pub fn offset(&self) -> Duration {
        Duration::from_micros(self.micros)
    }
}

/// A tempo change in absolute ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempoChange {
    pub tick: u64,
    /// Microseconds elapsed at `tick`
    pub micros: u64,
    pub micros_per_beat: u32,
}

/// Converts absolute ticks to microseconds
#[derive(Debug, Clone, PartialEq)]
pub enum TempoMap {
    /// Ticks per quarter note with tempo changes, always starting at tick 0
    Metrical {
        ticks_per_beat: u16,
        changes: Vec<TempoChange>,
    },
    /// SMPTE timing: a fixed duration per tick
    Timecode { micros_per_tick: f64 },
}

impl TempoMap {
    /// Build the tempo map from every tempo event in every track
    pub fn from_smf(smf: &Smf) -> Self {
        let ticks_per_beat = match smf.header.timing {
            Timing::Metrical(tpb) => tpb.as_int().max(1),
            Timing::Timecode(fps, ticks_per_frame) => {
                let ticks_per_second = fps.as_f32() as f64 * ticks_per_frame.max(1) as f64;
                return TempoMap::Timecode {
                    micros_per_tick: 1_000_000.0 / ticks_per_second,
                };
            }
        };

        let mut tempos: Vec<(u64, u32)> = Vec::new();
        for track in &smf.tracks {
            let mut tick: u64 = 0;
            for event in track {
                tick += event.delta.as_int() as u64;
                if let TrackEventKind::Meta(MetaMessage::Tempo(tempo)) = event.kind {
                    tempos.push((tick, tempo.as_int()));
                }
            }
        }
        Self::metrical(ticks_per_beat, tempos)
    }

    /// Build a metrical tempo map from `(tick, micros_per_beat)` pairs
    pub fn metrical(ticks_per_beat: u16, mut tempos: Vec<(u64, u32)>) -> Self {
        let ticks_per_beat = ticks_per_beat.max(1);
        tempos.sort_by_key(|&(tick, _)| tick);

        let mut changes = vec![TempoChange {
            tick: 0,
            micros: 0,
            micros_per_beat: DEFAULT_MICROS_PER_BEAT,
        }];

        for (tick, micros_per_beat) in tempos {
            let last = changes[changes.len() - 1];
            let micros = last.micros + ticks_to_micros(tick - last.tick, last.micros_per_beat, ticks_per_beat);
            let change = TempoChange { tick, micros, micros_per_beat };
            // a later tempo at the same tick wins
            if last.tick == tick {
                let end = changes.len() - 1;
                changes[end] = change;
            } else {
                changes.push(change);
            }
        }

        TempoMap::Metrical { ticks_per_beat, changes }
    }

    /// Microseconds from the start of the file at an absolute tick
    pub fn micros_at(&self, tick: u64) -> u64 {
        match self {
            TempoMap::Metrical { ticks_per_beat, changes } => {
                let index = changes.partition_point(|c| c.tick <= tick).saturating_sub(1);
                let change = changes[index];
                change.micros
                    + ticks_to_micros(tick - change.tick, change.micros_per_beat, *ticks_per_beat)
            }
            TempoMap::Timecode { micros_per_tick } => (tick as f64 * micros_per_tick) as u64,
        }
    }
}

fn ticks_to_micros(ticks: u64, micros_per_beat: u32, ticks_per_beat: u16) -> u64 {
    (ticks as u128 * micros_per_beat as u128 / ticks_per_beat as u128) as u64
}

/// Every note event of a MIDI file in playback order
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    events: Vec<TimedEvent>,
}

impl Timeline {
    /// Read and flatten a MIDI file
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .map_err(|e| Error::Midi(format!("Failed to read MIDI file {:?}: {}", path, e)))?;
        let smf = Smf::parse(&data)
            .map_err(|e| Error::Midi(format!("Failed to parse MIDI file {:?}: {}", path, e)))?;

        let timeline = Self::from_smf(&smf);
        log::info!(
            "Loaded {:?}: {} tracks, {} note events, {:.1}s",
            path,
            smf.tracks.len(),
            timeline.len(),
            timeline.duration().as_secs_f32()
        );
        Ok(timeline)
    }

    /// Flatten a parsed MIDI file. Non-note messages are dropped.
    pub fn from_smf(smf: &Smf) -> Self {
        let tempo_map = TempoMap::from_smf(smf);
        let mut events = Vec::new();

        for (track_index, track) in smf.tracks.iter().enumerate() {
            let mut tick: u64 = 0;

            for event in track {
                tick += event.delta.as_int() as u64;

                let TrackEventKind::Midi { channel, message } = event.kind else {
                    continue;
                };

                let (key, velocity, kind) = match message {
                    // velocity 0 note-on is a note-off by convention
                    MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => {
                        (key.as_int(), 0, NoteKind::Off)
                    }
                    MidiMessage::NoteOn { key, vel } => (key.as_int(), vel.as_int(), NoteKind::On),
                    MidiMessage::NoteOff { key, vel } => (key.as_int(), vel.as_int(), NoteKind::Off),
                    _ => continue,
                };

                events.push(TimedEvent {
                    micros: tempo_map.micros_at(tick),
                    tick,
                    track: track_index,
                    channel: channel.as_int(),
                    key,
                    velocity,
                    kind,
                });
            }
        }

        Self::from_events(events)
    }

    /// Order already-stamped events; equal ticks keep their relative order
    pub fn from_events(mut events: Vec<TimedEvent>) -> Self {
        events.sort_by_key(|event| event.tick);
        Self { events }
    }

    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Offset of the last event
    pub fn duration(&self) -> Duration {
        self.events.last().map(TimedEvent::offset).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::num::{u15, u24, u28, u4, u7};
    use midly::{Format, Fps, Header, TrackEvent};

    fn note_on(delta: u32, channel: u8, key: u8, vel: u8) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(channel),
                message: MidiMessage::NoteOn { key: u7::new(key), vel: u7::new(vel) },
            },
        }
    }

    fn note_off(delta: u32, channel: u8, key: u8) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(channel),
                message: MidiMessage::NoteOff { key: u7::new(key), vel: u7::new(0) },
            },
        }
    }

    fn tempo(delta: u32, micros_per_beat: u32) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(micros_per_beat))),
        }
    }

    fn smf(tracks: Vec<Vec<TrackEvent<'static>>>) -> Smf<'static> {
        let mut smf = Smf::new(Header::new(Format::Parallel, Timing::Metrical(u15::new(480))));
        smf.tracks = tracks;
        smf
    }

    #[test]
    fn test_default_tempo() {
        let map = TempoMap::metrical(480, vec![]);
        assert_eq!(map.micros_at(0), 0);
        assert_eq!(map.micros_at(480), 500_000);
        assert_eq!(map.micros_at(720), 750_000);
    }

    #[test]
    fn test_tempo_changes_integrate() {
        // 120 BPM for one beat, then 60 BPM
        let map = TempoMap::metrical(480, vec![(480, 1_000_000)]);
        assert_eq!(map.micros_at(480), 500_000);
        assert_eq!(map.micros_at(960), 1_500_000);

        // a tempo at tick 0 replaces the default
        let map = TempoMap::metrical(100, vec![(0, 250_000)]);
        assert_eq!(map.micros_at(100), 250_000);
    }

    #[test]
    fn test_merges_tracks_in_tick_order() {
        let smf = smf(vec![
            vec![tempo(0, 500_000), note_on(480, 0, 60, 100), note_off(480, 0, 60)],
            vec![note_on(240, 1, 62, 90), note_off(960, 1, 62)],
        ]);
        let timeline = Timeline::from_smf(&smf);
        let ticks: Vec<u64> = timeline.events().iter().map(|e| e.tick).collect();
        assert_eq!(ticks, vec![240, 480, 960, 1200]);

        for pair in timeline.events().windows(2) {
            assert!(pair[0].micros <= pair[1].micros);
        }
        assert_eq!(timeline.events()[0].micros, 250_000);
        assert_eq!(timeline.duration(), Duration::from_micros(1_250_000));
    }

    #[test]
    fn test_tempo_from_another_track() {
        // notes in track 0, the slowdown lives in track 1
        let smf = smf(vec![
            vec![note_on(960, 0, 60, 100)],
            vec![tempo(480, 1_000_000)],
        ]);
        let timeline = Timeline::from_smf(&smf);
        assert_eq!(timeline.events()[0].micros, 1_500_000);
    }

    #[test]
    fn test_timecode_timing() {
        // 25 fps * 40 ticks per frame = 1000 ticks per second, tempo ignored
        let mut smf = Smf::new(Header::new(Format::Parallel, Timing::Timecode(Fps::Fps25, 40)));
        smf.tracks = vec![vec![tempo(0, 1_000_000), note_on(1000, 0, 60, 100)]];

        assert!(matches!(TempoMap::from_smf(&smf), TempoMap::Timecode { .. }));
        let timeline = Timeline::from_smf(&smf);
        assert_eq!(timeline.events()[0].micros, 1_000_000);
    }

    #[test]
    fn test_equal_ticks_keep_emission_order() {
        let smf = smf(vec![
            vec![note_on(100, 0, 60, 1), note_on(0, 0, 64, 2)],
            vec![note_on(100, 1, 67, 3), note_on(0, 1, 72, 4)],
        ]);
        let timeline = Timeline::from_smf(&smf);
        let order: Vec<(usize, u8)> = timeline.events().iter().map(|e| (e.track, e.key)).collect();
        assert_eq!(order, vec![(0, 60), (0, 64), (1, 67), (1, 72)]);
    }

    #[test]
    fn test_velocity_zero_is_note_off_and_other_messages_dropped() {
        let program_change = TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::ProgramChange { program: u7::new(5) },
            },
        };
        let smf = smf(vec![vec![program_change, note_on(10, 0, 60, 80), note_on(10, 0, 60, 0)]]);
        let timeline = Timeline::from_smf(&smf);

        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.events()[0].kind, NoteKind::On);
        assert_eq!(timeline.events()[0].velocity, 80);
        assert_eq!(timeline.events()[1].kind, NoteKind::Off);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.mid");
        std::fs::write(&path, b"not a midi file").unwrap();
        assert!(matches!(Timeline::load(&path), Err(Error::Midi(_))));
        assert!(matches!(Timeline::load(&dir.path().join("none.mid")), Err(Error::Midi(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.mid");
        smf(vec![vec![note_on(0, 2, 21, 64), note_off(480, 2, 21)]])
            .save(&path)
            .unwrap();

        let timeline = Timeline::load(&path).unwrap();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.events()[0].channel, 2);
        assert_eq!(timeline.duration(), Duration::from_millis(500));
    }
}
