//! MIDI file handling: note timeline and polyphony resolution

mod note_stack;
mod timeline;

pub use note_stack::{NoteEntry, NoteStack, NUM_KEYS};
pub use timeline::{NoteKind, TempoChange, TempoMap, TimedEvent, Timeline, DEFAULT_MICROS_PER_BEAT};
