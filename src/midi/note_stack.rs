//! Per-key polyphony resolution
//!
//! Several channels can hold the same key at once. The most recently
//! triggered one decides what the key's zone shows; releasing it reveals
//! the next most recent note that is still held.

/// Number of MIDI keys
pub const NUM_KEYS: usize = 128;

/// A held note on one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEntry {
    pub channel: u8,
    pub effect: u32,
}

/// Held notes for every key, oldest first
///
/// Within a key each channel appears at most once; the last entry is the
/// visible one. Only the player's dispatch path mutates it.
#[derive(Debug, Clone)]
pub struct NoteStack {
    keys: [Vec<NoteEntry>; NUM_KEYS],
}

impl Default for NoteStack {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteStack {
    pub fn new() -> Self {
        Self {
            keys: std::array::from_fn(|_| Vec::new()),
        }
    }

    /// Hold `key` on `channel` with `effect`, making it the visible entry.
    ///
    /// A channel already holding the key is moved to the top with the new
    /// effect. Returns the effect now visible, which is always `effect`.
    pub fn play(&mut self, key: u8, channel: u8, effect: u32) -> u32 {
        let held = &mut self.keys[slot(key)];
        held.retain(|entry| entry.channel != channel);
        held.push(NoteEntry { channel, effect });
        effect
    }

    /// Release `key` on `channel`.
    ///
    /// Returns the effect of the note now on top, or 0 if nothing is held.
    /// Releasing a channel that does not hold the key changes nothing.
    pub fn release(&mut self, key: u8, channel: u8) -> u32 {
        let held = &mut self.keys[slot(key)];
        if let Some(pos) = held.iter().position(|entry| entry.channel == channel) {
            held.remove(pos);
        }
        held.last().map_or(0, |entry| entry.effect)
    }

    /// Visible effect for a key, if any note is held
    pub fn active(&self, key: u8) -> Option<u32> {
        self.keys[slot(key)].last().map(|entry| entry.effect)
    }

    /// Held notes for a key, oldest first
    pub fn held(&self, key: u8) -> &[NoteEntry] {
        &self.keys[slot(key)]
    }

    /// Drop every held note
    pub fn clear(&mut self) {
        for held in self.keys.iter_mut() {
            held.clear();
        }
    }
}

#[inline]
fn slot(key: u8) -> usize {
    (key & 0x7F) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_reveals_previous_channel() {
        let mut stack = NoteStack::new();
        assert_eq!(stack.play(60, 1, 0x110000), 0x110000);
        assert_eq!(stack.play(60, 2, 0x002200), 0x002200);
        assert_eq!(stack.release(60, 2), 0x110000);
        assert_eq!(stack.release(60, 1), 0);
        assert_eq!(stack.active(60), None);
    }

    #[test]
    fn test_retrigger_updates_in_place() {
        let mut stack = NoteStack::new();
        stack.play(40, 3, 0x10);
        stack.play(40, 3, 0x20);
        assert_eq!(stack.held(40).len(), 1);
        assert_eq!(stack.active(40), Some(0x20));
    }

    #[test]
    fn test_retrigger_moves_channel_to_top() {
        let mut stack = NoteStack::new();
        stack.play(50, 1, 0xA);
        stack.play(50, 2, 0xB);
        stack.play(50, 1, 0xC);
        assert_eq!(
            stack.held(50),
            &[
                NoteEntry { channel: 2, effect: 0xB },
                NoteEntry { channel: 1, effect: 0xC },
            ]
        );
        // releasing the top reveals channel 2, not channel 1's old effect
        assert_eq!(stack.release(50, 1), 0xB);
    }

    #[test]
    fn test_release_unknown_channel_is_noop() {
        let mut stack = NoteStack::new();
        stack.play(70, 1, 0x1);
        stack.play(70, 2, 0x2);
        let before = stack.held(70).to_vec();

        assert_eq!(stack.release(70, 9), 0x2);
        assert_eq!(stack.held(70), before.as_slice());
        assert_eq!(stack.release(71, 1), 0);
    }

    #[test]
    fn test_release_middle_entry() {
        let mut stack = NoteStack::new();
        stack.play(10, 1, 0x1);
        stack.play(10, 2, 0x2);
        stack.play(10, 3, 0x3);
        assert_eq!(stack.release(10, 2), 0x3);
        assert_eq!(stack.held(10).len(), 2);
        assert_eq!(stack.release(10, 3), 0x1);
    }

    #[test]
    fn test_keys_are_independent() {
        let mut stack = NoteStack::new();
        stack.play(60, 0, 0x1);
        stack.play(61, 0, 0x2);
        assert_eq!(stack.release(60, 0), 0);
        assert_eq!(stack.active(61), Some(0x2));

        stack.clear();
        assert_eq!(stack.active(61), None);
    }
}
