//! Binary command frames for the LED controller
//!
//! Every command is a single ASCII opcode byte followed by a fixed number of
//! big-endian operands. The controller never acknowledges commands.

use std::io::{self, Read};

/// A command understood by the LED controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Clear all controller-side zone state
    Reset,
    /// Configure a zone's "off" level
    SetOffLevel { strip: u8, zone: u8, level: u16 },
    /// Configure a zone's "on" level
    SetOnLevel { strip: u8, zone: u8, level: u16 },
    /// Set a zone's current effect
    SetEffect { strip: u8, zone: u8, effect: u32 },
}

impl Command {
    pub const RESET: u8 = b'R';
    pub const SET_OFF_LEVEL: u8 = b'D';
    pub const SET_ON_LEVEL: u8 = b'L';
    pub const SET_EFFECT: u8 = b'E';

    /// Encode the command as a wire frame
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            Command::Reset => vec![Self::RESET],
            Command::SetOffLevel { strip, zone, level } => {
                let [hi, lo] = level.to_be_bytes();
                vec![Self::SET_OFF_LEVEL, strip, zone, hi, lo]
            }
            Command::SetOnLevel { strip, zone, level } => {
                let [hi, lo] = level.to_be_bytes();
                vec![Self::SET_ON_LEVEL, strip, zone, hi, lo]
            }
            Command::SetEffect { strip, zone, effect } => {
                let [b3, b2, b1, b0] = effect.to_be_bytes();
                vec![Self::SET_EFFECT, strip, zone, b3, b2, b1, b0]
            }
        }
    }

    /// Decode a single wire frame. Returns `None` for unknown opcodes or
    /// frames with the wrong length.
    pub fn decode(frame: &[u8]) -> Option<Self> {
        match *frame {
            [Self::RESET] => Some(Command::Reset),
            [Self::SET_OFF_LEVEL, strip, zone, hi, lo] => Some(Command::SetOffLevel {
                strip,
                zone,
                level: u16::from_be_bytes([hi, lo]),
            }),
            [Self::SET_ON_LEVEL, strip, zone, hi, lo] => Some(Command::SetOnLevel {
                strip,
                zone,
                level: u16::from_be_bytes([hi, lo]),
            }),
            [Self::SET_EFFECT, strip, zone, b3, b2, b1, b0] => Some(Command::SetEffect {
                strip,
                zone,
                effect: u32::from_be_bytes([b3, b2, b1, b0]),
            }),
            _ => None,
        }
    }
}

/// Ordered byte channel to the LED controller
///
/// Implementations must write each frame completely before returning so
/// that frames from different callers never interleave.
pub trait Transport: Send {
    /// Write one complete frame
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Independent read handle for draining unsolicited controller output.
    ///
    /// Reads should time out after a short interval (returning
    /// `TimedOut`/`WouldBlock`) so the reader can notice shutdown.
    fn try_clone_reader(&self) -> io::Result<Box<dyn Read + Send>>;

    /// Close the link
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}
