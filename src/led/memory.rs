//! In-memory transport that records frames instead of sending them
//!
//! Used for dry runs and tests. The recorded frames are shared, so a clone
//! of [`FrameLog`] can inspect everything written after the transport has
//! been handed to a controller.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::protocol::{Command, Transport};

/// Shared record of written frames
#[derive(Debug, Clone, Default)]
pub struct FrameLog {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl FrameLog {
    /// All frames written so far
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.frames.lock().clone()
    }

    /// All frames decoded as commands (unknown frames are skipped)
    pub fn commands(&self) -> Vec<Command> {
        self.frames
            .lock()
            .iter()
            .filter_map(|f| Command::decode(f))
            .collect()
    }

    /// Only the set-effect commands, in write order
    pub fn effects(&self) -> Vec<Command> {
        self.commands()
            .into_iter()
            .filter(|c| matches!(c, Command::SetEffect { .. }))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    pub fn clear(&self) {
        self.frames.lock().clear();
    }
}

/// Transport backed by memory
#[derive(Debug, Default)]
pub struct MemoryTransport {
    log: FrameLog,
    incoming: Arc<Mutex<VecDeque<u8>>>,
    fail_after: Option<usize>,
    closed: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the frames this transport records
    pub fn log(&self) -> FrameLog {
        self.log.clone()
    }

    /// Queue bytes for the reader to return, as if the controller printed them
    pub fn push_incoming(&self, bytes: &[u8]) {
        self.incoming.lock().extend(bytes.iter().copied());
    }

    /// Fail every write once `count` frames have been written
    pub fn fail_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }
}

impl Transport for MemoryTransport {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "transport closed"));
        }
        let mut frames = self.log.frames.lock();
        if let Some(limit) = self.fail_after {
            if frames.len() >= limit {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "link lost"));
            }
        }
        frames.push(frame.to_vec());
        Ok(())
    }

    fn try_clone_reader(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(MemoryReader {
            incoming: Arc::clone(&self.incoming),
        }))
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Reader that behaves like a serial port with a short read timeout
struct MemoryReader {
    incoming: Arc<Mutex<VecDeque<u8>>>,
}

impl Read for MemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        {
            let mut incoming = self.incoming.lock();
            if !incoming.is_empty() {
                let n = buf.len().min(incoming.len());
                for (slot, byte) in buf.iter_mut().zip(incoming.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
        }
        thread::sleep(Duration::from_millis(2));
        Err(io::Error::new(io::ErrorKind::TimedOut, "no data"))
    }
}
