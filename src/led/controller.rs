//! LED controller: zone configuration and effect dispatch over a transport

use parking_lot::{Mutex, RwLock};
use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use super::protocol::{Command, Transport};
use super::zones::{addressed_zones, ZoneRegistry};
use crate::config::LightingConfig;
use crate::error::{Error, Result};

/// State shared with the output drain thread
struct ReaderState {
    /// Set by `close()`; checked after every read
    should_stop: AtomicBool,
    /// Bytes received from the controller (diagnostics only)
    bytes_received: AtomicU64,
}

/// Handle to a connected LED controller
///
/// All writes go through one lock and each lock hold writes exactly one
/// frame, so configuration and playback may share a controller safely.
pub struct LedController {
    transport: Mutex<Option<Box<dyn Transport>>>,
    registry: RwLock<ZoneRegistry>,
    reader_state: Arc<ReaderState>,
    reader_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl LedController {
    /// Take ownership of a transport and start draining controller output
    pub fn new(transport: Box<dyn Transport>) -> Result<Self> {
        let reader = transport.try_clone_reader()?;
        let reader_state = Arc::new(ReaderState {
            should_stop: AtomicBool::new(false),
            bytes_received: AtomicU64::new(0),
        });

        let state_clone = Arc::clone(&reader_state);
        let reader_handle = thread::Builder::new()
            .name("led-reader".to_string())
            .spawn(move || {
                drain_controller_output(reader, state_clone);
            })?;

        Ok(Self {
            transport: Mutex::new(Some(transport)),
            registry: RwLock::new(ZoneRegistry::default()),
            reader_state,
            reader_handle: Mutex::new(Some(reader_handle)),
        })
    }

    /// Reset the controller and push zone levels from the configuration.
    ///
    /// The name lookup table is replaced only once every frame was written.
    pub fn configure(&self, config: &LightingConfig) -> Result<()> {
        let registry = ZoneRegistry::build(config);

        self.send(Command::Reset)?;

        for (address, zone) in addressed_zones(config) {
            if zone.name.is_empty() {
                continue;
            }

            if zone.off > 0 {
                self.send(Command::SetOffLevel {
                    strip: address.strip,
                    zone: address.zone,
                    level: zone.off,
                })?;
            }

            self.send(Command::SetOnLevel {
                strip: address.strip,
                zone: address.zone,
                level: zone.on,
            })?;
        }

        log::info!("Configured {} LED zones", registry.len());
        *self.registry.write() = registry;
        Ok(())
    }

    /// Set the effect of a named zone. Returns whether a frame was sent;
    /// unknown names are ignored.
    pub fn set_zone_effect(&self, zone_name: &str, effect: u32) -> Result<bool> {
        let address = self.registry.read().lookup(zone_name);
        match address {
            Some(address) => {
                self.set_zone_effect_raw(address.strip, address.zone, effect)?;
                Ok(true)
            }
            None => {
                log::trace!("Zone '{}' not in lighting configuration", zone_name);
                Ok(false)
            }
        }
    }

    /// Set the effect of a zone by address
    pub fn set_zone_effect_raw(&self, strip: u8, zone: u8, effect: u32) -> Result<()> {
        self.send(Command::SetEffect { strip, zone, effect })
    }

    /// Write a single command frame
    pub fn send(&self, command: Command) -> Result<()> {
        let mut transport = self.transport.lock();
        let transport = transport.as_mut().ok_or(Error::TransportClosed)?;
        transport.write_frame(&command.encode())?;
        Ok(())
    }

    /// Whether a zone name is addressable with the current configuration
    pub fn has_zone(&self, zone_name: &str) -> bool {
        self.registry.read().lookup(zone_name).is_some()
    }

    /// Number of bytes the controller has sent back so far
    pub fn bytes_received(&self) -> u64 {
        self.reader_state.bytes_received.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.transport.lock().is_none()
    }

    /// Stop the output drain and close the transport. Safe to call twice.
    pub fn close(&self) -> Result<()> {
        self.reader_state.should_stop.store(true, Ordering::SeqCst);

        if let Some(handle) = self.reader_handle.lock().take() {
            if handle.join().is_err() {
                log::warn!("LED output reader panicked");
            }
        }

        if let Some(mut transport) = self.transport.lock().take() {
            transport.close()?;
        }

        Ok(())
    }
}

impl Drop for LedController {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to close LED controller: {}", e);
        }
    }
}

/// Output drain thread: logs whatever the controller prints, line by line
fn drain_controller_output(mut reader: Box<dyn Read + Send>, state: Arc<ReaderState>) {
    let mut buf = [0u8; 4096];
    let mut line: Vec<u8> = Vec::new();

    while !state.should_stop.load(Ordering::SeqCst) {
        match reader.read(&mut buf) {
            Ok(0) => {
                log::debug!("LED controller output closed");
                break;
            }
            Ok(n) => {
                state.bytes_received.fetch_add(n as u64, Ordering::Relaxed);
                for &byte in &buf[..n] {
                    match byte {
                        b'\n' => {
                            log::debug!("controller: {}", String::from_utf8_lossy(&line));
                            line.clear();
                        }
                        b'\r' => {}
                        _ => line.push(byte),
                    }
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                log::warn!("LED controller read failed: {}", e);
                break;
            }
        }
    }

    if !line.is_empty() {
        log::debug!("controller: {}", String::from_utf8_lossy(&line));
    }
}
