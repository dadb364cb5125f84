//! Serial link to the LED controller

use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;

use super::protocol::Transport;

/// Default controller device
pub const DEFAULT_PORT: &str = "/dev/ttyACM0";

/// Default controller baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Read timeout for the output drain, short enough to notice shutdown quickly
const READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Transport over a serial port
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    path: String,
}

impl SerialTransport {
    /// Open a serial port at the given baud rate
    pub fn open(path: &str, baud_rate: u32) -> io::Result<Self> {
        log::info!("Opening LED controller at {} ({} baud)", path, baud_rate);

        let port = serialport::new(path, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(io::Error::from)?;

        Ok(Self {
            port: Some(port),
            path: path.to_string(),
        })
    }

    fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port closed"))
    }
}

impl Transport for SerialTransport {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        let port = self.port()?;
        port.write_all(frame)?;
        port.flush()
    }

    fn try_clone_reader(&self) -> io::Result<Box<dyn Read + Send>> {
        let port = self
            .port
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port closed"))?;
        let clone = port.try_clone().map_err(io::Error::from)?;
        Ok(Box::new(SerialReader(clone)))
    }

    fn close(&mut self) -> io::Result<()> {
        if self.port.take().is_some() {
            log::info!("Closed LED controller at {}", self.path);
        }
        Ok(())
    }
}

/// Read half of a cloned serial port handle
struct SerialReader(Box<dyn SerialPort>);

impl Read for SerialReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}
