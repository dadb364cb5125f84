//! LED controller access
//!
//! Provides the wire protocol, the zone name registry, and transports
//! (serial for hardware, memory for dry runs and tests).

mod controller;
pub mod memory;
mod protocol;
mod serial;
mod zones;

pub use controller::LedController;
pub use protocol::{Command, Transport};
pub use serial::{SerialTransport, DEFAULT_BAUD_RATE, DEFAULT_PORT};
pub use zones::{ZoneAddress, ZoneRegistry};
