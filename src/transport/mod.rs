// Transport seam between the stage logic and the physical controller link
//
// Provides:
// - Transport trait: device discovery, session open/close, command send,
//   packet receive
// - SerialTransport: framed serial implementation
// - MockTransport: scripted double for off-hardware testing (feature `mock`)

use std::time::Duration;

use crate::channel::Channel;
use crate::error::Result;
use crate::protocol::{Command, Packet};

#[cfg(any(test, feature = "mock"))]
mod mock;
mod serial;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockTransport;
pub use serial::{DEFAULT_BAUDRATE, SerialTransport};

/// Synchronous link to one motion controller.
///
/// Commands are fire-and-forget; responses arrive asynchronously and are
/// drained one at a time through `receive_next_packet`. A `None` channel
/// addresses the session scope rather than a single axis.
pub trait Transport {
    /// Locators of attached controllers, possibly empty.
    fn find_devices(&mut self) -> Result<Vec<String>>;

    /// Open the link to one controller.
    fn open(&mut self, locator: &str) -> Result<()>;

    /// Drop the link. Harmless when nothing is open.
    fn close(&mut self) -> Result<()>;

    /// Enqueue one command toward the controller.
    fn send(&mut self, channel: Option<Channel>, command: &Command) -> Result<()>;

    /// Next response packet, or `Error::Timeout` when none arrives in time.
    fn receive_next_packet(&mut self, timeout: Duration) -> Result<Packet>;
}
