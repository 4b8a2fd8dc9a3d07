// Session lifecycle and the command/response correlator
//
// Owns the transport, matches each command against the packet that answers
// it, and hosts the settle polling used after calibration and reference
// searches.

use std::time::Instant;

use tracing::{debug, info, warn};

use super::referencing::ReferencingStatus;
use crate::channel::Channel;
use crate::config::StageConfig;
use crate::error::{Error, Result};
use crate::protocol::{Command, Packet, PacketKind, PositionerStatus, SensorMode};
use crate::transport::{SerialTransport, Transport};

/// One controller session.
///
/// A `Stage` is an owned value, not a process-wide singleton. It performs no
/// internal locking; to share it across threads, wrap it in external mutual
/// exclusion. Construct it over a transport, `initialize`, operate, then
/// `close` (dropping an open session closes it too).
pub struct Stage<T: Transport = SerialTransport> {
    pub(super) transport: T,
    pub(super) config: StageConfig,
    pub(super) locator: String,
    pub(super) found: bool,
    pub(super) referencing: ReferencingStatus,
}

impl<T: Transport> Stage<T> {
    /// Stage over the given transport with default tunables.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, StageConfig::default())
    }

    /// Stage with explicit tunables.
    pub fn with_config(transport: T, config: StageConfig) -> Self {
        Self {
            transport,
            config,
            locator: String::new(),
            found: false,
            referencing: ReferencingStatus::Idle,
        }
    }

    /// Discover the controller, open it, and apply the session-wide sensor
    /// configuration. Required before any channel operation.
    pub fn initialize(&mut self) -> Result<()> {
        let locators = self.transport.find_devices()?;
        let Some(locator) = locators.into_iter().next() else {
            return Err(Error::NotFound);
        };

        info!("Opening stage controller at {}", locator);
        self.transport.open(&locator)?;
        self.locator = locator;
        self.found = true;

        self.ensure_sensors_enabled()?;

        // Relative moves must act on the live position, not a queued total
        for channel in Channel::CLOSED_LOOP {
            self.transport
                .send(Some(channel), &Command::SetAccumulateRelativePositions(false))?;
        }

        info!("Stage session ready");
        Ok(())
    }

    fn ensure_sensors_enabled(&mut self) -> Result<()> {
        let packet = self.transact_system(Command::GetSensorMode, PacketKind::SensorMode)?;
        let mode = SensorMode::from_code(packet.data1).ok_or(Error::InvalidSensorType)?;
        if mode != SensorMode::Enabled {
            debug!("Sensors reported {:?}, enabling", mode);
            self.transport
                .send(None, &Command::SetSensorMode(SensorMode::Enabled))?;
        }
        Ok(())
    }

    /// Close the session. The locator is kept for diagnostics.
    pub fn close(&mut self) -> Result<()> {
        if self.found {
            info!("Closing stage controller at {}", self.locator);
        }
        self.found = false;
        self.transport.close()
    }

    /// Whether a controller was found by the last `initialize`.
    pub fn is_found(&self) -> bool {
        self.found
    }

    /// Locator of the controller found by `initialize`.
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Summary of the most recent referencing activity.
    pub fn referencing_status(&self) -> ReferencingStatus {
        self.referencing
    }

    /// Fire-and-forget channel command.
    pub(crate) fn send(&mut self, channel: Channel, command: Command) -> Result<()> {
        self.transport.send(Some(channel), &command)
    }

    /// Send one channel command and wait for the packet answering it.
    ///
    /// The next packet on the wire must match both the expected kind and the
    /// channel; anything else is a protocol error, surfaced without retry.
    pub(crate) fn transact(
        &mut self,
        channel: Channel,
        command: Command,
        expected: PacketKind,
    ) -> Result<Packet> {
        self.transport.send(Some(channel), &command)?;
        let packet = self.transport.receive_next_packet(self.config.packet_timeout)?;
        check_packet(packet, expected, Some(channel))
    }

    /// Session-scoped variant: the reply kind must match, no channel check.
    pub(crate) fn transact_system(
        &mut self,
        command: Command,
        expected: PacketKind,
    ) -> Result<Packet> {
        self.transport.send(None, &command)?;
        let packet = self.transport.receive_next_packet(self.config.packet_timeout)?;
        check_packet(packet, expected, None)
    }

    /// Block until the channel reports `Stopped` after a calibration command.
    pub fn wait_calibration(&mut self, channel: Channel) -> Result<()> {
        self.poll_until_stopped(channel)
    }

    /// Block until the channel reports `Stopped` after a reference search.
    pub fn wait_referencing(&mut self, channel: Channel) -> Result<()> {
        self.poll_until_stopped(channel)
    }

    /// Poll channel status until `Stopped`, bounded by the settle deadline.
    fn poll_until_stopped(&mut self, channel: Channel) -> Result<()> {
        let started = Instant::now();
        loop {
            let packet = self.transact(channel, Command::GetStatus, PacketKind::Status)?;
            match PositionerStatus::from_code(packet.data1) {
                Some(PositionerStatus::Stopped) => return Ok(()),
                status => debug!("Channel {} settling, status {:?}", channel, status),
            }

            let elapsed = started.elapsed();
            if elapsed >= self.config.settle_deadline {
                return Err(Error::SettleTimeout { channel, elapsed });
            }
            std::thread::sleep(self.config.poll_interval);
        }
    }
}

fn check_packet(packet: Packet, expected: PacketKind, channel: Option<Channel>) -> Result<Packet> {
    if packet.kind == PacketKind::Error {
        return Err(Error::Controller {
            code: packet.data1,
            channel: packet.channel,
        });
    }

    let channel_ok = channel.is_none_or(|c| packet.channel == c.index());
    if packet.kind != expected || !channel_ok {
        return Err(Error::PacketMismatch {
            expected,
            got: packet.kind,
            got_channel: packet.channel,
        });
    }

    Ok(packet)
}

impl<T: Transport> Drop for Stage<T> {
    fn drop(&mut self) {
        if self.found {
            if let Err(e) = self.close() {
                warn!("Failed to close stage session on drop: {}", e);
            }
        }
    }
}
