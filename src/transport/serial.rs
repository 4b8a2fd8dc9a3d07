// Framed serial transport for the stage controller
//
// Request frame:  [0xA5, 0x5A, channel, length, opcode, params..., checksum]
// Response frame: [0xA5, 0x5A, kind, channel, data1 (u32 LE), data2 (i32 LE), checksum]
// The checksum is the complemented byte sum of everything after the header.

use serialport::{self, SerialPort, SerialPortType};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

use super::Transport;
use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::protocol::{Command, Packet, PacketKind, SYSTEM_CHANNEL};

/// Default serial configuration for the controller's USB bridge.
pub const DEFAULT_BAUDRATE: u32 = 115_200;
const DEFAULT_TIMEOUT_MS: u64 = 100;

/// USB identification of the controller's serial bridge.
const CONTROLLER_VID: u16 = 0x0403;
const CONTROLLER_PID: u16 = 0x6015;

/// Frame header bytes
const HEADER: [u8; 2] = [0xA5, 0x5A];

/// Response frame length after the header: kind, channel, two data words,
/// checksum.
const RESPONSE_BODY_LEN: usize = 11;

/// Serial link to the stage controller.
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    baudrate: u32,
    pinned: Option<String>,
}

impl SerialTransport {
    /// Transport that discovers the controller by its USB identity.
    pub fn new() -> Self {
        Self {
            port: None,
            baudrate: DEFAULT_BAUDRATE,
            pinned: None,
        }
    }

    /// Transport pinned to one serial port, skipping discovery.
    pub fn with_locator(locator: impl Into<String>) -> Self {
        Self {
            pinned: Some(locator.into()),
            ..Self::new()
        }
    }

    /// Override the line rate.
    pub fn baudrate(mut self, baudrate: u32) -> Self {
        self.baudrate = baudrate;
        self
    }

    /// Complemented byte sum over everything after the header
    fn checksum(data: &[u8]) -> u8 {
        let sum: u16 = data.iter().map(|&b| b as u16).sum();
        (!sum & 0xFF) as u8
    }

    /// Build a request frame with header and checksum
    fn build_frame(channel: Option<Channel>, command: &Command) -> Vec<u8> {
        let mut params = Vec::new();
        command.encode_params(&mut params);

        let length = (params.len() + 2) as u8; // opcode + checksum
        let mut frame = Vec::with_capacity(6 + params.len());
        frame.extend_from_slice(&HEADER);
        frame.push(channel.map_or(SYSTEM_CHANNEL, Channel::index));
        frame.push(length);
        frame.push(command.opcode());
        frame.extend_from_slice(&params);

        // Checksum over channel, length, opcode, params
        let check = Self::checksum(&frame[2..]);
        frame.push(check);

        frame
    }

    /// Decode a response body (everything after the header)
    fn decode_body(body: &[u8; RESPONSE_BODY_LEN]) -> Result<Packet> {
        let (payload, check) = body.split_at(RESPONSE_BODY_LEN - 1);
        if Self::checksum(payload) != check[0] {
            return Err(Error::InvalidFrame("checksum mismatch"));
        }

        let kind =
            PacketKind::from_code(payload[0]).ok_or(Error::InvalidFrame("unknown packet kind"))?;
        let data1 = u32::from_le_bytes([payload[2], payload[3], payload[4], payload[5]]);
        let data2 = i32::from_le_bytes([payload[6], payload[7], payload[8], payload[9]]);

        Ok(Packet {
            kind,
            channel: payload[1],
            data1,
            data2,
        })
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotConnected).into())
    }
}

impl Default for SerialTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SerialTransport {
    fn find_devices(&mut self) -> Result<Vec<String>> {
        if let Some(locator) = &self.pinned {
            return Ok(vec![locator.clone()]);
        }

        let ports = serialport::available_ports()?;
        let locators: Vec<String> = ports
            .into_iter()
            .filter(|info| match &info.port_type {
                SerialPortType::UsbPort(usb) => {
                    usb.vid == CONTROLLER_VID && usb.pid == CONTROLLER_PID
                }
                _ => false,
            })
            .map(|info| info.port_name)
            .collect();

        debug!("Found {} candidate controller port(s)", locators.len());
        Ok(locators)
    }

    fn open(&mut self, locator: &str) -> Result<()> {
        let port = serialport::new(locator, self.baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.port = None;
        Ok(())
    }

    fn send(&mut self, channel: Option<Channel>, command: &Command) -> Result<()> {
        let frame = Self::build_frame(channel, command);
        debug!(
            "Send {:?} to channel {:?} ({} bytes)",
            command,
            channel,
            frame.len()
        );

        let port = self.port_mut()?;
        port.write_all(&frame)?;
        port.flush()?;
        Ok(())
    }

    fn receive_next_packet(&mut self, timeout: Duration) -> Result<Packet> {
        let port = self.port_mut()?;
        port.set_timeout(timeout)?;

        let mut header = [0u8; 2];
        port.read_exact(&mut header).map_err(map_timeout)?;
        if header != HEADER {
            return Err(Error::InvalidFrame("bad header"));
        }

        let mut body = [0u8; RESPONSE_BODY_LEN];
        port.read_exact(&mut body).map_err(map_timeout)?;
        Self::decode_body(&body)
    }
}

fn map_timeout(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::TimedOut {
        Error::Timeout
    } else {
        Error::Io(e)
    }
}
