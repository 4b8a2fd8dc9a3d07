// Error taxonomy for the stage control layer
//
// Transport failures pass through with their raw codes intact; the
// core-defined conditions (not found, mismatch, unsupported) get their own
// variants so callers can branch without parsing integers.

use std::time::Duration;

use crate::channel::Channel;
use crate::protocol::PacketKind;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No positioning controller found")]
    NotFound,

    #[error("Timeout waiting for a response packet")]
    Timeout,

    #[error("Unexpected {got:?} packet for channel index {got_channel} while awaiting {expected:?}")]
    PacketMismatch {
        expected: PacketKind,
        got: PacketKind,
        got_channel: u8,
    },

    #[error("Malformed response frame: {0}")]
    InvalidFrame(&'static str),

    #[error("Controller error {code} on channel index {channel}")]
    Controller { code: u32, channel: u8 },

    #[error("Channel {channel} does not support {op}")]
    NotSupported { channel: Channel, op: &'static str },

    #[error("Channel {channel} still moving after {elapsed:?}")]
    SettleTimeout { channel: Channel, elapsed: Duration },

    #[error("Controller reported a sensor mode outside the known set")]
    InvalidSensorType,
}

pub type Result<T> = std::result::Result<T, Error>;
