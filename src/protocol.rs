// Controller command set and response packet vocabulary
//
// Commands are addressed to one channel (or the session scope) and answered
// asynchronously by typed packets carrying up to two data fields. Numeric
// parameters go on the wire little-endian.

/// Hold time applied after positioning commands [ms].
pub const POSITIONER_HOLD_TIME_MS: u32 = 0;

/// Drive amplitude for open-loop step bursts (controller units, 0..=4095).
pub const OPEN_LOOP_AMPLITUDE: u32 = 2048;

/// Angular moves are always issued against the current revolution.
pub const CURRENT_REVOLUTION: i32 = 0;

/// One revolution expressed in micro-degrees.
pub const MICRO_DEGREES_PER_REVOLUTION: i64 = 360 * 1_000_000;

/// Channel index carried by session-scoped frames.
pub const SYSTEM_CHANNEL: u8 = 0xFF;

/// Data field value reported once a physical position is established.
pub(crate) const PHYSICAL_POSITION_KNOWN: u32 = 1;

/// Travel direction for calibration and reference-mark searches.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward = 0,
    Backward = 1,
}

/// Session-wide sensor operation mode.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorMode {
    Disabled = 0,
    Enabled = 1,
    PowerSave = 2,
}

impl SensorMode {
    pub(crate) fn from_code(code: u32) -> Option<SensorMode> {
        match code {
            0 => Some(SensorMode::Disabled),
            1 => Some(SensorMode::Enabled),
            2 => Some(SensorMode::PowerSave),
            _ => None,
        }
    }
}

/// Motion state reported by a status packet.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionerStatus {
    Stopped = 0,
    Stepping = 1,
    Scanning = 2,
    Holding = 3,
    Targeting = 4,
    MoveDelay = 5,
    Calibrating = 6,
    FindingReferenceMark = 7,
    Locked = 9,
}

impl PositionerStatus {
    pub fn from_code(code: u32) -> Option<PositionerStatus> {
        match code {
            0 => Some(PositionerStatus::Stopped),
            1 => Some(PositionerStatus::Stepping),
            2 => Some(PositionerStatus::Scanning),
            3 => Some(PositionerStatus::Holding),
            4 => Some(PositionerStatus::Targeting),
            5 => Some(PositionerStatus::MoveDelay),
            6 => Some(PositionerStatus::Calibrating),
            7 => Some(PositionerStatus::FindingReferenceMark),
            9 => Some(PositionerStatus::Locked),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        self as u32
    }
}

/// Response packet kinds the controller emits.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// Command rejected; data1 carries the controller error code.
    Error = 0,
    SensorMode = 1,
    PhysicalPositionKnown = 2,
    Status = 3,
    Position = 4,
    Angle = 5,
}

impl PacketKind {
    pub(crate) fn code(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_code(code: u8) -> Option<PacketKind> {
        match code {
            0 => Some(PacketKind::Error),
            1 => Some(PacketKind::SensorMode),
            2 => Some(PacketKind::PhysicalPositionKnown),
            3 => Some(PacketKind::Status),
            4 => Some(PacketKind::Position),
            5 => Some(PacketKind::Angle),
            _ => None,
        }
    }
}

/// One response unit from the controller.
///
/// Meaning of the data fields depends on the kind: status and sensor reports
/// use `data1`, position reports use `data2`, angle reports use `data1` for
/// the in-revolution angle and `data2` for the signed revolution counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketKind,
    pub channel: u8,
    pub data1: u32,
    pub data2: i32,
}

/// A request to the controller. The target channel is supplied at send time;
/// the variants carry only the payload parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    GetSensorMode,
    SetSensorMode(SensorMode),
    SetAccumulateRelativePositions(bool),
    GetPhysicalPositionKnown,
    GetStatus,
    GetPosition,
    GetAngle,
    SetSafeDirection(Direction),
    CalibrateSensor,
    FindReferenceMark {
        direction: Direction,
        hold_ms: u32,
        auto_zero: bool,
    },
    SetClosedLoopSpeed(u32),
    MoveRelative {
        delta_nm: i32,
        hold_ms: u32,
    },
    MoveAbsolute {
        position_nm: i32,
        hold_ms: u32,
    },
    MoveAngleRelative {
        delta_udeg: i32,
        revolution: i32,
        hold_ms: u32,
    },
    MoveAngleAbsolute {
        angle_udeg: i32,
        revolution: i32,
        hold_ms: u32,
    },
    StepMove {
        steps: i32,
        amplitude: u32,
        frequency_hz: u32,
    },
    Stop,
}

impl Command {
    /// Wire opcode.
    pub(crate) fn opcode(&self) -> u8 {
        match self {
            Command::GetSensorMode => 0x01,
            Command::SetSensorMode(_) => 0x02,
            Command::SetAccumulateRelativePositions(_) => 0x03,
            Command::GetPhysicalPositionKnown => 0x10,
            Command::GetStatus => 0x11,
            Command::GetPosition => 0x12,
            Command::GetAngle => 0x13,
            Command::SetSafeDirection(_) => 0x20,
            Command::CalibrateSensor => 0x21,
            Command::FindReferenceMark { .. } => 0x22,
            Command::SetClosedLoopSpeed(_) => 0x30,
            Command::MoveRelative { .. } => 0x31,
            Command::MoveAbsolute { .. } => 0x32,
            Command::MoveAngleRelative { .. } => 0x33,
            Command::MoveAngleAbsolute { .. } => 0x34,
            Command::StepMove { .. } => 0x35,
            Command::Stop => 0x3F,
        }
    }

    /// Append the little-endian parameter bytes to `buf`.
    pub(crate) fn encode_params(&self, buf: &mut Vec<u8>) {
        match *self {
            Command::GetSensorMode
            | Command::GetPhysicalPositionKnown
            | Command::GetStatus
            | Command::GetPosition
            | Command::GetAngle
            | Command::CalibrateSensor
            | Command::Stop => {}
            Command::SetSensorMode(mode) => buf.push(mode as u8),
            Command::SetAccumulateRelativePositions(accumulate) => buf.push(accumulate as u8),
            Command::SetSafeDirection(direction) => buf.push(direction as u8),
            Command::FindReferenceMark {
                direction,
                hold_ms,
                auto_zero,
            } => {
                buf.push(direction as u8);
                buf.extend_from_slice(&hold_ms.to_le_bytes());
                buf.push(auto_zero as u8);
            }
            Command::SetClosedLoopSpeed(speed) => buf.extend_from_slice(&speed.to_le_bytes()),
            Command::MoveRelative { delta_nm, hold_ms } => {
                buf.extend_from_slice(&delta_nm.to_le_bytes());
                buf.extend_from_slice(&hold_ms.to_le_bytes());
            }
            Command::MoveAbsolute {
                position_nm,
                hold_ms,
            } => {
                buf.extend_from_slice(&position_nm.to_le_bytes());
                buf.extend_from_slice(&hold_ms.to_le_bytes());
            }
            Command::MoveAngleRelative {
                delta_udeg,
                revolution,
                hold_ms,
            } => {
                buf.extend_from_slice(&delta_udeg.to_le_bytes());
                buf.extend_from_slice(&revolution.to_le_bytes());
                buf.extend_from_slice(&hold_ms.to_le_bytes());
            }
            Command::MoveAngleAbsolute {
                angle_udeg,
                revolution,
                hold_ms,
            } => {
                buf.extend_from_slice(&angle_udeg.to_le_bytes());
                buf.extend_from_slice(&revolution.to_le_bytes());
                buf.extend_from_slice(&hold_ms.to_le_bytes());
            }
            Command::StepMove {
                steps,
                amplitude,
                frequency_hz,
            } => {
                buf.extend_from_slice(&steps.to_le_bytes());
                buf.extend_from_slice(&amplitude.to_le_bytes());
                buf.extend_from_slice(&frequency_hz.to_le_bytes());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_round_trip() {
        assert_eq!(PositionerStatus::from_code(0), Some(PositionerStatus::Stopped));
        assert_eq!(
            PositionerStatus::from_code(7),
            Some(PositionerStatus::FindingReferenceMark)
        );
        assert_eq!(PositionerStatus::from_code(8), None);
        assert_eq!(PositionerStatus::from_code(9), Some(PositionerStatus::Locked));
        assert_eq!(PositionerStatus::Targeting.code(), 4);
    }

    #[test]
    fn test_find_reference_mark_params() {
        let mut buf = Vec::new();
        Command::FindReferenceMark {
            direction: Direction::Backward,
            hold_ms: 0,
            auto_zero: true,
        }
        .encode_params(&mut buf);
        assert_eq!(buf, [1, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_move_relative_params_little_endian() {
        let mut buf = Vec::new();
        Command::MoveRelative {
            delta_nm: -2,
            hold_ms: 0x0102,
        }
        .encode_params(&mut buf);
        assert_eq!(buf, [0xFE, 0xFF, 0xFF, 0xFF, 0x02, 0x01, 0, 0]);
    }

    #[test]
    fn test_step_move_params_width() {
        let mut buf = Vec::new();
        Command::StepMove {
            steps: 500,
            amplitude: OPEN_LOOP_AMPLITUDE,
            frequency_hz: 1000,
        }
        .encode_params(&mut buf);
        assert_eq!(buf.len(), 12);
        assert_eq!(&buf[0..4], &500i32.to_le_bytes());
    }

    #[test]
    fn test_query_commands_have_no_params() {
        for command in [
            Command::GetSensorMode,
            Command::GetPhysicalPositionKnown,
            Command::GetStatus,
            Command::GetPosition,
            Command::GetAngle,
            Command::CalibrateSensor,
            Command::Stop,
        ] {
            let mut buf = Vec::new();
            command.encode_params(&mut buf);
            assert!(buf.is_empty(), "{:?} should carry no params", command);
        }
    }
}
