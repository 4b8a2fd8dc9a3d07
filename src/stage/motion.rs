// Motion commands and position readback
//
// Closed-loop moves are two commands on the wire: a speed setting followed by
// the move itself. The controller then runs the move on its own; callers who
// need completion poll the position or status afterwards. The open-loop
// stepper takes a burst of steps instead and reports nothing back.

use tracing::{debug, warn};

use super::session::Stage;
use crate::channel::{Channel, Family};
use crate::error::{Error, Result};
use crate::protocol::{
    Command, CURRENT_REVOLUTION, MICRO_DEGREES_PER_REVOLUTION, OPEN_LOOP_AMPLITUDE, PacketKind,
    POSITIONER_HOLD_TIME_MS,
};
use crate::transport::Transport;

impl<T: Transport> Stage<T> {
    /// Move a channel by a signed delta from wherever it is now.
    ///
    /// Units are nanometers for the linear axes and microdegrees for the
    /// angular ones, with `speed` in the same unit per second. For the
    /// stepper the delta is a step count and `speed` is the step frequency
    /// in hertz. Fractional deltas are truncated toward zero.
    pub fn move_relative(&mut self, channel: Channel, delta: f64, speed: u32) -> Result<()> {
        let delta = delta as i32;
        match channel.family() {
            Family::Linear => {
                self.send(channel, Command::SetClosedLoopSpeed(speed))?;
                self.send(
                    channel,
                    Command::MoveRelative {
                        delta_nm: delta,
                        hold_ms: POSITIONER_HOLD_TIME_MS,
                    },
                )
            }
            Family::Angular => {
                self.send(channel, Command::SetClosedLoopSpeed(speed))?;
                self.send(
                    channel,
                    Command::MoveAngleRelative {
                        delta_udeg: delta,
                        revolution: CURRENT_REVOLUTION,
                        hold_ms: POSITIONER_HOLD_TIME_MS,
                    },
                )
            }
            Family::OpenLoopStep => self.send(
                channel,
                Command::StepMove {
                    steps: delta,
                    amplitude: OPEN_LOOP_AMPLITUDE,
                    frequency_hz: speed,
                },
            ),
        }
    }

    /// Move a channel to an absolute target in its own unit.
    ///
    /// The stepper has no origin to measure from, so for it this does
    /// nothing.
    pub fn move_absolute(&mut self, channel: Channel, target: f64, speed: u32) -> Result<()> {
        let target = target as i32;
        match channel.family() {
            Family::Linear => {
                self.send(channel, Command::SetClosedLoopSpeed(speed))?;
                self.send(
                    channel,
                    Command::MoveAbsolute {
                        position_nm: target,
                        hold_ms: POSITIONER_HOLD_TIME_MS,
                    },
                )
            }
            Family::Angular => {
                self.send(channel, Command::SetClosedLoopSpeed(speed))?;
                self.send(
                    channel,
                    Command::MoveAngleAbsolute {
                        angle_udeg: target,
                        revolution: CURRENT_REVOLUTION,
                        hold_ms: POSITIONER_HOLD_TIME_MS,
                    },
                )
            }
            Family::OpenLoopStep => {
                debug!("Channel {} has no position origin, ignoring goto", channel);
                Ok(())
            }
        }
    }

    /// Read back a channel's current position, in nanometers for linear
    /// axes and total microdegrees for angular ones.
    pub fn position(&mut self, channel: Channel) -> Result<i64> {
        match channel.family() {
            Family::Linear => {
                let packet = self.transact(channel, Command::GetPosition, PacketKind::Position)?;
                Ok(i64::from(packet.data2))
            }
            Family::Angular => {
                let packet = self.transact(channel, Command::GetAngle, PacketKind::Angle)?;
                // data1 is the angle within the revolution, data2 the signed
                // revolution counter
                Ok(i64::from(packet.data1)
                    + i64::from(packet.data2) * MICRO_DEGREES_PER_REVOLUTION)
            }
            Family::OpenLoopStep => Err(Error::NotSupported {
                channel,
                op: "position readback",
            }),
        }
    }

    /// Halt whatever the channel is doing, including referencing runs.
    pub fn stop(&mut self, channel: Channel) -> Result<()> {
        self.send(channel, Command::Stop)
    }

    /// Best-effort stop of every channel. Keeps going past failures and
    /// returns the first error seen, if any.
    pub fn stop_all(&mut self) -> Result<()> {
        let mut first_err = None;
        for channel in Channel::ALL {
            if let Err(e) = self.stop(channel) {
                warn!("Stop failed for channel {}: {}", channel, e);
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StageConfig;
    use crate::transport::MockTransport;
    use std::time::Duration;

    fn stage_over(mock: MockTransport) -> Stage<MockTransport> {
        Stage::with_config(
            mock,
            StageConfig {
                packet_timeout: Duration::from_millis(5),
                settle_deadline: Duration::from_secs(2),
                poll_interval: Duration::ZERO,
            },
        )
    }

    #[test]
    fn test_linear_relative_sets_speed_then_moves() {
        let mut stage = stage_over(MockTransport::new());

        stage.move_relative(Channel::X, 1500.7, 2_000_000).unwrap();

        assert_eq!(
            stage.transport.sent(),
            &[
                (Some(Channel::X), Command::SetClosedLoopSpeed(2_000_000)),
                (
                    Some(Channel::X),
                    Command::MoveRelative {
                        delta_nm: 1500,
                        hold_ms: 0,
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_angular_relative_uses_current_revolution() {
        let mut stage = stage_over(MockTransport::new());

        stage
            .move_relative(Channel::Alpha, -250.9, 1_000_000)
            .unwrap();

        assert_eq!(
            stage.transport.sent(),
            &[
                (Some(Channel::Alpha), Command::SetClosedLoopSpeed(1_000_000)),
                (
                    Some(Channel::Alpha),
                    Command::MoveAngleRelative {
                        delta_udeg: -250,
                        revolution: 0,
                        hold_ms: 0,
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_gamma_relative_is_a_step_burst() {
        let mut stage = stage_over(MockTransport::new());

        stage.move_relative(Channel::Gamma, -400.0, 1_000).unwrap();

        // No speed command for the stepper, the frequency rides along
        assert_eq!(
            stage.transport.sent(),
            &[(
                Some(Channel::Gamma),
                Command::StepMove {
                    steps: -400,
                    amplitude: OPEN_LOOP_AMPLITUDE,
                    frequency_hz: 1_000,
                }
            )]
        );
    }

    #[test]
    fn test_linear_absolute_move() {
        let mut stage = stage_over(MockTransport::new());

        stage
            .move_absolute(Channel::Z, 20_000_000.0, 5_000_000)
            .unwrap();

        assert_eq!(
            stage.transport.sent(),
            &[
                (Some(Channel::Z), Command::SetClosedLoopSpeed(5_000_000)),
                (
                    Some(Channel::Z),
                    Command::MoveAbsolute {
                        position_nm: 20_000_000,
                        hold_ms: 0,
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_gamma_absolute_is_a_noop() {
        let mut stage = stage_over(MockTransport::new());

        stage.move_absolute(Channel::Gamma, 1_000.0, 1_000).unwrap();

        assert!(stage.transport.sent().is_empty());
    }

    #[test]
    fn test_linear_position_sign_extends() {
        let mut mock = MockTransport::new();
        mock.push_packet(PacketKind::Position, Channel::Y.index(), 0, -42);
        let mut stage = stage_over(mock);

        assert_eq!(stage.position(Channel::Y).unwrap(), -42);
    }

    #[test]
    fn test_angular_position_unwraps_revolutions() {
        let mut mock = MockTransport::new();
        mock.push_packet(PacketKind::Angle, Channel::Alpha.index(), 10, 2);
        let mut stage = stage_over(mock);

        assert_eq!(stage.position(Channel::Alpha).unwrap(), 720_000_010);
    }

    #[test]
    fn test_angular_position_negative_revolution() {
        let mut mock = MockTransport::new();
        mock.push_packet(PacketKind::Angle, Channel::Beta.index(), 359_999_999, -1);
        let mut stage = stage_over(mock);

        assert_eq!(stage.position(Channel::Beta).unwrap(), -1);
    }

    #[test]
    fn test_gamma_position_is_not_supported() {
        let mut stage = stage_over(MockTransport::new());

        let err = stage.position(Channel::Gamma).unwrap_err();
        assert!(matches!(
            err,
            Error::NotSupported {
                channel: Channel::Gamma,
                ..
            }
        ));
    }

    #[test]
    fn test_stop_is_one_command() {
        let mut stage = stage_over(MockTransport::new());

        stage.stop(Channel::Beta).unwrap();

        assert_eq!(
            stage.transport.sent(),
            &[(Some(Channel::Beta), Command::Stop)]
        );
    }

    #[test]
    fn test_stop_all_covers_every_channel() {
        let mut stage = stage_over(MockTransport::new());

        stage.stop_all().unwrap();

        let sent = stage.transport.sent();
        assert_eq!(sent.len(), Channel::ALL.len());
        for (i, channel) in Channel::ALL.into_iter().enumerate() {
            assert_eq!(sent[i], (Some(channel), Command::Stop));
        }
    }
}
