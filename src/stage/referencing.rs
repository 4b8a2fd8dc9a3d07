// Power-up referencing for the sensor-equipped channels
//
// Linear axes calibrate against their end stop before the reference-mark
// search; the rotary axes search directly, each in the direction its sensor
// is mounted for. The open-loop stepper has nothing to reference.

use serde::{Deserialize, Serialize};
use std::fmt;

use tracing::{debug, info, warn};

use super::session::Stage;
use crate::channel::{Channel, Family};
use crate::error::{Error, Result};
use crate::protocol::{
    Command, Direction, PHYSICAL_POSITION_KNOWN, POSITIONER_HOLD_TIME_MS, PacketKind,
};
use crate::transport::Transport;

/// Summary of the most recent referencing activity, cached on the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferencingStatus {
    /// Nothing attempted yet this session.
    Idle,
    /// The named axis was found, or made, referenced.
    Done(Channel),
    /// Referencing the named axis failed.
    Failed(Channel),
    /// The named axis reported its physical position unknown.
    NotDone(Channel),
    /// Every closed-loop axis ended a sweep referenced.
    AllDone,
}

impl fmt::Display for ReferencingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferencingStatus::Idle => write!(f, "idle"),
            ReferencingStatus::Done(channel) => write!(f, "{} referenced", channel),
            ReferencingStatus::Failed(channel) => write!(f, "referencing {} failed", channel),
            ReferencingStatus::NotDone(channel) => write!(f, "{} not referenced", channel),
            ReferencingStatus::AllDone => write!(f, "all channels referenced"),
        }
    }
}

/// Referencing recipe for one channel, fixed by its sensor hardware.
#[derive(Debug, Clone, Copy)]
struct ReferencePlan {
    /// End-stop sensors must be calibrated before the mark search.
    calibrate_first: bool,
    /// Search direction. The end-stop calibration also uses it as the safe
    /// direction to retreat in.
    direction: Direction,
}

/// Recipe for a channel, `None` for sensor-less channels.
fn plan_for(channel: Channel) -> Option<ReferencePlan> {
    match channel.family() {
        Family::Linear => Some(ReferencePlan {
            calibrate_first: true,
            direction: Direction::Backward,
        }),
        // Beta's mark sensor is mounted mirrored relative to Alpha's
        Family::Angular => Some(ReferencePlan {
            calibrate_first: false,
            direction: if channel == Channel::Alpha {
                Direction::Forward
            } else {
                Direction::Backward
            },
        }),
        Family::OpenLoopStep => None,
    }
}

impl<T: Transport> Stage<T> {
    /// Whether the channel's physical position is established, as a
    /// channel-tagged outcome. Updates the session's referencing cache.
    pub fn is_referenced(&mut self, channel: Channel) -> Result<ReferencingStatus> {
        if channel.family() == Family::OpenLoopStep {
            return Err(Error::NotSupported {
                channel,
                op: "referencing",
            });
        }

        let status = if self.physical_position_known(channel)? {
            ReferencingStatus::Done(channel)
        } else {
            ReferencingStatus::NotDone(channel)
        };
        self.referencing = status;
        Ok(status)
    }

    /// Establish the channel's physical origin.
    ///
    /// Already-referenced channels return right after the query, sensor-less
    /// channels without touching the transport at all. A failure aborts the
    /// sequence and leaves the controller's partial progress in place.
    pub fn reference_channel(&mut self, channel: Channel) -> Result<()> {
        let Some(plan) = plan_for(channel) else {
            debug!("Channel {} has no sensor, nothing to reference", channel);
            return Ok(());
        };

        let result = self.run_reference_plan(channel, plan);
        self.referencing = match result {
            Ok(()) => ReferencingStatus::Done(channel),
            Err(_) => ReferencingStatus::Failed(channel),
        };
        result
    }

    fn run_reference_plan(&mut self, channel: Channel, plan: ReferencePlan) -> Result<()> {
        if self.physical_position_known(channel)? {
            debug!("Channel {} already referenced", channel);
            return Ok(());
        }

        if plan.calibrate_first {
            // The calibration run drives toward the end stop; the safe
            // direction tells the controller which way that is.
            self.send(channel, Command::SetSafeDirection(plan.direction))?;
            self.send(channel, Command::CalibrateSensor)?;
            self.wait_calibration(channel)?;
        }

        self.send(
            channel,
            Command::FindReferenceMark {
                direction: plan.direction,
                hold_ms: POSITIONER_HOLD_TIME_MS,
                auto_zero: true,
            },
        )?;
        self.wait_referencing(channel)?;

        info!("Channel {} referenced", channel);
        Ok(())
    }

    fn physical_position_known(&mut self, channel: Channel) -> Result<bool> {
        let packet = self.transact(
            channel,
            Command::GetPhysicalPositionKnown,
            PacketKind::PhysicalPositionKnown,
        )?;
        Ok(packet.data1 == PHYSICAL_POSITION_KNOWN)
    }

    /// Reference every closed-loop channel, continuing past per-axis
    /// failures. Ends with the cache at `AllDone` only if every axis came
    /// out referenced; otherwise the cache keeps the last per-axis outcome.
    pub fn reference_all(&mut self) -> ReferencingStatus {
        let mut all_done = true;
        for channel in Channel::CLOSED_LOOP {
            match self.is_referenced(channel) {
                Ok(ReferencingStatus::Done(_)) => {
                    debug!("Channel {} already referenced", channel);
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Referencing query failed for channel {}: {}", channel, e);
                    self.referencing = ReferencingStatus::Failed(channel);
                    all_done = false;
                    continue;
                }
            }

            if let Err(e) = self.reference_channel(channel) {
                warn!("Referencing channel {} failed: {}", channel, e);
                all_done = false;
            }
        }

        if all_done {
            self.referencing = ReferencingStatus::AllDone;
        }
        self.referencing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StageConfig;
    use crate::protocol::PositionerStatus;
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

    fn push_known(mock: &mut MockTransport, channel: Channel, known: bool) {
        mock.push_packet(
            PacketKind::PhysicalPositionKnown,
            channel.index(),
            known as u32,
            0,
        );
    }

    fn push_status(mock: &mut MockTransport, channel: Channel, status: PositionerStatus) {
        mock.push_packet(PacketKind::Status, channel.index(), status.code(), 0);
    }

    fn commands(stage: &Stage<MockTransport>) -> Vec<Command> {
        stage.transport.sent().iter().map(|(_, c)| c.clone()).collect()
    }

    #[test]
    fn test_linear_sequence_order() {
        let mut mock = MockTransport::new();
        push_known(&mut mock, Channel::X, false);
        // Calibration takes three polls to settle
        push_status(&mut mock, Channel::X, PositionerStatus::Calibrating);
        push_status(&mut mock, Channel::X, PositionerStatus::Calibrating);
        push_status(&mut mock, Channel::X, PositionerStatus::Stopped);
        push_status(&mut mock, Channel::X, PositionerStatus::FindingReferenceMark);
        push_status(&mut mock, Channel::X, PositionerStatus::Stopped);
        let mut stage = stage_over(mock);

        stage.reference_channel(Channel::X).unwrap();

        let sent = commands(&stage);
        assert_eq!(sent[0], Command::GetPhysicalPositionKnown);
        assert_eq!(sent[1], Command::SetSafeDirection(Direction::Backward));
        assert_eq!(sent[2], Command::CalibrateSensor);
        assert_eq!(sent[3], Command::GetStatus);
        assert_eq!(sent[4], Command::GetStatus);
        assert_eq!(sent[5], Command::GetStatus);
        // The mark search starts only once the calibration has settled
        assert_eq!(
            sent[6],
            Command::FindReferenceMark {
                direction: Direction::Backward,
                hold_ms: 0,
                auto_zero: true,
            }
        );
        assert_eq!(sent[7], Command::GetStatus);
        assert_eq!(sent[8], Command::GetStatus);
        assert_eq!(sent.len(), 9);

        assert!(
            stage
                .transport
                .sent()
                .iter()
                .all(|(ch, _)| *ch == Some(Channel::X))
        );
        assert_eq!(
            stage.referencing_status(),
            ReferencingStatus::Done(Channel::X)
        );
    }

    #[test]
    fn test_already_referenced_short_circuit() {
        let mut mock = MockTransport::new();
        push_known(&mut mock, Channel::Y, true);
        let mut stage = stage_over(mock);

        stage.reference_channel(Channel::Y).unwrap();

        // Nothing beyond the single query
        assert_eq!(commands(&stage), vec![Command::GetPhysicalPositionKnown]);
        assert_eq!(
            stage.referencing_status(),
            ReferencingStatus::Done(Channel::Y)
        );
    }

    #[test]
    fn test_alpha_searches_forward_without_calibration() {
        let mut mock = MockTransport::new();
        push_known(&mut mock, Channel::Alpha, false);
        push_status(&mut mock, Channel::Alpha, PositionerStatus::FindingReferenceMark);
        push_status(&mut mock, Channel::Alpha, PositionerStatus::Stopped);
        let mut stage = stage_over(mock);

        stage.reference_channel(Channel::Alpha).unwrap();

        let sent = commands(&stage);
        assert_eq!(
            sent,
            vec![
                Command::GetPhysicalPositionKnown,
                Command::FindReferenceMark {
                    direction: Direction::Forward,
                    hold_ms: 0,
                    auto_zero: true,
                },
                Command::GetStatus,
                Command::GetStatus,
            ]
        );
    }

    #[test]
    fn test_beta_searches_backward() {
        let mut mock = MockTransport::new();
        push_known(&mut mock, Channel::Beta, false);
        push_status(&mut mock, Channel::Beta, PositionerStatus::Stopped);
        let mut stage = stage_over(mock);

        stage.reference_channel(Channel::Beta).unwrap();

        let sent = commands(&stage);
        assert_eq!(
            sent[1],
            Command::FindReferenceMark {
                direction: Direction::Backward,
                hold_ms: 0,
                auto_zero: true,
            }
        );
        assert!(!sent.contains(&Command::CalibrateSensor));
    }

    #[test]
    fn test_gamma_reference_is_a_noop() {
        let mut stage = stage_over(MockTransport::new());

        stage.reference_channel(Channel::Gamma).unwrap();

        assert!(stage.transport.sent().is_empty());
        assert_eq!(stage.referencing_status(), ReferencingStatus::Idle);
    }

    #[test]
    fn test_gamma_query_is_not_supported() {
        let mut stage = stage_over(MockTransport::new());

        let err = stage.is_referenced(Channel::Gamma).unwrap_err();
        assert!(matches!(
            err,
            Error::NotSupported {
                channel: Channel::Gamma,
                ..
            }
        ));
        assert!(stage.transport.sent().is_empty());
    }

    #[test]
    fn test_is_referenced_reports_axis_identity() {
        let mut mock = MockTransport::new();
        push_known(&mut mock, Channel::Beta, false);
        let mut stage = stage_over(mock);

        let status = stage.is_referenced(Channel::Beta).unwrap();
        assert_eq!(status, ReferencingStatus::NotDone(Channel::Beta));
        assert_eq!(stage.referencing_status(), status);
    }

    #[test]
    fn test_failure_mid_calibration_aborts_sequence() {
        let mut mock = MockTransport::new();
        push_known(&mut mock, Channel::Z, false);
        // Status poll after the calibration command times out
        mock.push_timeout();
        let mut stage = stage_over(mock);

        let err = stage.reference_channel(Channel::Z).unwrap_err();
        assert!(matches!(err, Error::Timeout));

        let sent = commands(&stage);
        assert!(
            !sent
                .iter()
                .any(|c| matches!(c, Command::FindReferenceMark { .. }))
        );
        assert_eq!(
            stage.referencing_status(),
            ReferencingStatus::Failed(Channel::Z)
        );
    }

    #[test]
    fn test_reference_all_already_referenced() {
        let mut mock = MockTransport::new();
        for channel in Channel::CLOSED_LOOP {
            push_known(&mut mock, channel, true);
        }
        let mut stage = stage_over(mock);

        let status = stage.reference_all();
        assert_eq!(status, ReferencingStatus::AllDone);
        // One query per closed-loop axis, nothing else
        assert_eq!(stage.transport.sent().len(), Channel::CLOSED_LOOP.len());
    }

    #[test]
    fn test_reference_all_continues_past_failure() {
        let mut mock = MockTransport::new();
        push_known(&mut mock, Channel::X, true);
        // Y is unreferenced; its calibration settle poll times out
        push_known(&mut mock, Channel::Y, false);
        push_known(&mut mock, Channel::Y, false);
        mock.push_timeout();
        push_known(&mut mock, Channel::Z, true);
        push_known(&mut mock, Channel::Alpha, true);
        push_known(&mut mock, Channel::Beta, true);
        let mut stage = stage_over(mock);

        let status = stage.reference_all();

        assert_ne!(status, ReferencingStatus::AllDone);
        // The sweep still reached Beta after Y failed
        assert!(
            stage
                .transport
                .sent()
                .contains(&(Some(Channel::Beta), Command::GetPhysicalPositionKnown))
        );
    }

    #[test]
    fn test_reference_all_runs_unreferenced_axes() {
        let mut mock = MockTransport::new();
        push_known(&mut mock, Channel::X, true);
        push_known(&mut mock, Channel::Y, true);
        push_known(&mut mock, Channel::Z, true);
        // Alpha needs the full search
        push_known(&mut mock, Channel::Alpha, false);
        push_known(&mut mock, Channel::Alpha, false);
        push_status(&mut mock, Channel::Alpha, PositionerStatus::Stopped);
        push_known(&mut mock, Channel::Beta, true);
        let mut stage = stage_over(mock);

        let status = stage.reference_all();
        assert_eq!(status, ReferencingStatus::AllDone);
        assert!(
            stage
                .transport
                .sent()
                .iter()
                .any(|(ch, c)| *ch == Some(Channel::Alpha)
                    && matches!(c, Command::FindReferenceMark { .. }))
        );
    }
}
