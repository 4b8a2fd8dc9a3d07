// Soft workspace bounds checked before motion commands are issued
//
// Values mirror the stage's deployed travel envelope. The controller will
// drive a closed-loop axis straight into its hard stop if asked; these
// windows are what the operator tooling refuses to cross.

use std::ops::RangeInclusive;

use crate::channel::{Channel, Family};

/// Per-family position and speed windows.
#[derive(Debug, Clone)]
pub struct SafeLimits {
    /// Linear axis targets [nm].
    pub linear_position: RangeInclusive<i64>,
    /// Angular axis targets [µdeg].
    pub angular_position: RangeInclusive<i64>,
    /// Signed steps per open-loop burst.
    pub step_count: RangeInclusive<i64>,
    /// Closed-loop linear speed [nm/s].
    pub linear_speed: RangeInclusive<u32>,
    /// Closed-loop angular speed [µdeg/s].
    pub angular_speed: RangeInclusive<u32>,
    /// Open-loop step frequency [Hz].
    pub step_frequency: RangeInclusive<u32>,
}

impl Default for SafeLimits {
    fn default() -> Self {
        Self {
            linear_position: 100_000..=39_900_000,
            angular_position: 0..=60_000_000,
            step_count: -29_900..=29_900,
            linear_speed: 500_000..=20_000_000,
            angular_speed: 1_000_000..=50_000_000,
            step_frequency: 250..=18_000,
        }
    }
}

impl SafeLimits {
    /// Would a relative move keep the channel inside its window? For the
    /// open-loop stepper only the burst size is bounded, since there is no
    /// position to track.
    pub fn is_valid_relative_move(&self, channel: Channel, current: i64, delta: f64) -> bool {
        match channel.family() {
            Family::Linear => self
                .linear_position
                .contains(&current.saturating_add(delta as i64)),
            Family::Angular => self
                .angular_position
                .contains(&current.saturating_add(delta as i64)),
            Family::OpenLoopStep => self.step_count.contains(&(delta as i64)),
        }
    }

    /// Is an absolute target inside the channel's window? Open-loop channels
    /// have no absolute positions, so no target is valid for them.
    pub fn is_valid_absolute_move(&self, channel: Channel, target: f64) -> bool {
        match channel.family() {
            Family::Linear => self.linear_position.contains(&(target as i64)),
            Family::Angular => self.angular_position.contains(&(target as i64)),
            Family::OpenLoopStep => false,
        }
    }

    /// Is the speed (step frequency for the open-loop stepper) inside the
    /// allowed band?
    pub fn is_valid_speed(&self, channel: Channel, speed: u32) -> bool {
        match channel.family() {
            Family::Linear => self.linear_speed.contains(&speed),
            Family::Angular => self.angular_speed.contains(&speed),
            Family::OpenLoopStep => self.step_frequency.contains(&speed),
        }
    }
}
