// Timeouts, polling cadence, default speeds

use std::time::Duration;

// Window for a single response packet
pub const PACKET_TIMEOUT: Duration = Duration::from_millis(1000);

// Wall-clock budget for one calibration or referencing settle loop
pub const SETTLE_DEADLINE: Duration = Duration::from_secs(60);

// Pause between status polls while waiting for a channel to stop
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

// Speeds applied when the operator does not supply one
pub const DEFAULT_LINEAR_SPEED: u32 = 1_000_000; // nm/s (1 mm/s)
pub const DEFAULT_ANGULAR_SPEED: u32 = 2_000_000; // µdeg/s (2 deg/s)
pub const DEFAULT_STEP_FREQUENCY: u32 = 1_000; // Hz

/// Tunables for one controller session.
#[derive(Debug, Clone)]
pub struct StageConfig {
    /// Window for each response packet.
    pub packet_timeout: Duration,
    /// Wall-clock budget for each poll-until-stopped loop.
    pub settle_deadline: Duration,
    /// Pause between status polls.
    pub poll_interval: Duration,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            packet_timeout: PACKET_TIMEOUT,
            settle_deadline: SETTLE_DEADLINE,
            poll_interval: POLL_INTERVAL,
        }
    }
}
