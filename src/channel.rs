// Channel identifiers and kinematic families for the six-axis stage
//
// X/Y/Z are closed-loop linear positioners, Alpha/Beta closed-loop rotary
// ones, Gamma an open-loop stepper with no position sensor. The family
// decides which command sequences a channel understands.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use Channel::*;

/// One addressable axis of the stage.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    X = 0,
    Y = 1,
    Z = 2,
    Alpha = 3,
    Beta = 4,
    Gamma = 5,
}

/// Kinematic family of a channel, fixed by the installed positioner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    /// Closed-loop linear travel, nanometer readback, end-stop sensor.
    Linear,
    /// Closed-loop rotation, micro-degree readback, reference-mark sensor.
    Angular,
    /// Open-loop stepping, no readback.
    OpenLoopStep,
}

impl Channel {
    /// All channels in controller index order.
    pub const ALL: [Channel; 6] = [X, Y, Z, Alpha, Beta, Gamma];

    /// The five sensor-equipped channels, in referencing sweep order.
    pub const CLOSED_LOOP: [Channel; 5] = [X, Y, Z, Alpha, Beta];

    /// Controller-side channel index.
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Channel for a controller index, if one exists.
    pub fn from_index(index: u8) -> Option<Channel> {
        match index {
            0 => Some(X),
            1 => Some(Y),
            2 => Some(Z),
            3 => Some(Alpha),
            4 => Some(Beta),
            5 => Some(Gamma),
            _ => None,
        }
    }

    /// Kinematic family this channel belongs to.
    pub fn family(self) -> Family {
        match self {
            X | Y | Z => Family::Linear,
            Alpha | Beta => Family::Angular,
            Gamma => Family::OpenLoopStep,
        }
    }

    /// Whether the channel takes closed-loop absolute position targets.
    pub fn closed_loop(self) -> bool {
        self.family().closed_loop()
    }
}

impl Family {
    /// Closed-loop families accept absolute targets; the stepper does not.
    pub fn closed_loop(self) -> bool {
        !matches!(self, Family::OpenLoopStep)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            X => "X",
            Y => "Y",
            Z => "Z",
            Alpha => "Alpha",
            Beta => "Beta",
            Gamma => "Gamma",
        };
        f.write_str(name)
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "x" => Ok(X),
            "y" => Ok(Y),
            "z" => Ok(Z),
            "alpha" => Ok(Alpha),
            "beta" => Ok(Beta),
            "gamma" => Ok(Gamma),
            _ => Err(format!(
                "unknown channel '{}' (expected x, y, z, alpha, beta, or gamma)",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_classification_is_stable() {
        let expected = [
            (X, Family::Linear),
            (Y, Family::Linear),
            (Z, Family::Linear),
            (Alpha, Family::Angular),
            (Beta, Family::Angular),
            (Gamma, Family::OpenLoopStep),
        ];
        for (channel, family) in expected {
            assert_eq!(channel.family(), family);
            // Repeated queries must agree
            assert_eq!(channel.family(), channel.family());
        }
    }

    #[test]
    fn test_index_round_trip() {
        for channel in Channel::ALL {
            assert_eq!(Channel::from_index(channel.index()), Some(channel));
        }
        assert_eq!(Channel::from_index(6), None);
        assert_eq!(Channel::from_index(0xFF), None);
    }

    #[test]
    fn test_closed_loop_excludes_gamma() {
        for channel in Channel::CLOSED_LOOP {
            assert!(channel.closed_loop());
        }
        assert!(!Gamma.closed_loop());
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("x".parse::<Channel>(), Ok(X));
        assert_eq!("Alpha".parse::<Channel>(), Ok(Alpha));
        assert_eq!("GAMMA".parse::<Channel>(), Ok(Gamma));
        assert!("theta".parse::<Channel>().is_err());
    }
}
