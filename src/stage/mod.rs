// Stage control module
//
// Provides:
// - Session lifecycle and the command/response correlator
// - Power-up referencing state machine per kinematic family
// - Relative/absolute motion and position readback

mod motion;
mod referencing;
mod session;

pub use referencing::ReferencingStatus;
pub use session::Stage;
