//! Control layer for a six-channel piezo positioning stage.
//!
//! Three linear axes (X, Y, Z), two rotary axes (Alpha, Beta) and one
//! open-loop stepper (Gamma) sit behind a single serial motion controller.
//! [`Stage`] owns the connection and exposes referencing, closed-loop moves
//! and position readback on top of the packetized command protocol.
//!
//! ```no_run
//! use microstage::{Channel, SerialTransport, Stage};
//!
//! fn main() -> microstage::Result<()> {
//!     let mut stage = Stage::new(SerialTransport::new());
//!     stage.initialize()?;
//!     stage.reference_all();
//!     stage.move_relative(Channel::X, 250_000.0, 1_000_000)?;
//!     println!("X at {} nm", stage.position(Channel::X)?);
//!     stage.close()?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod limits;
pub mod protocol;
pub mod stage;
pub mod transport;

pub use channel::{Channel, Family};
pub use config::StageConfig;
pub use error::{Error, Result};
pub use limits::SafeLimits;
pub use stage::{ReferencingStatus, Stage};
#[cfg(any(test, feature = "mock"))]
pub use transport::MockTransport;
pub use transport::{SerialTransport, Transport};
