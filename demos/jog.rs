// Keyboard jog: arrows move X/Y, W/S move Z, A/D and Z/X rotate, G/H step
// Gamma, R/F jog size, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::Duration;
use tracing::{info, warn};

use microstage::{Channel, Family, ReferencingStatus, SafeLimits, SerialTransport, Stage, config};

const LINEAR_JOGS: [f64; 3] = [1_000.0, 10_000.0, 100_000.0]; // nm
const ANGULAR_JOGS: [f64; 3] = [10_000.0, 100_000.0, 1_000_000.0]; // udeg
const STEP_JOGS: [f64; 3] = [10.0, 100.0, 1_000.0]; // steps

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let port = std::env::args().nth(1);
    let transport = match &port {
        Some(port) => SerialTransport::with_locator(port),
        None => SerialTransport::new(),
    };

    info!("Connecting to the stage...");
    let mut stage = Stage::new(transport);
    stage.initialize()?;
    info!("Connected on {}", stage.locator());

    for channel in Channel::CLOSED_LOOP {
        if stage.is_referenced(channel)? != ReferencingStatus::Done(channel) {
            warn!(
                "Channel {} is not referenced, its safe window cannot be enforced",
                channel
            );
        }
    }

    info!("Controls: arrows=X/Y, W/S=Z, A/D=Alpha, Z/X=Beta, G/H=Gamma, R/F=jog size, Q=quit");
    info!("Jog size: SMALL");

    enable_raw_mode()?;
    let result = run_jog(&mut stage);
    disable_raw_mode()?;

    stage.stop_all()?;
    stage.close()?;

    result
}

fn run_jog(stage: &mut Stage<SerialTransport>) -> Result<(), Box<dyn std::error::Error>> {
    let mut size_idx: usize = 0;

    loop {
        // Poll for key with 20ms timeout
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                match code {
                    // Linear axes
                    KeyCode::Right if pressed => jog(stage, Channel::X, 1.0, size_idx)?,
                    KeyCode::Left if pressed => jog(stage, Channel::X, -1.0, size_idx)?,
                    KeyCode::Up if pressed => jog(stage, Channel::Y, 1.0, size_idx)?,
                    KeyCode::Down if pressed => jog(stage, Channel::Y, -1.0, size_idx)?,
                    KeyCode::Char('w') if pressed => jog(stage, Channel::Z, 1.0, size_idx)?,
                    KeyCode::Char('s') if pressed => jog(stage, Channel::Z, -1.0, size_idx)?,

                    // Rotary axes
                    KeyCode::Char('a') if pressed => jog(stage, Channel::Alpha, 1.0, size_idx)?,
                    KeyCode::Char('d') if pressed => jog(stage, Channel::Alpha, -1.0, size_idx)?,
                    KeyCode::Char('z') if pressed => jog(stage, Channel::Beta, 1.0, size_idx)?,
                    KeyCode::Char('x') if pressed => jog(stage, Channel::Beta, -1.0, size_idx)?,

                    // Open-loop stepper
                    KeyCode::Char('g') if pressed => jog(stage, Channel::Gamma, -1.0, size_idx)?,
                    KeyCode::Char('h') if pressed => jog(stage, Channel::Gamma, 1.0, size_idx)?,

                    // Jog size control
                    KeyCode::Char('r') if pressed => {
                        size_idx = (size_idx + 1).min(2);
                        print_size(size_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        size_idx = size_idx.saturating_sub(1);
                        print_size(size_idx);
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }
    }

    Ok(())
}

/// One bounded relative jog, refused at the edge of the safe window.
fn jog(
    stage: &mut Stage<SerialTransport>,
    channel: Channel,
    sign: f64,
    size_idx: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let (delta, speed) = match channel.family() {
        Family::Linear => (LINEAR_JOGS[size_idx], config::DEFAULT_LINEAR_SPEED),
        Family::Angular => (ANGULAR_JOGS[size_idx], config::DEFAULT_ANGULAR_SPEED),
        Family::OpenLoopStep => (STEP_JOGS[size_idx], config::DEFAULT_STEP_FREQUENCY),
    };
    let delta = delta * sign;

    let current = if channel.closed_loop() {
        stage.position(channel)?
    } else {
        0
    };
    let limits = SafeLimits::default();
    if !limits.is_valid_relative_move(channel, current, delta) {
        info!("Channel {} at the edge of its safe window, jog ignored", channel);
        return Ok(());
    }

    stage.move_relative(channel, delta, speed)?;
    info!("Channel {} jogged by {}", channel, delta);
    Ok(())
}

fn print_size(idx: usize) {
    let label = ["SMALL", "MED", "LARGE"][idx];
    info!("Jog size: {}", label);
}
