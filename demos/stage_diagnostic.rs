// Stage diagnostic: survey the controller without moving anything
//
// This tool issues no motion commands. It connects, checks which axes are
// referenced and reads positions back. Use this first before running
// stage_exercise.
//
// Usage: cargo run --example stage_diagnostic -- [port]
// Example: cargo run --example stage_diagnostic -- /dev/ttyUSB0

use microstage::{Channel, Error, Family, ReferencingStatus, SerialTransport, Stage};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("debug".parse().unwrap()),
        )
        .init();

    let port = std::env::args().nth(1);

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║            Stage Diagnostic (no motion commands)             ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Connects, queries referencing state and reads positions.    ║");
    println!("║  No axis will move.                                          ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    match &port {
        Some(port) => println!("Serial port: {}", port),
        None => println!("Serial port: scanning for the controller"),
    }
    println!();

    // Connect to the controller
    println!("Step 1: Connecting...");
    let transport = match &port {
        Some(port) => SerialTransport::with_locator(port),
        None => SerialTransport::new(),
    };
    let mut stage = Stage::new(transport);
    match stage.initialize() {
        Ok(()) => println!("  ✓ Controller found on {}", stage.locator()),
        Err(e) => {
            println!("  ✗ Failed to connect: {}", e);
            println!();
            println!("Troubleshooting:");
            println!("  - Check the USB cable to the controller");
            println!("  - Pass the port explicitly if discovery fails");
            println!("  - Check you have permission to open the device");
            return Err(e.into());
        }
    }
    println!();

    // Query referencing state per axis
    println!("Step 2: Checking referencing state...");
    let mut all_referenced = true;
    for channel in Channel::ALL {
        match stage.is_referenced(channel) {
            Ok(ReferencingStatus::Done(_)) => {
                println!("  Channel {:<6} ✓ referenced", channel.to_string());
            }
            Ok(_) => {
                println!("  Channel {:<6} ✗ NOT REFERENCED", channel.to_string());
                all_referenced = false;
            }
            Err(Error::NotSupported { .. }) => {
                println!("  Channel {:<6} - open loop, nothing to reference", channel.to_string());
            }
            Err(e) => {
                println!("  Channel {:<6} ✗ ERROR: {}", channel.to_string(), e);
                all_referenced = false;
            }
        }
    }
    println!();

    if !all_referenced {
        println!("⚠ Some axes are not referenced. Their positions below are");
        println!("  relative to wherever the stage powered up, not the origin.");
        println!();
    }

    // Read positions back
    println!("Step 3: Reading positions...");
    for channel in Channel::ALL {
        match stage.position(channel) {
            Ok(position) => match channel.family() {
                Family::Linear => {
                    println!(
                        "  Channel {:<6} {} nm ({:.3} mm)",
                        channel.to_string(),
                        position,
                        position as f64 / 1_000_000.0
                    );
                }
                _ => {
                    println!(
                        "  Channel {:<6} {} udeg ({:.3}°)",
                        channel.to_string(),
                        position,
                        position as f64 / 1_000_000.0
                    );
                }
            },
            Err(Error::NotSupported { .. }) => {
                println!("  Channel {:<6} no readback (open loop)", channel.to_string());
            }
            Err(e) => println!("  Channel {:<6} ERROR: {}", channel.to_string(), e),
        }
    }
    println!();

    stage.close()?;

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                    Diagnostic Complete                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("If every closed-loop axis shows ✓ referenced:");
    println!("  1. Positions above are absolute and safe to navigate by");
    println!("  2. stage_exercise can run its move cycle");
    println!();
    println!("If axes show NOT REFERENCED, run the referencing sweep first:");
    println!("  cargo run -- reference");

    Ok(())
}
