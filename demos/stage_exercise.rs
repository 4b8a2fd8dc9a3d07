// Stage exercise: careful, step-by-step motion test
//
// IMPORTANT: Run stage_diagnostic FIRST to verify read-only communication.
//
// Usage: cargo run --example stage_exercise -- [port]
// Example: cargo run --example stage_exercise -- /dev/ttyUSB0
//
// Safety features:
// - Explicit confirmation before referencing and before any move
// - Tiny test deltas at conservative speeds
// - Every move is checked against the safe window first
// - Each axis is driven back to where it started

use microstage::{Channel, ReferencingStatus, SafeLimits, SerialTransport, Stage};
use std::io::{self, Write};
use std::thread::sleep;
use std::time::Duration;

// Per-family test deltas, small enough to be harmless anywhere in the window
const LINEAR_DELTA_NM: f64 = 50_000.0; // 50 um
const LINEAR_SPEED: u32 = 1_000_000; // 1 mm/s
const ANGULAR_DELTA_UDEG: f64 = 100_000.0; // 0.1 deg
const ANGULAR_SPEED: u32 = 2_000_000; // 2 deg/s
const STEP_BURST: f64 = 200.0;
const STEP_FREQUENCY: u32 = 1_000; // Hz

fn confirm(prompt: &str) -> bool {
    print!("{} [y/N]: ", prompt);
    io::stdout().flush().unwrap();
    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap();
    input.trim().eq_ignore_ascii_case("y")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .init();

    let port = std::env::args().nth(1);

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║             Stage Exercise (WITH MOTION)                     ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  ⚠  This tool WILL move the stage!                           ║");
    println!("║  ⚠  Make sure the workspace around the stage is clear!       ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    if !confirm("Have you run stage_diagnostic first and verified the connection?") {
        println!("Please run: cargo run --example stage_diagnostic");
        return Ok(());
    }

    if !confirm("Is the workspace clear of obstructions and fingers?") {
        println!("Please clear the stage workspace before exercising it.");
        return Ok(());
    }

    println!();
    println!("Connecting...");
    let transport = match &port {
        Some(port) => SerialTransport::with_locator(port),
        None => SerialTransport::new(),
    };
    let mut stage = Stage::new(transport);
    stage.initialize()?;
    println!("✓ Connected on {}", stage.locator());
    println!();

    // ========== STEP 1: Check referencing state (read-only) ==========
    println!("Step 1: Checking referencing state (read-only)...");
    let mut needs_referencing = false;
    for channel in Channel::CLOSED_LOOP {
        match stage.is_referenced(channel)? {
            ReferencingStatus::Done(_) => {
                println!("  ✓ Channel {} referenced", channel);
            }
            _ => {
                println!("  ✗ Channel {} not referenced", channel);
                needs_referencing = true;
            }
        }
    }
    println!();

    // ========== STEP 2: Referencing sweep ==========
    if needs_referencing {
        println!("Step 2: Referencing sweep");
        println!("  Linear axes will calibrate against their end stops, then");
        println!("  every sensor-equipped axis searches for its reference mark.");
        println!("  The stage WILL move during this step.");
        println!();

        if !confirm("Run the referencing sweep?") {
            println!("Aborted. Unreferenced axes cannot be exercised safely.");
            stage.close()?;
            return Ok(());
        }

        match stage.reference_all() {
            ReferencingStatus::AllDone => println!("  ✓ All axes referenced"),
            status => {
                println!("  ✗ Sweep incomplete: {}", status);
                println!("  Fix the failing axis before exercising the stage.");
                stage.stop_all()?;
                stage.close()?;
                return Ok(());
            }
        }
    } else {
        println!("Step 2: All axes already referenced, skipping sweep");
    }
    println!();

    // ========== STEP 3: Small out-and-back moves ==========
    println!("Step 3: Small out-and-back moves on the closed-loop axes");
    println!("  Each axis moves out by a tiny delta, then back.");
    println!();

    if !confirm("Proceed with the move cycle?") {
        stage.stop_all()?;
        stage.close()?;
        return Ok(());
    }

    let limits = SafeLimits::default();
    let moves = [
        (Channel::X, LINEAR_DELTA_NM, LINEAR_SPEED, "nm"),
        (Channel::Y, LINEAR_DELTA_NM, LINEAR_SPEED, "nm"),
        (Channel::Z, LINEAR_DELTA_NM, LINEAR_SPEED, "nm"),
        (Channel::Alpha, ANGULAR_DELTA_UDEG, ANGULAR_SPEED, "udeg"),
        (Channel::Beta, ANGULAR_DELTA_UDEG, ANGULAR_SPEED, "udeg"),
    ];

    for (channel, delta, speed, unit) in moves {
        let start = stage.position(channel)?;
        println!("  Channel {}: at {} {}", channel, start, unit);

        if !limits.is_valid_relative_move(channel, start, delta) {
            println!("    skipping, {} {} would leave the safe window", delta, unit);
            continue;
        }

        println!("    moving +{} {}...", delta, unit);
        stage.move_relative(channel, delta, speed)?;
        sleep(Duration::from_millis(500));
        let out = stage.position(channel)?;
        println!("    now at {} {} (moved {})", out, unit, out - start);

        println!("    moving back...");
        stage.move_relative(channel, -delta, speed)?;
        sleep(Duration::from_millis(500));
        let back = stage.position(channel)?;
        println!("    back at {} {} (offset {})", back, unit, back - start);
    }
    println!();

    // ========== STEP 4: Open-loop step burst ==========
    println!("Step 4: Open-loop step burst on Gamma");
    println!("  {} steps out, {} steps back. There is no readback to verify,", STEP_BURST, STEP_BURST);
    println!("  watch the axis to confirm it moves.");
    println!();

    if confirm("Send the step bursts?") {
        stage.move_relative(Channel::Gamma, STEP_BURST, STEP_FREQUENCY)?;
        sleep(Duration::from_millis(500));
        stage.move_relative(Channel::Gamma, -STEP_BURST, STEP_FREQUENCY)?;
        sleep(Duration::from_millis(500));
        println!("  ✓ Step bursts sent");
    } else {
        println!("  Skipped");
    }
    println!();

    // ========== FINAL: Stop and cleanup ==========
    println!("Step 5: Stopping all channels...");
    stage.stop_all()?;
    println!("  ✓ Stopped");
    stage.close()?;

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                    Exercise Complete!                        ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("If every axis moved out and came back to its start position,");
    println!("the stage is healthy. Try the CLI next: cargo run -- status");

    Ok(())
}
