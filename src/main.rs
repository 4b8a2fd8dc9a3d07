// Command-line frontend for the stage control layer
//
// Thin wrapper over the library: discover the controller, reference axes,
// issue bounded moves and read positions back. Every motion command is
// checked against the deployed safety windows before it goes on the wire.

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use microstage::{
    Channel, Error, Family, ReferencingStatus, SafeLimits, SerialTransport, Stage, Transport,
    config,
};

#[derive(Parser, Debug)]
#[command(name = "microstage", version, about = "Six-channel piezo stage control")]
struct Cli {
    /// Serial device to use instead of scanning for the controller
    #[arg(long, global = true)]
    port: Option<String>,

    /// Emit machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// List serial devices that look like the stage controller
    List,
    /// Report referencing state and position for every channel
    Status,
    /// Reference one channel, or sweep all sensor-equipped channels
    Reference { channel: Option<Channel> },
    /// Move a channel by a signed delta (nm, microdegrees or steps)
    Move {
        channel: Channel,
        #[arg(allow_negative_numbers = true)]
        delta: f64,
        /// Speed in units/s, or step frequency in Hz for Gamma
        #[arg(long)]
        speed: Option<u32>,
    },
    /// Move a channel to an absolute target (nm or microdegrees)
    Goto {
        channel: Channel,
        #[arg(allow_negative_numbers = true)]
        target: f64,
        /// Speed in units/s
        #[arg(long)]
        speed: Option<u32>,
    },
    /// Read back a channel position
    Position { channel: Channel },
    /// Stop one channel, or every channel
    Stop { channel: Option<Channel> },
}

/// One row of the status report.
#[derive(Debug, Serialize)]
struct ChannelReport {
    channel: Channel,
    family: Family,
    #[serde(skip_serializing_if = "Option::is_none")]
    referenced: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<i64>,
}

fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut transport = match &cli.port {
        Some(port) => SerialTransport::with_locator(port),
        None => SerialTransport::new(),
    };

    match cli.command {
        Cmd::List => {
            let devices = transport.find_devices()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&devices)?);
            } else if devices.is_empty() {
                println!("No stage controller found");
            } else {
                for device in &devices {
                    println!("{}", device);
                }
            }
            Ok(())
        }
        command => {
            let mut stage = Stage::new(transport);
            stage.initialize()?;
            let result = run_command(&mut stage, command, cli.json);
            let closed = stage.close();
            result?;
            closed?;
            Ok(())
        }
    }
}

fn run_command(
    stage: &mut Stage<SerialTransport>,
    command: Cmd,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Cmd::List => Ok(()),
        Cmd::Status => {
            let mut reports = Vec::with_capacity(Channel::ALL.len());
            for channel in Channel::ALL {
                reports.push(channel_report(stage, channel)?);
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                println!("Stage on {}", stage.locator());
                for report in &reports {
                    let referenced = match report.referenced {
                        Some(true) => "referenced",
                        Some(false) => "not referenced",
                        None => "open loop",
                    };
                    match report.position {
                        Some(position) => println!(
                            "  {:<6} {:<15} {} {}",
                            report.channel.to_string(),
                            referenced,
                            position,
                            unit(report.channel)
                        ),
                        None => println!("  {:<6} {}", report.channel.to_string(), referenced),
                    }
                }
            }
            Ok(())
        }
        Cmd::Reference { channel } => {
            let status = match channel {
                Some(channel) => {
                    stage.reference_channel(channel)?;
                    stage.referencing_status()
                }
                None => stage.reference_all(),
            };
            if json {
                println!("{}", serde_json::to_string(&status)?);
            } else {
                println!("{}", status);
            }
            Ok(())
        }
        Cmd::Move {
            channel,
            delta,
            speed,
        } => {
            let speed = speed.unwrap_or_else(|| default_speed(channel));
            let limits = SafeLimits::default();
            if !limits.is_valid_speed(channel, speed) {
                return Err(format!(
                    "speed {} is outside the safe band for channel {}",
                    speed, channel
                )
                .into());
            }
            // Bound the end point for closed-loop axes, the burst size for
            // the stepper
            let current = if channel.closed_loop() {
                stage.position(channel)?
            } else {
                0
            };
            if !limits.is_valid_relative_move(channel, current, delta) {
                return Err(format!(
                    "moving channel {} by {} {} would leave the safe window",
                    channel,
                    delta,
                    unit(channel)
                )
                .into());
            }
            stage.move_relative(channel, delta, speed)?;
            if json {
                println!(
                    "{}",
                    json!({ "channel": channel, "moved_by": delta, "speed": speed })
                );
            } else {
                println!("Channel {} moving by {} {}", channel, delta, unit(channel));
            }
            Ok(())
        }
        Cmd::Goto {
            channel,
            target,
            speed,
        } => {
            if !channel.closed_loop() {
                return Err(format!(
                    "channel {} is open loop and has no absolute targets",
                    channel
                )
                .into());
            }
            let speed = speed.unwrap_or_else(|| default_speed(channel));
            let limits = SafeLimits::default();
            if !limits.is_valid_speed(channel, speed) {
                return Err(format!(
                    "speed {} is outside the safe band for channel {}",
                    speed, channel
                )
                .into());
            }
            if !limits.is_valid_absolute_move(channel, target) {
                return Err(format!(
                    "target {} {} is outside the safe window of channel {}",
                    target,
                    unit(channel),
                    channel
                )
                .into());
            }
            stage.move_absolute(channel, target, speed)?;
            if json {
                println!(
                    "{}",
                    json!({ "channel": channel, "moving_to": target, "speed": speed })
                );
            } else {
                println!("Channel {} moving to {} {}", channel, target, unit(channel));
            }
            Ok(())
        }
        Cmd::Position { channel } => {
            let position = stage.position(channel)?;
            if json {
                println!("{}", json!({ "channel": channel, "position": position }));
            } else {
                println!("{} {}", position, unit(channel));
            }
            Ok(())
        }
        Cmd::Stop { channel } => {
            match channel {
                Some(channel) => {
                    stage.stop(channel)?;
                    if !json {
                        println!("Channel {} stopped", channel);
                    }
                }
                None => {
                    stage.stop_all()?;
                    if !json {
                        println!("All channels stopped");
                    }
                }
            }
            if json {
                println!("{}", json!({ "stopped": true }));
            }
            Ok(())
        }
    }
}

/// Status row for one channel. Capabilities the channel lacks come back as
/// absent fields rather than errors.
fn channel_report(
    stage: &mut Stage<SerialTransport>,
    channel: Channel,
) -> Result<ChannelReport, Error> {
    let referenced = match stage.is_referenced(channel) {
        Ok(status) => Some(status == ReferencingStatus::Done(channel)),
        Err(Error::NotSupported { .. }) => None,
        Err(e) => return Err(e),
    };
    let position = match stage.position(channel) {
        Ok(position) => Some(position),
        Err(Error::NotSupported { .. }) => None,
        Err(e) => return Err(e),
    };
    Ok(ChannelReport {
        channel,
        family: channel.family(),
        referenced,
        position,
    })
}

fn default_speed(channel: Channel) -> u32 {
    match channel.family() {
        Family::Linear => config::DEFAULT_LINEAR_SPEED,
        Family::Angular => config::DEFAULT_ANGULAR_SPEED,
        Family::OpenLoopStep => config::DEFAULT_STEP_FREQUENCY,
    }
}

fn unit(channel: Channel) -> &'static str {
    match channel.family() {
        Family::Linear => "nm",
        Family::Angular => "udeg",
        Family::OpenLoopStep => "steps",
    }
}
