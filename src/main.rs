use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use clap::Parser;
use geartrain::input::parse_script_line;
use geartrain::{ChainConfig, FontConfig, GearTrain, GearTrainConfig, SpeedUnit, WindowConfig};

/// Interactive view of a long reduction gear train.
#[derive(Parser, Debug)]
#[command(name = "geartrain", version, about)]
struct Cli {
    /// Initial drive speed; invalid or non-positive values fall back to 1
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    speed: f64,

    /// Unit of --speed
    #[arg(long, value_enum, default_value_t = CliSpeedUnit::S)]
    unit: CliSpeedUnit,

    /// Start with continuous drive already running
    #[arg(long)]
    auto: bool,

    /// One-based stage to centre on at startup
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    start_stage: i64,

    /// Number of stages in the chain
    #[arg(long, default_value_t = 100)]
    stages: usize,

    #[arg(long, default_value_t = 1200)]
    width: usize,

    #[arg(long, default_value_t = 480)]
    height: usize,

    /// Upper bound on redraws per second
    #[arg(long, default_value_t = 60.0)]
    fps: f64,

    /// Font for labels; without it a few common system fonts are tried
    #[arg(long)]
    font: Option<PathBuf>,

    /// Read control commands line by line from stdin (e.g. `speed 5`, `jump 40`)
    #[arg(long)]
    stdin: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum CliSpeedUnit {
    /// Revolutions per second
    S,
    /// Revolutions per minute
    Min,
}

impl From<CliSpeedUnit> for SpeedUnit {
    fn from(unit: CliSpeedUnit) -> Self {
        match unit {
            CliSpeedUnit::S => SpeedUnit::PerSecond,
            CliSpeedUnit::Min => SpeedUnit::PerMinute,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    let config = GearTrainConfig::builder()
        .chain(ChainConfig {
            stage_count: cli.stages,
            ..ChainConfig::default()
        })
        .window(WindowConfig {
            width: cli.width,
            height: cli.height,
            max_framerate: cli.fps,
            ..WindowConfig::default()
        })
        .font(FontConfig {
            path: cli.font,
            ..FontConfig::default()
        })
        .speed(cli.speed)
        .speed_unit(cli.unit.into())
        .auto_drive(cli.auto)
        .start_stage(cli.start_stage)
        .build();

    let gear_train = GearTrain::new(config)?;

    if cli.stdin {
        let (sender, receiver) = mpsc::channel();
        // Spawn a thread to read commands from stdin and forward them to the window
        thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if let Some(command) = parse_script_line(&line) {
                    if sender.send(command).is_err() {
                        break;
                    }
                }
            }
            log::debug!("stdin closed");
        });
        gear_train.show_with_commands(receiver)?;
    } else {
        gear_train.show()?;
    }

    Ok(())
}
