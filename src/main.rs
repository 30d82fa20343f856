// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use dombyra::config::StageConfig;
use dombyra::pattern::STRINGS;
use dombyra::scheduler::plan::PerformancePlan;
use dombyra::util::duration_minutes_seconds;
use dombyra::{audio, PatternKey, Scheduler};

/// Extra time after the stage resets so the last pluck can ring out before the audio closes.
const RING_OUT: Duration = Duration::from_millis(400);

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A three-string dombyra that plays short melodies."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the built-in patterns.
    Patterns {},
    /// Lists the available audio output devices.
    Devices {},
    /// Prints when each note of a pattern sounds.
    Plan {
        /// The pattern to plan.
        #[arg(value_enum)]
        pattern: PatternKey,
    },
    /// Plays a pattern, drawing the strings as they sound.
    Perform {
        /// The path to the stage config.
        #[arg[short, long]]
        config: Option<PathBuf>,
        /// The device name to play through. Overrides the config.
        #[arg[short, long]]
        device: Option<String>,
        /// The pattern to play. Defaults to the configured pattern.
        #[arg(value_enum)]
        pattern: Option<PatternKey>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Patterns {} => {
            println!("Strings:");
            for string in STRINGS.iter() {
                println!("- {} ({} Hz)", string.label, string.frequency);
            }

            println!("\nPatterns:");
            for key in PatternKey::ALL {
                let pattern = key.pattern();
                println!("- {}: {}", key, pattern);
                println!("    {}", pattern.description);
            }
        }
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Plan { pattern } => {
            let plan = PerformancePlan::new(pattern.pattern());
            println!("{}: {}", pattern, pattern.pattern());
            println!("{}", plan);
        }
        Commands::Perform {
            config,
            device,
            pattern,
        } => {
            let mut stage_config = match config {
                Some(path) => StageConfig::deserialize(&path)?,
                None => StageConfig::default(),
            };
            if let Some(device) = device {
                stage_config = stage_config.with_device(&device);
            }

            let mut scheduler = Scheduler::from_config(&stage_config);
            if let Some(pattern) = pattern {
                scheduler.select_pattern(pattern);
            }

            let mut view = scheduler.subscribe();
            let summary = scheduler.perform();
            println!(
                "{} ({}){}",
                scheduler.pattern().title,
                duration_minutes_seconds(summary.duration),
                if summary.audible { "" } else { " [silent]" }
            );

            let mut stdout = io::stdout();
            loop {
                let current = *view.borrow_and_update();
                write!(stdout, "\r{}", current)?;
                stdout.flush()?;
                if !current.performing {
                    break;
                }
                if view.changed().await.is_err() {
                    break;
                }
            }
            println!();

            tokio::time::sleep(RING_OUT).await;
            scheduler.teardown();
        }
    }

    Ok(())
}
