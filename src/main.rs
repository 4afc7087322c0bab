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
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chamberlin::audio;
use chamberlin::config;
use chamberlin::engine::VoiceEngine;
use chamberlin::loader::FileFetcher;
use clap::{crate_version, Parser, Subcommand};
use duration_string::DurationString;
use tracing_subscriber::EnvFilter;

/// Played when no keys are given on the command line.
const DEFAULT_CHORD: [i64; 5] = [30, 44, 59, 64, 68];

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A pitch-shifting sample player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prints the note name, frequency and playback rate of every key.
    Keys {
        /// The frequency of A4 (key 49) in Hz.
        #[arg(short, long)]
        reference_frequency: Option<f64>,
        /// The path to the engine config.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Loads a sample and plays keys from it as a chord.
    Play {
        /// The keys to play, 1-88. Defaults to a five note chord.
        keys: Vec<i64>,
        /// The sample to load, as a path or file:// URI. Overrides the config.
        #[arg(short, long)]
        sample: Option<String>,
        /// How long to hold the chord, e.g. 2s or 1500ms.
        #[arg(short, long, default_value = "2s")]
        duration: String,
        /// The path to the engine config.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// The device name to play through. Overrides the config.
        #[arg(long)]
        device: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Keys {
            reference_frequency,
            config,
        } => {
            let mut config = config::load(config.as_deref())?;
            if let Some(reference_frequency) = reference_frequency {
                config = config.with_reference_frequency(reference_frequency);
            }

            // Nothing is played, so the table doesn't need a real device.
            let engine = VoiceEngine::from_config(
                &config,
                FileFetcher::new(config.sample_rate()),
                Arc::new(audio::mock::Sink::get("mock")),
            )?;
            print!("{}", engine.keyboard_status());
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
        Commands::Play {
            keys,
            sample,
            duration,
            config,
            device,
        } => {
            let mut config = config::load(config.as_deref())?;
            if let Some(sample) = sample {
                config = config.with_sample(&sample);
            }
            if let Some(device) = device {
                config = config.with_device(&device);
            }
            let Some(locator) = config.sample().map(str::to_string) else {
                return Err("no sample given: pass --sample or set sample in the config".into());
            };
            let duration: Duration = DurationString::from_string(duration)?.into();

            let sink = audio::get_sink(&config)?;
            let engine =
                VoiceEngine::from_config(&config, FileFetcher::new(config.sample_rate()), sink)?;
            engine.load_sample(&locator).await?;

            let keys = if keys.is_empty() {
                DEFAULT_CHORD.to_vec()
            } else {
                keys
            };
            let report = engine.play_chord(&keys);
            if report.played().is_empty() {
                return Err("none of the requested keys could be played".into());
            }

            tokio::time::sleep(duration).await;
            engine.stop_all_keys();
        }
    }

    Ok(())
}
