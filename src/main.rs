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

use clap::{crate_version, Parser, Subcommand};
use polysynth::{
    audio,
    config::{Audio, Midi, Synth},
    controller::{keyboard, Controller},
    engine::Engine,
    midi,
    shutdown::Reason,
};
use tracing::info;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A polyphonic FM synthesizer."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the available MIDI input devices.
    MidiDevices {},
    /// Validates a synth config without opening any devices.
    Check {
        /// The path to the synth config.
        config_path: String,
    },
    /// Plays through the given device with the default voice.
    Play {
        /// The audio device name to play through.
        device_name: String,
        /// The MIDI device to take notes from.
        #[arg[short, long]]
        midi_device_name: Option<String>,
    },
    /// Starts the synth from a config file.
    Start {
        /// The path to the synth config.
        config_path: String,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
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
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Check { config_path } => {
            let synth = Synth::load(&PathBuf::from(config_path))?;
            println!("Audio: {}", synth.target_format()?);
            println!("Polyphony: {}", synth.polyphony());
            println!("Envelope: {:?}", synth.adsr()?);
            println!("Voicing: {:?}", synth.voicing()?);
        }
        Commands::Play {
            device_name,
            midi_device_name,
        } => {
            let synth = Synth::new(
                Audio::new(&device_name),
                midi_device_name.as_deref().map(Midi::new),
            );
            run(&synth)?;
        }
        Commands::Start { config_path } => {
            run(&Synth::load(&PathBuf::from(config_path))?)?;
        }
    }

    Ok(())
}

/// Runs the engine with a keyboard controller until something stops it.
fn run(synth: &Synth) -> Result<(), Box<dyn Error>> {
    let mut engine = Engine::start(synth)?;
    let _controller = Controller::new(
        engine.state().tunables().clone(),
        engine.shutdown_handle(),
        Arc::new(keyboard::Driver::new()),
    )?;

    let reason = engine.wait();
    info!(reason = %reason, "Shutting down.");
    engine.stop()?;

    match reason {
        Reason::Requested => Ok(()),
        reason => Err(reason.to_string().into()),
    }
}
