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
use std::{sync::Arc, thread};

use tracing::{error, info, span, Level};

use crate::{
    audio::{self, BlockPool, TargetFormat},
    clock::GlobalClock,
    config::Synth,
    error::EngineError,
    midi::{self, MidiDecoder},
    mixer::Mixer,
    registry::NoteRegistry,
    scheduler::BlockScheduler,
    shutdown::{Reason, ShutdownHandle},
    tunables::Tunables,
};

/// The state shared between the render thread, the MIDI thread and the
/// control surface.
pub struct EngineState {
    clock: GlobalClock,
    registry: Arc<NoteRegistry>,
    tunables: Arc<Tunables>,
}

impl EngineState {
    /// A read-only view of engine time.
    pub fn clock(&self) -> &GlobalClock {
        &self.clock
    }

    pub fn registry(&self) -> &Arc<NoteRegistry> {
        &self.registry
    }

    pub fn tunables(&self) -> &Arc<Tunables> {
        &self.tunables
    }
}

struct MidiInput {
    device: Arc<dyn midi::Device>,
    decoder: thread::JoinHandle<()>,
}

impl MidiInput {
    /// Stops the device and waits for the decoder to drain.
    fn close(self) {
        self.device.stop_watch_events();
        if self.decoder.join().is_err() {
            error!("MIDI decoder thread panicked.");
        }
    }
}

/// A running synthesizer.
pub struct Engine {
    state: Arc<EngineState>,
    shutdown: ShutdownHandle,
    format: TargetFormat,
    render: Option<thread::JoinHandle<Result<(), EngineError>>>,
    midi: Option<MidiInput>,
}

impl Engine {
    /// Opens the configured devices and starts the engine.
    pub fn start(config: &Synth) -> Result<Engine, EngineError> {
        config.validate()?;
        let audio_device = audio::get_device(config.audio().device())?;
        let midi_device = config
            .midi()
            .map(|midi| midi::get_device(midi.device()))
            .transpose()?;
        Engine::start_with_devices(config, audio_device, midi_device)
    }

    /// Starts the engine on devices that have already been resolved.
    ///
    /// Every device is opened before the render thread starts, so a startup
    /// failure never leaves a thread behind.
    pub fn start_with_devices(
        config: &Synth,
        audio_device: Arc<dyn audio::Device>,
        midi_device: Option<Arc<dyn midi::Device>>,
    ) -> Result<Engine, EngineError> {
        let span = span!(Level::INFO, "engine start");
        let _enter = span.enter();

        config.validate()?;
        let format = config.target_format()?;
        let (clock, clock_writer) = GlobalClock::new(format.sample_rate);
        let state = Arc::new(EngineState {
            clock,
            registry: Arc::new(NoteRegistry::new(config.polyphony())),
            tunables: Arc::new(Tunables::new(config.voicing()?, config.adsr()?)),
        });
        let shutdown = ShutdownHandle::new();

        let midi = match midi_device {
            Some(device) => Some(Engine::start_midi(&state, device)?),
            None => None,
        };

        let (pool, completions) = BlockPool::new(format.block_count, format.samples_per_block);
        let output = match audio_device.open(&format, completions) {
            Ok(output) => output,
            Err(e) => {
                if let Some(midi) = midi {
                    midi.close();
                }
                return Err(e);
            }
        };

        let mixer = Mixer::new(state.registry.clone(), state.tunables.clone());
        let render = BlockScheduler::new(
            clock_writer,
            pool,
            output,
            format.clone(),
            shutdown.clone(),
        )
        .with_source(Box::new(mixer))
        .spawn();
        let render = match render {
            Ok(render) => render,
            Err(e) => {
                if let Some(midi) = midi {
                    midi.close();
                }
                return Err(e);
            }
        };

        info!(
            audio = audio_device.name(),
            midi = midi.as_ref().map(|midi| midi.device.name()),
            polyphony = config.polyphony(),
            format = %format,
            "Engine started."
        );

        Ok(Engine {
            state,
            shutdown,
            format,
            render: Some(render),
            midi,
        })
    }

    fn start_midi(
        state: &Arc<EngineState>,
        device: Arc<dyn midi::Device>,
    ) -> Result<MidiInput, EngineError> {
        let (events_tx, events_rx) = crossbeam_channel::unbounded::<Vec<u8>>();
        let decoder = MidiDecoder::new(state.registry.clone(), state.clock.clone());
        let decoder = thread::Builder::new()
            .name("midi-decoder".to_string())
            .spawn(move || decoder.run(events_rx))
            .map_err(EngineError::driver)?;

        // On failure the sender is dropped and the decoder exits on its own.
        if let Err(e) = device.watch_events(events_tx) {
            let _ = decoder.join();
            return Err(e);
        }

        Ok(MidiInput { device, decoder })
    }

    pub fn state(&self) -> Arc<EngineState> {
        self.state.clone()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn format(&self) -> &TargetFormat {
        &self.format
    }

    /// Blocks until something asks the engine to stop.
    pub fn wait(&self) -> Reason {
        self.shutdown.wait()
    }

    /// Stops the engine and waits for its threads. Returns the render loop's
    /// error if it stopped on one.
    pub fn stop(&mut self) -> Result<(), EngineError> {
        self.shutdown.request(Reason::Requested);

        let result = match self.render.take() {
            Some(render) => render.join().unwrap_or_else(|_| {
                Err(EngineError::DriverFailure(
                    "render thread panicked".to_string(),
                ))
            }),
            None => Ok(()),
        };

        if let Some(midi) = self.midi.take() {
            midi.close();
        }

        info!(
            seconds = self.state.clock.now(),
            rejected_notes = self.state.registry.rejected(),
            "Engine stopped."
        );
        result
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.render.is_some() || self.midi.is_some() {
            if let Err(e) = self.stop() {
                error!(err = %e, "Engine stopped with an error.");
            }
        }
    }
}
