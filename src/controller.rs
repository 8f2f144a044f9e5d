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
use std::{
    io,
    sync::Arc,
    thread::{self, JoinHandle},
};

use crossbeam_channel::Sender;
use tracing::{error, info, span, Level};

use crate::{
    error::EngineError,
    shutdown::{Reason, ShutdownHandle},
    tunables::Tunables,
    voice::Waveform,
};

pub mod keyboard;

/// How far one detune step moves the unison spread, in Hz.
pub const DETUNE_STEP: f64 = 0.2;
/// How far one depth step moves the modulation depth.
pub const DEPTH_STEP: f64 = 0.1;

/// Controller events that adjust the live synth.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Event {
    /// Widens the unison spread.
    DetuneUp,
    /// Narrows the unison spread. Never goes below zero.
    DetuneDown,
    /// Deepens the frequency modulation.
    DepthUp,
    /// Shallows the frequency modulation. Never goes below zero.
    DepthDown,
    /// Selects the carrier waveform.
    Carrier(Waveform),
    /// Selects the modulator waveform.
    Modulator(Waveform),
    /// Back to sine carrier and modulator with no detune or modulation.
    Reset,
    /// Stops the engine.
    Quit,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Applies driver events to the live tunables.
pub struct Controller {
    handle: Option<JoinHandle<()>>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(
        tunables: Arc<Tunables>,
        shutdown: ShutdownHandle,
        driver: Arc<dyn Driver>,
    ) -> Result<Controller, EngineError> {
        let handle = thread::Builder::new()
            .name("controller".to_string())
            .spawn(move || Controller::trigger_events(tunables, shutdown, driver))
            .map_err(EngineError::driver)?;
        Ok(Controller {
            handle: Some(handle),
        })
    }

    /// Join will block until the driver closes its event stream.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Controller thread panicked.");
            }
        }
    }

    fn trigger_events(tunables: Arc<Tunables>, shutdown: ShutdownHandle, driver: Arc<dyn Driver>) {
        let span = span!(Level::INFO, "controller");
        let _enter = span.enter();

        let (events_tx, events_rx) = crossbeam_channel::bounded(1);
        let join_handle = driver.monitor_events(events_tx);

        info!("Controller started.");

        for event in events_rx.iter() {
            info!(event = ?event, "Received event.");
            Controller::apply(&tunables, &shutdown, event);
        }

        info!("Controller closing.");
        match join_handle.join() {
            Ok(Err(e)) => error!(err = %e, "Event monitor stopped with an error."),
            Err(_) => error!("Event monitor panicked."),
            Ok(Ok(())) => {}
        }
    }

    /// Applies a single event.
    pub fn apply(tunables: &Tunables, shutdown: &ShutdownHandle, event: Event) {
        match event {
            Event::DetuneUp => {
                let detune = tunables.nudge_detune(DETUNE_STEP);
                info!(detune, "Detune changed.");
            }
            Event::DetuneDown => {
                let detune = tunables.nudge_detune(-DETUNE_STEP);
                info!(detune, "Detune changed.");
            }
            Event::DepthUp => {
                let mod_depth = tunables.nudge_mod_depth(DEPTH_STEP);
                info!(mod_depth, "Modulation depth changed.");
            }
            Event::DepthDown => {
                let mod_depth = tunables.nudge_mod_depth(-DEPTH_STEP);
                info!(mod_depth, "Modulation depth changed.");
            }
            Event::Carrier(waveform) => {
                tunables.set_carrier(waveform);
                info!(carrier = %waveform, "Carrier changed.");
            }
            Event::Modulator(waveform) => {
                tunables.set_modulator(waveform);
                info!(modulator = %waveform, "Modulator changed.");
            }
            Event::Reset => {
                tunables.reset();
                info!("Voicing reset.");
            }
            Event::Quit => {
                shutdown.request(Reason::Requested);
            }
        }
    }
}
