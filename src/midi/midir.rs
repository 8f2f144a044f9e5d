// Copyright (C) 2024 Michael Wilson <mike@mdwn.dev>
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
use std::{fmt, mem};

use crossbeam_channel::Sender;
use midir::{MidiInput, MidiInputConnection, MidiInputPort};
use parking_lot::Mutex;
use tracing::{error, info, span, Level};

use crate::error::EngineError;

pub struct Device {
    name: String,
    input_port: MidiInputPort,
    event_connection: Mutex<Option<MidiInputConnection<()>>>,
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn watch_events(&self, sender: Sender<Vec<u8>>) -> Result<(), EngineError> {
        let span = span!(Level::INFO, "wait for event (midir)");
        let _enter = span.enter();

        let mut event_connection = self.event_connection.lock();
        if event_connection.is_some() {
            return Err(EngineError::DriverFailure(
                "already watching MIDI events".to_string(),
            ));
        }

        info!(device = self.name, "Watching MIDI events.");

        let input = MidiInput::new("polysynth input").map_err(EngineError::driver)?;
        *event_connection = Some(
            input
                .connect(
                    &self.input_port,
                    "polysynth input watcher",
                    move |_, raw_event, _| {
                        // Decoding happens on the decoder thread, not in the driver callback.
                        if let Err(e) = sender.send(Vec::from(raw_event)) {
                            error!(
                                err = format!("{:?}", e),
                                "Error sending MIDI event to receiver."
                            );
                        }
                    },
                    (),
                )
                .map_err(EngineError::driver)?,
        );

        Ok(())
    }

    /// Stops watching events.
    fn stop_watch_events(&self) {
        // Explicitly drop the connection, and with it the sender.
        let event_connection = self.event_connection.lock().take();
        mem::drop(event_connection);
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Input)", self.name)
    }
}

/// Lists midir devices and produces the Device trait.
pub fn list() -> Result<Vec<Box<dyn super::Device>>, EngineError> {
    Ok(list_midir_devices()?
        .into_iter()
        .map(|device| {
            let device: Box<dyn super::Device> = Box::new(device);
            device
        })
        .collect())
}

/// Lists midir input devices.
fn list_midir_devices() -> Result<Vec<Device>, EngineError> {
    let input = MidiInput::new("polysynth input listing").map_err(EngineError::driver)?;

    let mut devices: Vec<Device> = Vec::new();
    for port in input.ports() {
        let name = input.port_name(&port).map_err(EngineError::driver)?;
        if devices.iter().any(|device| device.name == name) {
            continue;
        }
        devices.push(Device {
            name,
            input_port: port,
            event_connection: Mutex::new(None),
        });
    }

    devices.sort_by_key(|device| device.name.clone());
    Ok(devices)
}

/// Gets the given midir device.
pub fn get(name: &str) -> Result<Device, EngineError> {
    let devices = list_midir_devices()?;
    if devices.is_empty() {
        return Err(EngineError::DeviceUnavailable { kind: "MIDI" });
    }

    let mut matches = devices
        .into_iter()
        .filter(|device| device.name.contains(name))
        .collect::<Vec<Device>>();

    if matches.is_empty() {
        return Err(EngineError::InvalidDeviceSelection {
            kind: "MIDI",
            name: name.to_string(),
            reason: "no device found with that name".to_string(),
        });
    }
    if matches.len() > 1 {
        return Err(EngineError::InvalidDeviceSelection {
            kind: "MIDI",
            name: name.to_string(),
            reason: format!(
                "found too many devices that match ({}), use a less ambiguous device name",
                matches
                    .iter()
                    .map(|device| device.name.clone())
                    .collect::<Vec<String>>()
                    .join(", ")
            ),
        });
    }

    // We've verified that there's only one element in the vector, so this should be safe.
    Ok(matches.swap_remove(0))
}
