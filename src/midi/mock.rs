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
use std::{fmt, sync::Arc};

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::info;

use crate::error::EngineError;

/// A mock device. Tests push raw messages into it.
#[derive(Clone)]
pub struct Device {
    name: String,
    sender: Arc<Mutex<Option<Sender<Vec<u8>>>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            sender: Arc::new(Mutex::new(None)),
        }
    }

    /// Sends the mock event through to the watcher. Returns false if nothing
    /// is watching.
    pub fn mock_event(&self, event: &[u8]) -> bool {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.send(event.to_vec()).is_ok(),
            None => false,
        }
    }

    /// Returns true while events are being watched.
    pub fn is_watching(&self) -> bool {
        self.sender.lock().is_some()
    }
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    /// Watches MIDI input for events and sends them to the given sender.
    fn watch_events(&self, sender: Sender<Vec<u8>>) -> Result<(), EngineError> {
        let mut current = self.sender.lock();
        if current.is_some() {
            return Err(EngineError::DriverFailure(
                "already watching MIDI events".to_string(),
            ));
        }
        info!(device = self.name, "Watching MIDI events.");
        *current = Some(sender);
        Ok(())
    }

    /// Stops watching events.
    fn stop_watch_events(&self) {
        self.sender.lock().take();
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::midi::Device as _;

    #[test]
    fn test_watch_and_stop() {
        let device = Device::get("mock-keys");
        assert!(!device.mock_event(&[0x90, 60, 100]));

        let (sender, receiver) = crossbeam_channel::unbounded();
        device.watch_events(sender).unwrap();
        assert!(device.watch_events(crossbeam_channel::unbounded().0).is_err());

        assert!(device.mock_event(&[0x90, 60, 100]));
        assert_eq!(vec![0x90, 60, 100], receiver.recv().unwrap());

        device.stop_watch_events();
        assert!(!device.is_watching());
        assert!(receiver.recv().is_err(), "sender should be dropped");
    }
}
