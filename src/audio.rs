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
use std::{fmt, sync::Arc};

use crossbeam_channel::Sender;

use crate::error::EngineError;

pub mod cpal;
pub mod format;
pub mod mock;
pub mod pool;
pub mod thread_priority;

pub use format::TargetFormat;
pub use pool::{Block, BlockPool};

/// An audio output device.
pub trait Device: fmt::Display + std::marker::Send + std::marker::Sync {
    /// Returns the name of the device.
    fn name(&self) -> String;

    /// The number of output channels the device can drive.
    fn max_channels(&self) -> u16;

    /// Opens the device for block output. Every block handed to the returned
    /// output comes back through `completions` once the device has played it.
    fn open(
        &self,
        format: &TargetFormat,
        completions: Sender<Block>,
    ) -> Result<Box<dyn Output>, EngineError>;
}

/// An open audio output.
pub trait Output: std::marker::Send {
    /// Hands a filled block to the device. The block is returned through the
    /// completion channel given to [`Device::open`].
    fn submit(&mut self, block: Block) -> Result<(), EngineError>;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, EngineError> {
    cpal::Device::list()
}

/// Gets a device with the given name.
pub fn get_device(name: &str) -> Result<Arc<dyn Device>, EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::InvalidDeviceSelection {
            kind: "audio",
            name: name.to_string(),
            reason: "there must be an audio device specified".to_string(),
        });
    }

    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(name)));
    };

    Ok(Arc::new(cpal::Device::get(name)?))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_get_mock_device() {
        let device = get_device("mock-output").expect("mock device");
        assert_eq!("mock-output", device.name());
        assert_eq!("mock-output (Mock)", device.to_string());
    }

    #[test]
    fn test_get_empty_device_name() {
        assert!(matches!(
            get_device("  "),
            Err(EngineError::InvalidDeviceSelection { kind: "audio", .. })
        ));
    }
}
