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

/// Fatal engine errors. Each variant is a distinct category so the binary can
/// report what went wrong before exiting.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No usable input or output device exists.
    #[error("no {kind} device available")]
    DeviceUnavailable { kind: &'static str },

    /// The configured device name doesn't match exactly one device.
    #[error("invalid {kind} device selection '{name}': {reason}")]
    InvalidDeviceSelection {
        kind: &'static str,
        name: String,
        reason: String,
    },

    /// The render loop was started without anything to render.
    #[error("render loop started without a sample generator")]
    MissingGenerator,

    /// A device failed to open, prepare or accept data.
    #[error("driver failure: {0}")]
    DriverFailure(String),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

impl EngineError {
    pub(crate) fn driver<E: std::fmt::Display>(err: E) -> EngineError {
        EngineError::DriverFailure(err.to_string())
    }
}
