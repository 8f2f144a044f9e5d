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

use std::{fmt, time::Duration};

use crate::config::ConfigError;

/// Shape of the block stream between the render loop and the device.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Bits per sample of the integer domain, 16 or 32
    pub bits_per_sample: u16,
    /// Frames per block
    pub samples_per_block: usize,
    /// Number of blocks cycled between the render loop and the device
    pub block_count: usize,
}

impl TargetFormat {
    /// Creates a new TargetFormat
    pub fn new(
        sample_rate: u32,
        bits_per_sample: u16,
        samples_per_block: usize,
        block_count: usize,
    ) -> Result<Self, ConfigError> {
        if sample_rate == 0 {
            return Err(ConfigError::Invalid(
                "sample rate must be greater than 0".to_string(),
            ));
        }
        if bits_per_sample != 16 && bits_per_sample != 32 {
            return Err(ConfigError::Invalid(format!(
                "unsupported bits per sample {}, must be 16 or 32",
                bits_per_sample
            )));
        }
        if samples_per_block == 0 {
            return Err(ConfigError::Invalid(
                "samples per block must be greater than 0".to_string(),
            ));
        }
        if block_count == 0 {
            return Err(ConfigError::Invalid(
                "block count must be greater than 0".to_string(),
            ));
        }

        Ok(TargetFormat {
            sample_rate,
            bits_per_sample,
            samples_per_block,
            block_count,
        })
    }

    /// The full-scale integer value for this bit depth.
    pub fn scale(&self) -> i32 {
        match self.bits_per_sample {
            16 => i32::from(i16::MAX),
            _ => i32::MAX,
        }
    }

    /// How long one block takes to play.
    pub fn block_duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples_per_block as f64 / f64::from(self.sample_rate))
    }

    /// The worst-case delay between rendering a frame and hearing it.
    pub fn latency(&self) -> Duration {
        self.block_duration() * self.block_count as u32
    }
}

impl Default for TargetFormat {
    /// 44.1kHz, 32-bit, eight blocks of 1024 frames.
    fn default() -> Self {
        TargetFormat {
            sample_rate: 44100,
            bits_per_sample: 32,
            samples_per_block: 1024,
            block_count: 8,
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} bit, {} x {} frames",
            self.sample_rate, self.bits_per_sample, self.block_count, self.samples_per_block
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_format_new() {
        let format = TargetFormat::new(48000, 16, 256, 4).unwrap();
        assert_eq!(format.sample_rate, 48000);
        assert_eq!(format.bits_per_sample, 16);
        assert_eq!(format.scale(), 32767);

        assert!(TargetFormat::new(0, 16, 256, 4).is_err());
        assert!(TargetFormat::new(44100, 24, 256, 4).is_err());
        assert!(TargetFormat::new(44100, 32, 0, 4).is_err());
        assert!(TargetFormat::new(44100, 32, 256, 0).is_err());
    }

    #[test]
    fn test_latency() {
        let format = TargetFormat::new(1000, 32, 500, 8).unwrap();
        assert_eq!(Duration::from_millis(500), format.block_duration());
        assert_eq!(Duration::from_secs(4), format.latency());
        assert_eq!(i32::MAX, format.scale());
    }
}
