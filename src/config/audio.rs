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
use serde::Deserialize;

use super::ConfigError;
use crate::audio::TargetFormat;

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_BLOCK_COUNT: usize = 8;
const DEFAULT_SAMPLES_PER_BLOCK: usize = 1024;
const DEFAULT_BITS_PER_SAMPLE: u16 = 32;

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Audio {
    /// The audio device.
    device: String,

    /// Target sample rate in Hz (default: 44100)
    sample_rate: Option<u32>,

    /// Number of blocks cycled between the render loop and the device (default: 8)
    block_count: Option<usize>,

    /// Frames per block (default: 1024)
    samples_per_block: Option<usize>,

    /// Target bits per sample, 16 or 32 (default: 32)
    bits_per_sample: Option<u16>,
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: device.to_string(),
            sample_rate: None,
            block_count: None,
            samples_per_block: None,
            bits_per_sample: None,
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Returns the target sample rate (default: 44100)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the number of blocks (default: 8)
    pub fn block_count(&self) -> usize {
        self.block_count.unwrap_or(DEFAULT_BLOCK_COUNT)
    }

    /// Returns the frames per block (default: 1024)
    pub fn samples_per_block(&self) -> usize {
        self.samples_per_block.unwrap_or(DEFAULT_SAMPLES_PER_BLOCK)
    }

    /// Returns the target bits per sample (default: 32)
    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample.unwrap_or(DEFAULT_BITS_PER_SAMPLE)
    }

    /// Returns the validated block stream format.
    pub fn target_format(&self) -> Result<TargetFormat, ConfigError> {
        if self.device.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "there must be an audio device specified".to_string(),
            ));
        }
        TargetFormat::new(
            self.sample_rate(),
            self.bits_per_sample(),
            self.samples_per_block(),
            self.block_count(),
        )
    }
}
