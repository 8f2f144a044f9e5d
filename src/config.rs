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
use std::path::Path;

use ::config::{Config, File, FileFormat};
use serde::Deserialize;

use crate::{audio::TargetFormat, envelope::Adsr, voice::Voicing};

mod audio;
mod envelope;
mod error;
mod midi;
mod voice;

pub use self::audio::Audio;
pub use self::envelope::Envelope;
pub use self::error::ConfigError;
pub use self::midi::Midi;
pub use self::voice::Voice;

const DEFAULT_POLYPHONY: usize = 9;

/// The configuration for the synthesizer.
#[derive(Deserialize, Clone, Debug)]
pub struct Synth {
    /// The audio output configuration.
    audio: Audio,
    /// The MIDI input configuration. Without it the engine only plays what
    /// is injected directly into the note registry.
    midi: Option<Midi>,
    /// The most notes that can sound at once (default: 9)
    polyphony: Option<usize>,
    envelope: Option<Envelope>,
    voice: Option<Voice>,
}

impl Synth {
    /// Creates a default configuration for the given devices.
    pub fn new(audio: Audio, midi: Option<Midi>) -> Synth {
        Synth {
            audio,
            midi,
            polyphony: None,
            envelope: None,
            voice: None,
        }
    }

    /// Loads and validates a config file. The format is taken from the
    /// file extension.
    pub fn load(path: &Path) -> Result<Synth, ConfigError> {
        let synth: Synth = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;
        synth.validate()?;
        Ok(synth)
    }

    /// Parses and validates a YAML config.
    pub fn parse(yaml: &str) -> Result<Synth, ConfigError> {
        let synth: Synth = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        synth.validate()?;
        Ok(synth)
    }

    /// Checks every value without starting anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.target_format()?;
        self.adsr()?;
        self.voicing()?;
        if self.polyphony() == 0 {
            return Err(ConfigError::Invalid(
                "polyphony must be at least 1".to_string(),
            ));
        }
        if let Some(midi) = &self.midi {
            if midi.device().trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "MIDI device name must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn midi(&self) -> Option<&Midi> {
        self.midi.as_ref()
    }

    /// Returns the polyphony limit (default: 9)
    pub fn polyphony(&self) -> usize {
        self.polyphony.unwrap_or(DEFAULT_POLYPHONY)
    }

    pub fn target_format(&self) -> Result<TargetFormat, ConfigError> {
        self.audio.target_format()
    }

    pub fn adsr(&self) -> Result<Adsr, ConfigError> {
        self.envelope.clone().unwrap_or_default().adsr()
    }

    pub fn voicing(&self) -> Result<Voicing, ConfigError> {
        self.voice.clone().unwrap_or_default().voicing()
    }
}
