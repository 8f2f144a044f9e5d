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
use crate::voice::{Voicing, Waveform};

/// A YAML representation of the initial voice settings.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Voice {
    carrier: Option<Waveform>,
    modulator: Option<Waveform>,
    mod_depth: Option<f64>,
    /// Unison spread in Hz either side of the note.
    detune: Option<f64>,
    voices: Option<usize>,
    blend: Option<f64>,
}

impl Voice {
    /// Returns the validated voicing, with defaults for anything unset.
    pub fn voicing(&self) -> Result<Voicing, ConfigError> {
        let defaults = Voicing::default();
        let voicing = Voicing {
            carrier: self.carrier.unwrap_or(defaults.carrier),
            modulator: self.modulator.unwrap_or(defaults.modulator),
            mod_depth: self.mod_depth.unwrap_or(defaults.mod_depth),
            detune: self.detune.unwrap_or(defaults.detune),
            voices: self.voices.unwrap_or(defaults.voices),
            blend: self.blend.unwrap_or(defaults.blend),
        };

        if voicing.voices == 0 {
            return Err(ConfigError::Invalid(
                "voice count must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&voicing.blend) {
            return Err(ConfigError::Invalid(format!(
                "voice blend must be between 0 and 1, got {}",
                voicing.blend
            )));
        }
        if !(voicing.mod_depth >= 0.0 && voicing.mod_depth.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "modulation depth must be zero or more, got {}",
                voicing.mod_depth
            )));
        }
        if !(voicing.detune >= 0.0 && voicing.detune.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "detune must be zero or more, got {}",
                voicing.detune
            )));
        }

        Ok(voicing)
    }
}
