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
use crate::envelope::Adsr;

/// A YAML representation of the envelope shape. Times are in seconds.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Envelope {
    attack: Option<f64>,
    decay: Option<f64>,
    sustain: Option<f64>,
    release: Option<f64>,
    peak: Option<f64>,
}

impl Envelope {
    /// Returns the validated envelope, with defaults for anything unset.
    pub fn adsr(&self) -> Result<Adsr, ConfigError> {
        let defaults = Adsr::default();
        let adsr = Adsr {
            attack_time: self.attack.unwrap_or(defaults.attack_time),
            decay_time: self.decay.unwrap_or(defaults.decay_time),
            sustain_amp: self.sustain.unwrap_or(defaults.sustain_amp),
            release_time: self.release.unwrap_or(defaults.release_time),
            peak: self.peak.unwrap_or(defaults.peak),
        };

        for (name, time) in [
            ("attack", adsr.attack_time),
            ("decay", adsr.decay_time),
            ("release", adsr.release_time),
        ] {
            if !time.is_finite() || time < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "envelope {} time must be zero or more, got {}",
                    name, time
                )));
            }
        }
        for (name, level) in [("sustain", adsr.sustain_amp), ("peak", adsr.peak)] {
            if !(0.0..=1.0).contains(&level) {
                return Err(ConfigError::Invalid(format!(
                    "envelope {} must be between 0 and 1, got {}",
                    name, level
                )));
            }
        }

        Ok(adsr)
    }
}
