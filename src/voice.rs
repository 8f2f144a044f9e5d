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

//! Oscillators, phase modulation and unison stacking.
//!
//! Every function here is evaluated at an absolute engine time rather than
//! from a running phase accumulator, so a voice has no state of its own and
//! any number of notes can share the same [`Voicing`].

use std::{
    f64::consts::{FRAC_2_PI, TAU},
    fmt,
    str::FromStr,
};

use serde::Deserialize;

/// The oscillator shapes available to the carrier and the modulator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    #[default]
    Sine,
    Triangle,
    Square,
}

impl Waveform {
    /// Samples the waveform at the given phase angle in radians. The period
    /// is 2π and the output is in [-1, 1].
    #[inline]
    pub fn sample(self, angle: f64) -> f64 {
        match self {
            Waveform::Sine => angle.sin(),
            Waveform::Triangle => angle.sin().asin() * FRAC_2_PI,
            Waveform::Square => {
                if angle.sin() > 0.0 {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }

    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Waveform::Sine => 0,
            Waveform::Triangle => 1,
            Waveform::Square => 2,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Waveform {
        match value {
            1 => Waveform::Triangle,
            2 => Waveform::Square,
            _ => Waveform::Sine,
        }
    }
}

impl FromStr for Waveform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sine" => Ok(Waveform::Sine),
            "triangle" => Ok(Waveform::Triangle),
            "square" => Ok(Waveform::Square),
            _ => Err(format!("unknown waveform '{}'", s)),
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Waveform::Sine => write!(f, "sine"),
            Waveform::Triangle => write!(f, "triangle"),
            Waveform::Square => write!(f, "square"),
        }
    }
}

/// Converts a frequency in Hz to radians per second.
#[inline]
pub fn angular_frequency(frequency: f64) -> f64 {
    TAU * frequency
}

/// A snapshot of the voice tunables, taken once per frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Voicing {
    /// The waveform that is heard.
    pub carrier: Waveform,
    /// The waveform that bends the carrier's phase.
    pub modulator: Waveform,
    /// How far, in radians, the modulator pushes the carrier's phase.
    pub mod_depth: f64,
    /// The spread of the unison stack in Hz either side of the note.
    pub detune: f64,
    /// The number of stacked voices per note.
    pub voices: usize,
    /// Level of the side voices relative to the center voices.
    pub blend: f64,
}

impl Default for Voicing {
    fn default() -> Self {
        Voicing {
            carrier: Waveform::Sine,
            modulator: Waveform::Sine,
            mod_depth: 0.0,
            detune: 0.0,
            voices: 5,
            blend: 0.4,
        }
    }
}

impl Voicing {
    /// Phase-modulated output of one oscillator pair at `time`.
    #[inline]
    pub fn modulate(
        &self,
        carrier_frequency: f64,
        modulator_frequency: f64,
        depth: f64,
        amplitude: f64,
        time: f64,
    ) -> f64 {
        let modulation = self
            .modulator
            .sample(angular_frequency(modulator_frequency) * time);
        self.carrier
            .sample(angular_frequency(carrier_frequency) * time + depth * modulation)
            * amplitude
    }

    /// One sample of a note at `base_frequency`, stacked into the configured
    /// number of detuned voices and normalized by that number.
    pub fn unison(&self, base_frequency: f64, amplitude: f64, time: f64) -> f64 {
        match self.voices {
            0 => 0.0,
            1 => self.modulate(
                base_frequency,
                base_frequency,
                self.mod_depth,
                amplitude,
                time,
            ),
            count => {
                let side_amplitude = amplitude * self.blend;
                let sum: f64 = self
                    .unison_frequencies(base_frequency)
                    .enumerate()
                    .map(|(index, frequency)| {
                        let voice_amplitude = if is_center_voice(index, count) {
                            amplitude
                        } else {
                            side_amplitude
                        };
                        self.modulate(
                            frequency,
                            frequency,
                            self.mod_depth,
                            voice_amplitude,
                            time,
                        )
                    })
                    .sum();
                sum / count as f64
            }
        }
    }

    /// The frequency of every voice in the unison stack, lowest first. The
    /// stack is evenly spaced across `[base - detune, base + detune]`.
    pub fn unison_frequencies(&self, base_frequency: f64) -> impl Iterator<Item = f64> {
        let count = self.voices;
        let lowest = base_frequency - self.detune;
        let spacing = if count > 1 {
            2.0 * self.detune / (count - 1) as f64
        } else {
            0.0
        };
        let single = count == 1;

        (0..count).map(move |index| {
            if single {
                base_frequency
            } else {
                lowest + index as f64 * spacing
            }
        })
    }
}

/// The middle voice of an odd stack, or the middle two of an even one.
fn is_center_voice(index: usize, count: usize) -> bool {
    if count % 2 == 1 {
        index == count / 2
    } else {
        index == count / 2 - 1 || index == count / 2
    }
}
