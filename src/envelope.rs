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

//! Linear ADSR envelope.
//!
//! The envelope keeps no per-note state. The phase a note is in is derived
//! from its trigger and release timestamps and the current engine time:
//!
//! ```text
//!   peak  ┐   /\
//!         │  /  \________
//!   sus   │ /            \
//!         │/              \
//!   0     └────────────────\───→ t
//!          A   D     S      R
//! ```
//!
//! A released note fades linearly from whatever level it had at the moment
//! of release, not from the sustain level, so releasing during the attack
//! doesn't click.

use crate::note::Note;

/// Levels at or below this are treated as silence.
pub const SILENCE_THRESHOLD: f64 = 0.001;

/// Envelope shape. Times are in seconds, levels in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Adsr {
    pub attack_time: f64,
    pub decay_time: f64,
    pub sustain_amp: f64,
    pub release_time: f64,
    pub peak: f64,
}

impl Default for Adsr {
    fn default() -> Self {
        Adsr {
            attack_time: 2.0,
            decay_time: 2.0,
            sustain_amp: 0.3,
            release_time: 2.0,
            peak: 0.3,
        }
    }
}

/// The envelope output for a note at a point in time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Level {
    /// Amplitude in [0, 1].
    pub amplitude: f64,
    /// True once a released note has faded to silence.
    pub decayed: bool,
}

impl Adsr {
    /// Computes the amplitude of the note at time `now`.
    pub fn amplitude(&self, note: &Note, now: f64) -> Level {
        let released = note.is_released();
        let amplitude = match note.off_time {
            Some(off_time) if released => {
                let release_amp = self.held_amplitude(off_time - note.on_time);
                self.release_amplitude(release_amp, now - off_time)
            }
            _ => self.held_amplitude(now - note.on_time),
        };

        let amplitude = amplitude.clamp(0.0, 1.0);
        if amplitude <= SILENCE_THRESHOLD {
            Level {
                amplitude: 0.0,
                decayed: released,
            }
        } else {
            Level {
                amplitude,
                decayed: false,
            }
        }
    }

    /// Amplitude of a note that has been held for `lifetime` seconds.
    fn held_amplitude(&self, lifetime: f64) -> f64 {
        if self.attack_time > 0.0 && lifetime <= self.attack_time {
            (lifetime / self.attack_time) * self.peak
        } else if self.decay_time > 0.0 && lifetime <= self.attack_time + self.decay_time {
            ((lifetime - self.attack_time) / self.decay_time) * (self.sustain_amp - self.peak)
                + self.peak
        } else {
            self.sustain_amp
        }
    }

    /// Linear fade from `release_amp` to zero over the release time.
    fn release_amplitude(&self, release_amp: f64, elapsed: f64) -> f64 {
        if self.release_time <= 0.0 {
            return 0.0;
        }
        let elapsed = elapsed.max(0.0);
        release_amp - (elapsed / self.release_time) * release_amp
    }
}
