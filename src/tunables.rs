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

//! Process-wide sound parameters.
//!
//! The control surface writes these while the render thread reads them every
//! frame. Each value is its own atomic; the render thread takes a snapshot
//! per frame and never sees a torn value, but two values changed together
//! may land in different frames.

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};

use crate::{
    envelope::Adsr,
    voice::{Voicing, Waveform},
};

/// An `f64` stored as its bit pattern.
#[derive(Debug)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(value: f64) -> AtomicF64 {
        AtomicF64(AtomicU64::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }

    /// Applies `f` atomically and returns the new value.
    pub fn update<F>(&self, f: F) -> f64
    where
        F: Fn(f64) -> f64,
    {
        let previous = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some(f(f64::from_bits(bits)).to_bits())
            })
            .unwrap_or_else(|bits| bits);
        f(f64::from_bits(previous))
    }
}

/// Shared voice and envelope parameters.
#[derive(Debug)]
pub struct Tunables {
    carrier: AtomicU8,
    modulator: AtomicU8,
    mod_depth: AtomicF64,
    detune: AtomicF64,
    voices: AtomicUsize,
    blend: AtomicF64,

    attack_time: AtomicF64,
    decay_time: AtomicF64,
    sustain_amp: AtomicF64,
    release_time: AtomicF64,
    peak: AtomicF64,
}

impl Default for Tunables {
    fn default() -> Self {
        Tunables::new(Voicing::default(), Adsr::default())
    }
}

impl Tunables {
    pub fn new(voicing: Voicing, adsr: Adsr) -> Tunables {
        let tunables = Tunables {
            carrier: AtomicU8::new(voicing.carrier.to_u8()),
            modulator: AtomicU8::new(voicing.modulator.to_u8()),
            mod_depth: AtomicF64::new(voicing.mod_depth),
            detune: AtomicF64::new(voicing.detune),
            voices: AtomicUsize::new(voicing.voices.max(1)),
            blend: AtomicF64::new(voicing.blend.clamp(0.0, 1.0)),
            attack_time: AtomicF64::new(0.0),
            decay_time: AtomicF64::new(0.0),
            sustain_amp: AtomicF64::new(0.0),
            release_time: AtomicF64::new(0.0),
            peak: AtomicF64::new(0.0),
        };
        tunables.set_envelope(adsr);
        tunables
    }

    /// Snapshot of the voice parameters.
    #[inline]
    pub fn voicing(&self) -> Voicing {
        Voicing {
            carrier: Waveform::from_u8(self.carrier.load(Ordering::Relaxed)),
            modulator: Waveform::from_u8(self.modulator.load(Ordering::Relaxed)),
            mod_depth: self.mod_depth.load(),
            detune: self.detune.load(),
            voices: self.voices.load(Ordering::Relaxed),
            blend: self.blend.load(),
        }
    }

    /// Snapshot of the envelope shape.
    #[inline]
    pub fn envelope(&self) -> Adsr {
        Adsr {
            attack_time: self.attack_time.load(),
            decay_time: self.decay_time.load(),
            sustain_amp: self.sustain_amp.load(),
            release_time: self.release_time.load(),
            peak: self.peak.load(),
        }
    }

    pub fn set_carrier(&self, waveform: Waveform) {
        self.carrier.store(waveform.to_u8(), Ordering::Relaxed);
    }

    pub fn set_modulator(&self, waveform: Waveform) {
        self.modulator.store(waveform.to_u8(), Ordering::Relaxed);
    }

    pub fn set_mod_depth(&self, depth: f64) {
        self.mod_depth.store(depth.max(0.0));
    }

    pub fn set_detune(&self, detune: f64) {
        self.detune.store(detune.max(0.0));
    }

    /// Sets the unison voice count. At least one voice always sounds.
    pub fn set_voices(&self, voices: usize) {
        self.voices.store(voices.max(1), Ordering::Relaxed);
    }

    pub fn set_blend(&self, blend: f64) {
        self.blend.store(blend.clamp(0.0, 1.0));
    }

    /// Replaces the envelope shape. Times are floored at zero and levels
    /// clamped to [0, 1].
    pub fn set_envelope(&self, adsr: Adsr) {
        self.attack_time.store(adsr.attack_time.max(0.0));
        self.decay_time.store(adsr.decay_time.max(0.0));
        self.sustain_amp.store(adsr.sustain_amp.clamp(0.0, 1.0));
        self.release_time.store(adsr.release_time.max(0.0));
        self.peak.store(adsr.peak.clamp(0.0, 1.0));
    }

    /// Moves the detune by `delta` Hz, never below zero.
    pub fn nudge_detune(&self, delta: f64) -> f64 {
        self.detune.update(|detune| (detune + delta).max(0.0))
    }

    /// Moves the modulation depth by `delta`, never below zero.
    pub fn nudge_mod_depth(&self, delta: f64) -> f64 {
        self.mod_depth.update(|depth| (depth + delta).max(0.0))
    }

    /// Returns the oscillators to plain sine waves with no detune or
    /// modulation. The envelope and voice count are left alone.
    pub fn reset(&self) {
        self.set_carrier(Waveform::Sine);
        self.set_modulator(Waveform::Sine);
        self.detune.store(0.0);
        self.mod_depth.store(0.0);
    }
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, thread};

    use super::*;

    #[test]
    fn test_defaults() {
        let tunables = Tunables::default();
        assert_eq!(Voicing::default(), tunables.voicing());
        assert_eq!(Adsr::default(), tunables.envelope());
    }

    #[test]
    fn test_setters_clamp() {
        let tunables = Tunables::default();
        tunables.set_voices(0);
        tunables.set_blend(3.0);
        tunables.set_mod_depth(-1.0);
        tunables.set_detune(-2.0);

        let voicing = tunables.voicing();
        assert_eq!(1, voicing.voices);
        assert_eq!(1.0, voicing.blend);
        assert_eq!(0.0, voicing.mod_depth);
        assert_eq!(0.0, voicing.detune);

        tunables.set_envelope(Adsr {
            attack_time: -1.0,
            decay_time: 0.5,
            sustain_amp: 1.5,
            release_time: 1.0,
            peak: -0.2,
        });
        let adsr = tunables.envelope();
        assert_eq!(0.0, adsr.attack_time);
        assert_eq!(1.0, adsr.sustain_amp);
        assert_eq!(0.0, adsr.peak);
    }

    #[test]
    fn test_nudges() {
        let tunables = Tunables::default();
        assert!((tunables.nudge_detune(0.2) - 0.2).abs() < 1e-12);
        assert!((tunables.nudge_detune(0.2) - 0.4).abs() < 1e-12);
        assert_eq!(0.0, tunables.nudge_detune(-1.0));

        assert!((tunables.nudge_mod_depth(0.1) - 0.1).abs() < 1e-12);
        assert_eq!(0.0, tunables.nudge_mod_depth(-0.5));
    }

    #[test]
    fn test_reset() {
        let tunables = Tunables::default();
        tunables.set_carrier(Waveform::Square);
        tunables.set_modulator(Waveform::Triangle);
        tunables.set_detune(3.0);
        tunables.set_mod_depth(2.0);
        tunables.set_voices(3);

        tunables.reset();

        let voicing = tunables.voicing();
        assert_eq!(Waveform::Sine, voicing.carrier);
        assert_eq!(Waveform::Sine, voicing.modulator);
        assert_eq!(0.0, voicing.detune);
        assert_eq!(0.0, voicing.mod_depth);
        assert_eq!(3, voicing.voices);
    }

    #[test]
    fn test_concurrent_nudges_are_not_lost() {
        let tunables = Arc::new(Tunables::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let tunables = tunables.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        tunables.nudge_mod_depth(1.0);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("nudge thread panicked");
        }
        assert_eq!(4000.0, tunables.voicing().mod_depth);
    }
}
