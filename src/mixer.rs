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
use std::sync::Arc;

use crate::{note::Note, registry::NoteRegistry, tunables::Tunables};

/// Produces one mono sample per frame for the render loop.
pub trait FrameSource: Send {
    /// Returns the clipped sample for the frame at engine time `now`.
    fn next_frame(&mut self, now: f64) -> f64;
}

/// Sums every live note into a single sample.
pub struct Mixer {
    registry: Arc<NoteRegistry>,
    tunables: Arc<Tunables>,
    live: Vec<Note>,
    decayed: Vec<Note>,
}

impl Mixer {
    pub fn new(registry: Arc<NoteRegistry>, tunables: Arc<Tunables>) -> Mixer {
        let capacity = registry.capacity();
        Mixer {
            registry,
            tunables,
            live: Vec::with_capacity(capacity),
            decayed: Vec::with_capacity(capacity),
        }
    }

    /// The unclipped sum of all live notes at `now`. Notes whose release has
    /// decayed are swept from the registry after the pass.
    ///
    /// The registry lock is only held to copy the table and to sweep it, so
    /// the oscillator math never blocks the MIDI thread.
    pub fn mix(&mut self, now: f64) -> f64 {
        let voicing = self.tunables.voicing();
        let adsr = self.tunables.envelope();

        self.registry.copy_live_into(&mut self.live);
        self.decayed.clear();

        let mut sum = 0.0;
        for note in &self.live {
            let level = adsr.amplitude(note, now);
            if level.decayed {
                self.decayed.push(Note {
                    active: false,
                    ..*note
                });
                continue;
            }
            sum += voicing.unison(note.frequency, level.amplitude, now);
        }

        self.registry.remove_decayed(&self.decayed);
        sum
    }
}

impl FrameSource for Mixer {
    fn next_frame(&mut self, now: f64) -> f64 {
        clip(self.mix(now))
    }
}

/// Clamps a sample to [-1, 1]. NaN becomes silence.
#[inline]
pub fn clip(sample: f64) -> f64 {
    if sample.is_nan() {
        0.0
    } else {
        sample.clamp(-1.0, 1.0)
    }
}

/// Scales a sample into the integer domain whose full-scale value is `scale`.
#[inline]
pub fn encode(sample: f64, scale: i32) -> i32 {
    (clip(sample) * f64::from(scale)).round() as i32
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{envelope::Adsr, voice::Voicing};

    fn mixer(capacity: usize) -> (Mixer, Arc<NoteRegistry>, Arc<Tunables>) {
        let registry = Arc::new(NoteRegistry::new(capacity));
        let tunables = Arc::new(Tunables::new(
            Voicing {
                voices: 1,
                ..Default::default()
            },
            Adsr::default(),
        ));
        (
            Mixer::new(registry.clone(), tunables.clone()),
            registry,
            tunables,
        )
    }

    #[test]
    fn test_clip() {
        assert_eq!(0.5, clip(0.5));
        assert_eq!(-0.25, clip(-0.25));
        assert_eq!(1.0, clip(3.0));
        assert_eq!(-1.0, clip(-1.0001));
        assert_eq!(0.0, clip(f64::NAN));
    }

    #[test]
    fn test_encode() {
        assert_eq!(i32::MAX, encode(1.0, i32::MAX));
        assert_eq!(-i32::MAX, encode(-7.0, i32::MAX));
        assert_eq!(0, encode(0.0, i32::MAX));
        assert_eq!(i16::MAX as i32, encode(1.5, i16::MAX as i32));
        assert_eq!(16384, encode(0.5, i16::MAX as i32));
    }

    #[test]
    fn test_empty_registry_is_silent() {
        let (mut mixer, _, _) = mixer(9);
        assert_eq!(0.0, mixer.next_frame(1.0));
    }

    #[test]
    fn test_mix_sums_notes() {
        let (mut mixer, registry, tunables) = mixer(9);
        registry.add(60, 261.63, 0.0).unwrap();
        registry.add(64, 329.63, 0.0).unwrap();

        let now = 3.3;
        let voicing = tunables.voicing();
        let adsr = tunables.envelope();
        let expected: f64 = registry
            .snapshot()
            .iter()
            .map(|note| voicing.unison(note.frequency, adsr.amplitude(note, now).amplitude, now))
            .sum();

        assert!((mixer.mix(now) - expected).abs() < 1e-12);
        assert_eq!(2, registry.len());
    }

    #[test]
    fn test_output_is_clipped() {
        let (mut mixer, registry, tunables) = mixer(9);
        tunables.set_carrier(crate::voice::Waveform::Square);
        tunables.set_envelope(Adsr {
            attack_time: 0.0,
            decay_time: 0.0,
            sustain_amp: 1.0,
            release_time: 1.0,
            peak: 1.0,
        });
        for id in 0..9 {
            registry.add(id, 1.0, 0.0).unwrap();
        }
        // Every note is a square wave at full level in the same phase.
        let sample = mixer.next_frame(0.1);
        assert_eq!(1.0, sample);
    }

    #[test]
    fn test_end_to_end_release_removes_note() {
        let (mut mixer, registry, tunables) = mixer(9);
        assert_eq!(Adsr::default(), tunables.envelope());

        registry.note_on(60, 261.63, 0.0).unwrap();
        let note = registry.get(60).unwrap();
        let adsr = tunables.envelope();
        assert!((adsr.amplitude(&note, 4.0).amplitude - 0.3).abs() < 1e-6);

        mixer.next_frame(4.0);
        assert!(registry.set_released(60, 4.0));

        mixer.next_frame(5.0);
        assert!(registry.contains(60), "note should still be releasing");

        let sample = mixer.next_frame(6.0);
        assert!(sample.abs() < 1e-6);
        assert!(!registry.contains(60));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_decayed_notes_do_not_hide_neighbours() {
        let (mut mixer, registry, _) = mixer(9);
        for id in [60, 62, 64] {
            registry.add(id, 440.0, 0.0).unwrap();
        }
        registry.set_released(60, 1.0);
        registry.set_released(62, 1.0);

        // Both released notes are fully decayed by t=10 and the held one remains.
        mixer.mix(10.0);
        let remaining: Vec<u8> = registry.snapshot().iter().map(|note| note.id).collect();
        assert_eq!(vec![64], remaining);
    }

    #[test]
    fn test_release_between_passes_is_swept_later() {
        let (mut mixer, registry, tunables) = mixer(9);
        tunables.set_voices(9);
        for id in 0..9 {
            registry.add(id, 440.0, 0.0).unwrap();
        }

        // A release that lands between passes keeps the note sounding.
        mixer.mix(1.0);
        registry.set_released(3, 1.0);
        assert_eq!(9, registry.len());
        assert!(registry.get(3).unwrap().is_released());

        // Once decayed, the sweep drops exactly that note.
        mixer.mix(10.0);
        assert_eq!(8, registry.len());
        assert!(!registry.contains(3));
    }
}
