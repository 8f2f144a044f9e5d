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

use crossbeam_channel::Receiver;
use midly::{live::LiveEvent, MidiMessage};
use tracing::{debug, info, span, Level};

use crate::{
    clock::GlobalClock,
    registry::{NoteOn, NoteRegistry},
};

/// A decoded note message. Channel is ignored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NoteEvent {
    On { key: u8, frequency: f64 },
    Off { key: u8 },
}

/// Equal-tempered frequency of a MIDI note number, A4 (69) = 440 Hz.
pub fn note_to_frequency(key: u8) -> f64 {
    440.0 * 2f64.powf((f64::from(key) - 69.0) / 12.0)
}

/// Decodes a raw MIDI message. Anything that isn't a note on or note off
/// decodes to `None`. A note on with zero velocity is a note off.
pub fn decode(raw: &[u8]) -> Option<NoteEvent> {
    let LiveEvent::Midi { message, .. } = LiveEvent::parse(raw).ok()? else {
        return None;
    };

    match message {
        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => Some(NoteEvent::On {
            key: key.as_int(),
            frequency: note_to_frequency(key.as_int()),
        }),
        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
            Some(NoteEvent::Off { key: key.as_int() })
        }
        _ => None,
    }
}

/// Applies incoming MIDI to the note registry, stamped with the engine clock.
pub struct MidiDecoder {
    registry: Arc<NoteRegistry>,
    clock: GlobalClock,
}

impl MidiDecoder {
    pub fn new(registry: Arc<NoteRegistry>, clock: GlobalClock) -> MidiDecoder {
        MidiDecoder { registry, clock }
    }

    /// Decodes and applies one raw message.
    pub fn handle(&self, raw: &[u8]) {
        match decode(raw) {
            Some(event) => self.apply(event),
            None => debug!(event = ?raw, "Ignoring MIDI message."),
        }
    }

    /// Applies a note event at the current engine time.
    pub fn apply(&self, event: NoteEvent) {
        let now = self.clock.now();
        match event {
            NoteEvent::On { key, frequency } => match self.registry.note_on(key, frequency, now) {
                Ok(NoteOn::Added) => debug!(key, frequency, now, "Note on."),
                Ok(NoteOn::Retriggered) => debug!(key, now, "Note retriggered."),
                // Already logged and counted by the registry.
                Err(_) => {}
            },
            NoteEvent::Off { key } => {
                if self.registry.set_released(key, now) {
                    debug!(key, now, "Note off.");
                } else {
                    debug!(key, "Note off for a note that isn't sounding.");
                }
            }
        }
    }

    /// Consumes messages until every sender has gone away.
    pub fn run(&self, events: Receiver<Vec<u8>>) {
        let span = span!(Level::INFO, "midi decoder");
        let _enter = span.enter();

        info!("MIDI decoder started.");
        for raw in events.iter() {
            self.handle(&raw);
        }
        info!("MIDI decoder closing.");
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const NOTE_ON: u8 = 0x90;
    const NOTE_OFF: u8 = 0x80;

    fn decoder(capacity: usize) -> (MidiDecoder, Arc<NoteRegistry>) {
        let registry = Arc::new(NoteRegistry::new(capacity));
        let (clock, _) = GlobalClock::new(44100);
        (MidiDecoder::new(registry.clone(), clock), registry)
    }

    #[test]
    fn test_note_to_frequency() {
        assert!((note_to_frequency(60) - 261.63).abs() < 0.01);
        assert_eq!(440.0, note_to_frequency(69));
        assert!((note_to_frequency(81) - 880.0).abs() < 1e-9);
        assert!((note_to_frequency(0) - 8.1758).abs() < 1e-4);
    }

    #[test]
    fn test_decode() {
        match decode(&[NOTE_ON, 60, 100]) {
            Some(NoteEvent::On { key, frequency }) => {
                assert_eq!(60, key);
                assert!((frequency - 261.63).abs() < 0.01);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(Some(NoteEvent::Off { key: 60 }), decode(&[NOTE_OFF, 60, 0]));
        // Any channel.
        assert_eq!(Some(NoteEvent::Off { key: 61 }), decode(&[0x8F, 61, 64]));
        // Velocity zero note on.
        assert_eq!(Some(NoteEvent::Off { key: 62 }), decode(&[0x93, 62, 0]));
        // Control change and garbage.
        assert_eq!(None, decode(&[0xB0, 7, 100]));
        assert_eq!(None, decode(&[]));
        assert_eq!(None, decode(&[0x90]));
    }

    #[test]
    fn test_note_on_then_retrigger() {
        let (decoder, registry) = decoder(9);
        decoder.handle(&[NOTE_ON, 60, 100]);
        decoder.handle(&[NOTE_OFF, 60, 0]);
        decoder.handle(&[NOTE_ON, 60, 100]);

        assert_eq!(1, registry.len());
        let note = registry.get(60).unwrap();
        assert!(!note.is_released());
        assert!((note.frequency - 261.63).abs() < 0.01);
    }

    #[test]
    fn test_unmatched_note_off_is_ignored() {
        let (decoder, registry) = decoder(9);
        decoder.handle(&[NOTE_ON, 64, 100]);
        let before = registry.snapshot();
        decoder.handle(&[NOTE_OFF, 65, 0]);
        assert_eq!(before, registry.snapshot());
    }

    #[test]
    fn test_full_registry_is_counted() {
        let (decoder, registry) = decoder(2);
        for key in [60, 62, 64] {
            decoder.handle(&[NOTE_ON, key, 100]);
        }
        assert_eq!(2, registry.len());
        assert_eq!(1, registry.rejected());
        assert!(!registry.contains(64));
    }

    #[test]
    fn test_run_exits_when_senders_close() {
        let (decoder, registry) = decoder(9);
        let (sender, receiver) = crossbeam_channel::unbounded();
        sender.send(vec![NOTE_ON, 60, 100]).unwrap();
        sender.send(vec![0xB0, 7, 100]).unwrap();
        sender.send(vec![NOTE_ON, 67, 100]).unwrap();
        drop(sender);

        decoder.run(receiver);
        assert_eq!(2, registry.len());
    }
}
