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
use std::fmt;

/// A single sounding note, keyed by its MIDI note number.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Note {
    /// The MIDI note number. Unique among live notes.
    pub id: u8,
    /// The pitch of the note in Hz.
    pub frequency: f64,
    /// Engine time at which the note was (re)triggered.
    pub on_time: f64,
    /// Engine time at which the note was released, if it has been.
    pub off_time: Option<f64>,
    /// Cleared once the release has decayed to silence.
    pub active: bool,
}

impl Note {
    /// Creates a held note triggered at the given time.
    pub fn new(id: u8, frequency: f64, now: f64) -> Note {
        Note {
            id,
            frequency,
            on_time: now,
            off_time: None,
            active: true,
        }
    }

    /// Returns true if the note was released after it was last triggered.
    /// A release stamped at the same instant as the trigger still counts as held.
    pub fn is_released(&self) -> bool {
        matches!(self.off_time, Some(off_time) if off_time > self.on_time)
    }

    /// Restarts the envelope at the given time.
    pub fn retrigger(&mut self, now: f64) {
        self.on_time = now;
        self.active = true;
    }

    /// Starts the release phase at the given time.
    pub fn release(&mut self, now: f64) {
        self.off_time = Some(now);
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "note {} ({:.2} Hz)", self.id, self.frequency)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_new_note_is_held() {
        let note = Note::new(60, 261.63, 1.0);
        assert!(!note.is_released());
        assert!(note.active);
    }

    #[test]
    fn test_release_at_trigger_time_is_held() {
        let mut note = Note::new(60, 261.63, 1.0);
        note.release(1.0);
        assert!(!note.is_released());

        note.release(1.5);
        assert!(note.is_released());
    }

    #[test]
    fn test_retrigger_after_release_is_held() {
        let mut note = Note::new(60, 261.63, 1.0);
        note.release(2.0);
        note.active = false;

        note.retrigger(3.0);
        assert!(!note.is_released());
        assert!(note.active);
        assert_eq!(3.0, note.on_time);
    }
}
