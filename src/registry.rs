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

//! The table of sounding notes shared between the MIDI thread and the render thread.
//!
//! The MIDI side adds, retriggers and releases notes. The render side copies
//! the table once per frame, evaluates the copy without the lock, and then
//! sweeps out the notes whose release has decayed. Every operation takes the
//! same lock and holds it only to copy or edit the table.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::warn;

use crate::note::Note;

/// Returned when a note cannot be added because every slot is taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("note registry is full ({capacity} notes), rejected note {id}")]
pub struct RegistryFull {
    /// The note that was rejected.
    pub id: u8,
    /// The configured polyphony limit.
    pub capacity: usize,
}

/// The result of a successful [`NoteRegistry::add`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Insertion {
    /// The note was added to the table.
    Added,
    /// A note with this id is already live. Nothing was changed.
    Present,
}

/// The result of a successful [`NoteRegistry::note_on`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteOn {
    Added,
    Retriggered,
}

/// A bounded, ordered collection of live notes.
#[derive(Debug)]
pub struct NoteRegistry {
    notes: Mutex<Vec<Note>>,
    capacity: usize,
    rejected: AtomicU64,
}

impl NoteRegistry {
    /// Creates an empty registry that holds at most `capacity` notes.
    pub fn new(capacity: usize) -> NoteRegistry {
        NoteRegistry {
            notes: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
            rejected: AtomicU64::new(0),
        }
    }

    /// The polyphony limit.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of live notes.
    pub fn len(&self) -> usize {
        self.notes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.lock().is_empty()
    }

    pub fn contains(&self, id: u8) -> bool {
        self.notes.lock().iter().any(|note| note.id == id)
    }

    /// Returns a copy of the live note with the given id.
    pub fn get(&self, id: u8) -> Option<Note> {
        self.notes.lock().iter().find(|note| note.id == id).copied()
    }

    /// The number of notes rejected because the registry was full.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Adds a new held note. Does nothing if the id is already live; callers
    /// should retrigger instead.
    pub fn add(&self, id: u8, frequency: f64, now: f64) -> Result<Insertion, RegistryFull> {
        let mut notes = self.notes.lock();
        self.insert(&mut notes, id, frequency, now)
    }

    /// Restarts the envelope of a live note. Returns false if the id is not live.
    pub fn retrigger(&self, id: u8, now: f64) -> bool {
        match self.notes.lock().iter_mut().find(|note| note.id == id) {
            Some(note) => {
                note.retrigger(now);
                true
            }
            None => false,
        }
    }

    /// Marks a live note as released. Returns false, and changes nothing, if
    /// the id is not live.
    pub fn set_released(&self, id: u8, now: f64) -> bool {
        match self.notes.lock().iter_mut().find(|note| note.id == id) {
            Some(note) => {
                note.release(now);
                true
            }
            None => false,
        }
    }

    /// Adds the note if it is not live or retriggers it if it is, under a
    /// single lock acquisition.
    pub fn note_on(&self, id: u8, frequency: f64, now: f64) -> Result<NoteOn, RegistryFull> {
        let mut notes = self.notes.lock();
        if let Some(note) = notes.iter_mut().find(|note| note.id == id) {
            note.retrigger(now);
            return Ok(NoteOn::Retriggered);
        }

        self.insert(&mut notes, id, frequency, now)
            .map(|_| NoteOn::Added)
    }

    /// Removes the note with the given id, shifting later notes down so the
    /// table stays compact and ordered.
    pub fn remove(&self, id: u8) -> Option<Note> {
        let mut notes = self.notes.lock();
        let index = notes.iter().position(|note| note.id == id)?;
        Some(notes.remove(index))
    }

    /// Returns a copy of the live notes in insertion order.
    pub fn snapshot(&self) -> Vec<Note> {
        self.notes.lock().clone()
    }

    /// Copies the live notes into `out` in insertion order, reusing its
    /// allocation.
    pub fn copy_live_into(&self, out: &mut Vec<Note>) {
        out.clear();
        out.extend_from_slice(&self.notes.lock());
    }

    /// Removes the notes a render pass found decayed, keeping the rest in
    /// order. A note retriggered or released again since the pass copied it
    /// no longer matches and stays. Returns the number removed.
    pub fn remove_decayed(&self, decayed: &[Note]) -> usize {
        if decayed.is_empty() {
            return 0;
        }

        let mut notes = self.notes.lock();
        let before = notes.len();
        notes.retain(|note| {
            !decayed.iter().any(|gone| {
                gone.id == note.id
                    && gone.on_time == note.on_time
                    && gone.off_time == note.off_time
            })
        });
        before - notes.len()
    }

    fn insert(
        &self,
        notes: &mut Vec<Note>,
        id: u8,
        frequency: f64,
        now: f64,
    ) -> Result<Insertion, RegistryFull> {
        if notes.iter().any(|note| note.id == id) {
            return Ok(Insertion::Present);
        }

        if notes.len() >= self.capacity {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            warn!(
                id,
                capacity = self.capacity,
                "Note registry is full, rejecting note."
            );
            return Err(RegistryFull {
                id,
                capacity: self.capacity,
            });
        }

        notes.push(Note::new(id, frequency, now));
        Ok(Insertion::Added)
    }
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, thread};

    use super::*;

    fn ids(registry: &NoteRegistry) -> Vec<u8> {
        registry.snapshot().iter().map(|note| note.id).collect()
    }

    #[test]
    fn test_add_and_get() {
        let registry = NoteRegistry::new(4);
        assert!(registry.is_empty());
        assert_eq!(Ok(Insertion::Added), registry.add(60, 261.63, 0.5));

        let note = registry.get(60).expect("expected note 60");
        assert_eq!(261.63, note.frequency);
        assert_eq!(0.5, note.on_time);
        assert_eq!(None, note.off_time);
        assert!(note.active);
        assert_eq!(1, registry.len());
    }

    #[test]
    fn test_add_duplicate_is_rejected_in_favor_of_retrigger() {
        let registry = NoteRegistry::new(4);
        registry.add(60, 261.63, 0.0).unwrap();

        assert_eq!(Ok(Insertion::Present), registry.add(60, 999.0, 1.0));
        assert_eq!(1, registry.len());
        let note = registry.get(60).unwrap();
        assert_eq!(261.63, note.frequency);
        assert_eq!(0.0, note.on_time);

        assert!(registry.retrigger(60, 1.0));
        assert_eq!(1.0, registry.get(60).unwrap().on_time);
    }

    #[test]
    fn test_add_beyond_capacity() {
        let registry = NoteRegistry::new(3);
        for id in 60..63 {
            registry.add(id, 440.0, 0.0).unwrap();
        }
        let before = registry.snapshot();

        assert_eq!(
            Err(RegistryFull {
                id: 63,
                capacity: 3
            }),
            registry.add(63, 440.0, 0.0)
        );
        assert_eq!(before, registry.snapshot());
        assert_eq!(3, registry.len());
        assert_eq!(1, registry.rejected());

        // A live id is still accepted as a no-op when full.
        assert_eq!(Ok(Insertion::Present), registry.add(61, 440.0, 0.0));
        assert_eq!(1, registry.rejected());
    }

    #[test]
    fn test_zero_capacity_rejects_everything() {
        let registry = NoteRegistry::new(0);
        assert!(registry.add(60, 440.0, 0.0).is_err());
        assert!(registry.note_on(60, 440.0, 0.0).is_err());
        assert_eq!(2, registry.rejected());
    }

    #[test]
    fn test_note_on_adds_then_retriggers() {
        let registry = NoteRegistry::new(2);
        assert_eq!(Ok(NoteOn::Added), registry.note_on(60, 261.63, 0.0));
        registry.set_released(60, 1.0);
        assert_eq!(Ok(NoteOn::Retriggered), registry.note_on(60, 261.63, 2.0));

        let note = registry.get(60).unwrap();
        assert_eq!(2.0, note.on_time);
        assert!(!note.is_released());
        assert_eq!(1, registry.len());
    }

    #[test]
    fn test_set_released_on_absent_id() {
        let registry = NoteRegistry::new(2);
        registry.add(60, 261.63, 0.0).unwrap();
        let before = registry.snapshot();

        assert!(!registry.set_released(61, 1.0));
        assert!(!registry.retrigger(61, 1.0));
        assert_eq!(before, registry.snapshot());
    }

    #[test]
    fn test_remove_preserves_order() {
        let registry = NoteRegistry::new(9);
        for id in [60, 64, 67, 72, 76] {
            registry.add(id, 440.0, 0.0).unwrap();
        }

        assert_eq!(Some(67), registry.remove(67).map(|note| note.id));
        assert_eq!(vec![60, 64, 72, 76], ids(&registry));
        assert_eq!(Some(60), registry.remove(60).map(|note| note.id));
        assert_eq!(vec![64, 72, 76], ids(&registry));
        assert_eq!(Some(76), registry.remove(76).map(|note| note.id));
        assert_eq!(vec![64, 72], ids(&registry));
        assert_eq!(None, registry.remove(76));
    }

    #[test]
    fn test_remove_decayed_keeps_order() {
        let registry = NoteRegistry::new(9);
        for id in [60, 61, 62, 63, 64] {
            registry.add(id, 440.0, 0.0).unwrap();
        }

        let mut live = Vec::new();
        registry.copy_live_into(&mut live);
        assert_eq!(5, live.len());
        let decayed: Vec<Note> = live
            .iter()
            .filter(|note| [61, 62, 64].contains(&note.id))
            .copied()
            .collect();

        assert_eq!(3, registry.remove_decayed(&decayed));
        assert_eq!(vec![60, 63], ids(&registry));
        assert_eq!(0, registry.remove_decayed(&decayed));
    }

    #[test]
    fn test_remove_decayed_everything() {
        let registry = NoteRegistry::new(9);
        for id in 0..9 {
            registry.add(id, 440.0, 0.0).unwrap();
        }

        let mut live = vec![Note::new(99, 1.0, 0.0)];
        registry.copy_live_into(&mut live);
        let copied: Vec<u8> = live.iter().map(|note| note.id).collect();
        assert_eq!((0..9).collect::<Vec<u8>>(), copied);

        assert_eq!(9, registry.remove_decayed(&live));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_retriggered_note_survives_sweep() {
        let registry = NoteRegistry::new(9);
        registry.add(60, 440.0, 0.0).unwrap();
        registry.add(62, 440.0, 0.0).unwrap();
        registry.set_released(60, 1.0);
        registry.set_released(62, 1.0);

        let mut live = Vec::new();
        registry.copy_live_into(&mut live);

        // Note 60 is played again between the copy and the sweep.
        assert!(registry.retrigger(60, 5.0));
        assert_eq!(1, registry.remove_decayed(&live));
        assert_eq!(vec![60], ids(&registry));
        assert!(!registry.get(60).unwrap().is_released());
    }

    #[test]
    fn test_concurrent_writers_and_render_pass() {
        let registry = Arc::new(NoteRegistry::new(9));

        let writer = {
            let registry = registry.clone();
            thread::spawn(move || {
                for round in 0..2000u32 {
                    let id = (round % 16) as u8;
                    let _ = registry.note_on(id, 440.0, round as f64);
                    registry.set_released(id.wrapping_add(3) % 16, round as f64);
                }
            })
        };

        let mut live = Vec::new();
        let mut decayed = Vec::new();
        for _ in 0..2000 {
            registry.copy_live_into(&mut live);
            decayed.clear();
            decayed.extend(live.iter().filter(|note| note.is_released()).copied());
            registry.remove_decayed(&decayed);

            let snapshot = registry.snapshot();
            assert!(snapshot.len() <= 9);
            let mut seen = snapshot.iter().map(|note| note.id).collect::<Vec<u8>>();
            seen.sort();
            seen.dedup();
            assert_eq!(snapshot.len(), seen.len(), "duplicate ids in registry");
        }

        writer.join().expect("writer thread panicked");
    }
}
