//! Last-value store indexed by MIDI note number.
//!
//! Written only from the JACK process callback, read from any thread. Every
//! slot is its own atomic, so readers never see a torn value and no lock is
//! taken on the real-time path.

use std::sync::atomic::{AtomicU8, Ordering};

pub const NOTE_COUNT: usize = 128;

#[derive(Debug)]
pub struct NoteTable {
    slots: [AtomicU8; NOTE_COUNT],
}

impl NoteTable {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| AtomicU8::new(0)),
        }
    }

    /// Notes outside 0..=127 are dropped.
    #[inline]
    pub fn record(&self, note: u8, value: u8) {
        if let Some(slot) = self.slots.get(note as usize) {
            slot.store(value, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn read(&self, note: u8) -> u8 {
        self.slots
            .get(note as usize)
            .map_or(0, |slot| slot.load(Ordering::Relaxed))
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> [u8; NOTE_COUNT] {
        std::array::from_fn(|note| self.slots[note].load(Ordering::Relaxed))
    }
}

impl Default for NoteTable {
    fn default() -> Self {
        Self::new()
    }
}
