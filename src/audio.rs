//! The JACK process callback: emits the startup handshake, decodes incoming
//! MIDI and feeds the telemetry table.
//! Nothing here blocks, allocates, logs or touches the display.

use jack::{
    Client, Control, MidiIn, MidiOut, MidiWriter, Port, ProcessHandler, ProcessScope, RawMidi,
};
use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};

use crate::midi::{HANDSHAKE, MidiEvent, decode_midi};
use crate::telemetry::NoteTable;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Ports not connected yet; input is discarded.
    Idle = 0,
    /// The next process block writes the handshake.
    Armed = 1,
    Sent = 2,
    Failed = 3,
}

/// Handshake progress shared between the main thread and the process callback.
#[derive(Debug, Default)]
pub struct HandshakeCell(AtomicU8);

impl HandshakeCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(HandshakeState::Idle as u8))
    }

    pub fn state(&self) -> HandshakeState {
        match self.0.load(Ordering::Acquire) {
            0 => HandshakeState::Idle,
            1 => HandshakeState::Armed,
            2 => HandshakeState::Sent,
            _ => HandshakeState::Failed,
        }
    }

    /// `false` if it was already armed or resolved.
    pub fn arm(&self) -> bool {
        self.transition(HandshakeState::Idle, HandshakeState::Armed)
    }

    fn resolve(&self, sent: bool) {
        let to = if sent {
            HandshakeState::Sent
        } else {
            HandshakeState::Failed
        };
        self.transition(HandshakeState::Armed, to);
    }

    fn transition(&self, from: HandshakeState, to: HandshakeState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Destination for MIDI bytes produced inside a process block.
pub trait MidiSink {
    type Error;

    fn send(&mut self, frame: u32, bytes: &[u8]) -> Result<(), Self::Error>;
}

impl MidiSink for MidiWriter<'_> {
    type Error = jack::Error;

    fn send(&mut self, frame: u32, bytes: &[u8]) -> Result<(), jack::Error> {
        self.write(&RawMidi { time: frame, bytes })
    }
}

// ─────────────────── block processor ─────────────────────────────────────────

pub struct PanelProcessor {
    table: Arc<NoteTable>,
    handshake: Arc<HandshakeCell>,
}

impl PanelProcessor {
    pub fn new(table: Arc<NoteTable>, handshake: Arc<HandshakeCell>) -> Self {
        Self { table, handshake }
    }

    /// One block: handshake first (once), then every input message in order.
    pub fn process_block<'a, I, W>(&self, events: I, out: &mut W)
    where
        I: IntoIterator<Item = &'a [u8]>,
        W: MidiSink,
    {
        match self.handshake.state() {
            HandshakeState::Idle => return,
            HandshakeState::Armed => {
                let sent = out.send(0, &HANDSHAKE).is_ok();
                self.handshake.resolve(sent);
            }
            HandshakeState::Sent | HandshakeState::Failed => {}
        }

        for msg in events {
            // Telemetry tracks the last note-off value per note.
            if let MidiEvent::NoteOff { key, velocity } = decode_midi(msg) {
                self.table.record(key, velocity);
            }
        }
    }
}

// ─────────────────── JACK adapter ────────────────────────────────────────────

pub struct PanelProcess {
    input: Port<MidiIn>,
    output: Port<MidiOut>,
    processor: PanelProcessor,
}

impl PanelProcess {
    pub fn new(input: Port<MidiIn>, output: Port<MidiOut>, processor: PanelProcessor) -> Self {
        Self {
            input,
            output,
            processor,
        }
    }
}

impl ProcessHandler for PanelProcess {
    fn process(&mut self, _: &Client, ps: &ProcessScope) -> Control {
        // A fresh writer starts with an empty output buffer every block.
        let mut writer = self.output.writer(ps);
        let events = self.input.iter(ps).map(|raw| raw.bytes);
        self.processor.process_block(events, &mut writer);
        Control::Continue
    }
}
