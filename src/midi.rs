//! Decodes raw 3-byte channel-voice messages into `MidiEvent`s.
//! Runs inside the JACK process callback: pure, bounded, allocation-free.

/// Control Change on channel 10 (controller 108, value 0) sent once to the
/// trigger interface after the ports are connected.
pub const HANDSHAKE: [u8; 3] = [0xB9, 0x6C, 0x00];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { key: u8, velocity: u8 },
    NoteOff { key: u8, velocity: u8 },
    ControlChange { controller: u8, value: u8 },
    Ignored,
}

/// Only exact 3-byte messages are interpreted. The channel nibble is not
/// distinguished.
pub fn decode_midi(msg: &[u8]) -> MidiEvent {
    let &[status, data1, data2] = msg else {
        return MidiEvent::Ignored;
    };

    match status & 0xF0 {
        0x80 => MidiEvent::NoteOff {
            key: data1,
            velocity: data2,
        },
        0x90 => MidiEvent::NoteOn {
            key: data1,
            velocity: data2,
        },
        0xB0 => MidiEvent::ControlChange {
            controller: data1,
            value: data2,
        },
        _ => MidiEvent::Ignored, // program change, pitch bend, system, ...
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_high_nibble_on_every_channel() {
        for channel in 0..16u8 {
            assert_eq!(
                decode_midi(&[0x90 | channel, 38, 127]),
                MidiEvent::NoteOn {
                    key: 38,
                    velocity: 127
                }
            );
            assert_eq!(
                decode_midi(&[0x80 | channel, 38, 5]),
                MidiEvent::NoteOff {
                    key: 38,
                    velocity: 5
                }
            );
            assert_eq!(
                decode_midi(&[0xB0 | channel, 16, 64]),
                MidiEvent::ControlChange {
                    controller: 16,
                    value: 64
                }
            );
        }
    }

    #[test]
    fn other_status_nibbles_are_ignored() {
        for status in [0xA0u8, 0xC0, 0xD0, 0xE0, 0xF0, 0xF8, 0x3C] {
            assert_eq!(decode_midi(&[status, 1, 2]), MidiEvent::Ignored);
        }
    }

    #[test]
    fn wrong_length_is_ignored() {
        assert_eq!(decode_midi(&[]), MidiEvent::Ignored);
        assert_eq!(decode_midi(&[0x90]), MidiEvent::Ignored);
        assert_eq!(decode_midi(&[0x90, 60]), MidiEvent::Ignored);
        assert_eq!(decode_midi(&[0x90, 60, 100, 0]), MidiEvent::Ignored);
        assert_eq!(
            decode_midi(&[0xF0, 0x7E, 0x7F, 0x06, 0x01, 0xF7]),
            MidiEvent::Ignored
        );
    }

    #[test]
    fn note_on_with_zero_velocity_stays_note_on() {
        assert_eq!(
            decode_midi(&[0x99, 36, 0]),
            MidiEvent::NoteOn {
                key: 36,
                velocity: 0
            }
        );
    }

    #[test]
    fn handshake_decodes_as_control_change() {
        assert_eq!(
            decode_midi(&HANDSHAKE),
            MidiEvent::ControlChange {
                controller: 108,
                value: 0
            }
        );
    }
}
