/// Zero-indexed channel reserved for control-surface messages (MIDI channel 16).
pub const UI_CHANNEL: u8 = 15;

/// Center of the 14-bit pitch bend range.
pub const PITCH_BEND_CENTER: u16 = 8192;
pub const PITCH_BEND_MAX: u16 = 16_383;

/// Channel voice messages the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8, velocity: u8 },
    PolyAftertouch { channel: u8, key: u8, pressure: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    ChannelPressure { channel: u8, pressure: u8 },
    /// Raw 14-bit value, 0 ..= 16383 with 8192 at rest.
    PitchBend { channel: u8, value: u16 },
}

impl MidiEvent {
    /// Decode a 3-byte message. Data bytes are masked to 7 bits. System
    /// messages and stray data bytes decode to `None`.
    ///
    /// A Note On with velocity 0 is a Note Off.
    pub fn parse(status: u8, data1: u8, data2: u8) -> Option<Self> {
        if status < 0x80 || status >= 0xF0 {
            return None;
        }

        let channel = status & 0x0F;
        let data1 = data1 & 0x7F;
        let data2 = data2 & 0x7F;

        let event = match status & 0xF0 {
            0x80 => MidiEvent::NoteOff {
                channel,
                key: data1,
                velocity: data2,
            },
            0x90 if data2 == 0 => MidiEvent::NoteOff {
                channel,
                key: data1,
                velocity: 0,
            },
            0x90 => MidiEvent::NoteOn {
                channel,
                key: data1,
                velocity: data2,
            },
            0xA0 => MidiEvent::PolyAftertouch {
                channel,
                key: data1,
                pressure: data2,
            },
            0xB0 => MidiEvent::ControlChange {
                channel,
                controller: data1,
                value: data2,
            },
            0xC0 => MidiEvent::ProgramChange {
                channel,
                program: data1,
            },
            0xD0 => MidiEvent::ChannelPressure {
                channel,
                pressure: data1,
            },
            0xE0 => MidiEvent::PitchBend {
                channel,
                value: ((data2 as u16) << 7) | data1 as u16,
            },
            _ => return None,
        };
        Some(event)
    }

    /// Encode back into (status, data1, data2).
    pub fn to_bytes(self) -> [u8; 3] {
        match self {
            MidiEvent::NoteOn { channel, key, velocity } => [0x90 | channel, key, velocity],
            MidiEvent::NoteOff { channel, key, velocity } => [0x80 | channel, key, velocity],
            MidiEvent::PolyAftertouch { channel, key, pressure } => [0xA0 | channel, key, pressure],
            MidiEvent::ControlChange {
                channel,
                controller,
                value,
            } => [0xB0 | channel, controller, value],
            MidiEvent::ProgramChange { channel, program } => [0xC0 | channel, program, 0],
            MidiEvent::ChannelPressure { channel, pressure } => [0xD0 | channel, pressure, 0],
            MidiEvent::PitchBend { channel, value } => {
                let value = value.min(PITCH_BEND_MAX);
                [0xE0 | channel, (value & 0x7F) as u8, (value >> 7) as u8]
            }
        }
    }

    pub fn channel(&self) -> u8 {
        match *self {
            MidiEvent::NoteOn { channel, .. }
            | MidiEvent::NoteOff { channel, .. }
            | MidiEvent::PolyAftertouch { channel, .. }
            | MidiEvent::ControlChange { channel, .. }
            | MidiEvent::ProgramChange { channel, .. }
            | MidiEvent::ChannelPressure { channel, .. }
            | MidiEvent::PitchBend { channel, .. } => channel,
        }
    }
}

/// 7-bit data value to 0.0 - 1.0.
#[inline]
pub fn normalize_7bit(value: u8) -> f32 {
    (value.min(127)) as f32 / 127.0
}

/// 14-bit bend to -1.0 - 1.0 about the center.
#[inline]
pub fn normalize_pitch_bend(value: u16) -> f32 {
    ((value.min(PITCH_BEND_MAX) as f32 - PITCH_BEND_CENTER as f32) / PITCH_BEND_CENTER as f32)
        .clamp(-1.0, 1.0)
}

pub fn midi_note_to_freq(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}
