//! Typed MIDI 1.0 messages.

use serde::{Deserialize, Serialize};

use crate::error::RangeError;

pub const MAX_CHANNEL: u8 = 15;
pub const MAX_DATA: u8 = 127;
pub const MAX_14BIT: u16 = 16383;
pub const MAX_FRAME_TYPE: u8 = 7;
pub const MAX_TIME_CODE_VALUE: u8 = 15;

/// Status bytes (channel messages carry the channel in the low nibble).
pub mod status {
    pub const NOTE_OFF: u8 = 0x80;
    pub const NOTE_ON: u8 = 0x90;
    pub const POLYPHONIC_KEY_PRESSURE: u8 = 0xA0;
    pub const CONTROL_CHANGE: u8 = 0xB0;
    pub const PROGRAM_CHANGE: u8 = 0xC0;
    pub const CHANNEL_PRESSURE: u8 = 0xD0;
    pub const PITCH_BEND_CHANGE: u8 = 0xE0;
    pub const SYSTEM_EXCLUSIVE: u8 = 0xF0;
    pub const MIDI_TIME_CODE: u8 = 0xF1;
    pub const SONG_POSITION_POINTER: u8 = 0xF2;
    pub const SONG_SELECT: u8 = 0xF3;
    pub const TUNE_REQUEST: u8 = 0xF6;
    pub const END_OF_EXCLUSIVE: u8 = 0xF7;
    pub const TIMING_CLOCK: u8 = 0xF8;
    pub const START: u8 = 0xFA;
    pub const CONTINUE: u8 = 0xFB;
    pub const STOP: u8 = 0xFC;
    pub const ACTIVE_SENSING: u8 = 0xFE;
    pub const SYSTEM_RESET: u8 = 0xFF;
}

/// A single MIDI 1.0 message.
///
/// Channel fields are 0-15, data fields 0-127 and 14-bit fields 0-16383.
/// Values outside those ranges are masked to their wire width by
/// [`MidiMessage::encode`]; use [`MidiMessage::validate`] to catch them first.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MidiMessage {
    NoteOff {
        channel: u8,
        note: u8,
        velocity: u8,
    },
    NoteOn {
        channel: u8,
        note: u8,
        velocity: u8,
    },
    PolyphonicKeyPressure {
        channel: u8,
        note: u8,
        pressure: u8,
    },
    ControlChange {
        channel: u8,
        controller: u8,
        value: u8,
    },
    ProgramChange {
        channel: u8,
        program: u8,
    },
    ChannelPressure {
        channel: u8,
        pressure: u8,
    },
    /// `bend` is unsigned, 8192 is center.
    PitchBendChange {
        channel: u8,
        bend: u16,
    },
    /// Payload excludes the 0xF0/0xF7 framing.
    SystemExclusive {
        payload: Vec<u8>,
    },
    MidiTimeCode {
        frame_type: u8,
        values: u8,
    },
    SongPositionPointer {
        beats: u16,
    },
    SongSelect {
        song: u8,
    },
    TuneRequest,
    TimingClock,
    Start,
    Continue,
    Stop,
    ActiveSensing,
    SystemReset,
}

/// Field-less discriminant of [`MidiMessage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MessageKind {
    NoteOff,
    NoteOn,
    PolyphonicKeyPressure,
    ControlChange,
    ProgramChange,
    ChannelPressure,
    PitchBendChange,
    SystemExclusive,
    MidiTimeCode,
    SongPositionPointer,
    SongSelect,
    TuneRequest,
    TimingClock,
    Start,
    Continue,
    Stop,
    ActiveSensing,
    SystemReset,
}

impl MessageKind {
    pub const ALL: [MessageKind; 18] = [
        MessageKind::NoteOff,
        MessageKind::NoteOn,
        MessageKind::PolyphonicKeyPressure,
        MessageKind::ControlChange,
        MessageKind::ProgramChange,
        MessageKind::ChannelPressure,
        MessageKind::PitchBendChange,
        MessageKind::SystemExclusive,
        MessageKind::MidiTimeCode,
        MessageKind::SongPositionPointer,
        MessageKind::SongSelect,
        MessageKind::TuneRequest,
        MessageKind::TimingClock,
        MessageKind::Start,
        MessageKind::Continue,
        MessageKind::Stop,
        MessageKind::ActiveSensing,
        MessageKind::SystemReset,
    ];

    /// Bit position used by subscription filters.
    #[inline]
    pub fn bit(self) -> u32 {
        1 << (self as u32)
    }

    #[inline]
    pub fn is_channel_message(self) -> bool {
        matches!(
            self,
            MessageKind::NoteOff
                | MessageKind::NoteOn
                | MessageKind::PolyphonicKeyPressure
                | MessageKind::ControlChange
                | MessageKind::ProgramChange
                | MessageKind::ChannelPressure
                | MessageKind::PitchBendChange
        )
    }

    #[inline]
    pub fn is_realtime(self) -> bool {
        matches!(
            self,
            MessageKind::TimingClock
                | MessageKind::Start
                | MessageKind::Continue
                | MessageKind::Stop
                | MessageKind::ActiveSensing
                | MessageKind::SystemReset
        )
    }
}

impl MidiMessage {
    #[inline]
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        MidiMessage::NoteOn {
            channel,
            note,
            velocity,
        }
    }

    #[inline]
    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        MidiMessage::NoteOff {
            channel,
            note,
            velocity,
        }
    }

    #[inline]
    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        MidiMessage::ControlChange {
            channel,
            controller,
            value,
        }
    }

    #[inline]
    pub fn program_change(channel: u8, program: u8) -> Self {
        MidiMessage::ProgramChange { channel, program }
    }

    #[inline]
    pub fn pitch_bend(channel: u8, bend: u16) -> Self {
        MidiMessage::PitchBendChange { channel, bend }
    }

    pub fn sysex(payload: impl Into<Vec<u8>>) -> Self {
        MidiMessage::SystemExclusive {
            payload: payload.into(),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            MidiMessage::NoteOff { .. } => MessageKind::NoteOff,
            MidiMessage::NoteOn { .. } => MessageKind::NoteOn,
            MidiMessage::PolyphonicKeyPressure { .. } => MessageKind::PolyphonicKeyPressure,
            MidiMessage::ControlChange { .. } => MessageKind::ControlChange,
            MidiMessage::ProgramChange { .. } => MessageKind::ProgramChange,
            MidiMessage::ChannelPressure { .. } => MessageKind::ChannelPressure,
            MidiMessage::PitchBendChange { .. } => MessageKind::PitchBendChange,
            MidiMessage::SystemExclusive { .. } => MessageKind::SystemExclusive,
            MidiMessage::MidiTimeCode { .. } => MessageKind::MidiTimeCode,
            MidiMessage::SongPositionPointer { .. } => MessageKind::SongPositionPointer,
            MidiMessage::SongSelect { .. } => MessageKind::SongSelect,
            MidiMessage::TuneRequest => MessageKind::TuneRequest,
            MidiMessage::TimingClock => MessageKind::TimingClock,
            MidiMessage::Start => MessageKind::Start,
            MidiMessage::Continue => MessageKind::Continue,
            MidiMessage::Stop => MessageKind::Stop,
            MidiMessage::ActiveSensing => MessageKind::ActiveSensing,
            MidiMessage::SystemReset => MessageKind::SystemReset,
        }
    }

    /// Channel (0-15) for channel voice messages, `None` for system messages.
    #[inline]
    pub fn channel(&self) -> Option<u8> {
        match *self {
            MidiMessage::NoteOff { channel, .. }
            | MidiMessage::NoteOn { channel, .. }
            | MidiMessage::PolyphonicKeyPressure { channel, .. }
            | MidiMessage::ControlChange { channel, .. }
            | MidiMessage::ProgramChange { channel, .. }
            | MidiMessage::ChannelPressure { channel, .. }
            | MidiMessage::PitchBendChange { channel, .. } => Some(channel),
            _ => None,
        }
    }

    /// First byte on the wire, with the channel masked into the low nibble.
    pub fn status(&self) -> u8 {
        let with_channel = |base: u8, channel: u8| base | (channel & 0x0F);
        match *self {
            MidiMessage::NoteOff { channel, .. } => with_channel(status::NOTE_OFF, channel),
            MidiMessage::NoteOn { channel, .. } => with_channel(status::NOTE_ON, channel),
            MidiMessage::PolyphonicKeyPressure { channel, .. } => {
                with_channel(status::POLYPHONIC_KEY_PRESSURE, channel)
            }
            MidiMessage::ControlChange { channel, .. } => {
                with_channel(status::CONTROL_CHANGE, channel)
            }
            MidiMessage::ProgramChange { channel, .. } => {
                with_channel(status::PROGRAM_CHANGE, channel)
            }
            MidiMessage::ChannelPressure { channel, .. } => {
                with_channel(status::CHANNEL_PRESSURE, channel)
            }
            MidiMessage::PitchBendChange { channel, .. } => {
                with_channel(status::PITCH_BEND_CHANGE, channel)
            }
            MidiMessage::SystemExclusive { .. } => status::SYSTEM_EXCLUSIVE,
            MidiMessage::MidiTimeCode { .. } => status::MIDI_TIME_CODE,
            MidiMessage::SongPositionPointer { .. } => status::SONG_POSITION_POINTER,
            MidiMessage::SongSelect { .. } => status::SONG_SELECT,
            MidiMessage::TuneRequest => status::TUNE_REQUEST,
            MidiMessage::TimingClock => status::TIMING_CLOCK,
            MidiMessage::Start => status::START,
            MidiMessage::Continue => status::CONTINUE,
            MidiMessage::Stop => status::STOP,
            MidiMessage::ActiveSensing => status::ACTIVE_SENSING,
            MidiMessage::SystemReset => status::SYSTEM_RESET,
        }
    }

    /// Checks every field against its MIDI 1.0 range.
    ///
    /// Reports the first offending field.
    pub fn validate(&self) -> Result<(), RangeError> {
        match self {
            MidiMessage::NoteOff {
                channel,
                note,
                velocity,
            }
            | MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => {
                check_channel(*channel)?;
                check_u8("note", *note, MAX_DATA)?;
                check_u8("velocity", *velocity, MAX_DATA)
            }
            MidiMessage::PolyphonicKeyPressure {
                channel,
                note,
                pressure,
            } => {
                check_channel(*channel)?;
                check_u8("note", *note, MAX_DATA)?;
                check_u8("pressure", *pressure, MAX_DATA)
            }
            MidiMessage::ControlChange {
                channel,
                controller,
                value,
            } => {
                check_channel(*channel)?;
                check_u8("controller", *controller, MAX_DATA)?;
                check_u8("value", *value, MAX_DATA)
            }
            MidiMessage::ProgramChange { channel, program } => {
                check_channel(*channel)?;
                check_u8("program", *program, MAX_DATA)
            }
            MidiMessage::ChannelPressure { channel, pressure } => {
                check_channel(*channel)?;
                check_u8("pressure", *pressure, MAX_DATA)
            }
            MidiMessage::PitchBendChange { channel, bend } => {
                check_channel(*channel)?;
                check_u16("bend", *bend, MAX_14BIT)
            }
            MidiMessage::SystemExclusive { payload } => {
                match payload.iter().find(|b| **b > MAX_DATA) {
                    Some(b) => Err(RangeError::new("payload", *b as u32, MAX_DATA as u32)),
                    None => Ok(()),
                }
            }
            MidiMessage::MidiTimeCode { frame_type, values } => {
                check_u8("frame_type", *frame_type, MAX_FRAME_TYPE)?;
                check_u8("values", *values, MAX_TIME_CODE_VALUE)
            }
            MidiMessage::SongPositionPointer { beats } => check_u16("beats", *beats, MAX_14BIT),
            MidiMessage::SongSelect { song } => check_u8("song", *song, MAX_DATA),
            MidiMessage::TuneRequest
            | MidiMessage::TimingClock
            | MidiMessage::Start
            | MidiMessage::Continue
            | MidiMessage::Stop
            | MidiMessage::ActiveSensing
            | MidiMessage::SystemReset => Ok(()),
        }
    }
}

#[inline]
fn check_channel(channel: u8) -> Result<(), RangeError> {
    check_u8("channel", channel, MAX_CHANNEL)
}

#[inline]
fn check_u8(field: &'static str, value: u8, max: u8) -> Result<(), RangeError> {
    if value > max {
        Err(RangeError::new(field, value as u32, max as u32))
    } else {
        Ok(())
    }
}

#[inline]
fn check_u16(field: &'static str, value: u16, max: u16) -> Result<(), RangeError> {
    if value > max {
        Err(RangeError::new(field, value as u32, max as u32))
    } else {
        Ok(())
    }
}
