//! MIDI 1.0 byte-stream codec.
//!
//! `decode` expects one complete message per call; framing and reassembly
//! (running status, split SysEx) are the transport's job.

use smallvec::SmallVec;

use crate::message::{status, MidiMessage, MAX_14BIT};

/// Encoded message bytes. Everything but SysEx fits inline.
pub type MidiBytes = SmallVec<[u8; 3]>;

/// Splits a 14-bit value into `(lsb, msb)` 7-bit data bytes.
#[inline]
pub fn pack_14bit(value: u16) -> (u8, u8) {
    let value = value & MAX_14BIT;
    ((value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8)
}

#[inline]
pub fn unpack_14bit(lsb: u8, msb: u8) -> u16 {
    ((msb as u16 & 0x7F) << 7) | (lsb as u16 & 0x7F)
}

/// Decodes one complete message.
///
/// Returns `None` for anything that should be ignored silently: empty input,
/// a standalone End-of-Exclusive, reserved system statuses (0xF4, 0xF5, 0xF9,
/// 0xFD), a leading data byte, or a message missing its data bytes.
pub fn decode(bytes: &[u8]) -> Option<MidiMessage> {
    let (&first, data) = bytes.split_first()?;
    let channel = first & 0x0F;

    let msg = match first & 0xF0 {
        status::NOTE_OFF => {
            let [note, velocity] = data_bytes::<2>(data)?;
            MidiMessage::NoteOff {
                channel,
                note,
                velocity,
            }
        }
        status::NOTE_ON => {
            let [note, velocity] = data_bytes::<2>(data)?;
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            }
        }
        status::POLYPHONIC_KEY_PRESSURE => {
            let [note, pressure] = data_bytes::<2>(data)?;
            MidiMessage::PolyphonicKeyPressure {
                channel,
                note,
                pressure,
            }
        }
        status::CONTROL_CHANGE => {
            let [controller, value] = data_bytes::<2>(data)?;
            MidiMessage::ControlChange {
                channel,
                controller,
                value,
            }
        }
        status::PROGRAM_CHANGE => {
            let [program] = data_bytes::<1>(data)?;
            MidiMessage::ProgramChange { channel, program }
        }
        status::CHANNEL_PRESSURE => {
            let [pressure] = data_bytes::<1>(data)?;
            MidiMessage::ChannelPressure { channel, pressure }
        }
        status::PITCH_BEND_CHANGE => {
            let [lsb, msb] = data_bytes::<2>(data)?;
            MidiMessage::PitchBendChange {
                channel,
                bend: unpack_14bit(lsb, msb),
            }
        }
        0xF0 => decode_system(first, data)?,
        // Data byte in status position
        _ => return None,
    };

    Some(msg)
}

fn decode_system(status_byte: u8, data: &[u8]) -> Option<MidiMessage> {
    let msg = match status_byte {
        status::SYSTEM_EXCLUSIVE => {
            let payload = match data.split_last() {
                Some((&status::END_OF_EXCLUSIVE, body)) => body,
                _ => data,
            };
            MidiMessage::SystemExclusive {
                payload: payload.to_vec(),
            }
        }
        status::MIDI_TIME_CODE => {
            let [byte] = data_bytes::<1>(data)?;
            MidiMessage::MidiTimeCode {
                frame_type: (byte >> 4) & 0x07,
                values: byte & 0x0F,
            }
        }
        status::SONG_POSITION_POINTER => {
            let [lsb, msb] = data_bytes::<2>(data)?;
            MidiMessage::SongPositionPointer {
                beats: unpack_14bit(lsb, msb),
            }
        }
        status::SONG_SELECT => {
            let [song] = data_bytes::<1>(data)?;
            MidiMessage::SongSelect { song }
        }
        status::TUNE_REQUEST => MidiMessage::TuneRequest,
        status::TIMING_CLOCK => MidiMessage::TimingClock,
        status::START => MidiMessage::Start,
        status::CONTINUE => MidiMessage::Continue,
        status::STOP => MidiMessage::Stop,
        status::ACTIVE_SENSING => MidiMessage::ActiveSensing,
        status::SYSTEM_RESET => MidiMessage::SystemReset,
        // 0xF4, 0xF5, 0xF9, 0xFD are undefined; 0xF7 only terminates SysEx
        _ => return None,
    };
    Some(msg)
}

/// First `N` data bytes, or `None` if the message is truncated.
#[inline]
fn data_bytes<const N: usize>(data: &[u8]) -> Option<[u8; N]> {
    data.get(..N)?.try_into().ok()
}

impl MidiMessage {
    /// Encodes to wire bytes.
    ///
    /// Every field is masked to its wire width, so an out-of-range value
    /// truncates but never corrupts the status byte or SysEx framing.
    pub fn encode(&self) -> MidiBytes {
        let mut out = MidiBytes::new();
        self.write_bytes(|b| out.push(b));
        out
    }

    /// Appends the wire bytes to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.reserve(self.encoded_len());
        self.write_bytes(|b| out.push(b));
    }

    /// Number of bytes [`MidiMessage::encode`] produces.
    pub fn encoded_len(&self) -> usize {
        match self {
            MidiMessage::NoteOff { .. }
            | MidiMessage::NoteOn { .. }
            | MidiMessage::PolyphonicKeyPressure { .. }
            | MidiMessage::ControlChange { .. }
            | MidiMessage::PitchBendChange { .. }
            | MidiMessage::SongPositionPointer { .. } => 3,
            MidiMessage::ProgramChange { .. }
            | MidiMessage::ChannelPressure { .. }
            | MidiMessage::MidiTimeCode { .. }
            | MidiMessage::SongSelect { .. } => 2,
            MidiMessage::SystemExclusive { payload } => payload.len() + 2,
            MidiMessage::TuneRequest
            | MidiMessage::TimingClock
            | MidiMessage::Start
            | MidiMessage::Continue
            | MidiMessage::Stop
            | MidiMessage::ActiveSensing
            | MidiMessage::SystemReset => 1,
        }
    }

    fn write_bytes(&self, mut push: impl FnMut(u8)) {
        push(self.status());
        match *self {
            MidiMessage::NoteOff { note, velocity, .. }
            | MidiMessage::NoteOn { note, velocity, .. } => {
                push(note & 0x7F);
                push(velocity & 0x7F);
            }
            MidiMessage::PolyphonicKeyPressure { note, pressure, .. } => {
                push(note & 0x7F);
                push(pressure & 0x7F);
            }
            MidiMessage::ControlChange {
                controller, value, ..
            } => {
                push(controller & 0x7F);
                push(value & 0x7F);
            }
            MidiMessage::ProgramChange { program, .. } => push(program & 0x7F),
            MidiMessage::ChannelPressure { pressure, .. } => push(pressure & 0x7F),
            MidiMessage::PitchBendChange { bend, .. } => {
                let (lsb, msb) = pack_14bit(bend);
                push(lsb);
                push(msb);
            }
            MidiMessage::SystemExclusive { ref payload } => {
                for b in payload {
                    push(b & 0x7F);
                }
                push(status::END_OF_EXCLUSIVE);
            }
            MidiMessage::MidiTimeCode { frame_type, values } => {
                push(((frame_type & 0x07) << 4) | (values & 0x0F));
            }
            MidiMessage::SongPositionPointer { beats } => {
                let (lsb, msb) = pack_14bit(beats);
                push(lsb);
                push(msb);
            }
            MidiMessage::SongSelect { song } => push(song & 0x7F),
            MidiMessage::TuneRequest
            | MidiMessage::TimingClock
            | MidiMessage::Start
            | MidiMessage::Continue
            | MidiMessage::Stop
            | MidiMessage::ActiveSensing
            | MidiMessage::SystemReset => {}
        }
    }
}
