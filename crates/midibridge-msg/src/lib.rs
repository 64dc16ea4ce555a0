//! MIDI 1.0 message types and byte-stream codec for midibridge.
//!
//! Pure data, no I/O: [`decode`] maps one complete wire message to a
//! [`MidiMessage`] and [`MidiMessage::encode`] maps it back, bit-exact with the
//! MIDI 1.0 byte stream (status nibble layout, 7+7 bit packing for 14-bit
//! values, SysEx framed by 0xF0/0xF7).
//!
//! ```
//! use midibridge_msg::{decode, MidiMessage};
//!
//! let msg = decode(&[0x91, 0x3C, 0x64]).unwrap();
//! assert_eq!(msg, MidiMessage::note_on(1, 60, 100));
//! assert_eq!(msg.encode().as_slice(), &[0x91, 0x3C, 0x64]);
//! ```

pub mod error;
pub use error::RangeError;

mod codec;
pub use codec::{decode, pack_14bit, unpack_14bit, MidiBytes};

mod message;
pub use message::{
    status, MessageKind, MidiMessage, MAX_14BIT, MAX_CHANNEL, MAX_DATA, MAX_FRAME_TYPE,
    MAX_TIME_CODE_VALUE,
};
