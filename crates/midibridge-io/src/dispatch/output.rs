//! Output dispatch: typed sends in, wire bytes out to the addressed port.
//!
//! Fire-and-forget. A send to a device without an attached output is dropped
//! and reported as `Ok(false)`; nothing is queued or retried.

use midibridge_msg::MidiMessage;
use tracing::{trace, warn};

use crate::config::RangePolicy;
use crate::error::Result;
use crate::system::{BridgeInner, MidiBridge};

impl BridgeInner {
    pub(crate) fn send_message(&self, id: &str, message: &MidiMessage) -> Result<bool> {
        if self.config.range_policy == RangePolicy::Reject {
            if let Err(e) = message.validate() {
                warn!("Rejected MIDI send to {}: {}", id, e);
                return Err(e.into());
            }
        }
        if !self.is_running() {
            return Ok(false);
        }

        let bytes = message.encode();
        let sent = self.registry.send_output(id, &bytes);

        if sent {
            trace!("MIDI out {}: {:02X?}", id, bytes.as_slice());
        } else {
            trace!("No MIDI output {}, dropping {:?}", id, message.kind());
        }
        Ok(sent)
    }
}

/// Typed sends. Each returns `Ok(true)` if the bytes went to an attached
/// output, `Ok(false)` if no output with that id is attached. Errors only under
/// [`RangePolicy::Reject`].
impl MidiBridge {
    pub fn send(&self, id: &str, message: &MidiMessage) -> Result<bool> {
        self.inner.send_message(id, message)
    }

    pub fn send_note_off(&self, id: &str, channel: u8, note: u8, velocity: u8) -> Result<bool> {
        self.send(id, &MidiMessage::note_off(channel, note, velocity))
    }

    pub fn send_note_on(&self, id: &str, channel: u8, note: u8, velocity: u8) -> Result<bool> {
        self.send(id, &MidiMessage::note_on(channel, note, velocity))
    }

    pub fn send_polyphonic_key_pressure(
        &self,
        id: &str,
        channel: u8,
        note: u8,
        pressure: u8,
    ) -> Result<bool> {
        self.send(
            id,
            &MidiMessage::PolyphonicKeyPressure {
                channel,
                note,
                pressure,
            },
        )
    }

    pub fn send_control_change(
        &self,
        id: &str,
        channel: u8,
        controller: u8,
        value: u8,
    ) -> Result<bool> {
        self.send(id, &MidiMessage::control_change(channel, controller, value))
    }

    pub fn send_program_change(&self, id: &str, channel: u8, program: u8) -> Result<bool> {
        self.send(id, &MidiMessage::program_change(channel, program))
    }

    pub fn send_channel_pressure(&self, id: &str, channel: u8, pressure: u8) -> Result<bool> {
        self.send(id, &MidiMessage::ChannelPressure { channel, pressure })
    }

    /// `bend`: 0-16383, 8192 is center.
    pub fn send_pitch_bend_change(&self, id: &str, channel: u8, bend: u16) -> Result<bool> {
        self.send(id, &MidiMessage::pitch_bend(channel, bend))
    }

    /// `payload` excludes the 0xF0/0xF7 framing, which is added here.
    pub fn send_system_exclusive(&self, id: &str, payload: &[u8]) -> Result<bool> {
        self.send(id, &MidiMessage::sysex(payload))
    }

    pub fn send_midi_time_code(&self, id: &str, frame_type: u8, values: u8) -> Result<bool> {
        self.send(id, &MidiMessage::MidiTimeCode { frame_type, values })
    }

    pub fn send_song_position_pointer(&self, id: &str, beats: u16) -> Result<bool> {
        self.send(id, &MidiMessage::SongPositionPointer { beats })
    }

    pub fn send_song_select(&self, id: &str, song: u8) -> Result<bool> {
        self.send(id, &MidiMessage::SongSelect { song })
    }

    pub fn send_tune_request(&self, id: &str) -> Result<bool> {
        self.send(id, &MidiMessage::TuneRequest)
    }

    pub fn send_timing_clock(&self, id: &str) -> Result<bool> {
        self.send(id, &MidiMessage::TimingClock)
    }

    pub fn send_start(&self, id: &str) -> Result<bool> {
        self.send(id, &MidiMessage::Start)
    }

    pub fn send_continue(&self, id: &str) -> Result<bool> {
        self.send(id, &MidiMessage::Continue)
    }

    pub fn send_stop(&self, id: &str) -> Result<bool> {
        self.send(id, &MidiMessage::Stop)
    }

    pub fn send_active_sensing(&self, id: &str) -> Result<bool> {
        self.send(id, &MidiMessage::ActiveSensing)
    }

    pub fn send_system_reset(&self, id: &str) -> Result<bool> {
        self.send(id, &MidiMessage::SystemReset)
    }
}
