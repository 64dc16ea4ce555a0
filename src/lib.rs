//! # midibridge
//!
//! Bridges platform MIDI devices and a host application: typed MIDI 1.0
//! messages in both directions, device attach/detach tracking and USB
//! vendor/product metadata.
//!
//! ## Quick Start
//!
//! ```ignore
//! use midibridge::prelude::*;
//!
//! let bridge = MidiBridge::builder().transport(transport).build()?;
//! let events = bridge.subscribe();
//!
//! while let Some(event) = events.recv() {
//!     match event {
//!         BridgeEvent::Attached { kind, id } => println!("+ {kind} {id}"),
//!         BridgeEvent::Message { id, message, .. } => println!("{id}: {message:?}"),
//!         BridgeEvent::Detached { kind, id } => println!("- {kind} {id}"),
//!     }
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `midi-io` - Hardware MIDI transport via midir

/// Re-export of midibridge-msg: message types and the wire codec
pub use midibridge_msg as msg;

/// Re-export of midibridge-io: device sessions, events and sends
pub use midibridge_io as io;

pub use midibridge_io::{
    BridgeConfig, BridgeEvent, DeviceId, DeviceMetadata, DeviceState, Error, EventFilter,
    EventReceiver, MidiBridge, MidiBridgeBuilder, MidiTransport, PortHandle, PortKind,
    RangePolicy, RawDeviceInfo, Result, WeakMidiBridge,
};
pub use midibridge_msg::{decode, MessageKind, MidiMessage};

#[cfg(feature = "midi-io")]
pub use midibridge_io::{MidirConfig, MidirTransport};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{MidiBridge, MidiBridgeBuilder, WeakMidiBridge};

    pub use crate::{BridgeEvent, EventFilter, EventReceiver};

    pub use crate::{DeviceId, MidiTransport, PortHandle, PortKind, RawDeviceInfo};

    pub use crate::{MessageKind, MidiMessage};

    #[cfg(feature = "midi-io")]
    pub use crate::{MidirConfig, MidirTransport};
}
