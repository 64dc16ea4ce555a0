//! MIDI device sessions for midibridge.
//!
//! Sits between a platform MIDI transport and a host: tracks which devices have
//! open ports, captures their vendor/product metadata, decodes incoming bytes
//! into typed [`BridgeEvent`]s and encodes typed sends onto the right output.
//!
//! The platform side is abstracted by [`MidiTransport`]. Feature gate
//! `midi-io` adds [`MidirTransport`], a polling transport over midir.

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub use config::{BridgeConfig, RangePolicy};

pub mod device;
pub use device::{
    DeviceId, PortKind, PropertyValue, RawDeviceInfo, CONTAINER_ID_KEY, INSTANCE_ID_KEY,
};

pub mod metadata;
pub use metadata::{parse_instance_id, DeviceMetadata, DeviceMetadataStore};

pub mod transport;
pub use transport::{MidiTransport, PortHandle};

pub(crate) mod port;
pub use port::{Port, PortRegistry};

pub mod event;
pub use event::{BridgeEvent, EventFilter, EventReceiver};

mod dispatch;

mod system;
pub use system::{DeviceState, MidiBridge, MidiBridgeBuilder, WeakMidiBridge};

pub use midibridge_msg::{decode, MessageKind, MidiBytes, MidiMessage, RangeError};

#[cfg(feature = "midi-io")]
pub(crate) mod io;

#[cfg(feature = "midi-io")]
pub use io::{MidirConfig, MidirTransport};
