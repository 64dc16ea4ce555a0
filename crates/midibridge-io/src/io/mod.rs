//! Hardware MIDI transport via midir.
//!
//! Requires the `midi-io` feature.

mod midir_transport;

pub use midir_transport::{MidirConfig, MidirTransport};
