//! Port bookkeeping for attached MIDI devices.

mod registry;

pub use registry::{Port, PortRegistry};
