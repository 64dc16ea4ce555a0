//! Platform transport interface.
//!
//! The transport owns the real MIDI stack. It reports device changes and
//! received bytes by calling back into [`MidiBridge`](crate::MidiBridge):
//!
//! - `device_added` / `device_updated` / `device_removed` from its device watcher
//! - `port_opened` when an `open_input` / `open_output` request completes
//! - `message_received` for every message on an opened input
//!
//! Callbacks may arrive on any thread. The bridge holds none of its locks while
//! calling `open_input`/`open_output`, so a transport may complete an open
//! synchronously from inside that call. `send` runs under the port registry
//! lock and must not call back into the bridge.

use crate::device::{DeviceId, RawDeviceInfo};
use std::fmt;

/// Opaque handle to an open platform port, issued by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortHandle(pub u64);

impl fmt::Display for PortHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub trait MidiTransport: Send + Sync {
    /// Starts opening an input port. Completion is reported via `port_opened`.
    fn open_input(&self, id: &DeviceId);

    /// Starts opening an output port. Completion is reported via `port_opened`.
    fn open_output(&self, id: &DeviceId);

    /// Fire-and-forget. Called under the registry lock.
    fn send(&self, handle: PortHandle, bytes: &[u8]);

    /// Releases a handle. Called exactly once per handle reported as opened.
    fn close(&self, handle: PortHandle);

    /// Other devices sharing a container id (e.g. the USB function of a MIDI port).
    fn container_devices(&self, _container_id: &str) -> Vec<RawDeviceInfo> {
        Vec::new()
    }

    /// Stops device-change notifications. Called once from `MidiBridge::shutdown`.
    fn stop_watching(&self) {}
}
