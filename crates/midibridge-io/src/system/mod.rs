//! The MIDI bridge: device sessions, typed events and typed sends.
//!
//! ## Quick Start
//!
//! ```ignore
//! use midibridge_io::{BridgeEvent, MidiBridge};
//!
//! let bridge = MidiBridge::builder().transport(platform).build()?;
//! let events = bridge.subscribe();
//!
//! // The platform layer reports devices and messages:
//! //   bridge.device_added(PortKind::Input, raw_info);
//! //   bridge.port_opened(PortKind::Input, &id, Some(handle));
//! //   bridge.message_received(handle, &bytes, timestamp);
//!
//! while let Some(event) = events.recv() {
//!     if let BridgeEvent::Message { id, message, .. } = event {
//!         println!("{id}: {message:?}");
//!     }
//! }
//!
//! bridge.send_control_change("synth-out", 0, 7, 127)?;
//! bridge.shutdown();
//! ```

mod builder;

pub use builder::MidiBridgeBuilder;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::config::BridgeConfig;
use crate::device::{DeviceId, PortKind, RawDeviceInfo};
use crate::event::{EventBus, EventFilter, EventReceiver};
use crate::metadata::{DeviceMetadata, DeviceMetadataStore};
use crate::port::PortRegistry;
use crate::transport::{MidiTransport, PortHandle};

/// Session state of one port direction of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Never seen, removed, or its open request failed.
    Unknown,
    /// Open requested, waiting for the transport.
    Attaching,
    Attached,
}

/// Bridge between a platform MIDI transport and a host.
///
/// Clone is cheap (Arc internally). Platform callbacks (`device_*`,
/// `port_opened`, `message_received`) may be called from any thread.
#[derive(Clone)]
pub struct MidiBridge {
    pub(crate) inner: Arc<BridgeInner>,
}

/// Non-owning handle, for transports that call back into the bridge.
#[derive(Clone)]
pub struct WeakMidiBridge {
    inner: Weak<BridgeInner>,
}

impl WeakMidiBridge {
    pub fn upgrade(&self) -> Option<MidiBridge> {
        self.inner.upgrade().map(|inner| MidiBridge { inner })
    }
}

pub(crate) struct BridgeInner {
    pub(crate) config: BridgeConfig,
    pub(crate) transport: Arc<dyn MidiTransport>,
    pub(crate) registry: PortRegistry,
    pub(crate) metadata: DeviceMetadataStore,
    /// Devices with an open request in flight.
    pub(crate) attaching: Mutex<HashSet<(PortKind, DeviceId)>>,
    pub(crate) events: EventBus,
    pub(crate) running: AtomicBool,
}

impl BridgeInner {
    #[inline]
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl MidiBridge {
    pub fn builder() -> MidiBridgeBuilder {
        MidiBridgeBuilder::default()
    }

    pub fn downgrade(&self) -> WeakMidiBridge {
        WeakMidiBridge {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    // ==================== Platform Callbacks ====================

    /// Platform watcher reported a new device.
    pub fn device_added(&self, kind: PortKind, raw: RawDeviceInfo) {
        self.inner.on_device_added(kind, raw);
    }

    /// Platform watcher reported a change. Attaches the device if it is not
    /// attached yet (some platforms report an update before the add).
    pub fn device_updated(&self, kind: PortKind, raw: RawDeviceInfo) {
        self.inner.on_device_updated(kind, raw);
    }

    pub fn device_removed(&self, kind: PortKind, id: &str) {
        self.inner.on_device_removed(kind, id);
    }

    /// Completion of an `open_input`/`open_output` request. `None` means the
    /// open failed; the device goes back to unknown without an event.
    pub fn port_opened(&self, kind: PortKind, id: &str, handle: Option<PortHandle>) {
        self.inner.on_port_opened(kind, id, handle);
    }

    /// Raw message bytes from an opened input.
    pub fn message_received(&self, handle: PortHandle, bytes: &[u8], timestamp: u64) {
        self.inner.on_message_received(handle, bytes, timestamp);
    }

    pub fn device_state(&self, kind: PortKind, id: &str) -> DeviceState {
        self.inner.device_state(kind, id)
    }

    // ==================== Events ====================

    /// Subscribe to every event.
    pub fn subscribe(&self) -> EventReceiver {
        self.inner.events.subscribe(EventFilter::all())
    }

    pub fn subscribe_with(&self, filter: EventFilter) -> EventReceiver {
        self.inner.events.subscribe(filter)
    }

    // ==================== Ports ====================

    pub fn input_ports(&self) -> Vec<DeviceId> {
        self.inner.registry.ids(PortKind::Input)
    }

    pub fn output_ports(&self) -> Vec<DeviceId> {
        self.inner.registry.ids(PortKind::Output)
    }

    pub fn is_attached(&self, kind: PortKind, id: &str) -> bool {
        self.inner.registry.contains(kind, id)
    }

    // ==================== Metadata ====================

    /// Empty string if the device is unknown.
    pub fn device_name(&self, id: &str) -> String {
        self.inner.metadata.name(id)
    }

    /// Empty string if the device is unknown or has no vendor id.
    pub fn vendor_id(&self, id: &str) -> String {
        self.inner.metadata.vendor_id(id)
    }

    /// Empty string if the device is unknown or has no product id.
    pub fn product_id(&self, id: &str) -> String {
        self.inner.metadata.product_id(id)
    }

    pub fn device_metadata(&self, id: &str) -> Option<DeviceMetadata> {
        self.inner.metadata.get(id)
    }

    // ==================== Shutdown ====================

    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    /// Stops the bridge: unsubscribes from the platform watcher, releases every
    /// open port, clears all state and ends every event subscription.
    ///
    /// Idempotent. Platform callbacks arriving afterwards are ignored, and
    /// handles reported by late `port_opened` calls are closed immediately.
    pub fn shutdown(&self) {
        let inner = &self.inner;
        if !inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        inner.transport.stop_watching();
        inner.attaching.lock().clear();
        let released = inner.registry.teardown_all();
        inner.metadata.clear();
        inner.events.close();
        tracing::debug!("MIDI bridge shut down, released {} ports", released);
    }
}

impl std::fmt::Debug for MidiBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiBridge")
            .field("running", &self.inner.is_running())
            .field("registry", &self.inner.registry)
            .field("num_devices", &self.inner.metadata.len())
            .field("num_subscribers", &self.inner.events.subscriber_count())
            .finish()
    }
}
