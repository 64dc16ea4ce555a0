//! Input dispatch: platform device notifications and received bytes in,
//! typed events out.
//!
//! Per (direction, device id) the session moves
//! Unknown -> Attaching -> Attached -> Unknown. The registry is the single
//! source of truth for Attached; the `attaching` set tracks open requests in
//! flight. Callbacks for different devices race freely and carry no ordering
//! promise between them.

use tracing::{debug, trace};

use crate::device::{DeviceId, PortKind, RawDeviceInfo};
use crate::event::BridgeEvent;
use crate::metadata::DeviceMetadata;
use crate::port::Port;
use crate::system::{BridgeInner, DeviceState};
use crate::transport::PortHandle;

impl BridgeInner {
    pub(crate) fn on_device_added(&self, kind: PortKind, raw: RawDeviceInfo) {
        if !self.is_running() {
            return;
        }
        let id = raw.device_id();
        if self.registry.contains(kind, id.as_str()) {
            trace!("MIDI {} {} already attached", kind, id);
            return;
        }
        if !self.attaching.lock().insert((kind, id.clone())) {
            trace!("MIDI {} {} already opening", kind, id);
            return;
        }

        // The transport is queried with no lock held, so a remove or shutdown
        // may land meanwhile. Store under the attaching lock only if the
        // request is still pending; remove and shutdown clear that set first.
        let metadata = self.capture_metadata(&raw);
        {
            let attaching = self.attaching.lock();
            if !self.is_running() || !attaching.contains(&(kind, id.clone())) {
                debug!("MIDI {} {} went away while attaching", kind, id);
                return;
            }
            debug!(
                "Opening MIDI {} {} ({}) vendor={:?} product={:?}",
                kind, id, metadata.name, metadata.vendor_id, metadata.product_id
            );
            self.metadata.put(metadata);
        }

        match kind {
            PortKind::Input => self.transport.open_input(&id),
            PortKind::Output => self.transport.open_output(&id),
        }
    }

    pub(crate) fn on_device_updated(&self, kind: PortKind, raw: RawDeviceInfo) {
        if self.registry.contains(kind, raw.id.as_str()) {
            trace!("Ignoring update for attached MIDI {} {}", kind, raw.id);
            return;
        }
        self.on_device_added(kind, raw);
    }

    pub(crate) fn on_device_removed(&self, kind: PortKind, id: &str) {
        if !self.is_running() {
            return;
        }
        let id = DeviceId::from(id);
        self.attaching.lock().remove(&(kind, id.clone()));
        self.metadata.remove(id.as_str());
        self.registry.detach_with(kind, id.as_str(), |id| {
            self.events.publish(BridgeEvent::Detached {
                kind,
                id: id.clone(),
            });
        });
    }

    pub(crate) fn on_port_opened(&self, kind: PortKind, id: &str, handle: Option<PortHandle>) {
        let id = DeviceId::from(id);
        let was_attaching = self.attaching.lock().remove(&(kind, id.clone()));

        let Some(handle) = handle else {
            if was_attaching {
                debug!("Failed to open MIDI {} {}", kind, id);
            }
            return;
        };

        let port = Port::new(id.clone(), handle, self.transport.clone());
        if !was_attaching || !self.is_running() {
            // Removed or shut down while opening; dropping the port closes it
            debug!("Discarding late MIDI {} port {} ({})", kind, id, handle);
            return;
        }

        let attached = self.registry.attach_with(kind, port, |id| {
            self.events.publish(BridgeEvent::Attached {
                kind,
                id: id.clone(),
            });
        });
        if !attached {
            trace!("MIDI {} {} was already attached", kind, id);
        }

        // Shutdown may have drained the registry between the check and the attach
        if attached && !self.is_running() {
            self.registry.detach(kind, id.as_str());
        }
    }

    pub(crate) fn on_message_received(&self, handle: PortHandle, bytes: &[u8], timestamp: u64) {
        if !self.is_running() {
            return;
        }
        let Some(id) = self.registry.input_for_handle(handle) else {
            trace!("Message on unknown MIDI input {}", handle);
            return;
        };
        let Some(message) = midibridge_msg::decode(bytes) else {
            trace!("Ignoring MIDI bytes {:02X?} from {}", bytes, id);
            return;
        };
        trace!("MIDI in {}: {:?}", id, message);
        self.events.publish(BridgeEvent::Message {
            id,
            message,
            timestamp,
        });
    }

    pub(crate) fn device_state(&self, kind: PortKind, id: &str) -> DeviceState {
        if self.registry.contains(kind, id) {
            DeviceState::Attached
        } else if self.attaching.lock().contains(&(kind, DeviceId::from(id))) {
            DeviceState::Attaching
        } else {
            DeviceState::Unknown
        }
    }

    /// Resolves a container-grouped companion that carries the instance id.
    fn capture_metadata(&self, raw: &RawDeviceInfo) -> DeviceMetadata {
        let companions: Vec<RawDeviceInfo> = match raw.container_id() {
            Some(container_id) => self
                .transport
                .container_devices(container_id)
                .into_iter()
                .filter(|companion| companion.id != raw.id)
                .collect(),
            None => Vec::new(),
        };
        DeviceMetadata::capture(raw, &companions)
    }
}
