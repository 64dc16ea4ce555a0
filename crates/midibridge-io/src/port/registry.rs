//! Port Registry
//!
//! Bookkeeping of open input/output ports keyed by device id. A single mutex
//! guards both maps and the handle index; every operation is atomic with
//! respect to the others.

use crate::device::{DeviceId, PortKind};
use crate::transport::{MidiTransport, PortHandle};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// An open platform port. Dropping it releases the handle.
pub struct Port {
    id: DeviceId,
    handle: PortHandle,
    transport: Arc<dyn MidiTransport>,
}

impl Port {
    pub fn new(id: DeviceId, handle: PortHandle, transport: Arc<dyn MidiTransport>) -> Self {
        Self {
            id,
            handle,
            transport,
        }
    }

    #[inline]
    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    #[inline]
    pub fn handle(&self) -> PortHandle {
        self.handle
    }

    #[inline]
    pub fn send(&self, bytes: &[u8]) {
        self.transport.send(self.handle, bytes);
    }
}

impl Drop for Port {
    fn drop(&mut self) {
        tracing::debug!("Closing MIDI port {} ({})", self.id, self.handle);
        self.transport.close(self.handle);
    }
}

impl std::fmt::Debug for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Port")
            .field("id", &self.id)
            .field("handle", &self.handle)
            .finish()
    }
}

#[derive(Default)]
struct Ports {
    inputs: HashMap<DeviceId, Port>,
    outputs: HashMap<DeviceId, Port>,
    /// Reverse index for receive callbacks, which only carry the handle.
    input_handles: HashMap<PortHandle, DeviceId>,
}

impl Ports {
    fn by_kind(&self, kind: PortKind) -> &HashMap<DeviceId, Port> {
        match kind {
            PortKind::Input => &self.inputs,
            PortKind::Output => &self.outputs,
        }
    }
}

#[derive(Default)]
pub struct PortRegistry {
    ports: Mutex<Ports>,
}

impl PortRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` (and releases `port`) if the id is already attached.
    pub fn attach_input(&self, port: Port) -> bool {
        self.attach(PortKind::Input, port)
    }

    pub fn attach_output(&self, port: Port) -> bool {
        self.attach(PortKind::Output, port)
    }

    /// Returns `false` if the id was not attached.
    pub fn detach_input(&self, id: &str) -> bool {
        self.detach(PortKind::Input, id)
    }

    pub fn detach_output(&self, id: &str) -> bool {
        self.detach(PortKind::Output, id)
    }

    pub fn lookup_input(&self, id: &str) -> Option<PortHandle> {
        self.lookup(PortKind::Input, id)
    }

    pub fn lookup_output(&self, id: &str) -> Option<PortHandle> {
        self.lookup(PortKind::Output, id)
    }

    pub fn attach(&self, kind: PortKind, port: Port) -> bool {
        self.attach_with(kind, port, |_| {})
    }

    /// Like [`attach`](Self::attach), running `notify` under the lock on
    /// success so notifications for one id keep registry order.
    pub fn attach_with(&self, kind: PortKind, port: Port, notify: impl FnOnce(&DeviceId)) -> bool {
        let mut ports = self.ports.lock();
        let ports = &mut *ports;
        let map = match kind {
            PortKind::Input => &mut ports.inputs,
            PortKind::Output => &mut ports.outputs,
        };
        if map.contains_key(port.id()) {
            return false;
        }
        if kind == PortKind::Input {
            ports.input_handles.insert(port.handle(), port.id().clone());
        }
        tracing::debug!("Attached MIDI {} {} ({})", kind, port.id(), port.handle());
        notify(port.id());
        map.insert(port.id().clone(), port);
        true
    }

    pub fn detach(&self, kind: PortKind, id: &str) -> bool {
        self.detach_with(kind, id, |_| {})
    }

    /// Like [`detach`](Self::detach), running `notify` under the lock on success.
    pub fn detach_with(&self, kind: PortKind, id: &str, notify: impl FnOnce(&DeviceId)) -> bool {
        let removed = {
            let mut ports = self.ports.lock();
            let port = match kind {
                PortKind::Input => {
                    let port = ports.inputs.remove(id);
                    if let Some(port) = &port {
                        ports.input_handles.remove(&port.handle());
                    }
                    port
                }
                PortKind::Output => ports.outputs.remove(id),
            };
            if let Some(port) = &port {
                tracing::debug!("Detached MIDI {} {}", kind, port.id());
                notify(port.id());
            }
            port
        };
        // Released here, outside the lock
        removed.is_some()
    }

    pub fn lookup(&self, kind: PortKind, id: &str) -> Option<PortHandle> {
        self.ports.lock().by_kind(kind).get(id).map(Port::handle)
    }

    pub fn contains(&self, kind: PortKind, id: &str) -> bool {
        self.ports.lock().by_kind(kind).contains_key(id)
    }

    /// Device id of the input port owning `handle`.
    pub fn input_for_handle(&self, handle: PortHandle) -> Option<DeviceId> {
        self.ports.lock().input_handles.get(&handle).cloned()
    }

    /// Sends on the output attached as `id`, holding the lock across lookup
    /// and send so the port cannot be released in between. Returns `false` if
    /// there is no such output.
    pub fn send_output(&self, id: &str, bytes: &[u8]) -> bool {
        match self.ports.lock().outputs.get(id) {
            Some(port) => {
                port.send(bytes);
                true
            }
            None => false,
        }
    }

    pub fn ids(&self, kind: PortKind) -> Vec<DeviceId> {
        let mut ids: Vec<_> = self.ports.lock().by_kind(kind).keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self, kind: PortKind) -> usize {
        self.ports.lock().by_kind(kind).len()
    }

    pub fn is_empty(&self) -> bool {
        let ports = self.ports.lock();
        ports.inputs.is_empty() && ports.outputs.is_empty()
    }

    /// Releases every port and clears both maps. Returns how many were released.
    ///
    /// The maps are drained in one critical section; the ports close after
    /// the lock is released.
    pub fn teardown_all(&self) -> usize {
        let drained = {
            let mut ports = self.ports.lock();
            ports.input_handles.clear();
            let Ports {
                inputs, outputs, ..
            } = &mut *ports;
            let drained: Vec<Port> = inputs
                .drain()
                .chain(outputs.drain())
                .map(|(_, port)| port)
                .collect();
            drained
        };
        drained.len()
    }
}

impl std::fmt::Debug for PortRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ports = self.ports.lock();
        f.debug_struct("PortRegistry")
            .field("num_input_ports", &ports.inputs.len())
            .field("num_output_ports", &ports.outputs.len())
            .finish()
    }
}
