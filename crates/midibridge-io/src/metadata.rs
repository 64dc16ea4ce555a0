//! Device metadata captured on attach.

use crate::device::{DeviceId, RawDeviceInfo};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Descriptive metadata for a device. Immutable once captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    pub id: DeviceId,
    pub name: String,
    pub vendor_id: String,
    pub product_id: String,
}

impl DeviceMetadata {
    pub fn new(id: impl Into<DeviceId>, name: impl Into<String>, instance_id: Option<&str>) -> Self {
        let (vendor_id, product_id) = instance_id.map(parse_instance_id).unwrap_or_default();
        Self {
            id: id.into(),
            name: name.into(),
            vendor_id,
            product_id,
        }
    }

    /// Builds metadata from a raw device description.
    ///
    /// `companions` are the other devices sharing `raw`'s container id. The
    /// first companion that carries an instance id supplies it; otherwise the
    /// raw device's own instance id is used.
    pub fn capture(raw: &RawDeviceInfo, companions: &[RawDeviceInfo]) -> Self {
        let instance_id = companions
            .iter()
            .find_map(RawDeviceInfo::instance_id)
            .or_else(|| raw.instance_id());
        Self::new(raw.device_id(), raw.name.as_str(), instance_id)
    }
}

/// Splits `BUS\VID_xxxx&PID_xxxx\serial` into `("VID_xxxx", "PID_xxxx")`.
///
/// Missing segments come back as empty strings.
pub fn parse_instance_id(instance_id: &str) -> (String, String) {
    let Some(ids) = instance_id.split('\\').nth(1) else {
        return (String::new(), String::new());
    };
    let mut parts = ids.split('&');
    let vendor = parts.next().unwrap_or_default().to_owned();
    let product = parts.next().unwrap_or_default().to_owned();
    (vendor, product)
}

/// Thread-safe map of device id to metadata.
#[derive(Debug, Default)]
pub struct DeviceMetadataStore {
    entries: RwLock<HashMap<DeviceId, DeviceMetadata>>,
}

impl DeviceMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if metadata for this id was already present.
    pub fn put(&self, metadata: DeviceMetadata) -> bool {
        let mut entries = self.entries.write();
        if entries.contains_key(&metadata.id) {
            return false;
        }
        entries.insert(metadata.id.clone(), metadata);
        true
    }

    pub fn get(&self, id: &str) -> Option<DeviceMetadata> {
        self.entries.read().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<DeviceMetadata> {
        self.entries.write().remove(id)
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn name(&self, id: &str) -> String {
        self.project(id, |m| &m.name)
    }

    pub fn vendor_id(&self, id: &str) -> String {
        self.project(id, |m| &m.vendor_id)
    }

    pub fn product_id(&self, id: &str) -> String {
        self.project(id, |m| &m.product_id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn project(&self, id: &str, field: impl Fn(&DeviceMetadata) -> &String) -> String {
        self.entries
            .read()
            .get(id)
            .map(|m| field(m).clone())
            .unwrap_or_default()
    }
}
