//! Device identity and the raw device descriptions supplied by the platform.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;

/// Property key carrying the id that groups the functions of one physical device.
pub const CONTAINER_ID_KEY: &str = "System.Devices.ContainerId";

/// Property key carrying the composite `BUS\VID_xxxx&PID_xxxx\serial` instance id.
pub const INSTANCE_ID_KEY: &str = "System.Devices.DeviceInstanceId";

/// Opaque platform identifier of a MIDI port, stable for the life of a connection.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for DeviceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&DeviceId> for DeviceId {
    fn from(id: &DeviceId) -> Self {
        id.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortKind {
    Input,
    Output,
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortKind::Input => f.write_str("input"),
            PortKind::Output => f.write_str("output"),
        }
    }
}

/// A value in a platform device property bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Bytes(Vec<u8>),
}

impl PropertyValue {
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Str(s.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Str(s)
    }
}

/// Device description delivered with platform add/update notifications.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawDeviceInfo {
    pub id: String,
    pub name: String,
    pub properties: HashMap<String, PropertyValue>,
}

impl RawDeviceInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn device_id(&self) -> DeviceId {
        DeviceId::new(self.id.as_str())
    }

    /// String-valued property; non-string values read as absent.
    pub fn string_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(PropertyValue::as_str)
    }

    #[inline]
    pub fn container_id(&self) -> Option<&str> {
        self.string_property(CONTAINER_ID_KEY)
    }

    #[inline]
    pub fn instance_id(&self) -> Option<&str> {
        self.string_property(INSTANCE_ID_KEY)
    }
}
