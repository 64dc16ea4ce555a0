//! MidiBridge builder.

use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{BridgeConfig, RangePolicy};
use crate::error::{Error, Result};
use crate::event::EventBus;
use crate::metadata::DeviceMetadataStore;
use crate::port::PortRegistry;
use crate::transport::MidiTransport;

use super::{BridgeInner, MidiBridge};

#[derive(Default)]
pub struct MidiBridgeBuilder {
    config: BridgeConfig,
    transport: Option<Arc<dyn MidiTransport>>,
}

impl MidiBridgeBuilder {
    /// The platform transport. Required.
    pub fn transport(mut self, transport: Arc<dyn MidiTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn range_policy(mut self, policy: RangePolicy) -> Self {
        self.config.range_policy = policy;
        self
    }

    pub fn build(self) -> Result<MidiBridge> {
        self.config.validate()?;
        let transport = self
            .transport
            .ok_or_else(|| Error::InvalidConfig("no MIDI transport configured".to_string()))?;

        let inner = BridgeInner {
            events: EventBus::new(self.config.event_capacity),
            config: self.config,
            transport,
            registry: PortRegistry::new(),
            metadata: DeviceMetadataStore::new(),
            attaching: Mutex::new(HashSet::new()),
            running: AtomicBool::new(true),
        };

        Ok(MidiBridge {
            inner: Arc::new(inner),
        })
    }
}

impl std::fmt::Debug for MidiBridgeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiBridgeBuilder")
            .field("config", &self.config)
            .field("has_transport", &self.transport.is_some())
            .finish()
    }
}
