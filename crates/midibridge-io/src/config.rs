//! Bridge configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// How outbound messages with out-of-range fields are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangePolicy {
    /// Mask every field to its wire width and send.
    #[default]
    Mask,
    /// Refuse to send and return [`Error::OutOfRange`].
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Queue depth of each event subscription. Events for a full queue are dropped.
    pub event_capacity: usize,
    pub range_policy: RangePolicy,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            event_capacity: 1024,
            range_policy: RangePolicy::Mask,
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            return Err(Error::InvalidConfig(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
