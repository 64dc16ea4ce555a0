//! Error types for MIDI message validation.

use thiserror::Error;

/// A message field outside its MIDI 1.0 range.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{field} value {value} out of range (0-{max})")]
pub struct RangeError {
    pub field: &'static str,
    pub value: u32,
    pub max: u32,
}

impl RangeError {
    pub fn new(field: &'static str, value: u32, max: u32) -> Self {
        Self { field, value, max }
    }
}
