use super::{DEFAULT_STREAM_WEIGHT, MAX_STREAM_WEIGHT, MIN_STREAM_WEIGHT};
use crate::common::error::StreamError;

/// Stream dependency, weight and exclusivity as carried by HEADERS and
/// PRIORITY frames.
///
/// Compared by value: two priorities with the same triple are the same
/// priority and switching between them is not a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamPriority {
    dependency: u32,
    weight: u16,
    exclusive: bool,
}

impl StreamPriority {
    /// `weight` must be within `1..=256`.
    pub fn new(dependency: u32, weight: u16, exclusive: bool) -> Result<Self, StreamError> {
        Ok(Self::default()
            .with_dependency(dependency)
            .with_weight(weight)?
            .with_exclusive(exclusive))
    }

    pub fn dependency(&self) -> u32 {
        self.dependency
    }

    pub fn weight(&self) -> u16 {
        self.weight
    }

    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// Weight as encoded on the wire (weight - 1).
    pub fn wire_weight(&self) -> u8 {
        (self.weight - 1) as u8
    }

    pub fn with_dependency(mut self, dependency: u32) -> Self {
        // The high bit is the exclusive flag on the wire.
        self.dependency = dependency & 0x7fff_ffff;
        self
    }

    pub fn with_weight(mut self, weight: u16) -> Result<Self, StreamError> {
        if !(MIN_STREAM_WEIGHT..=MAX_STREAM_WEIGHT).contains(&weight) {
            return Err(StreamError::InvalidWeight(weight));
        }
        self.weight = weight;
        Ok(self)
    }

    pub fn with_exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }
}

impl Default for StreamPriority {
    fn default() -> Self {
        Self {
            dependency: 0,
            weight: DEFAULT_STREAM_WEIGHT,
            exclusive: false,
        }
    }
}
