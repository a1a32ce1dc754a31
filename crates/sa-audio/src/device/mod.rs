//! Queued-buffer device drivers
//!
//! A driver exposes a device that plays fixed-identity buffers handed to it
//! through a per-source queue and reports completion only through two polled
//! counters: how many buffers are queued and how many of those are processed.
//!
//! Every call returns its status directly. Device-level status codes are the
//! closed [`AlError`] and [`AlcError`] enums, which translate to their
//! canonical names for diagnostics.

use std::fmt;

use crate::format::BufferFormat;

pub mod cpal_driver;
pub mod sim;

pub use cpal_driver::CpalDriver;
pub use sim::SimDriver;

/// Opened hardware device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub u32);

/// Processing context of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub u32);

/// One playback voice on a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub u32);

/// A chunk of device memory holding one audio payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// Playback state of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Initial,
    Playing,
    Paused,
    Stopped,
}

/// Status codes of source and buffer calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlError {
    InvalidName,
    InvalidEnum,
    InvalidValue,
    InvalidOperation,
    OutOfMemory,
}

impl AlError {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidName => "AL_INVALID_NAME",
            Self::InvalidEnum => "AL_INVALID_ENUM",
            Self::InvalidValue => "AL_INVALID_VALUE",
            Self::InvalidOperation => "AL_INVALID_OPERATION",
            Self::OutOfMemory => "AL_OUT_OF_MEMORY",
        }
    }
}

impl fmt::Display for AlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status codes of device and context calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlcError {
    InvalidDevice,
    InvalidContext,
    InvalidEnum,
    InvalidValue,
    OutOfMemory,
}

impl AlcError {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidDevice => "ALC_INVALID_DEVICE",
            Self::InvalidContext => "ALC_INVALID_CONTEXT",
            Self::InvalidEnum => "ALC_INVALID_ENUM",
            Self::InvalidValue => "ALC_INVALID_VALUE",
            Self::OutOfMemory => "ALC_OUT_OF_MEMORY",
        }
    }
}

impl fmt::Display for AlcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A device that plays queued buffers.
///
/// Source and buffer calls apply to the current context and fail with
/// [`AlError::InvalidOperation`] when none is current. Buffers are played in
/// the order they were queued, and only processed buffers can be unqueued,
/// oldest first.
pub trait QueueDriver {
    /// Open a playback device, `None` selects the default device
    fn open_device(&mut self, name: Option<&str>) -> Result<DeviceId, AlcError>;

    fn close_device(&mut self, device: DeviceId) -> Result<(), AlcError>;

    fn create_context(&mut self, device: DeviceId) -> Result<ContextId, AlcError>;

    /// Make `context` current, or clear the current context with `None`
    fn make_context_current(&mut self, context: Option<ContextId>) -> Result<(), AlcError>;

    fn destroy_context(&mut self, context: ContextId) -> Result<(), AlcError>;

    fn gen_source(&mut self) -> Result<SourceId, AlError>;

    fn delete_source(&mut self, source: SourceId) -> Result<(), AlError>;

    /// Allocate `count` distinct buffers
    fn gen_buffers(&mut self, count: usize) -> Result<Vec<BufferId>, AlError>;

    fn delete_buffers(&mut self, buffers: &[BufferId]) -> Result<(), AlError>;

    /// Replace the contents of a buffer that is not currently queued
    fn buffer_data(
        &mut self,
        buffer: BufferId,
        format: BufferFormat,
        data: &[u8],
        rate: u32,
    ) -> Result<(), AlError>;

    /// Append a buffer to the tail of the source queue
    fn queue_buffer(&mut self, source: SourceId, buffer: BufferId) -> Result<(), AlError>;

    /// Remove the oldest processed buffer from the source queue
    fn unqueue_buffer(&mut self, source: SourceId) -> Result<BufferId, AlError>;

    /// Buffers on the source queue, processed or not
    fn buffers_queued(&self, source: SourceId) -> Result<usize, AlError>;

    /// Queued buffers the device has finished playing
    fn buffers_processed(&self, source: SourceId) -> Result<usize, AlError>;

    fn source_state(&self, source: SourceId) -> Result<SourceState, AlError>;

    /// Start or resume playback of the source queue
    fn play(&mut self, source: SourceId) -> Result<(), AlError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_translate() {
        assert_eq!(AlError::InvalidName.to_string(), "AL_INVALID_NAME");
        assert_eq!(AlError::OutOfMemory.as_str(), "AL_OUT_OF_MEMORY");
        assert_eq!(AlcError::InvalidContext.to_string(), "ALC_INVALID_CONTEXT");
        assert_eq!(AlcError::InvalidValue.as_str(), "ALC_INVALID_VALUE");
    }
}
