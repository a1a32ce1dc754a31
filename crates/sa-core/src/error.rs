//! Error types for simpleaudio

use thiserror::Error;

use crate::stream::SampleFormat;

/// Errors reported by an audio backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Cannot open device {device}: {code}")]
    DeviceOpen { device: String, code: &'static str },

    #[error("Cannot create context: {0}")]
    ContextCreate(&'static str),

    #[error("Unsupported buffer format: {format} with {channels} channel(s)")]
    UnsupportedFormat { format: SampleFormat, channels: u32 },

    #[error("Capture streams are not supported by this backend")]
    CaptureUnsupported,

    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("Device protocol error during {op}: {code}")]
    DeviceProtocol { op: &'static str, code: String },

    #[error("Stream is not open")]
    NotOpen,

    #[error("Stream is already open")]
    AlreadyOpen,

    #[error("Stream faulted on an earlier device error and must be closed")]
    Faulted,

    #[error("Write of {actual} bytes does not match {expected} bytes of whole frames")]
    FrameMismatch { expected: usize, actual: usize },
}

impl BackendError {
    /// Shorthand for a device protocol violation
    pub fn protocol(op: &'static str, code: impl Into<String>) -> Self {
        Self::DeviceProtocol {
            op,
            code: code.into(),
        }
    }

    /// Whether the error leaves the stream untrustworthy.
    ///
    /// Fatal errors are contract or protocol violations; the caller should log
    /// them and abandon the stream rather than retry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat { .. } | Self::DeviceProtocol { .. } | Self::Faulted
        )
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("No configuration directory on this platform")]
    NoConfigDir,
}

pub type Result<T> = std::result::Result<T, BackendError>;
