//! Mapping of stream formats onto device buffer formats

use sa_core::{BackendError, Result, SampleFormat};

/// Buffer layout understood by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferFormat {
    Mono16,
    Stereo16,
}

impl BufferFormat {
    pub const fn channels(self) -> u16 {
        match self {
            Self::Mono16 => 1,
            Self::Stereo16 => 2,
        }
    }

    /// Bytes per frame
    pub const fn frame_size(self) -> usize {
        self.channels() as usize * 2
    }
}

/// Translate a sample format and channel count into a device buffer format.
///
/// Only 16-bit signed PCM in mono or stereo is representable. Anything else
/// is a caller contract violation and yields a fatal
/// [`BackendError::UnsupportedFormat`].
pub fn buffer_format(format: SampleFormat, channels: u32) -> Result<BufferFormat> {
    match (format, channels) {
        (SampleFormat::S16, 1) => Ok(BufferFormat::Mono16),
        (SampleFormat::S16, 2) => Ok(BufferFormat::Stereo16),
        (SampleFormat::S16, _) | (SampleFormat::Float, _) => {
            Err(BackendError::UnsupportedFormat { format, channels })
        }
    }
}
