//! Stream parameters negotiated at open time

use std::fmt;

use serde::{Deserialize, Serialize};

/// Abstract sample format requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// Signed 16-bit PCM, native endian
    S16,
    /// 32-bit float PCM
    Float,
}

impl SampleFormat {
    /// Size of one sample in bytes
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::S16 => 2,
            Self::Float => 4,
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S16 => write!(f, "s16"),
            Self::Float => write!(f, "float"),
        }
    }
}

/// Stream direction, fixed for the lifetime of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Playback,
    Record,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Playback => write!(f, "playback"),
            Self::Record => write!(f, "record"),
        }
    }
}

/// Everything a backend needs to open a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamParams {
    /// Device name, `None` selects the default device
    pub device: Option<String>,
    pub direction: Direction,
    pub format: SampleFormat,
    /// Sample rate in Hz
    pub rate: u32,
    pub channels: u32,
    pub app_name: String,
    pub stream_name: String,
}

impl StreamParams {
    /// Playback parameters on the default device
    pub fn playback(format: SampleFormat, rate: u32, channels: u32) -> Self {
        Self {
            device: None,
            direction: Direction::Playback,
            format,
            rate,
            channels,
            app_name: String::from("simpleaudio"),
            stream_name: String::from("output"),
        }
    }

    /// Bytes per sample-frame (one sample for every channel)
    pub fn frame_size(&self) -> usize {
        self.channels as usize * self.format.bytes_per_sample()
    }
}
