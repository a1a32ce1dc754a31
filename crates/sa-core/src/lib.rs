//! Core types shared by the simpleaudio backends
//!
//! Holds stream parameters, the backend error taxonomy, configuration and
//! logging setup. Nothing in here talks to an audio device.

pub mod config;
pub mod error;
pub mod logging;
pub mod stream;

pub use config::Config;
pub use error::{BackendError, Result};
pub use stream::{Direction, SampleFormat, StreamParams};
