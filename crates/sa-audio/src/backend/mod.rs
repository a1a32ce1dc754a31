//! Audio backends
//!
//! Every backend implements the same blocking open/read/write/close contract.
//! The variant is chosen once from configuration and then used through
//! [`Backend`] without further dispatch decisions.

use sa_core::config::{AudioConfig, BackendKind};
use sa_core::{Result, StreamParams};

use crate::device::{CpalDriver, SimDriver};
use crate::session::SessionConfig;

pub mod null;
pub mod queued;

pub use null::NullAudioBackend;
pub use queued::QueuedBackend;

/// Stream interface shared by all backends
pub trait AudioBackend {
    /// Backend name for diagnostics
    fn name(&self) -> &'static str;

    /// Open a stream; the opened handle is kept for the calls below
    fn open(&mut self, params: &StreamParams) -> Result<()>;

    /// Read captured frames into `data`
    fn read(&mut self, data: &mut [u8], frames: usize) -> Result<usize>;

    /// Write `frames` whole frames from `data`, blocking until all are accepted
    fn write(&mut self, data: &[u8], frames: usize) -> Result<usize>;

    /// Drain and release the stream. A no-op when nothing is open.
    fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;
}

/// Backend selected from configuration
pub enum Backend {
    Queued(QueuedBackend<CpalDriver>),
    Simulated(QueuedBackend<SimDriver>),
    Null(NullAudioBackend),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Queued(_) => BackendKind::Queued,
            Self::Simulated(_) => BackendKind::Simulated,
            Self::Null(_) => BackendKind::Null,
        }
    }

    fn inner(&mut self) -> &mut dyn AudioBackend {
        match self {
            Self::Queued(backend) => backend as &mut dyn AudioBackend,
            Self::Simulated(backend) => backend as &mut dyn AudioBackend,
            Self::Null(backend) => backend as &mut dyn AudioBackend,
        }
    }

    fn inner_ref(&self) -> &dyn AudioBackend {
        match self {
            Self::Queued(backend) => backend as &dyn AudioBackend,
            Self::Simulated(backend) => backend as &dyn AudioBackend,
            Self::Null(backend) => backend as &dyn AudioBackend,
        }
    }
}

impl AudioBackend for Backend {
    fn name(&self) -> &'static str {
        self.inner_ref().name()
    }

    fn open(&mut self, params: &StreamParams) -> Result<()> {
        self.inner().open(params)
    }

    fn read(&mut self, data: &mut [u8], frames: usize) -> Result<usize> {
        self.inner().read(data, frames)
    }

    fn write(&mut self, data: &[u8], frames: usize) -> Result<usize> {
        self.inner().write(data, frames)
    }

    fn close(&mut self) -> Result<()> {
        self.inner().close()
    }

    fn is_open(&self) -> bool {
        self.inner_ref().is_open()
    }
}

/// Build the backend named in the configuration
pub fn create_backend(config: &AudioConfig) -> Backend {
    let session = SessionConfig::from(config);
    let backend = match config.backend {
        BackendKind::Queued => Backend::Queued(QueuedBackend::new(CpalDriver::new(), session)),
        BackendKind::Simulated => {
            Backend::Simulated(QueuedBackend::new(SimDriver::with_autoplay(), session))
        }
        BackendKind::Null => Backend::Null(NullAudioBackend::new()),
    };
    tracing::info!("Using {} audio backend", backend.name());
    backend
}
