//! Stream session lifecycle
//!
//! A session owns one device, its context, one source and a pool of buffers.
//! It is driven by a single thread for its whole life; calling into the same
//! session from several threads is not supported.

use sa_core::{device_debug, BackendError, Direction, Result, StreamParams};

use crate::device::{AlcError, BufferId, ContextId, DeviceId, QueueDriver, SourceId, SourceState};
use crate::format::{buffer_format, BufferFormat};
use crate::pool::{BufferPool, DEFAULT_CAPACITY};
use crate::scheduler::{fault, PollWait, UploadTarget, WriteScheduler};

/// Per-session tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Buffers allocated at open
    pub pool_capacity: usize,
    pub wait: PollWait,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pool_capacity: DEFAULT_CAPACITY,
            wait: PollWait::default(),
        }
    }
}

impl From<&sa_core::config::AudioConfig> for SessionConfig {
    fn from(config: &sa_core::config::AudioConfig) -> Self {
        Self {
            pool_capacity: config.pool_capacity,
            wait: PollWait::new(config.poll_interval()),
        }
    }
}

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    /// A device call failed mid-stream; only close is meaningful
    Faulted,
    /// Close is waiting for queued audio to finish
    Draining,
    Closed,
}

/// Resources acquired so far during open, released in reverse on failure
struct Acquired {
    device: DeviceId,
    context: Option<ContextId>,
    current: bool,
    source: Option<SourceId>,
}

impl Acquired {
    fn release<D: QueueDriver>(&self, driver: &mut D) {
        if let Some(source) = self.source {
            if let Err(err) = driver.delete_source(source) {
                tracing::warn!("Failed to delete source during rollback: {}", err);
            }
        }
        if self.current {
            if let Err(err) = driver.make_context_current(None) {
                tracing::warn!("Failed to release context during rollback: {}", err);
            }
        }
        if let Some(context) = self.context {
            if let Err(err) = driver.destroy_context(context) {
                tracing::warn!("Failed to destroy context during rollback: {}", err);
            }
        }
        if let Err(err) = driver.close_device(self.device) {
            tracing::warn!("Failed to close device during rollback: {}", err);
        }
    }
}

/// One open output stream on a queued-buffer device.
///
/// Dropping a session that is still open closes it, draining first.
pub struct StreamSession<D: QueueDriver> {
    /// Held until [`StreamSession::into_driver`] hands it back
    driver: Option<D>,
    device: DeviceId,
    context: ContextId,
    source: SourceId,
    pool: BufferPool,
    params: StreamParams,
    target: UploadTarget,
    frame_size: usize,
    scheduler: WriteScheduler,
    state: SessionState,
}

impl<D: QueueDriver> StreamSession<D> {
    /// Open a stream: device, context, source, then the buffer pool.
    ///
    /// The format is checked before any device call. If any acquisition
    /// fails everything acquired so far is released and `driver` is handed
    /// back alongside the error.
    pub fn open(
        mut driver: D,
        params: StreamParams,
        config: SessionConfig,
    ) -> std::result::Result<Self, (BackendError, D)> {
        let format = match buffer_format(params.format, params.channels) {
            Ok(format) => format,
            Err(err) => return Err((err, driver)),
        };

        let device = match params.direction {
            Direction::Playback => driver.open_device(params.device.as_deref()),
            Direction::Record => return Err((BackendError::CaptureUnsupported, driver)),
        };
        let device = match device {
            Ok(device) => device,
            Err(err) => {
                let name = params.device.clone().unwrap_or_else(|| "default".into());
                tracing::error!("Cannot open device {}: {}", name, err);
                return Err((
                    BackendError::DeviceOpen {
                        device: name,
                        code: err.as_str(),
                    },
                    driver,
                ));
            }
        };

        let mut acquired = Acquired {
            device,
            context: None,
            current: false,
            source: None,
        };

        let (context, source, buffers) =
            match Self::acquire(&mut driver, &mut acquired, config.pool_capacity.max(1)) {
                Ok(acquisition) => acquisition,
                Err(err) => {
                    acquired.release(&mut driver);
                    return Err((err, driver));
                }
            };

        device_debug!(
            "Opened {} stream '{}' for '{}': {} Hz, {} channel(s), {} buffers",
            params.direction,
            params.stream_name,
            params.app_name,
            params.rate,
            params.channels,
            buffers.len()
        );
        Ok(Self {
            driver: Some(driver),
            device,
            context,
            source,
            pool: BufferPool::new(buffers),
            target: UploadTarget {
                format,
                rate: params.rate,
            },
            frame_size: params.frame_size(),
            params,
            scheduler: WriteScheduler::new(config.wait),
            state: SessionState::Open,
        })
    }

    fn acquire(
        driver: &mut D,
        acquired: &mut Acquired,
        capacity: usize,
    ) -> Result<(ContextId, SourceId, Vec<BufferId>)> {
        let context = driver.create_context(acquired.device).map_err(context_error)?;
        acquired.context = Some(context);

        driver
            .make_context_current(Some(context))
            .map_err(context_error)?;
        acquired.current = true;

        let source = driver.gen_source().map_err(fault("generate source"))?;
        acquired.source = Some(source);

        let buffers = driver
            .gen_buffers(capacity)
            .map_err(fault("generate buffers"))?;
        Ok((context, source, buffers))
    }

    /// Queue `frames` frames of `data`, blocking until the device has room.
    ///
    /// `data` must hold exactly `frames` whole frames. Either every frame is
    /// accepted or an error is returned; a device error faults the session.
    pub fn write(&mut self, data: &[u8], frames: usize) -> Result<usize> {
        match self.state {
            SessionState::Open => {}
            SessionState::Faulted => return Err(BackendError::Faulted),
            SessionState::Draining | SessionState::Closed => return Err(BackendError::NotOpen),
        }
        check_frames(data, frames, self.frame_size)?;
        if frames == 0 {
            return Ok(0);
        }
        let Some(driver) = self.driver.as_mut() else {
            return Err(BackendError::NotOpen);
        };

        match self.scheduler.write(
            driver,
            self.source,
            &mut self.pool,
            self.target,
            data,
        ) {
            Ok(_) => Ok(frames),
            Err(err) => {
                self.state = SessionState::Faulted;
                Err(err)
            }
        }
    }

    /// Capture is not implemented, so there is never anything to read
    pub fn read(&mut self, _data: &mut [u8], _frames: usize) -> Result<usize> {
        Err(BackendError::Unsupported("read"))
    }

    /// Wait for queued audio to finish playing, then release every device
    /// resource. Calling it again is a no-op.
    ///
    /// A faulted session is not drained. Release continues past errors; the
    /// first error is returned.
    pub fn close(&mut self) -> Result<()> {
        let drain = match self.state {
            SessionState::Draining | SessionState::Closed => return Ok(()),
            SessionState::Open => true,
            SessionState::Faulted => false,
        };

        let Some(driver) = self.driver.as_mut() else {
            self.state = SessionState::Closed;
            return Ok(());
        };

        let mut first_error = None;
        if drain {
            self.state = SessionState::Draining;
            device_debug!("Draining {} queued buffers", self.pool.in_flight());
            let source = self.source;
            let drained = self.scheduler.wait().until(|| {
                driver
                    .source_state(source)
                    .map(|state| state != SourceState::Playing)
                    .map_err(fault("query source state"))
            });
            if let Err(err) = drained {
                first_error = Some(err);
            }
        }

        self.state = SessionState::Closed;

        let mut note = |err: BackendError| {
            tracing::warn!("Error while closing stream: {}", err);
            first_error.get_or_insert(err);
        };

        if let Err(err) = driver.delete_source(self.source) {
            note(BackendError::protocol("delete source", err.as_str()));
        }
        if let Err(err) = driver.delete_buffers(self.pool.handles()) {
            note(BackendError::protocol("delete buffers", err.as_str()));
        }
        if let Err(err) = driver.make_context_current(None) {
            note(BackendError::protocol("release context", err.as_str()));
        }
        if let Err(err) = driver.destroy_context(self.context) {
            note(BackendError::protocol("destroy context", err.as_str()));
        }
        if let Err(err) = driver.close_device(self.device) {
            note(BackendError::protocol("close device", err.as_str()));
        }

        device_debug!("Closed stream '{}'", self.params.stream_name);
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn params(&self) -> &StreamParams {
        &self.params
    }

    /// Bytes per frame, fixed at open
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn buffer_format(&self) -> BufferFormat {
        self.target.format
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn driver(&self) -> Option<&D> {
        self.driver.as_ref()
    }

    /// Close the session and give back the driver
    pub fn into_driver(mut self) -> (Result<()>, D) {
        let closed = self.close();
        match self.driver.take() {
            Some(driver) => (closed, driver),
            None => unreachable!("driver is only taken when the session is consumed"),
        }
    }
}

impl<D: QueueDriver> Drop for StreamSession<D> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(
                "Stream '{}' closed with error on drop: {}",
                self.params.stream_name,
                err
            );
        }
    }
}

/// `data` must hold exactly `frames` whole frames
pub(crate) fn check_frames(data: &[u8], frames: usize, frame_size: usize) -> Result<()> {
    match frames.checked_mul(frame_size) {
        Some(expected) if expected == data.len() => Ok(()),
        Some(expected) => Err(BackendError::FrameMismatch {
            expected,
            actual: data.len(),
        }),
        None => Err(BackendError::FrameMismatch {
            expected: usize::MAX,
            actual: data.len(),
        }),
    }
}

fn context_error(err: AlcError) -> BackendError {
    tracing::error!("Cannot create context: {}", err);
    BackendError::ContextCreate(err.as_str())
}
