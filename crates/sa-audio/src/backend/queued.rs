//! Queued-buffer backend

use sa_core::{BackendError, Result, StreamParams};

use super::AudioBackend;
use crate::device::QueueDriver;
use crate::session::{SessionConfig, StreamSession};

/// Backend that plays through a device's buffer queue.
///
/// Holds the driver while no stream is open and hands it to the session
/// while one is.
pub struct QueuedBackend<D: QueueDriver> {
    driver: Option<D>,
    session: Option<StreamSession<D>>,
    config: SessionConfig,
}

impl<D: QueueDriver> QueuedBackend<D> {
    pub fn new(driver: D, config: SessionConfig) -> Self {
        Self {
            driver: Some(driver),
            session: None,
            config,
        }
    }

    /// The open stream, if any
    pub fn session(&self) -> Option<&StreamSession<D>> {
        self.session.as_ref()
    }

    pub fn driver(&self) -> Option<&D> {
        match &self.session {
            Some(session) => session.driver(),
            None => self.driver.as_ref(),
        }
    }
}

impl<D: QueueDriver> AudioBackend for QueuedBackend<D> {
    fn name(&self) -> &'static str {
        "queued"
    }

    fn open(&mut self, params: &StreamParams) -> Result<()> {
        if self.session.is_some() {
            return Err(BackendError::AlreadyOpen);
        }
        let driver = self.driver.take().ok_or(BackendError::AlreadyOpen)?;
        match StreamSession::open(driver, params.clone(), self.config) {
            Ok(session) => {
                self.session = Some(session);
                Ok(())
            }
            Err((err, driver)) => {
                self.driver = Some(driver);
                Err(err)
            }
        }
    }

    fn read(&mut self, data: &mut [u8], frames: usize) -> Result<usize> {
        match self.session.as_mut() {
            Some(session) => session.read(data, frames),
            None => Err(BackendError::Unsupported("read")),
        }
    }

    fn write(&mut self, data: &[u8], frames: usize) -> Result<usize> {
        self.session
            .as_mut()
            .ok_or(BackendError::NotOpen)?
            .write(data, frames)
    }

    fn close(&mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        let (closed, driver) = session.into_driver();
        self.driver = Some(driver);
        closed
    }

    fn is_open(&self) -> bool {
        self.session.is_some()
    }
}

impl<D: QueueDriver> Drop for QueuedBackend<D> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!("Stream closed with error on drop: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SimDriver;
    use crate::scheduler::PollWait;
    use sa_core::SampleFormat;

    fn backend(driver: SimDriver) -> QueuedBackend<SimDriver> {
        QueuedBackend::new(
            driver,
            SessionConfig {
                pool_capacity: 4,
                wait: PollWait::spin(),
            },
        )
    }

    #[test]
    fn open_twice_is_rejected() {
        let mut backend = backend(SimDriver::with_autoplay());
        let params = StreamParams::playback(SampleFormat::S16, 44100, 1);

        backend.open(&params).unwrap();
        assert_eq!(backend.open(&params), Err(BackendError::AlreadyOpen));
        assert!(backend.is_open());
    }

    #[test]
    fn write_before_open_fails() {
        let mut backend = backend(SimDriver::new());
        assert_eq!(backend.write(&[0, 0], 1), Err(BackendError::NotOpen));
    }

    #[test]
    fn reopens_after_close() {
        let driver = SimDriver::with_autoplay();
        let mut backend = backend(driver.clone());
        let params = StreamParams::playback(SampleFormat::S16, 22050, 2);

        for _ in 0..2 {
            backend.open(&params).unwrap();
            assert_eq!(backend.write(&[0; 8], 2).unwrap(), 2);
            backend.close().unwrap();
            assert!(driver.resources().is_empty());
        }
    }

    #[test]
    fn failed_open_keeps_driver() {
        let driver = SimDriver::new();
        let mut backend = backend(driver.clone());
        driver.fail_open(crate::device::AlcError::InvalidDevice);

        let params = StreamParams::playback(SampleFormat::S16, 44100, 1);
        assert!(backend.open(&params).is_err());
        assert!(backend.driver().is_some());
        backend.open(&params).unwrap();
    }

    #[test]
    fn drop_closes_open_stream() {
        let driver = SimDriver::with_autoplay();
        {
            let mut backend = backend(driver.clone());
            backend
                .open(&StreamParams::playback(SampleFormat::S16, 44100, 1))
                .unwrap();
            backend.write(&[1, 0, 2, 0], 2).unwrap();
        }
        assert!(driver.resources().is_empty());
    }
}
