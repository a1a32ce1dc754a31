//! Null audio backend

use sa_core::{BackendError, Direction, Result, StreamParams};

use super::AudioBackend;
use crate::session::check_frames;

/// Null audio backend (no sound output)
#[derive(Debug, Default)]
pub struct NullAudioBackend {
    params: Option<StreamParams>,
    frames_written: u64,
    last_write: Option<Vec<u8>>,
}

impl NullAudioBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total frames accepted since the stream was opened
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Returns the last chunk that was written (useful for tests)
    pub fn last_write(&self) -> Option<&[u8]> {
        self.last_write.as_deref()
    }
}

impl AudioBackend for NullAudioBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    fn open(&mut self, params: &StreamParams) -> Result<()> {
        if self.params.is_some() {
            return Err(BackendError::AlreadyOpen);
        }
        if params.direction == Direction::Record {
            return Err(BackendError::CaptureUnsupported);
        }
        self.params = Some(params.clone());
        self.frames_written = 0;
        Ok(())
    }

    fn read(&mut self, _data: &mut [u8], _frames: usize) -> Result<usize> {
        Err(BackendError::Unsupported("read"))
    }

    fn write(&mut self, data: &[u8], frames: usize) -> Result<usize> {
        let params = self.params.as_ref().ok_or(BackendError::NotOpen)?;
        check_frames(data, frames, params.frame_size())?;
        self.frames_written += frames as u64;
        self.last_write = Some(data.to_vec());
        Ok(frames)
    }

    fn close(&mut self) -> Result<()> {
        self.params = None;
        self.last_write = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.params.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_core::SampleFormat;

    #[test]
    fn test_null_backend() {
        let mut backend = NullAudioBackend::new();
        let params = StreamParams::playback(SampleFormat::S16, 44100, 2);
        backend.open(&params).unwrap();

        assert_eq!(backend.write(&[0; 16], 4).unwrap(), 4);
        assert_eq!(backend.write(&[1; 8], 2).unwrap(), 2);
        assert_eq!(backend.frames_written(), 6);
        assert_eq!(backend.last_write(), Some(&[1u8; 8][..]));

        backend.close().unwrap();
        backend.close().unwrap();
        assert!(backend.last_write().is_none());
    }

    #[test]
    fn rejects_partial_frames() {
        let mut backend = NullAudioBackend::new();
        backend
            .open(&StreamParams::playback(SampleFormat::S16, 44100, 2))
            .unwrap();
        assert_eq!(
            backend.write(&[0; 6], 2),
            Err(BackendError::FrameMismatch {
                expected: 8,
                actual: 6
            })
        );
    }

    #[test]
    fn oversized_frame_count_is_rejected() {
        let mut backend = NullAudioBackend::new();
        backend
            .open(&StreamParams::playback(SampleFormat::S16, 44100, 1))
            .unwrap();

        let err = backend.write(&[], usize::MAX / 2 + 1).unwrap_err();
        assert!(matches!(err, BackendError::FrameMismatch { actual: 0, .. }));
        assert_eq!(backend.frames_written(), 0);
    }

    #[test]
    fn capture_is_unsupported() {
        let mut backend = NullAudioBackend::new();
        let mut params = StreamParams::playback(SampleFormat::S16, 44100, 1);
        params.direction = Direction::Record;
        assert_eq!(backend.open(&params), Err(BackendError::CaptureUnsupported));
    }
}
