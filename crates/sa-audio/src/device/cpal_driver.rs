//! cpal-backed queued-buffer device
//!
//! Each source owns a cpal output stream. The stream callback plays the
//! source queue front to back; a buffer moves to the processed list as soon
//! as its last sample has been rendered, and the source stops when the queue
//! runs dry. Buffers are converted to f32 on the way out.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use sa_core::device_debug;

use super::{
    AlError, AlcError, BufferId, ContextId, DeviceId, QueueDriver, SourceId, SourceState,
};
use crate::format::BufferFormat;

/// Uploaded PCM data
#[derive(Debug)]
struct PcmBuffer {
    samples: Vec<i16>,
    channels: u16,
    rate: u32,
}

impl PcmBuffer {
    fn layout(&self) -> StreamLayout {
        StreamLayout {
            channels: self.channels,
            rate: self.rate,
        }
    }
}

/// Channel count and rate a stream was built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StreamLayout {
    channels: u16,
    rate: u32,
}

/// Queue state shared with the stream callback
#[derive(Debug)]
struct Playback {
    pending: VecDeque<(BufferId, Arc<PcmBuffer>)>,
    /// Next sample of the front pending buffer
    cursor: usize,
    processed: VecDeque<BufferId>,
    state: SourceState,
}

impl Default for Playback {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
            cursor: 0,
            processed: VecDeque::new(),
            state: SourceState::Initial,
        }
    }
}

impl Playback {
    fn render(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            *sample = self.next_sample().unwrap_or(0.0);
        }
    }

    fn next_sample(&mut self) -> Option<f32> {
        if self.state != SourceState::Playing {
            return None;
        }
        while let Some((_, buffer)) = self.pending.front() {
            let len = buffer.samples.len();
            match buffer.samples.get(self.cursor).copied() {
                Some(sample) => {
                    self.cursor += 1;
                    if self.cursor >= len {
                        self.finish_front();
                    }
                    return Some(f32::from(sample) / 32768.0);
                }
                None => self.finish_front(),
            }
        }
        self.state = SourceState::Stopped;
        None
    }

    fn finish_front(&mut self) {
        if let Some((id, _)) = self.pending.pop_front() {
            self.processed.push_back(id);
        }
        self.cursor = 0;
    }

    fn queued(&self) -> usize {
        self.pending.len() + self.processed.len()
    }
}

struct CpalSource {
    device: DeviceId,
    playback: Arc<Mutex<Playback>>,
    stream: Option<(StreamLayout, cpal::Stream)>,
}

#[derive(Default)]
struct CpalBuffer {
    data: Option<Arc<PcmBuffer>>,
    queued_on: Option<SourceId>,
}

/// Queued-buffer device on top of the system audio host
pub struct CpalDriver {
    host: cpal::Host,
    next_id: u32,
    devices: HashMap<DeviceId, cpal::Device>,
    contexts: HashMap<ContextId, DeviceId>,
    current: Option<ContextId>,
    sources: HashMap<SourceId, CpalSource>,
    buffers: HashMap<BufferId, CpalBuffer>,
}

impl CpalDriver {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
            next_id: 0,
            devices: HashMap::new(),
            contexts: HashMap::new(),
            current: None,
            sources: HashMap::new(),
            buffers: HashMap::new(),
        }
    }

    /// Names of the output devices the host can see
    pub fn output_device_names(&self) -> Vec<String> {
        match self.host.output_devices() {
            Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
            Err(err) => {
                tracing::warn!("Cannot enumerate output devices: {}", err);
                Vec::new()
            }
        }
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn find_device(&self, name: Option<&str>) -> Option<cpal::Device> {
        match name {
            None => self.host.default_output_device(),
            Some(name) => self
                .host
                .output_devices()
                .ok()?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false)),
        }
    }

    fn require_context(&self) -> Result<(), AlError> {
        match self.current {
            Some(_) => Ok(()),
            None => Err(AlError::InvalidOperation),
        }
    }

    fn source(&self, source: SourceId) -> Result<&CpalSource, AlError> {
        self.require_context()?;
        self.sources.get(&source).ok_or(AlError::InvalidName)
    }
}

impl Default for CpalDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn build_stream(
    device: &cpal::Device,
    layout: StreamLayout,
    playback: Arc<Mutex<Playback>>,
) -> Result<cpal::Stream, AlError> {
    let config = cpal::StreamConfig {
        channels: layout.channels,
        sample_rate: cpal::SampleRate(layout.rate),
        buffer_size: cpal::BufferSize::Default,
    };
    device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| playback.lock().render(data),
            |err| tracing::error!("Output stream error: {}", err),
            None,
        )
        .map_err(|err| {
            tracing::error!(
                "Cannot build output stream ({} Hz, {} channel(s)): {}",
                layout.rate,
                layout.channels,
                err
            );
            AlError::InvalidValue
        })
}

/// Native-endian 16-bit samples from raw bytes, copied out so the input
/// needs no particular alignment
fn pcm_from_bytes(data: &[u8]) -> Vec<i16> {
    bytemuck::pod_collect_to_vec::<u8, i16>(data)
}

impl QueueDriver for CpalDriver {
    fn open_device(&mut self, name: Option<&str>) -> Result<DeviceId, AlcError> {
        let device = self.find_device(name).ok_or(AlcError::InvalidDevice)?;
        let id = DeviceId(self.next_id());
        device_debug!(
            "Opened output device {}",
            device.name().unwrap_or_else(|_| "<unnamed>".into())
        );
        self.devices.insert(id, device);
        Ok(id)
    }

    fn close_device(&mut self, device: DeviceId) -> Result<(), AlcError> {
        if self.contexts.values().any(|d| *d == device) {
            return Err(AlcError::InvalidDevice);
        }
        self.devices
            .remove(&device)
            .map(|_| ())
            .ok_or(AlcError::InvalidDevice)
    }

    fn create_context(&mut self, device: DeviceId) -> Result<ContextId, AlcError> {
        if !self.devices.contains_key(&device) {
            return Err(AlcError::InvalidDevice);
        }
        let id = ContextId(self.next_id());
        self.contexts.insert(id, device);
        Ok(id)
    }

    fn make_context_current(&mut self, context: Option<ContextId>) -> Result<(), AlcError> {
        if let Some(id) = context {
            if !self.contexts.contains_key(&id) {
                return Err(AlcError::InvalidContext);
            }
        }
        self.current = context;
        Ok(())
    }

    fn destroy_context(&mut self, context: ContextId) -> Result<(), AlcError> {
        if self.current == Some(context) {
            return Err(AlcError::InvalidContext);
        }
        self.contexts
            .remove(&context)
            .map(|_| ())
            .ok_or(AlcError::InvalidContext)
    }

    fn gen_source(&mut self) -> Result<SourceId, AlError> {
        let context = self.current.ok_or(AlError::InvalidOperation)?;
        let device = *self
            .contexts
            .get(&context)
            .ok_or(AlError::InvalidOperation)?;
        let id = SourceId(self.next_id());
        self.sources.insert(
            id,
            CpalSource {
                device,
                playback: Arc::new(Mutex::new(Playback::default())),
                stream: None,
            },
        );
        Ok(id)
    }

    fn delete_source(&mut self, source: SourceId) -> Result<(), AlError> {
        self.require_context()?;
        let removed = self.sources.remove(&source).ok_or(AlError::InvalidName)?;
        // Dropping the stream stops the callback
        drop(removed.stream);
        let playback = removed.playback.lock();
        let queued = playback
            .pending
            .iter()
            .map(|(id, _)| *id)
            .chain(playback.processed.iter().copied());
        for id in queued {
            if let Some(buffer) = self.buffers.get_mut(&id) {
                buffer.queued_on = None;
            }
        }
        Ok(())
    }

    fn gen_buffers(&mut self, count: usize) -> Result<Vec<BufferId>, AlError> {
        self.require_context()?;
        let ids: Vec<_> = (0..count).map(|_| BufferId(self.next_id())).collect();
        for id in &ids {
            self.buffers.insert(*id, CpalBuffer::default());
        }
        Ok(ids)
    }

    fn delete_buffers(&mut self, buffers: &[BufferId]) -> Result<(), AlError> {
        self.require_context()?;
        for id in buffers {
            match self.buffers.get(id) {
                None => return Err(AlError::InvalidName),
                Some(buffer) if buffer.queued_on.is_some() => {
                    return Err(AlError::InvalidOperation)
                }
                Some(_) => {}
            }
        }
        for id in buffers {
            self.buffers.remove(id);
        }
        Ok(())
    }

    fn buffer_data(
        &mut self,
        buffer: BufferId,
        format: BufferFormat,
        data: &[u8],
        rate: u32,
    ) -> Result<(), AlError> {
        self.require_context()?;
        let slot = self.buffers.get_mut(&buffer).ok_or(AlError::InvalidName)?;
        if slot.queued_on.is_some() {
            return Err(AlError::InvalidOperation);
        }
        if rate == 0 || data.len() % format.frame_size() != 0 {
            return Err(AlError::InvalidValue);
        }
        slot.data = Some(Arc::new(PcmBuffer {
            samples: pcm_from_bytes(data),
            channels: format.channels(),
            rate,
        }));
        Ok(())
    }

    fn queue_buffer(&mut self, source: SourceId, buffer: BufferId) -> Result<(), AlError> {
        self.require_context()?;
        let src = self.sources.get(&source).ok_or(AlError::InvalidName)?;
        let slot = self.buffers.get_mut(&buffer).ok_or(AlError::InvalidName)?;
        if slot.queued_on.is_some() {
            return Err(AlError::InvalidOperation);
        }
        let data = slot.data.clone().ok_or(AlError::InvalidValue)?;
        slot.queued_on = Some(source);
        src.playback.lock().pending.push_back((buffer, data));
        Ok(())
    }

    fn unqueue_buffer(&mut self, source: SourceId) -> Result<BufferId, AlError> {
        let id = self
            .source(source)?
            .playback
            .lock()
            .processed
            .pop_front()
            .ok_or(AlError::InvalidValue)?;
        if let Some(buffer) = self.buffers.get_mut(&id) {
            buffer.queued_on = None;
        }
        Ok(id)
    }

    fn buffers_queued(&self, source: SourceId) -> Result<usize, AlError> {
        Ok(self.source(source)?.playback.lock().queued())
    }

    fn buffers_processed(&self, source: SourceId) -> Result<usize, AlError> {
        Ok(self.source(source)?.playback.lock().processed.len())
    }

    fn source_state(&self, source: SourceId) -> Result<SourceState, AlError> {
        Ok(self.source(source)?.playback.lock().state)
    }

    fn play(&mut self, source: SourceId) -> Result<(), AlError> {
        self.require_context()?;
        let src = self.sources.get_mut(&source).ok_or(AlError::InvalidName)?;

        let layout = src
            .playback
            .lock()
            .pending
            .front()
            .map(|(_, buffer)| buffer.layout());
        let Some(layout) = layout else {
            src.playback.lock().state = SourceState::Stopped;
            return Ok(());
        };

        if src.stream.as_ref().map(|(built, _)| *built) != Some(layout) {
            let device = self
                .devices
                .get(&src.device)
                .ok_or(AlError::InvalidOperation)?;
            let stream = build_stream(device, layout, Arc::clone(&src.playback))?;
            device_debug!(
                "Built output stream: {} Hz, {} channel(s)",
                layout.rate,
                layout.channels
            );
            src.stream = Some((layout, stream));
        }

        src.playback.lock().state = SourceState::Playing;
        if let Some((_, stream)) = &src.stream {
            stream.play().map_err(|err| {
                tracing::error!("Cannot start output stream: {}", err);
                AlError::InvalidOperation
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(samples: &[i16]) -> Arc<PcmBuffer> {
        Arc::new(PcmBuffer {
            samples: samples.to_vec(),
            channels: 1,
            rate: 8000,
        })
    }

    #[test]
    fn decodes_native_endian_samples() {
        let bytes: Vec<u8> = [1i16, -2, i16::MAX]
            .iter()
            .flat_map(|s| s.to_ne_bytes())
            .collect();
        assert_eq!(pcm_from_bytes(&bytes), vec![1, -2, i16::MAX]);
    }

    #[test]
    fn decodes_unaligned_input() {
        let mut bytes = vec![0u8];
        bytes.extend(7i16.to_ne_bytes());
        bytes.extend((-7i16).to_ne_bytes());
        assert_eq!(pcm_from_bytes(&bytes[1..]), vec![7, -7]);
    }

    #[test]
    fn renders_queue_in_order_and_marks_processed() {
        let mut playback = Playback::default();
        playback.pending.push_back((BufferId(1), buffer(&[16384, 16384])));
        playback.pending.push_back((BufferId(2), buffer(&[-16384])));
        playback.state = SourceState::Playing;

        let mut out = [1.0f32; 2];
        playback.render(&mut out);
        assert_eq!(out, [0.5, 0.5]);
        assert_eq!(playback.processed, VecDeque::from([BufferId(1)]));
        assert_eq!(playback.queued(), 2);

        let mut out = [1.0f32; 3];
        playback.render(&mut out);
        assert_eq!(out, [-0.5, 0.0, 0.0]);
        assert_eq!(playback.processed, VecDeque::from([BufferId(1), BufferId(2)]));
        assert_eq!(playback.state, SourceState::Stopped);
    }

    #[test]
    fn silent_until_played() {
        let mut playback = Playback::default();
        playback.pending.push_back((BufferId(1), buffer(&[1000])));

        let mut out = [1.0f32; 2];
        playback.render(&mut out);
        assert_eq!(out, [0.0, 0.0]);
        assert!(playback.processed.is_empty());
        assert_eq!(playback.state, SourceState::Initial);
    }

    #[test]
    fn skips_empty_buffers() {
        let mut playback = Playback::default();
        playback.pending.push_back((BufferId(1), buffer(&[])));
        playback.pending.push_back((BufferId(2), buffer(&[8192])));
        playback.state = SourceState::Playing;

        let mut out = [0.0f32; 1];
        playback.render(&mut out);
        assert_eq!(out, [0.25]);
        assert_eq!(playback.processed.len(), 2);
    }

    #[test]
    fn source_calls_need_current_context() {
        let mut driver = CpalDriver::new();
        assert_eq!(driver.gen_source(), Err(AlError::InvalidOperation));
        assert_eq!(driver.gen_buffers(1), Err(AlError::InvalidOperation));
        assert_eq!(driver.destroy_context(ContextId(7)), Err(AlcError::InvalidContext));
    }
}
