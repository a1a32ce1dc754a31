//! Simulated queued-buffer device
//!
//! Plays nothing, but keeps the queue/processed bookkeeping of a real device
//! so the scheduler can be driven deterministically. Clones share the same
//! device, which lets a test hold on to one handle while a session owns
//! another, and complete buffers from a second thread while a write blocks.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{
    AlError, AlcError, BufferId, ContextId, DeviceId, QueueDriver, SourceId, SourceState,
};
use crate::format::BufferFormat;

/// Name of the only device the simulator exposes
pub const SIM_DEVICE_NAME: &str = "Simulated Output";

/// One `buffer_data` call as seen by the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub buffer: BufferId,
    pub format: BufferFormat,
    pub rate: u32,
    pub data: Vec<u8>,
}

/// Count of live device objects, for leak checks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimResources {
    pub devices: usize,
    pub contexts: usize,
    pub sources: usize,
    pub buffers: usize,
}

impl SimResources {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug)]
struct SimSource {
    queue: VecDeque<BufferId>,
    processed: usize,
    state: SourceState,
}

impl Default for SimSource {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            processed: 0,
            state: SourceState::Initial,
        }
    }
}

impl SimSource {
    fn pending(&self) -> usize {
        self.queue.len() - self.processed
    }

    /// Finish up to `count` pending buffers, stopping once the queue runs dry
    fn advance(&mut self, count: usize) -> usize {
        if self.state != SourceState::Playing {
            return 0;
        }
        let done = count.min(self.pending());
        self.processed += done;
        if self.pending() == 0 {
            self.state = SourceState::Stopped;
        }
        done
    }
}

#[derive(Debug, Default)]
struct SimBuffer {
    queued_on: Option<SourceId>,
}

#[derive(Debug, Default)]
struct SimState {
    next_id: u32,
    devices: HashMap<DeviceId, String>,
    contexts: HashMap<ContextId, DeviceId>,
    current: Option<ContextId>,
    sources: HashMap<SourceId, SimSource>,
    buffers: HashMap<BufferId, SimBuffer>,
    autoplay: bool,
    fail_open: Option<AlcError>,
    fail_context: Option<AlcError>,
    fail_gen_buffers: Option<AlError>,
    fail_buffer_data: Option<AlError>,
    calls: usize,
    uploads: Vec<Upload>,
    max_queued: usize,
}

impl SimState {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn require_context(&self) -> Result<(), AlError> {
        match self.current {
            Some(_) => Ok(()),
            None => Err(AlError::InvalidOperation),
        }
    }

    fn source(&self, source: SourceId) -> Result<&SimSource, AlError> {
        self.require_context()?;
        self.sources.get(&source).ok_or(AlError::InvalidName)
    }

    fn source_mut(&mut self, source: SourceId) -> Result<&mut SimSource, AlError> {
        self.require_context()?;
        self.sources.get_mut(&source).ok_or(AlError::InvalidName)
    }
}

/// In-process device with FIFO playback
#[derive(Debug, Clone, Default)]
pub struct SimDriver {
    inner: Arc<Mutex<SimState>>,
}

impl SimDriver {
    /// Device whose buffers only finish through [`SimDriver::complete`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Device that finishes one buffer every time a playing source is polled
    pub fn with_autoplay() -> Self {
        let driver = Self::new();
        driver.inner.lock().autoplay = true;
        driver
    }

    /// Mark up to `count` pending buffers processed on every playing source.
    /// Returns how many buffers finished.
    pub fn complete(&self, count: usize) -> usize {
        let mut state = self.inner.lock();
        state
            .sources
            .values_mut()
            .map(|source| source.advance(count))
            .sum()
    }

    /// Fail the next `open_device`
    pub fn fail_open(&self, error: AlcError) {
        self.inner.lock().fail_open = Some(error);
    }

    /// Fail the next `create_context`
    pub fn fail_context(&self, error: AlcError) {
        self.inner.lock().fail_context = Some(error);
    }

    /// Fail the next `gen_buffers`
    pub fn fail_gen_buffers(&self, error: AlError) {
        self.inner.lock().fail_gen_buffers = Some(error);
    }

    /// Fail the next `buffer_data`
    pub fn fail_buffer_data(&self, error: AlError) {
        self.inner.lock().fail_buffer_data = Some(error);
    }

    /// Number of driver calls made so far
    pub fn calls(&self) -> usize {
        self.inner.lock().calls
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.inner.lock().uploads.clone()
    }

    /// Largest queue length any source has reached
    pub fn max_queued(&self) -> usize {
        self.inner.lock().max_queued
    }

    pub fn resources(&self) -> SimResources {
        let state = self.inner.lock();
        SimResources {
            devices: state.devices.len(),
            contexts: state.contexts.len(),
            sources: state.sources.len(),
            buffers: state.buffers.len(),
        }
    }

    pub fn current_context(&self) -> Option<ContextId> {
        self.inner.lock().current
    }

    /// Live sources, oldest first
    pub fn sources(&self) -> Vec<SourceId> {
        let state = self.inner.lock();
        let mut ids: Vec<_> = state.sources.keys().copied().collect();
        ids.sort_by_key(|id| id.0);
        ids
    }

    /// Buffers on a source queue, oldest first
    pub fn queue_of(&self, source: SourceId) -> Vec<BufferId> {
        let state = self.inner.lock();
        state
            .sources
            .get(&source)
            .map(|s| s.queue.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl QueueDriver for SimDriver {
    fn open_device(&mut self, name: Option<&str>) -> Result<DeviceId, AlcError> {
        let mut state = self.inner.lock();
        state.calls += 1;
        if let Some(error) = state.fail_open.take() {
            return Err(error);
        }
        let name = name.unwrap_or(SIM_DEVICE_NAME);
        if name != SIM_DEVICE_NAME {
            return Err(AlcError::InvalidValue);
        }
        let id = DeviceId(state.next_id());
        state.devices.insert(id, name.to_string());
        Ok(id)
    }

    fn close_device(&mut self, device: DeviceId) -> Result<(), AlcError> {
        let mut state = self.inner.lock();
        state.calls += 1;
        if state.contexts.values().any(|d| *d == device) {
            return Err(AlcError::InvalidDevice);
        }
        state
            .devices
            .remove(&device)
            .map(|_| ())
            .ok_or(AlcError::InvalidDevice)
    }

    fn create_context(&mut self, device: DeviceId) -> Result<ContextId, AlcError> {
        let mut state = self.inner.lock();
        state.calls += 1;
        if let Some(error) = state.fail_context.take() {
            return Err(error);
        }
        if !state.devices.contains_key(&device) {
            return Err(AlcError::InvalidDevice);
        }
        let id = ContextId(state.next_id());
        state.contexts.insert(id, device);
        Ok(id)
    }

    fn make_context_current(&mut self, context: Option<ContextId>) -> Result<(), AlcError> {
        let mut state = self.inner.lock();
        state.calls += 1;
        if let Some(id) = context {
            if !state.contexts.contains_key(&id) {
                return Err(AlcError::InvalidContext);
            }
        }
        state.current = context;
        Ok(())
    }

    fn destroy_context(&mut self, context: ContextId) -> Result<(), AlcError> {
        let mut state = self.inner.lock();
        state.calls += 1;
        if state.current == Some(context) {
            return Err(AlcError::InvalidContext);
        }
        state
            .contexts
            .remove(&context)
            .map(|_| ())
            .ok_or(AlcError::InvalidContext)
    }

    fn gen_source(&mut self) -> Result<SourceId, AlError> {
        let mut state = self.inner.lock();
        state.calls += 1;
        state.require_context()?;
        let id = SourceId(state.next_id());
        state.sources.insert(id, SimSource::default());
        Ok(id)
    }

    fn delete_source(&mut self, source: SourceId) -> Result<(), AlError> {
        let mut state = self.inner.lock();
        state.calls += 1;
        state.require_context()?;
        let removed = state.sources.remove(&source).ok_or(AlError::InvalidName)?;
        for id in removed.queue {
            if let Some(buffer) = state.buffers.get_mut(&id) {
                buffer.queued_on = None;
            }
        }
        Ok(())
    }

    fn gen_buffers(&mut self, count: usize) -> Result<Vec<BufferId>, AlError> {
        let mut state = self.inner.lock();
        state.calls += 1;
        state.require_context()?;
        if let Some(error) = state.fail_gen_buffers.take() {
            return Err(error);
        }
        let ids: Vec<_> = (0..count).map(|_| BufferId(state.next_id())).collect();
        for id in &ids {
            state.buffers.insert(*id, SimBuffer::default());
        }
        Ok(ids)
    }

    fn delete_buffers(&mut self, buffers: &[BufferId]) -> Result<(), AlError> {
        let mut state = self.inner.lock();
        state.calls += 1;
        state.require_context()?;
        for id in buffers {
            match state.buffers.get(id) {
                None => return Err(AlError::InvalidName),
                Some(buffer) if buffer.queued_on.is_some() => {
                    return Err(AlError::InvalidOperation)
                }
                Some(_) => {}
            }
        }
        for id in buffers {
            state.buffers.remove(id);
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
        let mut state = self.inner.lock();
        state.calls += 1;
        state.require_context()?;
        if let Some(error) = state.fail_buffer_data.take() {
            return Err(error);
        }
        match state.buffers.get(&buffer) {
            None => return Err(AlError::InvalidName),
            Some(b) if b.queued_on.is_some() => return Err(AlError::InvalidOperation),
            Some(_) => {}
        }
        if rate == 0 || data.len() % format.frame_size() != 0 {
            return Err(AlError::InvalidValue);
        }
        state.uploads.push(Upload {
            buffer,
            format,
            rate,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn queue_buffer(&mut self, source: SourceId, buffer: BufferId) -> Result<(), AlError> {
        let mut state = self.inner.lock();
        state.calls += 1;
        state.source(source)?;
        match state.buffers.get_mut(&buffer) {
            None => return Err(AlError::InvalidName),
            Some(b) if b.queued_on.is_some() => return Err(AlError::InvalidOperation),
            Some(b) => b.queued_on = Some(source),
        }
        let queued = {
            let src = state.source_mut(source)?;
            src.queue.push_back(buffer);
            src.queue.len()
        };
        state.max_queued = state.max_queued.max(queued);
        Ok(())
    }

    fn unqueue_buffer(&mut self, source: SourceId) -> Result<BufferId, AlError> {
        let mut state = self.inner.lock();
        state.calls += 1;
        let src = state.source_mut(source)?;
        if src.processed == 0 {
            return Err(AlError::InvalidValue);
        }
        let id = src.queue.pop_front().ok_or(AlError::InvalidValue)?;
        src.processed -= 1;
        if let Some(buffer) = state.buffers.get_mut(&id) {
            buffer.queued_on = None;
        }
        Ok(id)
    }

    fn buffers_queued(&self, source: SourceId) -> Result<usize, AlError> {
        let mut state = self.inner.lock();
        state.calls += 1;
        Ok(state.source(source)?.queue.len())
    }

    fn buffers_processed(&self, source: SourceId) -> Result<usize, AlError> {
        let mut state = self.inner.lock();
        state.calls += 1;
        let autoplay = state.autoplay;
        let src = state.source_mut(source)?;
        if autoplay {
            src.advance(1);
        }
        Ok(src.processed)
    }

    fn source_state(&self, source: SourceId) -> Result<SourceState, AlError> {
        let mut state = self.inner.lock();
        state.calls += 1;
        let autoplay = state.autoplay;
        let src = state.source_mut(source)?;
        if autoplay {
            src.advance(1);
        }
        Ok(src.state)
    }

    fn play(&mut self, source: SourceId) -> Result<(), AlError> {
        let mut state = self.inner.lock();
        state.calls += 1;
        let src = state.source_mut(source)?;
        src.state = if src.pending() > 0 {
            SourceState::Playing
        } else {
            SourceState::Stopped
        };
        Ok(())
    }
}
