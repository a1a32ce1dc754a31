//! Write scheduler
//!
//! Turns each caller chunk into one device buffer:
//!
//! 1. check the device queue length against the buffers the pool has in flight
//! 2. take a never-used buffer if one is left, otherwise wait until the device
//!    has processed at least one queued buffer and unqueue it
//! 3. upload the chunk, append the buffer to the source queue
//! 4. start the source if it is not playing
//!
//! There is no prebuffering threshold: a single queued buffer is enough to
//! (re)start playback.

use std::thread;
use std::time::Duration;

use sa_core::{sched_debug, sched_trace, BackendError, Result};

use crate::device::{AlError, BufferId, QueueDriver, SourceId, SourceState};
use crate::format::BufferFormat;
use crate::pool::BufferPool;

/// Map a device status onto a protocol fault for `op`
pub(crate) fn fault(op: &'static str) -> impl Fn(AlError) -> BackendError {
    move |err| {
        tracing::error!("Device error during {}: {}", op, err);
        BackendError::protocol(op, err.as_str())
    }
}

/// Blocking wait on a polled device condition.
///
/// Waits have no timeout. A zero interval spins; otherwise the thread sleeps
/// for the interval between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollWait {
    interval: Duration,
}

impl PollWait {
    pub const fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub const fn spin() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll `ready` until it reports true. Returns the number of polls that
    /// came back false.
    pub fn until<F>(&self, mut ready: F) -> Result<u64>
    where
        F: FnMut() -> Result<bool>,
    {
        let mut misses = 0u64;
        while !ready()? {
            misses += 1;
            if self.interval.is_zero() {
                std::hint::spin_loop();
            } else {
                thread::sleep(self.interval);
            }
        }
        Ok(misses)
    }
}

impl Default for PollWait {
    fn default() -> Self {
        Self::new(Duration::from_millis(1))
    }
}

/// Format and rate every buffer of a stream is uploaded with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadTarget {
    pub format: BufferFormat,
    pub rate: u32,
}

/// Picks, fills and queues one buffer per write
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteScheduler {
    wait: PollWait,
}

impl WriteScheduler {
    pub fn new(wait: PollWait) -> Self {
        Self { wait }
    }

    pub fn wait(&self) -> PollWait {
        self.wait
    }

    /// Queue `data` on `source`, blocking until a buffer is free.
    ///
    /// Any device error is returned as [`BackendError::DeviceProtocol`]; the
    /// pool is not guaranteed to match the device afterwards.
    pub fn write<D>(
        &self,
        driver: &mut D,
        source: SourceId,
        pool: &mut BufferPool,
        target: UploadTarget,
        data: &[u8],
    ) -> Result<BufferId>
    where
        D: QueueDriver + ?Sized,
    {
        let queued = driver
            .buffers_queued(source)
            .map_err(fault("query queued buffers"))?;
        if queued != pool.in_flight() {
            tracing::error!(
                "Device reports {} queued buffers, {} in flight",
                queued,
                pool.in_flight()
            );
            return Err(BackendError::protocol(
                "query queued buffers",
                format!("{} queued but {} in flight", queued, pool.in_flight()),
            ));
        }

        let buffer = match pool.claim_fresh() {
            Some(id) => id,
            None => self.reclaim(driver, source, pool)?,
        };

        driver
            .buffer_data(buffer, target.format, data, target.rate)
            .map_err(fault("upload buffer"))?;
        driver
            .queue_buffer(source, buffer)
            .map_err(fault("queue buffer"))?;
        pool.commit(buffer);

        let state = driver
            .source_state(source)
            .map_err(fault("query source state"))?;
        if state != SourceState::Playing {
            sched_debug!("Source {:?} is {:?}, starting playback", source, state);
            driver.play(source).map_err(fault("start playback"))?;
        }

        Ok(buffer)
    }

    /// Wait for the oldest queued buffer to finish and take it back
    fn reclaim<D>(&self, driver: &mut D, source: SourceId, pool: &mut BufferPool) -> Result<BufferId>
    where
        D: QueueDriver + ?Sized,
    {
        let misses = self.wait.until(|| {
            driver
                .buffers_processed(source)
                .map(|processed| processed > 0)
                .map_err(fault("query processed buffers"))
        })?;
        if misses > 0 {
            sched_trace!("Pool exhausted, waited {} polls for a processed buffer", misses);
        }

        let returned = driver
            .unqueue_buffer(source)
            .map_err(fault("unqueue buffer"))?;
        pool.reclaim(returned).map_err(|err| {
            tracing::error!("{}", err);
            BackendError::protocol("unqueue buffer", err.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{SimDriver, SourceState};

    struct Rig {
        driver: SimDriver,
        source: SourceId,
        pool: BufferPool,
        scheduler: WriteScheduler,
    }

    const TARGET: UploadTarget = UploadTarget {
        format: BufferFormat::Mono16,
        rate: 44100,
    };

    fn rig(driver: SimDriver, capacity: usize) -> Rig {
        let mut driver = driver;
        let device = driver.open_device(None).unwrap();
        let context = driver.create_context(device).unwrap();
        driver.make_context_current(Some(context)).unwrap();
        let source = driver.gen_source().unwrap();
        let pool = BufferPool::new(driver.gen_buffers(capacity).unwrap());
        Rig {
            driver,
            source,
            pool,
            scheduler: WriteScheduler::new(PollWait::spin()),
        }
    }

    impl Rig {
        fn write(&mut self, data: &[u8]) -> Result<BufferId> {
            self.scheduler
                .write(&mut self.driver, self.source, &mut self.pool, TARGET, data)
        }
    }

    #[test]
    fn first_write_starts_playback() {
        let mut rig = rig(SimDriver::new(), 4);
        assert_eq!(
            rig.driver.source_state(rig.source).unwrap(),
            SourceState::Initial
        );

        rig.write(&[1, 0]).unwrap();
        assert_eq!(
            rig.driver.source_state(rig.source).unwrap(),
            SourceState::Playing
        );
    }

    #[test]
    fn restarts_after_underrun() {
        let mut rig = rig(SimDriver::new(), 4);
        rig.write(&[1, 0]).unwrap();
        rig.driver.complete(1);
        assert_eq!(
            rig.driver.source_state(rig.source).unwrap(),
            SourceState::Stopped
        );

        rig.write(&[2, 0]).unwrap();
        assert_eq!(
            rig.driver.source_state(rig.source).unwrap(),
            SourceState::Playing
        );
    }

    #[test]
    fn reuses_processed_buffer_once_pool_is_used_up() {
        let mut rig = rig(SimDriver::with_autoplay(), 2);
        let a = rig.write(&[1, 0]).unwrap();
        let b = rig.write(&[2, 0]).unwrap();
        assert_ne!(a, b);

        let c = rig.write(&[3, 0]).unwrap();
        assert_eq!(c, a);
        assert!(rig.driver.max_queued() <= 2);
    }

    #[test]
    fn detects_queue_count_drift() {
        let mut rig = rig(SimDriver::new(), 4);
        rig.write(&[1, 0]).unwrap();

        // A buffer queued behind the scheduler's back
        let stray = rig.driver.gen_buffers(1).unwrap()[0];
        rig.driver.queue_buffer(rig.source, stray).unwrap();

        let err = rig.write(&[2, 0]).unwrap_err();
        assert!(matches!(
            err,
            BackendError::DeviceProtocol {
                op: "query queued buffers",
                ..
            }
        ));
    }

    #[test]
    fn rejects_buffer_returned_out_of_order() {
        let mut rig = rig(SimDriver::new(), 2);
        let first = rig.write(&[1, 0]).unwrap();
        rig.write(&[2, 0]).unwrap();
        rig.driver.complete(2);

        let moved = rig.driver.unqueue_buffer(rig.source).unwrap();
        assert_eq!(moved, first);
        rig.driver.queue_buffer(rig.source, moved).unwrap();

        let err = rig.write(&[3, 0]).unwrap_err();
        assert!(matches!(
            err,
            BackendError::DeviceProtocol {
                op: "unqueue buffer",
                ..
            }
        ));
        assert_eq!(rig.pool.oldest_in_flight(), Some(first));
    }

    #[test]
    fn upload_failure_is_a_protocol_error() {
        let mut rig = rig(SimDriver::new(), 4);
        rig.driver.fail_buffer_data(AlError::OutOfMemory);

        let err = rig.write(&[1, 0]).unwrap_err();
        assert_eq!(
            err,
            BackendError::protocol("upload buffer", "AL_OUT_OF_MEMORY")
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn poll_wait_counts_misses() {
        let mut remaining = 3;
        let misses = PollWait::spin()
            .until(|| {
                remaining -= 1;
                Ok(remaining == 0)
            })
            .unwrap();
        assert_eq!(misses, 2);
    }

    #[test]
    fn poll_wait_propagates_errors() {
        let err = PollWait::new(Duration::from_micros(10))
            .until(|| Err(BackendError::NotOpen))
            .unwrap_err();
        assert_eq!(err, BackendError::NotOpen);
    }
}
