//! Fixed-capacity pool of device buffers
//!
//! Buffers are handed out in allocation order until every one has been used
//! once. After that a buffer only comes back through [`BufferPool::reclaim`],
//! which requires the device to return buffers in the order they were queued.

use std::collections::VecDeque;
use std::fmt;

use crate::device::BufferId;

/// Default number of buffers per stream. Callers write very short chunks, so
/// the pool has to be deep to keep playback smooth.
pub const DEFAULT_CAPACITY: usize = 128;

/// The device handed back a buffer that is not the oldest one in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfOrder {
    pub expected: Option<BufferId>,
    pub returned: BufferId,
}

impl fmt::Display for OutOfOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expected {
            Some(expected) => write!(
                f,
                "device returned buffer {} while buffer {} was oldest in flight",
                self.returned.0, expected.0
            ),
            None => write!(
                f,
                "device returned buffer {} with nothing in flight",
                self.returned.0
            ),
        }
    }
}

/// Buffer handles owned by one stream
#[derive(Debug)]
pub struct BufferPool {
    handles: Vec<BufferId>,
    /// Handles below this index have been used at least once
    fresh: usize,
    /// Queued buffers, oldest first
    in_flight: VecDeque<BufferId>,
}

impl BufferPool {
    pub fn new(handles: Vec<BufferId>) -> Self {
        let capacity = handles.len();
        Self {
            handles,
            fresh: 0,
            in_flight: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.handles.len()
    }

    pub fn handles(&self) -> &[BufferId] {
        &self.handles
    }

    /// Number of buffers queued on the device
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Buffer the device should return next
    pub fn oldest_in_flight(&self) -> Option<BufferId> {
        self.in_flight.front().copied()
    }

    /// Take the next never-used buffer, if any remain
    pub fn claim_fresh(&mut self) -> Option<BufferId> {
        let id = self.handles.get(self.fresh).copied()?;
        self.fresh += 1;
        Some(id)
    }

    /// Take back a buffer the device has finished with
    pub fn reclaim(&mut self, returned: BufferId) -> Result<BufferId, OutOfOrder> {
        let expected = self.oldest_in_flight();
        if expected != Some(returned) {
            return Err(OutOfOrder { expected, returned });
        }
        self.in_flight.pop_front();
        Ok(returned)
    }

    /// Record that a filled buffer is now on the device queue
    pub fn commit(&mut self, id: BufferId) {
        debug_assert!(self.in_flight.len() < self.capacity());
        self.in_flight.push_back(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: u32) -> BufferPool {
        BufferPool::new((1..=n).map(BufferId).collect())
    }

    #[test]
    fn hands_out_fresh_buffers_in_allocation_order() {
        let mut pool = pool(3);
        assert_eq!(pool.claim_fresh(), Some(BufferId(1)));
        assert_eq!(pool.claim_fresh(), Some(BufferId(2)));
        assert_eq!(pool.claim_fresh(), Some(BufferId(3)));
        assert_eq!(pool.claim_fresh(), None);
    }

    #[test]
    fn reclaims_oldest_first() {
        let mut pool = pool(2);
        for _ in 0..2 {
            let id = pool.claim_fresh().unwrap();
            pool.commit(id);
        }
        assert_eq!(pool.in_flight(), 2);

        assert_eq!(
            pool.reclaim(BufferId(2)),
            Err(OutOfOrder {
                expected: Some(BufferId(1)),
                returned: BufferId(2)
            })
        );
        assert_eq!(pool.reclaim(BufferId(1)), Ok(BufferId(1)));
        assert_eq!(pool.oldest_in_flight(), Some(BufferId(2)));
    }

    #[test]
    fn reclaim_with_nothing_in_flight() {
        let mut pool = pool(1);
        let err = pool.reclaim(BufferId(1)).unwrap_err();
        assert_eq!(err.expected, None);
        assert_eq!(
            err.to_string(),
            "device returned buffer 1 with nothing in flight"
        );
    }
}
