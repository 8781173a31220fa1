//! FIFO (First-In-First-Out) replacement policy.

use std::collections::VecDeque;

use crate::buffer::FrameId;

/// Evicts frames in the order their pages were loaded.
///
/// The pool is fixed-size, so per-frame state lives in plain vectors indexed
/// by [`FrameId`]. Re-accessing a frame does not move it in the queue.
pub struct FifoReplacer {
    /// Frames in load order (front = oldest).
    queue: VecDeque<FrameId>,
    queued: Vec<bool>,
    evictable: Vec<bool>,
    evictable_count: usize,
}

impl FifoReplacer {
    pub fn new(pool_size: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(pool_size),
            queued: vec![false; pool_size],
            evictable: vec![false; pool_size],
            evictable_count: 0,
        }
    }

    /// Record that a frame was loaded or touched.
    pub fn record_access(&mut self, frame_id: FrameId) {
        if !self.queued[frame_id.0] {
            self.queued[frame_id.0] = true;
            self.queue.push_back(frame_id);
        }
    }

    /// Flip whether a frame may be chosen as victim (pin count hit zero, or
    /// the frame was pinned again).
    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        let slot = &mut self.evictable[frame_id.0];
        match (*slot, evictable) {
            (false, true) => self.evictable_count += 1,
            (true, false) => self.evictable_count -= 1,
            _ => {}
        }
        *slot = evictable;
    }

    /// Pop the oldest evictable frame, or `None` if every frame is pinned.
    ///
    /// Pinned frames keep their place in the queue.
    pub fn evict(&mut self) -> Option<FrameId> {
        let pos = self
            .queue
            .iter()
            .position(|f| self.evictable[f.0])?;
        let frame_id = self.queue.remove(pos)?;
        self.queued[frame_id.0] = false;
        self.set_evictable(frame_id, false);
        Some(frame_id)
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.evictable_count
    }
}
