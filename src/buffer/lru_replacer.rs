use linked_hash_map::LinkedHashMap;
use parking_lot::Mutex;

use crate::common::FrameId;

/// Replacement policy for buffer frames.
///
/// A frame is tracked by the replacer only while it is evictable, i.e. while
/// its pin count is zero. The buffer pool calls `pin` whenever a frame gains
/// its first pin and `unpin` whenever the last pin is released.
pub trait Replacer: Send + Sync {
    /// Removes and returns the frame to evict next, if any.
    fn victim(&self) -> Option<FrameId>;

    /// Stops tracking `frame_id`. No-op if it is not tracked.
    fn pin(&self, frame_id: FrameId);

    /// Starts tracking `frame_id` as evictable. No-op if already tracked.
    fn unpin(&self, frame_id: FrameId);

    /// Returns a frame handed out by `victim` that could not be evicted,
    /// making it the next victim again.
    fn restore(&self, frame_id: FrameId);

    /// Number of evictable frames.
    fn size(&self) -> usize;
}

/// LRU Replacement Policy
///
/// Frames are kept in the order they became evictable. The victim is the
/// frame that has been evictable the longest. Unpinning an already tracked
/// frame does not refresh its position.
pub struct LruReplacer {
    /// Maximum number of frames the replacer can track
    max_frames: usize,
    /// Evictable frames, least recently unpinned at the front
    lru: Mutex<LinkedHashMap<FrameId, ()>>,
}

impl LruReplacer {
    /// Creates a new LRU replacer for a pool of `max_frames` frames.
    pub fn new(max_frames: usize) -> Self {
        Self {
            max_frames,
            lru: Mutex::new(LinkedHashMap::with_capacity(max_frames)),
        }
    }

    /// Returns the maximum number of frames.
    pub fn max_frames(&self) -> usize {
        self.max_frames
    }
}

impl Replacer for LruReplacer {
    fn victim(&self) -> Option<FrameId> {
        self.lru.lock().pop_front().map(|(frame_id, _)| frame_id)
    }

    fn pin(&self, frame_id: FrameId) {
        self.lru.lock().remove(&frame_id);
    }

    fn unpin(&self, frame_id: FrameId) {
        if frame_id.as_usize() >= self.max_frames {
            return;
        }

        let mut lru = self.lru.lock();
        if !lru.contains_key(&frame_id) {
            lru.insert(frame_id, ());
        }
    }

    fn restore(&self, frame_id: FrameId) {
        if frame_id.as_usize() >= self.max_frames {
            return;
        }

        let mut lru = self.lru.lock();
        if lru.contains_key(&frame_id) {
            return;
        }
        let rest: Vec<FrameId> = lru.keys().copied().collect();
        lru.clear();
        lru.insert(frame_id, ());
        for other in rest {
            lru.insert(other, ());
        }
    }

    fn size(&self) -> usize {
        self.lru.lock().len()
    }
}
