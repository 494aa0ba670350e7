use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::{FrameId, PageId, PAGE_SIZE};

/// One slot of the buffer pool: the cached page image plus its metadata.
///
/// `page_id`, `pin_count` and `is_dirty` are only changed while the buffer
/// pool latch is held. The atomics let introspection read them without it.
pub struct FrameHeader {
    /// Index of this frame in the pool
    frame_id: FrameId,
    /// Page cached in this frame, None while the frame is free
    page_id: RwLock<Option<PageId>>,
    /// Number of outstanding users of the page
    pin_count: AtomicU32,
    /// Whether the image differs from what is on disk
    is_dirty: AtomicBool,
    /// The page image
    data: RwLock<Box<[u8; PAGE_SIZE]>>,
}

impl FrameHeader {
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page_id: RwLock::new(None),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
            data: RwLock::new(Box::new([0u8; PAGE_SIZE])),
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn page_id(&self) -> Option<PageId> {
        *self.page_id.read()
    }

    pub fn set_page_id(&self, page_id: Option<PageId>) {
        *self.page_id.write() = page_id;
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Increments the pin count and returns the new value.
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrements the pin count and returns the new value.
    /// Returns None if the pin count was already 0.
    pub fn unpin(&self) -> Option<u32> {
        loop {
            let current = self.pin_count.load(Ordering::Acquire);
            if current == 0 {
                return None;
            }
            if self
                .pin_count
                .compare_exchange(current, current - 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Some(current - 1);
            }
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.is_dirty.store(dirty, Ordering::Release);
    }

    /// Returns a read guard to the page image.
    pub fn read_data(&self) -> RwLockReadGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.data.read()
    }

    /// Returns a write guard to the page image.
    pub fn write_data(&self) -> RwLockWriteGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.data.write()
    }

    /// Replaces the page image.
    pub fn copy_from(&self, data: &[u8; PAGE_SIZE]) {
        self.data.write().copy_from_slice(data);
    }

    /// Copies the page image out.
    pub fn copy_to(&self, data: &mut [u8; PAGE_SIZE]) {
        data.copy_from_slice(&self.data.read()[..]);
    }

    /// Returns the frame to its free state.
    pub fn reset(&self) {
        *self.page_id.write() = None;
        self.pin_count.store(0, Ordering::Release);
        self.is_dirty.store(false, Ordering::Release);
        self.data.write().fill(0);
    }
}
