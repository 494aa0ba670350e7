use std::sync::Arc;

use log::warn;
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, Result, PAGE_SIZE};

use super::{BufferPoolManager, FrameHeader};

/// RAII handle for a pinned page.
///
/// Dropping the guard releases its pin, passing along whether the page was
/// written through `data_mut` or `mark_dirty`. Data locks obtained from the
/// guard must be released before calling back into the buffer pool.
pub struct PageGuard<'a> {
    bpm: &'a BufferPoolManager,
    page_id: PageId,
    frame: Arc<FrameHeader>,
    is_dirty: bool,
    released: bool,
}

impl<'a> PageGuard<'a> {
    pub(crate) fn new(bpm: &'a BufferPoolManager, page_id: PageId, frame: Arc<FrameHeader>) -> Self {
        Self {
            bpm,
            page_id,
            frame,
            is_dirty: false,
            released: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns a shared lock on the page image.
    pub fn data(&self) -> RwLockReadGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.frame.read_data()
    }

    /// Returns an exclusive lock on the page image and marks the page dirty.
    pub fn data_mut(&mut self) -> RwLockWriteGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.is_dirty = true;
        self.frame.write_data()
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    /// Writes the page to disk while keeping it pinned. The page counts as
    /// clean afterwards unless it is written again through this guard.
    pub fn flush(&mut self) -> Result<()> {
        self.bpm.flush_page(self.page_id)?;
        self.is_dirty = false;
        Ok(())
    }

    /// Releases the pin now, reporting any protocol error.
    pub fn unpin(mut self) -> Result<()> {
        self.released = true;
        self.bpm.unpin_page(self.page_id, self.is_dirty)
    }

    /// Gives up the guard but keeps the pin. The caller becomes responsible
    /// for a matching `BufferPoolManager::unpin_page`, which should carry the
    /// dirty flag if `mark_dirty` or `data_mut` was used on this guard.
    pub fn detach(mut self) -> PageId {
        self.released = true;
        self.page_id
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.bpm.unpin_page(self.page_id, self.is_dirty) {
            warn!("failed to release {}: {}", self.page_id, e);
        }
    }
}
