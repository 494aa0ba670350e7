use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::common::{FileId, FrameId, PageId, Result, StrataError, PAGE_SIZE};
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{FrameHeader, LruReplacer, PageGuard, Replacer};

/// Bookkeeping guarded by the pool latch
struct PoolState {
    /// Page table: maps resident page IDs to frame IDs
    page_table: HashMap<PageId, FrameId>,
    /// Frames that hold no page
    free_list: VecDeque<FrameId>,
}

/// BufferPoolManager caches pages of open files in a fixed set of frames.
///
/// Every operation runs under a single pool latch, disk I/O included, so a
/// page is loaded at most once no matter how many threads ask for it and a
/// frame is never handed out twice. Frames are recycled in LRU order of
/// their last unpin.
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool
    pool_size: usize,
    /// The buffer pool frames
    frames: Vec<Arc<FrameHeader>>,
    /// Page table and free list
    latch: Mutex<PoolState>,
    /// Eviction order of unpinned frames
    replacer: LruReplacer,
    /// Disk scheduler for page I/O
    disk_scheduler: DiskScheduler,
}

impl BufferPoolManager {
    /// Creates a buffer pool of `pool_size` frames on top of `disk_manager`.
    pub fn new(pool_size: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(FrameHeader::new(frame_id)));
            free_list.push_back(frame_id);
        }

        Self {
            pool_size,
            frames,
            latch: Mutex::new(PoolState {
                page_table: HashMap::new(),
                free_list,
            }),
            replacer: LruReplacer::new(pool_size),
            disk_scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Pins `page_id` in the pool, reading it from disk if it is not resident.
    ///
    /// Fails with `BufferPoolFull` when the page is absent and every frame is
    /// pinned.
    pub fn fetch_page(&self, page_id: PageId) -> Result<PageGuard<'_>> {
        let mut state = self.latch.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &self.frames[frame_id.as_usize()];
            frame.pin();
            self.replacer.pin(frame_id);
            return Ok(PageGuard::new(self, page_id, Arc::clone(frame)));
        }

        let frame_id = self.acquire_frame(&mut state)?;
        let frame = &self.frames[frame_id.as_usize()];

        let read = {
            let mut data = frame.write_data();
            self.disk_scheduler.schedule_read_sync(page_id, &mut data)
        };
        if let Err(e) = read {
            frame.reset();
            state.free_list.push_back(frame_id);
            return Err(e);
        }

        frame.set_page_id(Some(page_id));
        frame.set_dirty(false);
        frame.pin();
        state.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);
        debug!("loaded {} into {}", page_id, frame_id);

        Ok(PageGuard::new(self, page_id, Arc::clone(frame)))
    }

    /// Allocates a new page number in `fd` and pins a zeroed frame for it.
    ///
    /// Nothing reaches the disk until the page is flushed or evicted.
    pub fn new_page(&self, fd: FileId) -> Result<PageGuard<'_>> {
        let mut state = self.latch.lock();

        let frame_id = self.acquire_frame(&mut state)?;
        let frame = &self.frames[frame_id.as_usize()];

        let page_no = match self.disk_manager().allocate_page(fd) {
            Ok(page_no) => page_no,
            Err(e) => {
                state.free_list.push_back(frame_id);
                return Err(e);
            }
        };
        let page_id = PageId::new(fd, page_no);

        frame.set_page_id(Some(page_id));
        frame.pin();
        state.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);
        debug!("new {} in {}", page_id, frame_id);

        Ok(PageGuard::new(self, page_id, Arc::clone(frame)))
    }

    /// Releases one pin on `page_id`. `is_dirty` can only set the dirty flag,
    /// never clear it. The frame becomes evictable when the last pin goes.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<()> {
        let state = self.latch.lock();

        let &frame_id = state
            .page_table
            .get(&page_id)
            .ok_or(StrataError::PageNotResident(page_id))?;
        let frame = &self.frames[frame_id.as_usize()];

        let remaining = frame.unpin().ok_or(StrataError::PageNotPinned(page_id))?;
        if is_dirty {
            frame.set_dirty(true);
        }
        if remaining == 0 {
            self.replacer.unpin(frame_id);
        }

        Ok(())
    }

    /// Drops `page_id` from the pool without writing it back.
    ///
    /// Returns `Ok(false)` if the page was not resident and `Ok(true)` if a
    /// frame was freed. A pinned page cannot be deleted.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut state = self.latch.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(false);
        };
        let frame = &self.frames[frame_id.as_usize()];
        if frame.pin_count() > 0 {
            return Err(StrataError::PageStillPinned(page_id));
        }

        state.page_table.remove(&page_id);
        self.replacer.pin(frame_id);
        frame.reset();
        state.free_list.push_back(frame_id);
        self.disk_manager().deallocate_page(page_id);
        debug!("deleted {} from {}", page_id, frame_id);

        Ok(true)
    }

    /// Writes `page_id` to disk whether or not it is dirty.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let state = self.latch.lock();

        let &frame_id = state
            .page_table
            .get(&page_id)
            .ok_or(StrataError::PageNotResident(page_id))?;
        self.write_back(page_id, &self.frames[frame_id.as_usize()])
    }

    /// Writes every resident page of `fd` to disk.
    pub fn flush_all_pages(&self, fd: FileId) -> Result<()> {
        let state = self.latch.lock();

        for (&page_id, &frame_id) in state.page_table.iter() {
            if page_id.fd == fd {
                self.write_back(page_id, &self.frames[frame_id.as_usize()])?;
            }
        }

        Ok(())
    }

    /// Writes every resident page to disk.
    pub fn flush_all(&self) -> Result<()> {
        let state = self.latch.lock();

        for (&page_id, &frame_id) in state.page_table.iter() {
            self.write_back(page_id, &self.frames[frame_id.as_usize()])?;
        }

        Ok(())
    }

    /// Writes back and drops every resident page of `fd`, e.g. before the
    /// file is closed and its descriptor reused.
    pub fn remove_file_pages(&self, fd: FileId) -> Result<()> {
        let mut state = self.latch.lock();

        let resident: Vec<(PageId, FrameId)> = state
            .page_table
            .iter()
            .filter(|(page_id, _)| page_id.fd == fd)
            .map(|(&page_id, &frame_id)| (page_id, frame_id))
            .collect();

        if let Some(&(page_id, _)) = resident
            .iter()
            .find(|(_, frame_id)| self.frames[frame_id.as_usize()].pin_count() > 0)
        {
            return Err(StrataError::PageStillPinned(page_id));
        }

        for (page_id, frame_id) in resident {
            let frame = &self.frames[frame_id.as_usize()];
            if frame.is_dirty() {
                self.write_back(page_id, frame)?;
            }
            state.page_table.remove(&page_id);
            self.replacer.pin(frame_id);
            frame.reset();
            state.free_list.push_back(frame_id);
        }

        Ok(())
    }

    /// Returns the pin count of a resident page.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        self.with_frame(page_id, |frame| frame.pin_count())
    }

    /// Returns the dirty flag of a resident page.
    pub fn is_dirty(&self, page_id: PageId) -> Option<bool> {
        self.with_frame(page_id, |frame| frame.is_dirty())
    }

    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.latch.lock().page_table.contains_key(&page_id)
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Returns the number of frames holding no page.
    pub fn free_frame_count(&self) -> usize {
        self.latch.lock().free_list.len()
    }

    /// Returns the number of resident, unpinned frames.
    pub fn evictable_count(&self) -> usize {
        let _state = self.latch.lock();
        self.replacer.size()
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        self.disk_scheduler.disk_manager()
    }

    fn with_frame<T>(&self, page_id: PageId, f: impl FnOnce(&FrameHeader) -> T) -> Option<T> {
        let state = self.latch.lock();
        state
            .page_table
            .get(&page_id)
            .map(|&frame_id| f(&self.frames[frame_id.as_usize()]))
    }

    /// Finds a frame for a new resident page: a free one if possible,
    /// otherwise the replacer's victim after writing it back if dirty.
    /// The returned frame is zeroed, unpinned and unmapped.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = self.replacer.victim().ok_or(StrataError::BufferPoolFull)?;
        let frame = &self.frames[frame_id.as_usize()];

        if let Some(old_page_id) = frame.page_id() {
            if frame.is_dirty() {
                if let Err(e) = self.write_back(old_page_id, frame) {
                    // Keep the victim resident, first in line for eviction
                    self.replacer.restore(frame_id);
                    return Err(e);
                }
            }
            state.page_table.remove(&old_page_id);
            debug!("evicted {} from {}", old_page_id, frame_id);
        }

        frame.reset();
        Ok(frame_id)
    }

    fn write_back(&self, page_id: PageId, frame: &FrameHeader) -> Result<()> {
        let mut data = [0u8; PAGE_SIZE];
        frame.copy_to(&mut data);
        self.disk_scheduler.schedule_write_sync(page_id, &data)?;
        frame.set_dirty(false);
        debug!("wrote back {}", page_id);
        Ok(())
    }
}
