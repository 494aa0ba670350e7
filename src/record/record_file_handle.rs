use std::collections::HashSet;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::buffer::{BufferPoolManager, PageGuard};
use crate::common::{
    FileId, PageId, PageNo, Result, Rid, StrataError, RECORD_FILE_HEADER_PAGE,
};
use crate::storage::page::{RecordFileHeader, RecordLayout, RecordPage, RecordPageRef};

use super::{Record, RecordScan};

/// An open record file.
///
/// Page 0 holds the `RecordFileHeader`; data pages start at 1. Pages with at
/// least one free slot are chained through their `next_free` field, starting
/// from `first_free_page_no` in the header. The in-memory header is written
/// back by `flush_header` and when the file is closed.
///
/// Mutations hold the header lock for their whole duration, so operations
/// on one file are serialized while reads only pin the page they need.
pub struct RecordFileHandle {
    fd: FileId,
    layout: RecordLayout,
    bpm: Arc<BufferPoolManager>,
    header: Mutex<RecordFileHeader>,
}

impl RecordFileHandle {
    pub(crate) fn new(fd: FileId, header: RecordFileHeader, bpm: Arc<BufferPoolManager>) -> Self {
        Self {
            fd,
            layout: header.layout(),
            bpm,
            header: Mutex::new(header),
        }
    }

    pub fn fd(&self) -> FileId {
        self.fd
    }

    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    /// Returns a copy of the in-memory header.
    pub fn file_header(&self) -> RecordFileHeader {
        *self.header.lock()
    }

    /// Copies out the record at `rid`.
    pub fn get_record(&self, rid: Rid) -> Result<Record> {
        self.check_page(&self.header.lock(), rid.page_no)?;

        let guard = self.fetch(rid.page_no)?;
        let data = guard.data();
        let bytes = RecordPageRef::new(&data[..], self.layout)
            .record(rid.slot_id)
            .ok_or(StrataError::RecordNotFound(rid))?;
        Ok(Record::new(rid, bytes))
    }

    /// Stores `data` in the lowest free slot of the first page on the free
    /// list, allocating a new page if the list is empty.
    pub fn insert_record(&self, data: &[u8]) -> Result<Rid> {
        self.check_size(data)?;
        let mut header = self.header.lock();

        let mut guard = match header.first_free_page_no {
            Some(page_no) => self.fetch(page_no)?,
            None => self.create_page(&mut header)?,
        };
        let page_no = guard.page_id().page_no;

        let mut page_data = guard.data_mut();
        let mut page = RecordPage::new(&mut page_data[..], self.layout);
        let slot_id = page.insert(data).ok_or_else(|| {
            StrataError::InvalidFileHeader(format!("page {} on the free list is full", page_no))
        })?;

        if page.is_full() {
            header.first_free_page_no = page.next_free_page();
            debug!("page {} of {} is full", page_no, self.fd);
        }

        Ok(Rid::new(page_no, slot_id))
    }

    /// Stores `data` at a specific free slot of an existing data page.
    pub fn insert_record_at(&self, rid: Rid, data: &[u8]) -> Result<()> {
        self.check_size(data)?;
        let mut header = self.header.lock();
        self.check_page(&header, rid.page_no)?;

        let mut guard = self.fetch(rid.page_no)?;
        {
            let page_data = guard.data();
            let page = RecordPageRef::new(&page_data[..], self.layout);
            if rid.slot_id.as_usize() >= self.layout.num_records_per_page {
                return Err(StrataError::RecordNotFound(rid));
            }
            if page.is_occupied(rid.slot_id) {
                return Err(StrataError::RecordAlreadyExists(rid));
            }
        }

        let next = {
            let mut page_data = guard.data_mut();
            let mut page = RecordPage::new(&mut page_data[..], self.layout);
            page.insert_at(rid.slot_id, data);
            page.is_full().then(|| page.next_free_page())
        };

        if let Some(next) = next {
            self.unlink_free_page(&mut header, rid.page_no, next)?;
        }
        Ok(())
    }

    /// Frees the slot at `rid`. A page that was full goes back to the head
    /// of the free list.
    pub fn delete_record(&self, rid: Rid) -> Result<()> {
        let mut header = self.header.lock();
        self.check_page(&header, rid.page_no)?;

        let mut guard = self.fetch(rid.page_no)?;
        self.check_occupied(&guard, rid)?;

        let mut page_data = guard.data_mut();
        let mut page = RecordPage::new(&mut page_data[..], self.layout);
        let was_full = page.is_full();
        page.remove(rid.slot_id);

        if was_full {
            page.set_next_free_page(header.first_free_page_no);
            header.first_free_page_no = Some(rid.page_no);
            debug!("page {} of {} back on the free list", rid.page_no, self.fd);
        }
        Ok(())
    }

    /// Overwrites the record at `rid` in place.
    pub fn update_record(&self, rid: Rid, data: &[u8]) -> Result<()> {
        self.check_size(data)?;
        let header = self.header.lock();
        self.check_page(&header, rid.page_no)?;

        let mut guard = self.fetch(rid.page_no)?;
        self.check_occupied(&guard, rid)?;

        let mut page_data = guard.data_mut();
        RecordPage::new(&mut page_data[..], self.layout).update(rid.slot_id, data);
        Ok(())
    }

    /// Starts a forward scan over every live record.
    pub fn scan(&self) -> Result<RecordScan<'_>> {
        RecordScan::new(self)
    }

    /// Writes the in-memory header to page 0 and flushes it.
    pub fn flush_header(&self) -> Result<()> {
        let header = self.header.lock();
        let page_id = PageId::new(self.fd, PageNo::new(RECORD_FILE_HEADER_PAGE));

        let mut guard = self.bpm.fetch_page(page_id)?;
        {
            let mut page_data = guard.data_mut();
            page_data.fill(0);
            header.encode(&mut page_data[..]);
        }
        // Page 0 must stay pinned until it is written, or it may be evicted
        guard.flush()?;
        guard.unpin()
    }

    /// Walks the free-page list from the header.
    pub fn free_page_chain(&self) -> Result<Vec<PageNo>> {
        let header = self.header.lock();
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = header.first_free_page_no;

        while let Some(page_no) = cursor {
            if !seen.insert(page_no) {
                return Err(StrataError::InvalidFileHeader(format!(
                    "free list revisits page {}",
                    page_no
                )));
            }
            self.check_page(&header, page_no)?;
            chain.push(page_no);

            let guard = self.fetch(page_no)?;
            let page_data = guard.data();
            let page = RecordPageRef::new(&page_data[..], self.layout);
            if page.is_full() {
                return Err(StrataError::InvalidFileHeader(format!(
                    "full page {} is on the free list",
                    page_no
                )));
            }
            cursor = page.next_free_page();
        }

        Ok(chain)
    }

    pub(crate) fn num_pages(&self) -> u32 {
        self.header.lock().num_pages
    }

    pub(crate) fn fetch(&self, page_no: PageNo) -> Result<PageGuard<'_>> {
        self.bpm.fetch_page(PageId::new(self.fd, page_no))
    }

    /// Allocates and initializes a data page and makes it the free list head.
    fn create_page(&self, header: &mut RecordFileHeader) -> Result<PageGuard<'_>> {
        let mut guard = self.bpm.new_page(self.fd)?;
        let page_no = guard.page_id().page_no;
        {
            let mut page_data = guard.data_mut();
            let mut page = RecordPage::new(&mut page_data[..], self.layout);
            page.init();
            page.set_next_free_page(header.first_free_page_no);
        }

        header.num_pages = header.num_pages.max(page_no.as_u32() + 1);
        header.first_free_page_no = Some(page_no);
        debug!("created data page {} in {}", page_no, self.fd);
        Ok(guard)
    }

    /// Removes `page_no` from the free list, wherever it sits in the chain.
    fn unlink_free_page(
        &self,
        header: &mut RecordFileHeader,
        page_no: PageNo,
        next: Option<PageNo>,
    ) -> Result<()> {
        if header.first_free_page_no == Some(page_no) {
            header.first_free_page_no = next;
            return Ok(());
        }

        let mut cursor = header.first_free_page_no;
        let mut hops = 0;
        while let Some(prev_no) = cursor {
            hops += 1;
            if hops > header.num_pages {
                return Err(StrataError::InvalidFileHeader(
                    "free list does not terminate".to_string(),
                ));
            }

            let mut guard = self.fetch(prev_no)?;
            let prev_next = RecordPageRef::new(&guard.data()[..], self.layout).next_free_page();
            if prev_next == Some(page_no) {
                RecordPage::new(&mut guard.data_mut()[..], self.layout).set_next_free_page(next);
                return Ok(());
            }
            cursor = prev_next;
        }

        Err(StrataError::InvalidFileHeader(format!(
            "page {} is not on the free list",
            page_no
        )))
    }

    fn check_size(&self, data: &[u8]) -> Result<()> {
        if data.len() != self.layout.record_size {
            return Err(StrataError::RecordSizeMismatch {
                expected: self.layout.record_size,
                actual: data.len(),
            });
        }
        Ok(())
    }

    fn check_page(&self, header: &RecordFileHeader, page_no: PageNo) -> Result<()> {
        if page_no.as_u32() == RECORD_FILE_HEADER_PAGE || page_no.as_u32() >= header.num_pages {
            return Err(StrataError::PageNotExist(page_no));
        }
        Ok(())
    }

    fn check_occupied(&self, guard: &PageGuard<'_>, rid: Rid) -> Result<()> {
        let page_data = guard.data();
        if !RecordPageRef::new(&page_data[..], self.layout).is_occupied(rid.slot_id) {
            return Err(StrataError::RecordNotFound(rid));
        }
        Ok(())
    }
}

impl std::fmt::Debug for RecordFileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordFileHandle")
            .field("fd", &self.fd)
            .field("layout", &self.layout)
            .finish()
    }
}

