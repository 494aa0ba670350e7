use crate::common::{PageNo, Result, Rid, StrataError};
use crate::storage::page::RecordPageRef;

use super::RecordFileHandle;

/// Forward cursor over the live records of a file, in page-then-slot order.
///
/// The cursor rests on a live record until `advance` is called. Once every
/// page is exhausted it holds `Rid::INVALID` and `rid` fails with
/// `ScanEnded`. Records inserted or deleted behind the cursor are not
/// revisited; to start over, create a new scan.
pub struct RecordScan<'a> {
    handle: &'a RecordFileHandle,
    rid: Rid,
    /// Error hit while advancing past the last yielded record
    pending: Option<StrataError>,
}

impl<'a> RecordScan<'a> {
    /// Positions a new scan on the first live record.
    pub fn new(handle: &'a RecordFileHandle) -> Result<Self> {
        let rid = Self::seek(handle, 1, 0)?;
        Ok(Self {
            handle,
            rid,
            pending: None,
        })
    }

    /// Moves to the next live record.
    pub fn advance(&mut self) -> Result<()> {
        if self.is_end() {
            return Err(StrataError::ScanEnded);
        }
        self.rid = Self::seek(
            self.handle,
            self.rid.page_no.as_u32(),
            self.rid.slot_id.as_usize() + 1,
        )?;
        Ok(())
    }

    pub fn is_end(&self) -> bool {
        !self.rid.is_valid()
    }

    /// Returns the current position.
    pub fn rid(&self) -> Result<Rid> {
        if self.is_end() {
            return Err(StrataError::ScanEnded);
        }
        Ok(self.rid)
    }

    /// Finds the first live record at or after `(page, slot)`.
    fn seek(handle: &RecordFileHandle, page: u32, slot: usize) -> Result<Rid> {
        let num_pages = handle.num_pages();
        let layout = handle.layout();

        for page_no in page..num_pages {
            let from = if page_no == page { slot } else { 0 };
            let guard = handle.fetch(PageNo::new(page_no))?;
            let data = guard.data();
            if let Some(slot_id) = RecordPageRef::new(&data[..], layout).next_occupied(from) {
                return Ok(Rid::new(PageNo::new(page_no), slot_id));
            }
        }

        Ok(Rid::INVALID)
    }
}

impl Iterator for RecordScan<'_> {
    type Item = Result<Rid>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.pending.take() {
            return Some(Err(e));
        }
        if self.is_end() {
            return None;
        }

        let rid = self.rid;
        if let Err(e) = self.advance() {
            self.rid = Rid::INVALID;
            self.pending = Some(e);
        }
        Some(Ok(rid))
    }
}

impl std::fmt::Debug for RecordScan<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordScan").field("rid", &self.rid).finish()
    }
}
