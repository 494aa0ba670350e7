use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};

use crate::buffer::BufferPoolManager;
use crate::common::{FileId, PageNo, Result, StrataError, PAGE_SIZE, RECORD_FILE_HEADER_PAGE};
use crate::storage::disk::DiskManager;
use crate::storage::page::{RecordFileHeader, RecordLayout};

use super::RecordFileHandle;

/// Creates, destroys, opens and closes record files.
pub struct RecordManager {
    disk_manager: Arc<DiskManager>,
    bpm: Arc<BufferPoolManager>,
}

impl RecordManager {
    pub fn new(disk_manager: Arc<DiskManager>, bpm: Arc<BufferPoolManager>) -> Self {
        Self { disk_manager, bpm }
    }

    /// Creates a record file packing as many `record_size` records per page
    /// as fit.
    pub fn create_file<P: AsRef<Path>>(&self, path: P, record_size: usize) -> Result<()> {
        let layout = RecordLayout::with_max_capacity(record_size).ok_or_else(|| {
            StrataError::InvalidRecordLayout(format!(
                "{}-byte records do not fit in a {}-byte page",
                record_size, PAGE_SIZE
            ))
        })?;
        self.create_with_layout(path.as_ref(), layout)
    }

    /// Creates a record file with exactly `records_per_page` slots per page.
    pub fn create_file_with_capacity<P: AsRef<Path>>(
        &self,
        path: P,
        record_size: usize,
        records_per_page: usize,
    ) -> Result<()> {
        let layout = RecordLayout::new(record_size, records_per_page).ok_or_else(|| {
            StrataError::InvalidRecordLayout(format!(
                "{} records of {} bytes do not fit in a {}-byte page",
                records_per_page, record_size, PAGE_SIZE
            ))
        })?;
        self.create_with_layout(path.as_ref(), layout)
    }

    pub fn destroy_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.disk_manager.destroy_file(path)
    }

    /// Opens a record file and loads its header.
    pub fn open_file<P: AsRef<Path>>(&self, path: P) -> Result<RecordFileHandle> {
        let fd = self.disk_manager.open_file(path.as_ref())?;

        match self.read_header(fd) {
            Ok(header) => {
                debug!(
                    "opened {} as {}: {} pages, free list head {:?}",
                    path.as_ref().display(),
                    fd,
                    header.num_pages,
                    header.first_free_page_no
                );
                Ok(RecordFileHandle::new(fd, header, Arc::clone(&self.bpm)))
            }
            Err(e) => {
                if let Err(close_err) = self.disk_manager.close_file(fd) {
                    warn!("failed to close {} after a bad open: {}", fd, close_err);
                }
                Err(e)
            }
        }
    }

    /// Persists the header, writes back and drops the file's cached pages,
    /// then closes the descriptor.
    ///
    /// On failure the file stays open and the handle is handed back with the
    /// error, so the caller can release whatever blocked the close and retry.
    pub fn close_file(
        &self,
        handle: RecordFileHandle,
    ) -> std::result::Result<(), (RecordFileHandle, StrataError)> {
        let fd = handle.fd();
        let closed = handle
            .flush_header()
            .and_then(|()| self.bpm.remove_file_pages(fd))
            .and_then(|()| self.disk_manager.close_file(fd));

        match closed {
            Ok(()) => {
                debug!("closed {}", fd);
                Ok(())
            }
            Err(e) => {
                warn!("failed to close {}: {}", fd, e);
                Err((handle, e))
            }
        }
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPoolManager> {
        &self.bpm
    }

    fn create_with_layout(&self, path: &Path, layout: RecordLayout) -> Result<()> {
        self.disk_manager.create_file(path)?;
        let fd = self.disk_manager.open_file(path)?;

        let header = RecordFileHeader::new(layout);
        let written = self.disk_manager.write_page(
            fd,
            PageNo::new(RECORD_FILE_HEADER_PAGE),
            &header.to_page()[..],
        );
        self.disk_manager.close_file(fd)?;
        written?;

        debug!(
            "created record file {} with {} records of {} bytes per page",
            path.display(),
            layout.num_records_per_page,
            layout.record_size
        );
        Ok(())
    }

    fn read_header(&self, fd: FileId) -> Result<RecordFileHeader> {
        let mut buf = [0u8; PAGE_SIZE];
        self.disk_manager
            .read_page(fd, PageNo::new(RECORD_FILE_HEADER_PAGE), &mut buf)?;
        let header = RecordFileHeader::decode(&buf)?;
        self.disk_manager
            .set_next_page_no(fd, PageNo::new(header.num_pages))?;
        Ok(header)
    }
}
