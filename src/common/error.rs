use std::path::PathBuf;

use thiserror::Error;

use super::types::{FileId, PageId, PageNo, Rid};

/// Storage engine error types
#[derive(Error, Debug)]
pub enum StrataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Incomplete read of page {page_no} in {fd}: expected {expected} bytes, got {actual}")]
    IncompleteRead {
        fd: FileId,
        page_no: PageNo,
        expected: usize,
        actual: usize,
    },

    #[error("Incomplete write of page {page_no} in {fd}: expected {expected} bytes, wrote {actual}")]
    IncompleteWrite {
        fd: FileId,
        page_no: PageNo,
        expected: usize,
        actual: usize,
    },

    #[error("Disk scheduler error: {0}")]
    DiskScheduler(String),

    #[error("File {0} already exists")]
    FileExists(PathBuf),

    #[error("File {0} not found")]
    FileNotFound(PathBuf),

    #[error("File {0} is already open")]
    FileAlreadyOpen(PathBuf),

    #[error("File {0} is open and cannot be destroyed")]
    FileInUse(PathBuf),

    #[error("{0} is not open")]
    FileNotOpen(FileId),

    #[error("Too many open files")]
    TooManyOpenFiles,

    #[error("Buffer pool is full, no evictable frames available")]
    BufferPoolFull,

    #[error("{0} is not resident in the buffer pool")]
    PageNotResident(PageId),

    #[error("{0} is not pinned")]
    PageNotPinned(PageId),

    #[error("{0} is still pinned")]
    PageStillPinned(PageId),

    #[error("Page {0} does not exist")]
    PageNotExist(PageNo),

    #[error("Record does not exist at {0}")]
    RecordNotFound(Rid),

    #[error("Record already exists at {0}")]
    RecordAlreadyExists(Rid),

    #[error("Record size mismatch: expected {expected} bytes, got {actual}")]
    RecordSizeMismatch { expected: usize, actual: usize },

    #[error("Invalid record layout: {0}")]
    InvalidRecordLayout(String),

    #[error("Invalid record file header: {0}")]
    InvalidFileHeader(String),

    #[error("Scan has ended")]
    ScanEnded,
}

pub type Result<T> = std::result::Result<T, StrataError>;
