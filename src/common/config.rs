/// Size of a page in bytes (4 KB)
pub const PAGE_SIZE: usize = 4096;

/// Default buffer pool size (number of frames)
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 64;

/// Capacity of the disk manager's descriptor table
pub const MAX_OPEN_FILES: usize = 1024;

/// Name of the append-only log file, relative to the working directory
pub const LOG_FILE_NAME: &str = "db.log";

/// Depth of the bounded disk scheduler request queue
pub const DISK_QUEUE_DEPTH: usize = 128;

/// Magic number stamped at the start of every record file header ("STRT")
pub const RECORD_FILE_MAGIC: u32 = 0x5354_5254;

/// On-disk record file format version
pub const RECORD_FILE_VERSION: u32 = 1;

/// Page number of the record file header
pub const RECORD_FILE_HEADER_PAGE: u32 = 0;

/// Number of bits in one bitmap byte
pub const BITMAP_WIDTH: usize = 8;
