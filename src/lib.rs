//! Strata - the storage core of a disk-oriented relational database
//!
//! This crate provides the layers that sit between table-level code and the
//! file system. Tables are files of fixed-width records, cached page by page
//! in a shared buffer pool.
//!
//! # Architecture
//!
//! The system is organized into several layers:
//!
//! - **Storage Layer** (`storage`): Handles disk I/O and page organization
//!   - `DiskManager`: Open-file table, page reads and writes, the log file
//!   - `DiskScheduler`: Background worker that performs page I/O
//!   - `RecordPage`: Bitmap-indexed slots of fixed-width records
//!   - `RecordFileHeader`: Page 0 of every record file
//!
//! - **Buffer Pool** (`buffer`): Memory management for database pages
//!   - `BufferPoolManager`: Fetches pages from disk and caches them in memory
//!   - `LruReplacer`: Least-recently-unpinned page replacement policy
//!   - `FrameHeader`: Per-frame metadata and data storage
//!   - `PageGuard`: RAII handle that releases its pin when dropped
//!
//! - **Record Files** (`record`): Fixed-width records addressed by `Rid`
//!   - `RecordManager`: Creates, destroys, opens and closes record files
//!   - `RecordFileHandle`: Get, insert, update and delete records
//!   - `RecordScan`: Forward scan over the live records of a file
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use strata::buffer::BufferPoolManager;
//! use strata::common::DEFAULT_BUFFER_POOL_SIZE;
//! use strata::record::RecordManager;
//! use strata::storage::disk::DiskManager;
//!
//! let disk_manager = Arc::new(DiskManager::new());
//! let bpm = Arc::new(BufferPoolManager::new(DEFAULT_BUFFER_POOL_SIZE, Arc::clone(&disk_manager)));
//! let manager = RecordManager::new(disk_manager, bpm);
//!
//! manager.create_file("users.tbl", 16).unwrap();
//! let file = manager.open_file("users.tbl").unwrap();
//!
//! let rid = file.insert_record(b"0123456789abcdef").unwrap();
//! assert_eq!(file.get_record(rid).unwrap().data(), b"0123456789abcdef");
//!
//! for rid in file.scan().unwrap() {
//!     println!("{}", rid.unwrap());
//! }
//!
//! manager.close_file(file).unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod record;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{FileId, PageId, PageNo, Result, Rid, SlotId, StrataError};
