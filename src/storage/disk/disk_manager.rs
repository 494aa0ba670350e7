use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::{Mutex, RwLock};

use crate::common::{
    FileId, PageId, PageNo, Result, StrataError, LOG_FILE_NAME, MAX_OPEN_FILES, PAGE_SIZE,
};

/// An entry in the descriptor table.
struct OpenFile {
    /// Path the file was opened with
    path: PathBuf,
    /// The file itself; seek + read/write happen under this lock
    file: Mutex<File>,
    /// Next page number handed out by `allocate_page`
    next_page_no: AtomicU32,
}

/// Bidirectional descriptor <-> path mapping, bounded by `MAX_OPEN_FILES`.
#[derive(Default)]
struct FileTable {
    by_fd: HashMap<FileId, Arc<OpenFile>>,
    by_path: HashMap<PathBuf, FileId>,
}

impl FileTable {
    fn lowest_free_fd(&self) -> Option<FileId> {
        (0..MAX_OPEN_FILES as u32)
            .map(FileId::new)
            .find(|fd| !self.by_fd.contains_key(fd))
    }
}

/// DiskManager performs page-granular I/O on any number of open files and
/// owns the append-only log file.
///
/// Page `n` of a file occupies bytes `[n * PAGE_SIZE, (n + 1) * PAGE_SIZE)`.
/// Reading a page that lies beyond the end of the file yields zeros, so a page
/// that was allocated but never written reads as an empty page.
pub struct DiskManager {
    /// Descriptor table
    files: RwLock<FileTable>,
    /// Path of the log file
    log_path: PathBuf,
    /// Lazily opened log file
    log_file: Mutex<Option<File>>,
    /// Number of page reads performed
    num_reads: AtomicU32,
    /// Number of page writes performed
    num_writes: AtomicU32,
}

impl DiskManager {
    /// Creates a DiskManager whose log lives at `LOG_FILE_NAME` in the
    /// working directory. No file is touched until it is used.
    pub fn new() -> Self {
        Self::with_log_path(LOG_FILE_NAME)
    }

    /// Creates a DiskManager with an explicit log file path.
    pub fn with_log_path<P: AsRef<Path>>(log_path: P) -> Self {
        Self {
            files: RwLock::new(FileTable::default()),
            log_path: log_path.as_ref().to_path_buf(),
            log_file: Mutex::new(None),
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
        }
    }

    /// Reads page `page_no` of `fd` into `data`. The number of bytes read is
    /// `data.len()`.
    pub fn read_page(&self, fd: FileId, page_no: PageNo, data: &mut [u8]) -> Result<()> {
        let entry = self.entry(fd)?;
        let offset = page_no.offset(PAGE_SIZE);

        let mut file = entry.file.lock();
        let file_len = file.metadata()?.len();
        self.num_reads.fetch_add(1, Ordering::Relaxed);

        if offset >= file_len {
            data.fill(0);
            return Ok(());
        }

        file.seek(SeekFrom::Start(offset))?;

        let mut read = 0;
        while read < data.len() {
            match file.read(&mut data[read..]) {
                Ok(0) => break,
                Ok(n) => read += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if read != data.len() {
            return Err(StrataError::IncompleteRead {
                fd,
                page_no,
                expected: data.len(),
                actual: read,
            });
        }

        Ok(())
    }

    /// Writes `data` as page `page_no` of `fd` and forces it to stable storage
    /// before returning.
    pub fn write_page(&self, fd: FileId, page_no: PageNo, data: &[u8]) -> Result<()> {
        let entry = self.entry(fd)?;
        let offset = page_no.offset(PAGE_SIZE);

        let mut file = entry.file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let mut written = 0;
        while written < data.len() {
            match file.write(&data[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if written != data.len() {
            return Err(StrataError::IncompleteWrite {
                fd,
                page_no,
                expected: data.len(),
                actual: written,
            });
        }

        file.sync_data()?;
        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Hands out the next page number of `fd`. This is only a counter; the
    /// page reaches the disk when it is first written.
    pub fn allocate_page(&self, fd: FileId) -> Result<PageNo> {
        let entry = self.entry(fd)?;
        let page_no = PageNo::new(entry.next_page_no.fetch_add(1, Ordering::SeqCst));
        debug!("allocated page {} in {}", page_no, fd);
        Ok(page_no)
    }

    /// Pages are never reclaimed.
    pub fn deallocate_page(&self, _page_id: PageId) {}

    /// Returns the page number the next `allocate_page` call will return.
    pub fn next_page_no(&self, fd: FileId) -> Result<PageNo> {
        let entry = self.entry(fd)?;
        Ok(PageNo::new(entry.next_page_no.load(Ordering::SeqCst)))
    }

    /// Resets the allocation counter of `fd`, e.g. from a persisted page count.
    pub fn set_next_page_no(&self, fd: FileId, page_no: PageNo) -> Result<()> {
        let entry = self.entry(fd)?;
        entry.next_page_no.store(page_no.as_u32(), Ordering::SeqCst);
        Ok(())
    }

    /// Returns whether `path` names an existing regular file.
    pub fn is_file<P: AsRef<Path>>(&self, path: P) -> bool {
        path.as_ref().is_file()
    }

    /// Creates an empty file. Fails if anything already exists at `path`.
    pub fn create_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if path.exists() {
            return Err(StrataError::FileExists(path.to_path_buf()));
        }

        OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => StrataError::FileExists(path.to_path_buf()),
                _ => StrataError::Io(e),
            })?;

        debug!("created file {}", path.display());
        Ok(())
    }

    /// Deletes a file. Fails if it does not exist or is currently open.
    pub fn destroy_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if !self.is_file(path) {
            return Err(StrataError::FileNotFound(path.to_path_buf()));
        }

        let key = fs::canonicalize(path)?;
        if self.files.read().by_path.contains_key(&key) {
            return Err(StrataError::FileInUse(path.to_path_buf()));
        }

        fs::remove_file(path)?;
        debug!("destroyed file {}", path.display());
        Ok(())
    }

    /// Opens an existing file and returns its descriptor. A path may only be
    /// open once at a time.
    pub fn open_file<P: AsRef<Path>>(&self, path: P) -> Result<FileId> {
        let path = path.as_ref();
        if !self.is_file(path) {
            return Err(StrataError::FileNotFound(path.to_path_buf()));
        }

        let key = fs::canonicalize(path)?;
        let mut files = self.files.write();

        if files.by_path.contains_key(&key) {
            return Err(StrataError::FileAlreadyOpen(path.to_path_buf()));
        }

        let fd = files.lowest_free_fd().ok_or(StrataError::TooManyOpenFiles)?;

        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let file_len = file.metadata()?.len();
        let num_pages = file_len.div_ceil(PAGE_SIZE as u64) as u32;

        files.by_fd.insert(
            fd,
            Arc::new(OpenFile {
                path: path.to_path_buf(),
                file: Mutex::new(file),
                next_page_no: AtomicU32::new(num_pages),
            }),
        );
        files.by_path.insert(key, fd);

        debug!("opened {} as {} ({} pages)", path.display(), fd, num_pages);
        Ok(fd)
    }

    /// Closes a descriptor returned by `open_file`.
    pub fn close_file(&self, fd: FileId) -> Result<()> {
        let entry = {
            let mut files = self.files.write();
            let entry = files.by_fd.remove(&fd).ok_or(StrataError::FileNotOpen(fd))?;
            files.by_path.retain(|_, open_fd| *open_fd != fd);
            entry
        };

        entry.file.lock().sync_all()?;
        debug!("closed {} ({})", fd, entry.path.display());
        Ok(())
    }

    /// Returns the size of the file at `path`, or None if it does not exist.
    pub fn get_file_size<P: AsRef<Path>>(&self, path: P) -> Option<u64> {
        fs::metadata(path).ok().map(|metadata| metadata.len())
    }

    /// Returns the path an open descriptor was opened with.
    pub fn get_file_name(&self, fd: FileId) -> Result<PathBuf> {
        Ok(self.entry(fd)?.path.clone())
    }

    /// Returns the descriptor of `path`, opening the file if necessary.
    pub fn get_file_fd<P: AsRef<Path>>(&self, path: P) -> Result<FileId> {
        let path = path.as_ref();
        if let Ok(key) = fs::canonicalize(path) {
            if let Some(&fd) = self.files.read().by_path.get(&key) {
                return Ok(fd);
            }
        }
        self.open_file(path)
    }

    /// Returns whether `fd` is currently open.
    pub fn is_open(&self, fd: FileId) -> bool {
        self.files.read().by_fd.contains_key(&fd)
    }

    /// Returns whether `path` names an existing directory.
    pub fn is_dir<P: AsRef<Path>>(&self, path: P) -> bool {
        path.as_ref().is_dir()
    }

    /// Creates a directory. Fails if anything already exists at `path`.
    pub fn create_dir<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if path.exists() {
            return Err(StrataError::FileExists(path.to_path_buf()));
        }
        fs::create_dir(path)?;
        Ok(())
    }

    /// Removes a directory and everything in it.
    pub fn destroy_dir<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if !self.is_dir(path) {
            return Err(StrataError::FileNotFound(path.to_path_buf()));
        }
        fs::remove_dir_all(path)?;
        Ok(())
    }

    /// Appends `data` to the log file and syncs it.
    pub fn write_log(&self, data: &[u8]) -> Result<()> {
        let mut guard = self.log_file.lock();
        let file = match guard.take() {
            Some(file) => guard.insert(file),
            None => guard.insert(self.open_log()?),
        };

        file.write_all(data)?;
        file.sync_data()?;
        Ok(())
    }

    /// Reads up to `data.len()` log bytes starting at `offset`.
    ///
    /// Returns `None` if `offset` lies beyond the end of the log, otherwise the
    /// number of bytes copied (0 at exactly the end).
    pub fn read_log(&self, data: &mut [u8], offset: u64) -> Result<Option<usize>> {
        let mut guard = self.log_file.lock();
        let file = match guard.take() {
            Some(file) => guard.insert(file),
            None => guard.insert(self.open_log()?),
        };

        let file_len = file.metadata()?.len();
        if offset > file_len {
            return Ok(None);
        }

        let size = data.len().min((file_len - offset) as usize);
        if size == 0 {
            return Ok(Some(0));
        }

        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut data[..size])?;
        Ok(Some(size))
    }

    /// Returns the path of the log file.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Returns the number of page reads performed.
    pub fn num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    /// Returns the number of page writes performed.
    pub fn num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    fn entry(&self, fd: FileId) -> Result<Arc<OpenFile>> {
        self.files
            .read()
            .by_fd
            .get(&fd)
            .cloned()
            .ok_or(StrataError::FileNotOpen(fd))
    }

    fn open_log(&self) -> Result<File> {
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.log_path)?;
        Ok(file)
    }
}

impl Default for DiskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        for (fd, entry) in self.files.get_mut().by_fd.iter() {
            if let Err(e) = entry.file.lock().sync_all() {
                warn!("failed to sync {} on shutdown: {}", fd, e);
            }
        }
    }
}
