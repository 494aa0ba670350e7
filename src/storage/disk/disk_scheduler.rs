use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, warn};

use crate::common::{PageId, Result, StrataError, DISK_QUEUE_DEPTH, PAGE_SIZE};

use super::DiskManager;

/// A page image travelling to or from the worker thread.
pub type PageBuf = Box<[u8; PAGE_SIZE]>;

/// Represents a disk I/O request
pub enum DiskRequest {
    /// Read a page; the worker replies with the filled buffer
    Read {
        page_id: PageId,
        reply: Sender<Result<PageBuf>>,
    },
    /// Write a page; the worker replies once the write is durable
    Write {
        page_id: PageId,
        data: PageBuf,
        reply: Sender<Result<()>>,
    },
}

/// DiskScheduler owns a background worker thread that performs disk I/O on
/// behalf of the buffer pool. Callers submit a request and block on its
/// completion, so every scheduled operation is synchronous for the caller.
pub struct DiskScheduler {
    /// The disk manager for actual I/O operations
    disk_manager: Arc<DiskManager>,
    /// Channel sender for queuing requests; dropping it stops the worker
    request_sender: Option<Sender<DiskRequest>>,
    /// Handle to the background worker thread
    worker_handle: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    /// Creates a new DiskScheduler and spawns its worker.
    pub fn new(disk_manager: Arc<DiskManager>) -> Self {
        let (sender, receiver) = bounded::<DiskRequest>(DISK_QUEUE_DEPTH);

        let dm_clone = Arc::clone(&disk_manager);
        let worker_handle = thread::Builder::new()
            .name("strata-disk".into())
            .spawn(move || Self::run_worker(dm_clone, receiver))
            .ok();

        if worker_handle.is_none() {
            warn!("failed to spawn disk worker; requests will be served inline");
        }

        Self {
            disk_manager,
            request_sender: worker_handle.as_ref().map(|_| sender),
            worker_handle,
        }
    }

    /// Queues a request for the worker. Without a worker the request is
    /// processed on the calling thread.
    pub fn schedule(&self, request: DiskRequest) -> Result<()> {
        match &self.request_sender {
            Some(sender) => sender
                .send(request)
                .map_err(|e| StrataError::DiskScheduler(format!("failed to schedule: {}", e))),
            None => {
                Self::process_request(&self.disk_manager, request);
                Ok(())
            }
        }
    }

    /// Reads `page_id` into `data` and waits for completion.
    pub fn schedule_read_sync(&self, page_id: PageId, data: &mut [u8; PAGE_SIZE]) -> Result<()> {
        let (tx, rx) = bounded(1);
        self.schedule(DiskRequest::Read { page_id, reply: tx })?;

        let buf = rx.recv().map_err(|e| {
            StrataError::DiskScheduler(format!("failed to receive completion: {}", e))
        })??;
        data.copy_from_slice(&buf[..]);
        Ok(())
    }

    /// Writes `data` as `page_id` and waits until it is durable.
    pub fn schedule_write_sync(&self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()> {
        let (tx, rx) = bounded(1);
        self.schedule(DiskRequest::Write {
            page_id,
            data: Box::new(*data),
            reply: tx,
        })?;

        rx.recv().map_err(|e| {
            StrataError::DiskScheduler(format!("failed to receive completion: {}", e))
        })?
    }

    /// Returns a reference to the underlying DiskManager.
    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }

    /// Worker loop: runs until every sender is gone.
    fn run_worker(disk_manager: Arc<DiskManager>, receiver: Receiver<DiskRequest>) {
        for request in receiver.iter() {
            Self::process_request(&disk_manager, request);
        }
        debug!("disk worker exiting");
    }

    fn process_request(disk_manager: &DiskManager, request: DiskRequest) {
        match request {
            DiskRequest::Read { page_id, reply } => {
                let mut buf: PageBuf = Box::new([0u8; PAGE_SIZE]);
                let result = disk_manager
                    .read_page(page_id.fd, page_id.page_no, &mut buf[..])
                    .map(|_| buf);
                let _ = reply.send(result);
            }
            DiskRequest::Write {
                page_id,
                data,
                reply,
            } => {
                let result = disk_manager.write_page(page_id.fd, page_id.page_no, &data[..]);
                let _ = reply.send(result);
            }
        }
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain the queue and exit
        self.request_sender.take();

        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}
