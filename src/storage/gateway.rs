//! Single-owner gateway serializing all storage access.
//!
//! Callers build a typed request carrying its own payload and a fresh
//! rendezvous, enqueue it with a bounded timeout, and wait on the rendezvous
//! with the same timeout. One dedicated task owns the backend, executes one
//! operation per message, and completes the caller's rendezvous with the
//! result. A send that succeeds always runs to completion on the owning
//! task, even if the caller gives up waiting.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use embassy_time::Duration;

use crate::kernel::Kernel;
use crate::queue::MessageQueue;
use crate::rendezvous::Rendezvous;
use crate::scheduler::{SchedulerError, TaskBody, TaskDef, TaskId, TaskScheduler};
use crate::storage::{FileInfo, StorageBackend};

/// Depth of the request queue.
pub const STORAGE_QUEUE_DEPTH: usize = 10;

/// Bounded timeout applied to enqueueing a request and, separately, to
/// waiting for its completion.
pub const STORAGE_OP_TIMEOUT: Duration = Duration::from_millis(1000);

/// Receive slice of the owning task's loop. Short enough that a scheduler
/// stop request is observed well inside the shutdown budget.
const RECEIVE_SLICE: Duration = Duration::from_millis(10);

/// Files smaller than this are treated as torn writes at mount time.
/// Kept below the smallest legitimate state document.
const CORRUPT_SIZE_LIMIT: usize = 16;

/// Per-entry callback for list operations.
///
/// Runs on the owning task, not on the caller.
pub type ListVisitor = Box<dyn FnMut(&FileInfo) + Send>;

/// A typed storage request. Owns its payload; enqueueing transfers the
/// message to the owning task.
enum StorageRequest {
    Read {
        name: String,
        reply: Arc<Rendezvous<String>>,
    },
    Write {
        name: String,
        contents: String,
        reply: Arc<Rendezvous<usize>>,
    },
    WriteAsync {
        name: String,
        contents: String,
    },
    Remove {
        name: String,
        reply: Arc<Rendezvous<bool>>,
    },
    Exists {
        name: String,
        reply: Arc<Rendezvous<bool>>,
    },
    Format {
        reply: Arc<Rendezvous<bool>>,
    },
    List {
        path: String,
        visit: ListVisitor,
        reply: Arc<Rendezvous<bool>>,
    },
    Stat {
        name: String,
        reply: Arc<Rendezvous<FileInfo>>,
    },
}

type RequestQueue = MessageQueue<StorageRequest, STORAGE_QUEUE_DEPTH>;

/// Owning-task body: mounts the backend, then executes queued requests one
/// at a time.
pub struct StorageTask {
    backend: Box<dyn StorageBackend + Send>,
    queue: Arc<RequestQueue>,
    kernel: Arc<dyn Kernel>,
}

impl StorageTask {
    fn execute(&mut self, request: StorageRequest) {
        match request {
            StorageRequest::Read { name, reply } => {
                let mut contents = String::new();
                self.backend.read(&name, &mut contents);
                reply.complete(contents);
            }
            StorageRequest::Write {
                name,
                contents,
                reply,
            } => {
                reply.complete(self.backend.write(&name, &contents));
            }
            StorageRequest::WriteAsync { name, contents } => {
                if self.backend.write(&name, &contents) == 0 {
                    log::error!("deferred write of {name} failed, contents dropped");
                }
            }
            StorageRequest::Remove { name, reply } => {
                reply.complete(self.backend.remove(&name));
            }
            StorageRequest::Exists { name, reply } => {
                reply.complete(self.backend.exists(&name));
            }
            StorageRequest::Format { reply } => {
                reply.complete(self.backend.format());
            }
            StorageRequest::List {
                path,
                mut visit,
                reply,
            } => {
                reply.complete(self.backend.list(&path, &mut *visit));
            }
            StorageRequest::Stat { name, reply } => {
                reply.complete(self.backend.stat(&name).unwrap_or_default());
            }
        }
    }

    /// Delete undersized files left behind by interrupted saves.
    fn sweep_torn_writes(&mut self) {
        let mut torn: Vec<String> = Vec::new();
        let listed = self.backend.list("/", &mut |entry| {
            if !entry.is_dir && entry.size < CORRUPT_SIZE_LIMIT {
                torn.push(entry.path.clone());
            }
        });
        if !listed {
            return;
        }
        for path in &torn {
            self.backend.remove(path);
            log::warn!("removed likely corrupted file {path} (size < {CORRUPT_SIZE_LIMIT} bytes)");
        }
    }
}

impl TaskBody for StorageTask {
    fn setup(&mut self) {
        if !self.backend.mount() {
            log::error!("storage volume failed to mount, requests will fail");
            return;
        }
        self.sweep_torn_writes();
        log::info!("storage volume mounted");
    }

    fn run(&mut self) {
        if let Some(request) = self.queue.receive_timeout(RECEIVE_SLICE, &*self.kernel) {
            self.execute(request);
        }
    }
}

/// Cloneable caller handle to the storage gateway.
///
/// Synchronous calls cooperatively block the caller until the owning task
/// completes the operation, or until the timeout. Enqueue timeouts and
/// completion timeouts are distinguished in the log but both collapse to a
/// zero/false result for the caller.
#[derive(Clone)]
pub struct SyncedStorage {
    queue: Arc<RequestQueue>,
    kernel: Arc<dyn Kernel>,
    timeout: Duration,
}

impl SyncedStorage {
    /// Start the owning task on the scheduler and return the caller handle
    /// together with the task id (for shutdown).
    ///
    /// `def` carries the task parameters; by convention its priority is one
    /// above the creating task's so queued requests drain promptly.
    pub fn start(
        backend: Box<dyn StorageBackend + Send>,
        scheduler: &mut TaskScheduler,
        def: &TaskDef,
    ) -> Result<(Self, TaskId), SchedulerError> {
        let queue = Arc::new(RequestQueue::new());
        let kernel = scheduler.kernel();
        let task = StorageTask {
            backend,
            queue: queue.clone(),
            kernel: kernel.clone(),
        };
        let id = scheduler.start_task(def, Box::new(task))?;
        Ok((
            Self {
                queue,
                kernel,
                timeout: STORAGE_OP_TIMEOUT,
            },
            id,
        ))
    }

    /// Read a whole file into `contents`.
    ///
    /// Returns the byte count; 0 for a missing file or a timed-out call.
    pub fn read_file(&self, name: &str, contents: &mut String) -> usize {
        let reply = Arc::new(Rendezvous::new());
        let request = StorageRequest::Read {
            name: String::from(name),
            reply: reply.clone(),
        };
        if !self.enqueue(request, "read", name) {
            return 0;
        }
        match reply.wait(self.timeout, &*self.kernel) {
            Some(data) => {
                *contents = data;
                contents.len()
            }
            None => {
                self.log_completion_timeout("read", name);
                0
            }
        }
    }

    /// Write a whole file, waiting for completion.
    ///
    /// Returns the bytes written; 0 on failure or timeout.
    pub fn write_file(&self, name: &str, contents: &str) -> usize {
        let reply = Arc::new(Rendezvous::new());
        let request = StorageRequest::Write {
            name: String::from(name),
            contents: String::from(contents),
            reply: reply.clone(),
        };
        if !self.enqueue(request, "write", name) {
            return 0;
        }
        match reply.wait(self.timeout, &*self.kernel) {
            Some(written) => written,
            None => {
                self.log_completion_timeout("write", name);
                0
            }
        }
    }

    /// Write a whole file without waiting for completion.
    ///
    /// Ownership of `contents` transfers with the request; the owning task
    /// consumes it. Returns whether the request was enqueued.
    pub fn write_file_async(&self, name: &str, contents: String) -> bool {
        let request = StorageRequest::WriteAsync {
            name: String::from(name),
            contents,
        };
        self.enqueue(request, "deferred write", name)
    }

    /// Delete a file. Deleting a missing file reports success.
    pub fn remove(&self, name: &str) -> bool {
        let reply = Arc::new(Rendezvous::new());
        let request = StorageRequest::Remove {
            name: String::from(name),
            reply: reply.clone(),
        };
        if !self.enqueue(request, "remove", name) {
            return false;
        }
        reply.wait(self.timeout, &*self.kernel).unwrap_or_else(|| {
            self.log_completion_timeout("remove", name);
            false
        })
    }

    /// Whether a file exists.
    pub fn exists(&self, name: &str) -> bool {
        let reply = Arc::new(Rendezvous::new());
        let request = StorageRequest::Exists {
            name: String::from(name),
            reply: reply.clone(),
        };
        if !self.enqueue(request, "exists", name) {
            return false;
        }
        reply.wait(self.timeout, &*self.kernel).unwrap_or_else(|| {
            self.log_completion_timeout("exists", name);
            false
        })
    }

    /// Erase the whole volume.
    pub fn format(&self) -> bool {
        let reply = Arc::new(Rendezvous::new());
        let request = StorageRequest::Format {
            reply: reply.clone(),
        };
        if !self.enqueue(request, "format", "/") {
            return false;
        }
        reply.wait(self.timeout, &*self.kernel).unwrap_or_else(|| {
            self.log_completion_timeout("format", "/");
            false
        })
    }

    /// Visit every entry under `path`, recursively.
    ///
    /// The callback executes on the owning task; callers must not assume
    /// their own task's context inside it.
    pub fn list(&self, path: &str, visit: ListVisitor) -> bool {
        let reply = Arc::new(Rendezvous::new());
        let request = StorageRequest::List {
            path: String::from(path),
            visit,
            reply: reply.clone(),
        };
        if !self.enqueue(request, "list", path) {
            return false;
        }
        reply.wait(self.timeout, &*self.kernel).unwrap_or_else(|| {
            self.log_completion_timeout("list", path);
            false
        })
    }

    /// Metadata of one entry.
    ///
    /// A missing entry (or a timed-out call) yields an all-zero `FileInfo`;
    /// callers inspect the magnitude rather than a distinct error.
    pub fn stat(&self, name: &str) -> FileInfo {
        let reply = Arc::new(Rendezvous::new());
        let request = StorageRequest::Stat {
            name: String::from(name),
            reply: reply.clone(),
        };
        if !self.enqueue(request, "stat", name) {
            return FileInfo::default();
        }
        reply.wait(self.timeout, &*self.kernel).unwrap_or_else(|| {
            self.log_completion_timeout("stat", name);
            FileInfo::default()
        })
    }

    fn enqueue(&self, request: StorageRequest, op: &str, name: &str) -> bool {
        if self
            .queue
            .send_timeout(request, self.timeout, &*self.kernel)
            .is_err()
        {
            log::error!(
                "storage request queue full, {op} of {name} dropped after {}ms",
                self.timeout.as_millis()
            );
            return false;
        }
        true
    }

    fn log_completion_timeout(&self, op: &str, name: &str) {
        log::error!(
            "no completion from storage task for {op} of {name} within {}ms",
            self.timeout.as_millis()
        );
    }
}
