//! Storage access: the raw backend contract and the gateway that makes it
//! safe to use from many tasks.
//!
//! A backend instance is not concurrency-safe and is owned by exactly one
//! task. Everything else talks to [`gateway::SyncedStorage`], which funnels
//! every operation through that owning task.

pub mod gateway;
pub mod mem;

use alloc::string::String;

use serde::Serialize;

/// Metadata for one stored entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    /// Entry name (last path segment)
    pub name: String,
    /// Full path of the entry
    pub path: String,
    /// Size in bytes
    pub size: usize,
    /// Modification time in seconds since the epoch, 0 when unknown
    pub modified: u64,
    /// Whether the entry is a directory
    pub is_dir: bool,
}

/// Raw storage backend.
///
/// Implementations wrap a concrete volume (flash filesystem on target, RAM
/// in tests). Failure semantics are benign by contract: reading a missing
/// file yields zero bytes, removing a missing file succeeds, and stat of a
/// missing entry is `None` rather than an error.
pub trait StorageBackend {
    /// Mount the volume. Returns false when the volume is unusable.
    fn mount(&mut self) -> bool;

    /// Read the whole file into `out`, returning the byte count.
    fn read(&mut self, name: &str, out: &mut String) -> usize;

    /// Replace the file contents, returning the bytes written (0 on failure).
    fn write(&mut self, name: &str, contents: &str) -> usize;

    /// Delete a file.
    fn remove(&mut self, name: &str) -> bool;

    /// Whether a file exists.
    fn exists(&mut self, name: &str) -> bool;

    /// Erase the whole volume.
    fn format(&mut self) -> bool;

    /// Visit every entry under `path`, recursively.
    fn list(&mut self, path: &str, visit: &mut dyn FnMut(&FileInfo)) -> bool;

    /// Metadata of one entry.
    fn stat(&mut self, name: &str) -> Option<FileInfo>;
}
