//! RAM-backed storage backend for hosts and tests.

use alloc::collections::BTreeMap;
use alloc::string::String;

use crate::storage::{FileInfo, StorageBackend};

/// Clock supplying modification timestamps, in seconds.
pub type TimeFn = fn() -> u64;

fn zero_time() -> u64 {
    0
}

/// In-memory volume with a flat path-keyed namespace.
///
/// Directories are implicit in names; `list` matches on path prefixes and
/// reports files only. Failure semantics mirror the embedded volume: reads
/// of missing files yield zero bytes and removes of missing files succeed.
pub struct MemVolume {
    files: BTreeMap<String, MemFile>,
    clock: TimeFn,
    mounted: bool,
}

struct MemFile {
    contents: String,
    modified: u64,
}

impl MemVolume {
    /// Empty volume with no timestamp source.
    pub fn new() -> Self {
        Self::with_clock(zero_time)
    }

    /// Empty volume stamping modification times from `clock`.
    pub fn with_clock(clock: TimeFn) -> Self {
        Self {
            files: BTreeMap::new(),
            clock,
            mounted: false,
        }
    }
}

impl Default for MemVolume {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemVolume {
    fn mount(&mut self) -> bool {
        self.mounted = true;
        true
    }

    fn read(&mut self, name: &str, out: &mut String) -> usize {
        out.clear();
        match self.files.get(name) {
            Some(file) => {
                out.push_str(&file.contents);
                out.len()
            }
            None => 0,
        }
    }

    fn write(&mut self, name: &str, contents: &str) -> usize {
        let modified = (self.clock)();
        self.files.insert(
            String::from(name),
            MemFile {
                contents: String::from(contents),
                modified,
            },
        );
        contents.len()
    }

    fn remove(&mut self, name: &str) -> bool {
        self.files.remove(name);
        true
    }

    fn exists(&mut self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    fn format(&mut self) -> bool {
        self.files.clear();
        true
    }

    fn list(&mut self, path: &str, visit: &mut dyn FnMut(&FileInfo)) -> bool {
        if !self.mounted {
            return false;
        }
        for (name, file) in &self.files {
            if name.starts_with(path) {
                visit(&FileInfo {
                    name: String::from(last_segment(name)),
                    path: name.clone(),
                    size: file.contents.len(),
                    modified: file.modified,
                    is_dir: false,
                });
            }
        }
        true
    }

    fn stat(&mut self, name: &str) -> Option<FileInfo> {
        self.files.get(name).map(|file| FileInfo {
            name: String::from(last_segment(name)),
            path: String::from(name),
            size: file.contents.len(),
            modified: file.modified,
            is_dir: false,
        })
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
