//! Shared work-queue file for dynamic first-move mode.
//!
//! A fixed-layout 8-byte file: bytes 0-3 hold the next-worker-index counter,
//! bytes 4-7 hold the total worker count, both native-endian u32s (the file
//! never crosses hosts; it lives for one run). Every access takes an
//! advisory exclusive `flock` over the whole file for the whole critical
//! section, so the counter is monotone and each worker receives a distinct
//! index.
//!
//! The coordinator creates and unlinks the file; workers inherit the path
//! across fork and open it themselves.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const COUNTER_OFFSET: u64 = 0;
const TOTAL_OFFSET: u64 = 4;

/// Handle to the shared queue file.
#[derive(Debug)]
pub struct WorkQueue {
    file: File,
    path: PathBuf,
    cached_index: Option<u32>,
}

/// Holds LOCK_EX on a file; unlocks on drop.
struct FlockGuard<'a> {
    file: &'a File,
}

impl<'a> FlockGuard<'a> {
    fn acquire(file: &'a File) -> io::Result<Self> {
        // SAFETY: flock on a descriptor we own.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { file })
    }
}

impl Drop for FlockGuard<'_> {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}

impl WorkQueue {
    /// Create the queue file with counter 0 and the given worker total.
    pub fn create(path: &Path, total: u32) -> Result<Self> {
        if total == 0 {
            return Err(Error::Queue("total workers must be > 0".into()));
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        {
            let _lock = FlockGuard::acquire(&file)?;
            write_cell(&file, COUNTER_OFFSET, 0)?;
            write_cell(&file, TOTAL_OFFSET, total)?;
        }
        Ok(Self {
            file,
            path: path.to_path_buf(),
            cached_index: None,
        })
    }

    /// Open an existing queue file (worker side).
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            cached_index: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically claim the next worker index.
    ///
    /// The first successful call caches its result; repeated calls return the
    /// cached value, so a worker's index is stable for its lifetime.
    pub fn acquire_worker_index(&mut self) -> Result<u32> {
        if let Some(index) = self.cached_index {
            return Ok(index);
        }
        let index = {
            let _lock = FlockGuard::acquire(&self.file)?;
            let index = read_cell(&self.file, COUNTER_OFFSET)?;
            write_cell(&self.file, COUNTER_OFFSET, index + 1)?;
            index
        };
        self.cached_index = Some(index);
        Ok(index)
    }

    /// Total number of queue workers, as written at creation.
    pub fn read_total(&mut self) -> Result<u32> {
        let _lock = FlockGuard::acquire(&self.file)?;
        read_cell(&self.file, TOTAL_OFFSET)
    }

    /// Unlink the queue file. Coordinator-only, after all children are reaped.
    pub fn destroy(self) -> Result<()> {
        std::fs::remove_file(&self.path)?;
        Ok(())
    }
}

// Cell I/O goes through `&File` so it can run while the flock guard holds
// its shared borrow of the same handle.
fn read_cell(mut file: &File, offset: u64) -> Result<u32> {
    file.seek(SeekFrom::Start(offset))?;
    let mut bytes = [0u8; 4];
    file.read_exact(&mut bytes)?;
    Ok(u32::from_ne_bytes(bytes))
}

fn write_cell(mut file: &File, offset: u64, value: u32) -> Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(&value.to_ne_bytes())?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_and_read_total() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue");
        let mut queue = WorkQueue::create(&path, 6).unwrap();
        assert_eq!(queue.read_total().unwrap(), 6);
    }

    #[test]
    fn test_create_rejects_zero_workers() {
        let dir = tempdir().unwrap();
        assert!(WorkQueue::create(&dir.path().join("q"), 0).is_err());
    }

    /// P5: W acquisitions through separate handles yield 0..W exactly and
    /// leave the counter at W.
    #[test]
    fn test_each_handle_gets_a_distinct_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue");
        let _creator = WorkQueue::create(&path, 4).unwrap();

        let mut indices = Vec::new();
        for _ in 0..4 {
            let mut handle = WorkQueue::open(&path).unwrap();
            indices.push(handle.acquire_worker_index().unwrap());
        }
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2, 3]);

        let mut fifth = WorkQueue::open(&path).unwrap();
        assert_eq!(fifth.acquire_worker_index().unwrap(), 4);
    }

    #[test]
    fn test_index_is_cached_per_handle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue");
        let _creator = WorkQueue::create(&path, 2).unwrap();

        let mut handle = WorkQueue::open(&path).unwrap();
        assert_eq!(handle.acquire_worker_index().unwrap(), 0);
        assert_eq!(handle.acquire_worker_index().unwrap(), 0);

        let mut other = WorkQueue::open(&path).unwrap();
        assert_eq!(other.acquire_worker_index().unwrap(), 1);
    }

    #[test]
    fn test_concurrent_acquisition_is_exclusive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue");
        let total = 16u32;
        let _creator = WorkQueue::create(&path, total).unwrap();

        let mut handles = Vec::new();
        for _ in 0..total {
            let path = path.clone();
            handles.push(std::thread::spawn(move || {
                let mut queue = WorkQueue::open(&path).unwrap();
                queue.acquire_worker_index().unwrap()
            }));
        }
        let mut indices: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..total).collect::<Vec<_>>());
    }

    #[test]
    fn test_destroy_unlinks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue");
        let queue = WorkQueue::create(&path, 1).unwrap();
        assert!(path.exists());
        queue.destroy().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_open_missing_file_fails() {
        let dir = tempdir().unwrap();
        assert!(WorkQueue::open(&dir.path().join("absent")).is_err());
    }
}
