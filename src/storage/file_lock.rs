use std::fs::File;
use crate::core::error::{Error, Result};

/// Single writer guarantee. Holds an exclusive advisory lock on the store
/// file for as long as it is alive.
pub struct FileLock {
    pub file: File,
}

impl FileLock {
    /// Locks the open file description behind `file` without blocking.
    /// Fails if another handle, in this or another process, holds the lock.
    pub fn acquire(file: &File) -> Result<Self> {
        let file = file.try_clone()?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_EX, LOCK_NB};

            let fd = file.as_raw_fd();

            unsafe {
                if flock(fd, LOCK_EX | LOCK_NB) != 0 {
                    return Err(Error::store_unavailable(format!(
                        "store file is locked by another handle: {}",
                        std::io::Error::last_os_error()
                    )));
                }
            }
        }

        Ok(FileLock { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_UN};

            let fd = self.file.as_raw_fd();
            unsafe {
                flock(fd, LOCK_UN);
            }
        }
    }
}
